//! File-backed session store.
//!
//! Each session lives in its own directory under the data root:
//!
//! ```text
//! <root>/<id>/meta.json    usage counters, budget, timestamps, files
//! <root>/<id>/state.json   scratch map
//! <root>/<id>/input/       ingested blobs
//! <root>/<id>/chunks/      chunk files
//! <root>/<id>/output/      synthesis results
//! ```
//!
//! Sessions are loaded into memory on first reference and flushed to disk
//! by [`SessionManager::save`]. Every record is written to a temporary file
//! and renamed into place so a crash never leaves a half-written record.

use rlmgate_core::error::{Result, StorageError};
use rlmgate_core::{BudgetLimits, ScratchValue, Session, validate_session_id};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

const META_FILE: &str = "meta.json";
const STATE_FILE: &str = "state.json";
const EXPORT_FILE: &str = "export.json";

/// On-disk paths for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub dir: PathBuf,
    pub meta: PathBuf,
    pub state: PathBuf,
    pub input: PathBuf,
    pub chunks: PathBuf,
    pub output: PathBuf,
}

impl SessionLayout {
    fn new(dir: PathBuf) -> Self {
        Self {
            meta: dir.join(META_FILE),
            state: dir.join(STATE_FILE),
            input: dir.join("input"),
            chunks: dir.join("chunks"),
            output: dir.join("output"),
            dir,
        }
    }

    /// Default target of a state export.
    pub fn export(&self) -> PathBuf {
        self.dir.join(EXPORT_FILE)
    }

    /// Create the session directory and its content subdirectories.
    pub async fn ensure(&self) -> Result<()> {
        for dir in [&self.dir, &self.input, &self.chunks, &self.output] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::io(dir, e))?;
        }
        Ok(())
    }
}

/// Everything a session owns, flattened into one document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionExport<'a> {
    #[serde(flatten)]
    meta: &'a Session,
    scratch: &'a BTreeMap<String, ScratchValue>,
    exported_at: chrono::DateTime<chrono::Utc>,
}

/// The in-process registry of sessions.
///
/// Each cached session sits behind its own mutex: operations on one id run
/// one at a time, while different ids only share the brief cache lookup.
pub struct SessionManager {
    root: PathBuf,
    defaults: BudgetLimits,
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    /// Create a manager rooted at `root`. New sessions get `defaults`.
    pub fn new(root: impl Into<PathBuf>, defaults: BudgetLimits) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "Session store ready");
        Self {
            root,
            defaults,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn defaults(&self) -> &BudgetLimits {
        &self.defaults
    }

    /// Paths for a session id. The id must already be validated.
    pub fn layout(&self, id: &str) -> SessionLayout {
        SessionLayout::new(self.root.join(id))
    }

    /// Get a cached session, load it from disk, or create a fresh one.
    ///
    /// The returned guard holds the session's lock until dropped. Only a
    /// cache hit refreshes the last-access time.
    pub async fn get_or_create(&self, id: &str) -> Result<OwnedMutexGuard<Session>> {
        validate_session_id(id)?;

        let cached = self.sessions.lock().await.get(id).cloned();
        if let Some(handle) = cached {
            let mut session = handle.lock_owned().await;
            session.touch();
            return Ok(session);
        }

        let session = match self.load(id).await? {
            Some(session) => {
                debug!(session = %id, "Loaded session from disk");
                session
            }
            None => {
                debug!(session = %id, "Created new session");
                Session::new(id, self.defaults)
            }
        };

        let handle = self
            .sessions
            .lock()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone();
        Ok(handle.lock_owned().await)
    }

    /// Read a session's records, or `None` if it was never saved.
    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let layout = self.layout(id);

        let Some(meta) = read_optional(&layout.meta).await? else {
            return Ok(None);
        };
        let mut session: Session = serde_json::from_str(&meta).map_err(|e| {
            warn!(path = %layout.meta.display(), error = %e, "Corrupted session metadata");
            StorageError::Corrupt {
                path: layout.meta.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(state) = read_optional(&layout.state).await? {
            session.scratch = serde_json::from_str(&state).map_err(|e| {
                warn!(path = %layout.state.display(), error = %e, "Corrupted session state");
                StorageError::Corrupt {
                    path: layout.state.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(Some(session))
    }

    /// Persist a session's metadata and scratch records.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let layout = self.layout(&session.id);
        layout.ensure().await?;

        write_json_atomic(&layout.meta, session).await?;
        write_json_atomic(&layout.state, &session.scratch).await?;

        debug!(
            session = %session.id,
            tokens = session.usage.tokens_used,
            calls = session.usage.calls_made,
            "Session saved"
        );
        Ok(())
    }

    /// Write metadata, scratch and materialized paths to one JSON file.
    ///
    /// Defaults to `<session dir>/export.json`. Returns the written path.
    pub async fn export(&self, session: &Session, target: Option<PathBuf>) -> Result<PathBuf> {
        let layout = self.layout(&session.id);
        let path = target.unwrap_or_else(|| layout.export());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }

        let document = SessionExport {
            meta: session,
            scratch: &session.scratch,
            exported_at: chrono::Utc::now(),
        };
        write_json_atomic(&path, &document).await?;
        Ok(path)
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e).into()),
    }
}

/// Serialize `value` next to `path` and rename it into place.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".into());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(path, e).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlmgate_core::ErrorKind;

    fn manager(dir: &Path) -> SessionManager {
        SessionManager::new(dir, BudgetLimits::default())
    }

    #[tokio::test]
    async fn new_session_gets_default_budget() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = BudgetLimits {
            max_cost: 2.0,
            ..Default::default()
        };
        let store = SessionManager::new(dir.path(), defaults);

        let session = store.get_or_create("fresh").await.unwrap();
        assert_eq!(session.id, "fresh");
        assert_eq!(session.budget, defaults);
        assert_eq!(session.usage.calls_made, 0);
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();

        let saved = {
            let store = manager(dir.path());
            let mut session = store.get_or_create("persist").await.unwrap();
            session.usage.tokens_used = 1234;
            session.usage.cost_used = 0.0421;
            session.usage.calls_made = 3;
            session.budget.max_tokens = 5000;
            session.scratch.insert("answer".into(), ScratchValue::Number(42.0));
            session.scratch.insert(
                "notes".into(),
                ScratchValue::List(vec!["a".into(), true.into()]),
            );
            session.track_file(dir.path().join("persist/input/doc.txt"));
            store.save(&session).await.unwrap();
            session.clone()
        };

        // A fresh manager must read back exactly what was written.
        let store = manager(dir.path());
        let reloaded = store.get_or_create("persist").await.unwrap();
        assert_eq!(*reloaded, saved);
    }

    #[tokio::test]
    async fn save_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = manager(dir.path());
        let session = store.get_or_create("layout").await.unwrap();
        store.save(&session).await.unwrap();

        let layout = store.layout("layout");
        assert!(layout.meta.is_file());
        assert!(layout.state.is_file());
        assert!(layout.input.is_dir());
        assert!(layout.chunks.is_dir());
        assert!(layout.output.is_dir());

        // No temporary files are left behind.
        let stray = std::fs::read_dir(&layout.dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(stray, 0);
    }

    #[tokio::test]
    async fn cache_hit_returns_same_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = manager(dir.path());
        {
            let mut session = store.get_or_create("cached").await.unwrap();
            session.usage.calls_made = 7;
        }
        let session = store.get_or_create("cached").await.unwrap();
        assert_eq!(session.usage.calls_made, 7);
    }

    #[tokio::test]
    async fn invalid_id_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = manager(dir.path());
        let err = store.get_or_create("../etc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn corrupted_metadata_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("broken");
        std::fs::create_dir_all(&session_dir).unwrap();
        std::fs::write(session_dir.join(META_FILE), "{ not json").unwrap();

        let store = manager(dir.path());
        let err = store.get_or_create("broken").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn corrupted_state_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = manager(dir.path());
            let session = store.get_or_create("half").await.unwrap();
            store.save(&session).await.unwrap();
        }
        std::fs::write(dir.path().join("half").join(STATE_FILE), "[1, 2").unwrap();

        let store = manager(dir.path());
        let err = store.get_or_create("half").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn same_session_operations_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(manager(dir.path()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    let mut session = store.get_or_create("shared").await.unwrap();
                    let calls = session.usage.calls_made;
                    tokio::task::yield_now().await;
                    session.usage.calls_made = calls + 1;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let session = store.get_or_create("shared").await.unwrap();
        assert_eq!(session.usage.calls_made, 200);
    }

    #[tokio::test]
    async fn export_writes_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = manager(dir.path());
        let mut session = store.get_or_create("exp").await.unwrap();
        session.scratch.insert("k".into(), "v".into());

        let path = store.export(&session, None).await.unwrap();
        assert_eq!(path, store.layout("exp").export());

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["id"], "exp");
        assert_eq!(doc["scratch"]["k"], "v");
        assert!(doc["budget"].get("maxTokens").is_some());
        assert!(doc["files"].is_array());

        let custom = dir.path().join("elsewhere/out.json");
        let written = store.export(&session, Some(custom.clone())).await.unwrap();
        assert_eq!(written, custom);
        assert!(custom.is_file());
    }
}
