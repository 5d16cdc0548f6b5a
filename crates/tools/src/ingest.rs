//! Ingest writer: materializes caller data as a file in a session's `input/`.

use rlmgate_core::error::{Error, Result, StorageError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Data handed to `ingest`.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestData {
    /// Written as-is.
    Text(String),
    /// Written as pretty-printed JSON.
    Structured(serde_json::Value),
}

impl IngestData {
    /// Strings stay text; every other JSON shape is structured.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Self::Text(text),
            other => Self::Structured(other),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Text(_) => "txt",
            Self::Structured(_) => "json",
        }
    }

    fn render(&self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Structured(value) => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}

/// Where the data landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingested {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Reject names that could escape the input directory.
pub fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("name must not be empty"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains("..") {
        return Err(Error::validation(format!(
            "name '{name}' must not contain path separators or '..'"
        )));
    }
    if trimmed.starts_with('.') {
        return Err(Error::validation(format!("name '{name}' must not start with '.'")));
    }
    Ok(())
}

async fn count_files(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::io(dir, e).into()),
    };

    let mut count = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io(dir, e))?
    {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            count += 1;
        }
    }
    Ok(count)
}

/// First `<prefix>_<n>.<extension>` in `dir` that does not exist yet,
/// counting up from one more than the number of files already there.
pub async fn next_free_path(dir: &Path, prefix: &str, extension: &str) -> Result<PathBuf> {
    let mut n = count_files(dir).await? + 1;
    loop {
        let path = dir.join(format!("{prefix}_{n}.{extension}"));
        let taken = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        if !taken {
            return Ok(path);
        }
        n += 1;
    }
}

/// Write `data` into `input_dir`.
///
/// Without a name the file is called `input_<n>`, the first free number
/// from one more than the files already there. A name without an extension
/// gets `.txt` or `.json`. Writing the same name twice overwrites.
pub async fn ingest(input_dir: &Path, data: &IngestData, name: Option<&str>) -> Result<Ingested> {
    let path = match name {
        Some(name) => {
            validate_name(name)?;
            let base = name.trim();
            if Path::new(base).extension().is_some() {
                input_dir.join(base)
            } else {
                input_dir.join(format!("{base}.{}", data.extension()))
            }
        }
        None => next_free_path(input_dir, "input", data.extension()).await?,
    };

    tokio::fs::create_dir_all(input_dir)
        .await
        .map_err(|e| StorageError::io(input_dir, e))?;

    let content = data.render()?;
    tokio::fs::write(&path, &content)
        .await
        .map_err(|e| StorageError::io(&path, e))?;

    let bytes = content.len() as u64;
    debug!(path = %path.display(), bytes, "Ingested data");
    Ok(Ingested { path, bytes })
}
