//! Scratch and budget operations on a session.

use std::path::PathBuf;

use rlmgate_core::error::{Error, Result};
use rlmgate_core::{BudgetLimits, BudgetPatch, ScratchValue, UsageCounters};
use rlmgate_telemetry::ledger::{self, Exhausted, Remaining};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::orchestrator::{Orchestrator, resolve};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEntry {
    pub key: String,
    pub value: Option<Value>,
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateKeys {
    pub keys: Vec<String>,
}

/// Usage, ceilings and what is left.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub budget: BudgetLimits,
    pub used: UsageCounters,
    pub remaining: Remaining,
    pub ok: bool,
    pub reason: Option<Exhausted>,
}

/// Keys are stored exactly as given, so surrounding whitespace is refused
/// rather than silently trimmed.
fn require_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::validation("key is required"));
    }
    if key != key.trim() {
        return Err(Error::validation(format!(
            "key '{key}' must not have leading or trailing whitespace"
        )));
    }
    Ok(())
}

impl Orchestrator {
    pub async fn state_get(&self, session_id: &str, key: &str) -> Result<StateEntry> {
        require_key(key)?;
        let session = self.sessions().get_or_create(session_id).await?;
        let value = session.scratch.get(key).map(Value::from);
        let entry = StateEntry {
            key: key.to_string(),
            found: value.is_some(),
            value,
        };
        self.finish(&session, Ok(entry)).await
    }

    /// Store one scratch entry. `null` is not a storable value.
    pub async fn state_set(&self, session_id: &str, key: &str, value: Value) -> Result<StateEntry> {
        require_key(key)?;
        let stored = ScratchValue::try_from(value)?;
        let echo = Value::from(&stored);

        let mut session = self.sessions().get_or_create(session_id).await?;
        session.scratch.insert(key.to_string(), stored);
        let entry = StateEntry {
            key: key.to_string(),
            value: Some(echo),
            found: true,
        };
        self.finish(&session, Ok(entry)).await
    }

    pub async fn state_list(&self, session_id: &str) -> Result<StateKeys> {
        let session = self.sessions().get_or_create(session_id).await?;
        let keys = session.scratch.keys().cloned().collect();
        self.finish(&session, Ok(StateKeys { keys })).await
    }

    /// Empty the scratch map. Returns how many entries were removed.
    pub async fn state_clear(&self, session_id: &str) -> Result<usize> {
        let mut session = self.sessions().get_or_create(session_id).await?;
        let cleared = session.scratch.len();
        session.scratch.clear();
        info!(session = %session_id, cleared, "Scratch cleared");
        self.finish(&session, Ok(cleared)).await
    }

    /// Report the budget, first merging `patch` into the ceilings if given.
    pub async fn state_budget(
        &self,
        session_id: &str,
        patch: Option<BudgetPatch>,
    ) -> Result<BudgetReport> {
        let patch = patch.filter(|p| !p.is_empty());
        if let Some(patch) = &patch {
            patch.validate()?;
        }

        let mut session = self.sessions().get_or_create(session_id).await?;
        let result = (|| -> Result<BudgetReport> {
            if let Some(patch) = &patch {
                session.budget.apply(patch)?;
                info!(session = %session_id, budget = ?session.budget, "Budget updated");
            }
            let check = ledger::check(&session);
            Ok(BudgetReport {
                budget: session.budget,
                used: session.usage,
                remaining: check.remaining,
                ok: check.ok,
                reason: check.reason,
            })
        })();
        self.finish(&session, result).await
    }

    /// Zero the counters and clear scratch. Ceilings are kept.
    pub async fn state_reset(&self, session_id: &str) -> Result<BudgetLimits> {
        let mut session = self.sessions().get_or_create(session_id).await?;
        session.reset();
        info!(session = %session_id, "Session reset");
        let budget = session.budget;
        self.finish(&session, Ok(budget)).await
    }

    /// Write the session to one JSON file and return its path.
    pub async fn state_export(&self, session_id: &str, path: Option<&str>) -> Result<PathBuf> {
        let layout = self.sessions().layout(session_id);
        let target = path.map(|p| resolve(&layout, p)).transpose()?;

        let session = self.sessions().get_or_create(session_id).await?;
        let result = self.sessions().export(&session, target).await;
        if let Ok(path) = &result {
            info!(session = %session_id, path = %path.display(), "Session exported");
        }
        self.finish(&session, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, orchestrator_with};
    use rlmgate_core::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        orchestrator_with(dir, Arc::new(ScriptedProvider::repeating("ok")))
    }

    #[tokio::test]
    async fn set_get_list_clear() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        orch.state_set("s", "plan", json!({"steps": ["a", "b"]})).await.unwrap();
        orch.state_set("s", "done", json!(false)).await.unwrap();

        let entry = orch.state_get("s", "plan").await.unwrap();
        assert!(entry.found);
        assert_eq!(entry.value, Some(json!({"steps": ["a", "b"]})));

        let missing = orch.state_get("s", "nope").await.unwrap();
        assert!(!missing.found);
        assert_eq!(missing.value, None);

        assert_eq!(orch.state_list("s").await.unwrap().keys, vec!["done", "plan"]);
        assert_eq!(orch.state_clear("s").await.unwrap(), 2);
        assert!(orch.state_list("s").await.unwrap().keys.is_empty());
    }

    #[tokio::test]
    async fn null_values_and_blank_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let err = orch.state_set("s", "k", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = orch.state_get("s", " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn padded_keys_are_refused_not_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let err = orch.state_set("s", " k", json!(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = orch.state_get("s", "k\t").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        orch.state_set("s", "k", json!(1)).await.unwrap();
        assert_eq!(orch.state_list("s").await.unwrap().keys, vec!["k"]);
    }

    #[tokio::test]
    async fn invalid_state_arguments_never_create_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let errors = vec![
            orch.state_get("ghost", "").await.unwrap_err(),
            orch.state_set("ghost", "k", Value::Null).await.unwrap_err(),
            orch.state_set("ghost", " k ", json!(1)).await.unwrap_err(),
            orch.state_budget(
                "ghost",
                Some(BudgetPatch {
                    max_cost: Some(f64::NAN),
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err(),
            orch.state_export("ghost", Some(" ")).await.unwrap_err(),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
        }
        assert!(!dir.path().join("ghost").exists());
    }

    #[tokio::test]
    async fn budget_patch_then_report() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let patch = BudgetPatch {
            max_tokens: Some(100),
            ..Default::default()
        };
        orch.state_budget("s", Some(patch)).await.unwrap();

        let report = orch.state_budget("s", None).await.unwrap();
        assert_eq!(report.budget.max_tokens, 100);
        assert!(report.ok);
        assert_eq!(report.reason, None);
        assert_eq!(report.remaining.tokens, 100);
    }

    #[tokio::test]
    async fn negative_cost_patch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let patch = BudgetPatch {
            max_cost: Some(-1.0),
            ..Default::default()
        };
        let err = orch.state_budget("s", Some(patch)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn reset_keeps_ceilings() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        let patch = BudgetPatch {
            max_iterations: Some(7),
            ..Default::default()
        };
        orch.state_budget("s", Some(patch)).await.unwrap();
        orch.process(
            "s",
            crate::ProcessRequest {
                prompt: "hi".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        orch.state_set("s", "k", json!("v")).await.unwrap();

        let budget = orch.state_reset("s").await.unwrap();
        assert_eq!(budget.max_iterations, 7);

        let report = orch.state_budget("s", None).await.unwrap();
        assert_eq!(report.used.calls_made, 0);
        assert_eq!(report.used.tokens_used, 0);
        assert!(orch.state_list("s").await.unwrap().keys.is_empty());
    }

    #[tokio::test]
    async fn export_writes_meta_scratch_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());

        orch.state_set("s", "k", json!(1)).await.unwrap();
        let path = orch.state_export("s", None).await.unwrap();
        assert_eq!(path, dir.path().join("s").join("export.json"));

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["id"], "s");
        assert_eq!(doc["scratch"]["k"], json!(1.0));
        assert!(doc.get("exportedAt").is_some());

        let custom = orch.state_export("s", Some("backup/out.json")).await.unwrap();
        assert!(custom.ends_with("backup/out.json"));
        assert!(custom.exists());
    }
}
