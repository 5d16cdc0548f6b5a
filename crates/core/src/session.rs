//! Session domain types.
//!
//! A session is the unit of isolation and persistence: usage counters,
//! budget ceilings, a scratch map and the files materialized for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::scratch::ScratchValue;

/// Longest accepted session identifier.
pub const MAX_SESSION_ID_LEN: usize = 128;

/// Check that a caller-supplied id can safely name an on-disk directory.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::validation("sessionId must not be empty"));
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::validation(format!(
            "sessionId exceeds {MAX_SESSION_ID_LEN} characters"
        )));
    }
    if id.starts_with('.') {
        return Err(Error::validation("sessionId must not start with '.'"));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::validation(format!(
            "sessionId contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Budget ceilings for one session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetLimits {
    pub max_tokens: u64,
    pub max_cost: f64,
    pub max_iterations: u64,
    /// Advisory only; never blocks.
    pub max_depth: u32,
    pub max_time_ms: u64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_tokens: 1_000_000,
            max_cost: 10.0,
            max_iterations: 100,
            max_depth: 5,
            max_time_ms: 3_600_000,
        }
    }
}

impl BudgetLimits {
    /// Merge the ceilings present in `patch`, leaving the rest untouched.
    pub fn apply(&mut self, patch: &BudgetPatch) -> Result<()> {
        patch.validate()?;
        if let Some(v) = patch.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = patch.max_cost {
            self.max_cost = v;
        }
        if let Some(v) = patch.max_iterations {
            self.max_iterations = v;
        }
        if let Some(v) = patch.max_depth {
            self.max_depth = v;
        }
        if let Some(v) = patch.max_time_ms {
            self.max_time_ms = v;
        }
        Ok(())
    }
}

/// A partial budget update as sent by callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPatch {
    #[serde(default, alias = "max_tokens")]
    pub max_tokens: Option<u64>,
    #[serde(default, alias = "max_cost")]
    pub max_cost: Option<f64>,
    #[serde(default, alias = "max_iterations")]
    pub max_iterations: Option<u64>,
    #[serde(default, alias = "max_depth")]
    pub max_depth: Option<u32>,
    #[serde(default, alias = "max_time_ms")]
    pub max_time_ms: Option<u64>,
}

impl BudgetPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(cost) = self.max_cost
            && (cost.is_nan() || cost < 0.0)
        {
            return Err(Error::validation("maxCost must be a non-negative number"));
        }
        Ok(())
    }
}

/// Cumulative usage for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub tokens_used: u64,
    pub cost_used: f64,
    pub calls_made: u64,
    /// Current advisory recursion depth.
    pub depth: u32,
}

/// A persistent, isolated unit of budget and scratch state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Origin of the wall-clock budget.
    pub started_at: DateTime<Utc>,
    pub usage: UsageCounters,
    pub budget: BudgetLimits,
    /// Persisted separately from the metadata record.
    #[serde(skip)]
    pub scratch: BTreeMap<String, ScratchValue>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl Session {
    pub fn new(id: impl Into<String>, budget: BudgetLimits) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_accessed: now,
            started_at: now,
            usage: UsageCounters::default(),
            budget,
            scratch: BTreeMap::new(),
            files: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    /// Zero the counters, restart the clock and clear scratch. Ceilings stay.
    pub fn reset(&mut self) {
        self.usage = UsageCounters::default();
        self.started_at = Utc::now();
        self.scratch.clear();
    }

    /// Record a materialized file once.
    pub fn track_file(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    /// Milliseconds elapsed since `started_at` as of `now`.
    pub fn elapsed_ms_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_milliseconds()
    }
}
