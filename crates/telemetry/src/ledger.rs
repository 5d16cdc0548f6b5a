//! Budget ledger: pure arithmetic over the four billable dimensions.
//!
//! Nothing here performs I/O. `check` runs before every provider call and
//! `charge` runs after every call that reported usage.

use chrono::{DateTime, Utc};
use rlmgate_core::{ModelDescriptor, Session};
use serde::{Deserialize, Serialize};

/// Ceiling minus usage per dimension. Values may go negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remaining {
    pub tokens: i64,
    pub cost: f64,
    pub iterations: i64,
    pub time_ms: i64,
}

/// The dimension that blocked a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exhausted {
    Tokens,
    Cost,
    Iterations,
    Time,
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokens => write!(f, "tokens"),
            Self::Cost => write!(f, "cost"),
            Self::Iterations => write!(f, "iterations"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// Outcome of a pre-call budget check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Exhausted>,
    pub remaining: Remaining,
}

/// What a single call added to the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tokens: u64,
    pub cost: f64,
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Remaining budget as of now.
pub fn remaining(session: &Session) -> Remaining {
    remaining_at(session, Utc::now())
}

/// Remaining budget as of `now`.
pub fn remaining_at(session: &Session, now: DateTime<Utc>) -> Remaining {
    let budget = &session.budget;
    let usage = &session.usage;
    Remaining {
        tokens: signed(budget.max_tokens).saturating_sub(signed(usage.tokens_used)),
        cost: budget.max_cost - usage.cost_used,
        iterations: signed(budget.max_iterations).saturating_sub(signed(usage.calls_made)),
        time_ms: signed(budget.max_time_ms).saturating_sub(session.elapsed_ms_at(now)),
    }
}

/// Check every dimension as of now.
pub fn check(session: &Session) -> BudgetCheck {
    check_at(session, Utc::now())
}

/// Check every dimension as of `now`.
///
/// The reason names the first exhausted dimension in the fixed order
/// tokens, cost, iterations, time.
pub fn check_at(session: &Session, now: DateTime<Utc>) -> BudgetCheck {
    let remaining = remaining_at(session, now);
    let reason = if remaining.tokens <= 0 {
        Some(Exhausted::Tokens)
    } else if remaining.cost <= 0.0 {
        Some(Exhausted::Cost)
    } else if remaining.iterations <= 0 {
        Some(Exhausted::Iterations)
    } else if remaining.time_ms <= 0 {
        Some(Exhausted::Time)
    } else {
        None
    };

    BudgetCheck {
        ok: reason.is_none(),
        reason,
        remaining,
    }
}

/// Fold one external call into the session counters.
pub fn charge(
    session: &mut Session,
    model: &ModelDescriptor,
    input_tokens: u64,
    output_tokens: u64,
) -> Charge {
    let tokens = input_tokens.saturating_add(output_tokens);
    let cost = model.cost(input_tokens, output_tokens);

    session.usage.tokens_used = session.usage.tokens_used.saturating_add(tokens);
    session.usage.cost_used += cost;
    session.usage.calls_made = session.usage.calls_made.saturating_add(1);

    tracing::debug!(
        session = %session.id,
        model = %model.id,
        tokens,
        cost,
        "Charged provider call"
    );

    Charge {
        input_tokens,
        output_tokens,
        tokens,
        cost,
    }
}
