//! Think patterns: structured reasoning templates.
//!
//! Four patterns run a single model call. `chain` feeds each output back as
//! the next input for a fixed number of steps, re-checking the budget before
//! every step.

use rlmgate_core::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default number of chain steps.
pub const DEFAULT_CHAIN_STEPS: usize = 3;

/// Most steps a single chain may request.
pub const MAX_CHAIN_STEPS: usize = 32;

/// System prompt shared by every pattern.
pub const THINK_SYSTEM_PROMPT: &str = "You are a careful reasoning engine. Think step by step, \
state assumptions explicitly, and keep your answer focused on the request.";

/// The closed set of reasoning templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkPattern {
    Decompose,
    Analyze,
    Evaluate,
    Plan,
    Chain,
}

impl ThinkPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decompose => "decompose",
            Self::Analyze => "analyze",
            Self::Evaluate => "evaluate",
            Self::Plan => "plan",
            Self::Chain => "chain",
        }
    }

    /// Build the prompt for one call. `step` and `total` only matter for chain.
    pub fn render(&self, input: &str, step: usize, total: usize) -> String {
        match self {
            Self::Decompose => format!(
                "Break the following problem into smaller sub-problems that can each be \
                 solved on their own. List them in order, one line each.\n\nProblem:\n{input}"
            ),
            Self::Analyze => format!(
                "Analyze the following in depth. Identify the key facts, the assumptions \
                 being made, and their implications.\n\n{input}"
            ),
            Self::Evaluate => format!(
                "Evaluate the following. Weigh its strengths against its weaknesses and \
                 finish with a clear verdict.\n\n{input}"
            ),
            Self::Plan => format!(
                "Produce a concrete, ordered plan for the following goal. Note any \
                 dependencies between steps.\n\nGoal:\n{input}"
            ),
            Self::Chain => format!(
                "Reasoning step {} of {total}. Build on the thinking below, correct any \
                 mistakes, and move closer to a final answer.\n\n{input}",
                step + 1
            ),
        }
    }
}

impl ThinkPattern {
    /// Number of calls this pattern makes. Only chain honours `requested`.
    pub fn steps(&self, requested: Option<usize>) -> Result<usize, Error> {
        let steps = match self {
            Self::Chain => requested.unwrap_or(DEFAULT_CHAIN_STEPS),
            _ => return Ok(1),
        };
        if steps == 0 {
            return Err(Error::validation("steps must be at least 1"));
        }
        if steps > MAX_CHAIN_STEPS {
            return Err(Error::validation(format!(
                "steps must be at most {MAX_CHAIN_STEPS}, got {steps}"
            )));
        }
        Ok(steps)
    }
}

impl std::fmt::Display for ThinkPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decompose" => Ok(Self::Decompose),
            "analyze" | "analyse" => Ok(Self::Analyze),
            "evaluate" => Ok(Self::Evaluate),
            "plan" => Ok(Self::Plan),
            "chain" => Ok(Self::Chain),
            other => Err(Error::validation(format!(
                "unknown pattern '{other}' (expected decompose, analyze, evaluate, plan or chain)"
            ))),
        }
    }
}

/// Progress of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// About to run step `i` (0-based).
    Running(usize),
    Done,
    BudgetExceeded,
}

impl ChainState {
    /// Transition after step `i` either ran or was refused by the budget.
    pub fn next(self, steps: usize, budget_refused: bool) -> Self {
        match self {
            Self::Running(_) if budget_refused => Self::BudgetExceeded,
            Self::Running(i) if i + 1 >= steps => Self::Done,
            Self::Running(i) => Self::Running(i + 1),
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_parse_and_display() {
        for pattern in [
            ThinkPattern::Decompose,
            ThinkPattern::Analyze,
            ThinkPattern::Evaluate,
            ThinkPattern::Plan,
            ThinkPattern::Chain,
        ] {
            assert_eq!(pattern.as_str().parse::<ThinkPattern>().unwrap(), pattern);
        }
        assert!("brainstorm".parse::<ThinkPattern>().is_err());
    }

    #[test]
    fn templates_embed_input() {
        let prompt = ThinkPattern::Plan.render("ship v2", 0, 1);
        assert!(prompt.contains("ship v2"));
        let step = ThinkPattern::Chain.render("prior", 1, 3);
        assert!(step.contains("step 2 of 3"));
    }

    #[test]
    fn chain_steps_are_bounded() {
        assert_eq!(ThinkPattern::Chain.steps(None).unwrap(), DEFAULT_CHAIN_STEPS);
        assert_eq!(ThinkPattern::Chain.steps(Some(MAX_CHAIN_STEPS)).unwrap(), MAX_CHAIN_STEPS);
        assert!(ThinkPattern::Chain.steps(Some(0)).is_err());
        assert!(ThinkPattern::Chain.steps(Some(MAX_CHAIN_STEPS + 1)).is_err());
        assert!(ThinkPattern::Chain.steps(Some(usize::MAX / 2)).is_err());
        assert_eq!(ThinkPattern::Plan.steps(Some(usize::MAX)).unwrap(), 1);
    }

    #[test]
    fn chain_runs_to_done() {
        let mut state = ChainState::Running(0);
        let mut ran = 0;
        while let ChainState::Running(_) = state {
            ran += 1;
            state = state.next(3, false);
        }
        assert_eq!(ran, 3);
        assert_eq!(state, ChainState::Done);
    }

    #[test]
    fn refused_step_stops_chain() {
        let state = ChainState::Running(1).next(3, true);
        assert_eq!(state, ChainState::BudgetExceeded);
        assert_eq!(state.next(3, false), ChainState::BudgetExceeded);
    }
}
