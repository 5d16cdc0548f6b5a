//! Budget accounting and model selection for rlmgate.
//!
//! The [`ledger`] module holds the pure arithmetic behind the four budget
//! dimensions (tokens, cost, calls, wall-clock time). The [`registry`]
//! module holds the model catalog and the tier selector that decides which
//! model a session should use next.

pub mod ledger;
pub mod registry;

pub use ledger::{BudgetCheck, Charge, Exhausted, Remaining};
pub use registry::{ModelRegistry, ModelSelector, TierDefaults};
