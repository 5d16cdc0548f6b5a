//! The rlmgate orchestration layer.
//!
//! An operation request flows through three stages:
//!
//! 1. **Dispatch**: [`RequestHandler`] reads the tool name and the `mode` or
//!    `op` field, looks the verb up in its table and extracts the session id
//! 2. **Orchestrate**: the verb calls into [`Orchestrator`], which locks the
//!    session, checks the budget, selects a model and calls the gateway
//! 3. **Persist**: the session is saved before the operation returns, on
//!    failure as well as success
//!
//! Every error becomes an `isError` reply at the handler; nothing escapes it.

pub mod handler;
pub mod orchestrator;
pub mod state;
pub mod think;
pub mod verbs;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use handler::{RequestHandler, TextContent, ToolCallRequest, ToolReply};
pub use orchestrator::{
    BATCH_CONCURRENCY, BUDGET_EXCEEDED_MARKER, BatchItem, BatchRequest, BatchResult, ChunkResult,
    MAX_BATCH_PROMPTS, ModelsResult, Orchestrator, ProcessRequest, ProcessResult, SearchResult,
    SynthesisResult, ThinkRequest, ThinkResult,
};
pub use state::{BudgetReport, StateEntry, StateKeys};
pub use think::{ChainState, ThinkPattern};
pub use verbs::{RlmMode, StateOp, Verb, VerbTable};
