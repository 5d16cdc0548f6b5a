//! # rlmgate Core
//!
//! Domain types, traits, and error definitions for the rlmgate orchestration
//! gateway. This crate has **no runtime dependencies**: it defines the domain
//! model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Backends are reached through the [`Provider`] trait; implementations live
//! in `rlmgate-providers`. Sessions, budgets and scratch values are plain
//! data so that the ledger, the store and the orchestrator can each be
//! tested in isolation.

pub mod error;
pub mod message;
pub mod model;
pub mod provider;
pub mod scratch;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorKind, ProviderError, Result, StorageError};
pub use message::{Message, Role};
pub use model::{ModelDescriptor, Tier};
pub use provider::{Backend, Provider, ProviderRequest, ProviderResponse, Usage};
pub use scratch::ScratchValue;
pub use session::{BudgetLimits, BudgetPatch, Session, UsageCounters, validate_session_id};
