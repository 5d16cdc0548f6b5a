//! Session persistence for rlmgate.
//!
//! One [`SessionManager`] is built at startup and shared by every handler.
//! It caches sessions in memory and mirrors them to disk after every
//! operation.

pub mod store;

pub use store::{SessionLayout, SessionManager};
