//! Model backend adapters for rlmgate.
//!
//! All adapters implement the `rlmgate_core::Provider` trait. The
//! [`ProviderGateway`] routes each call to the adapter for the model's
//! backend, as listed in the model registry.

pub mod anthropic;
pub mod gateway;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use gateway::{Completion, ProviderGateway, build_from_config};
pub use openai_compat::OpenAiCompatProvider;
