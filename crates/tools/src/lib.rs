//! Content tools for rlmgate sessions.
//!
//! These operate on files inside a session directory: writing ingested
//! data, splitting it into chunks, and searching it line by line. None of
//! them touch the budget or call a model.

pub mod chunk;
pub mod ingest;
pub mod search;

pub use chunk::{ChunkStrategy, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitOutcome, split};
pub use ingest::{IngestData, Ingested, ingest, next_free_path, validate_name};
pub use search::{DEFAULT_MAX_RESULTS, SearchHit, search};
