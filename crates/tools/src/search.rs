//! Line search over stored files.
//!
//! The query is a case-insensitive regular expression. A query that does
//! not compile is matched literally instead.

use regex_lite::{Regex, RegexBuilder};
use rlmgate_core::error::{Error, Result, StorageError};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_RESULTS: usize = 20;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: PathBuf,
    /// 1-based line number.
    pub line: usize,
    pub content: String,
}

/// Compile `query` case-insensitively, falling back to a literal match.
pub fn build_matcher(query: &str) -> Result<Regex> {
    if query.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex_lite::escape(query))
                .case_insensitive(true)
                .build()
        })
        .map_err(|e| Error::validation(format!("unusable query: {e}")))
}

fn matches_in(path: &Path, text: &str, matcher: &Regex, limit: usize) -> Vec<SearchHit> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| matcher.is_match(line))
        .take(limit)
        .map(|(i, line)| SearchHit {
            path: path.to_path_buf(),
            line: i + 1,
            content: line.to_string(),
        })
        .collect()
}

/// Search `paths` in order, stopping after `max_results` hits.
pub async fn search(paths: &[PathBuf], query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let matcher = build_matcher(query)?;

    let mut hits = Vec::new();
    for path in paths {
        if hits.len() >= max_results {
            break;
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        hits.extend(matches_in(path, &text, &matcher, max_results - hits.len()));
    }

    tracing::debug!(query, files = paths.len(), hits = hits.len(), "Search complete");
    Ok(hits)
}
