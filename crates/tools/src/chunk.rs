//! Chunk engine: deterministic, overlapping splits of a text blob.
//!
//! Sizes count Unicode scalar values, not bytes, so a window never cuts a
//! character in half. Besides plain fixed windows, a source can be split at
//! code definitions or markdown headings, packing whole sections into each
//! chunk.

use regex_lite::Regex;
use rlmgate_core::error::{Error, Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 4000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Top-level definitions that start a new code section.
const CODE_BOUNDARY: &str =
    r"^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:def|class|function|fn|impl|struct|enum|trait|mod)\s";

const MARKDOWN_BOUNDARY: &str = r"^#{1,6}\s";

/// How a source is cut into chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed windows of `size` characters advancing by `size - overlap`.
    #[default]
    Fixed,
    /// Sections start at top-level definitions (`fn`, `def`, `class`, ...).
    Code,
    /// Sections start at markdown headings.
    Markdown,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Code => "code",
            Self::Markdown => "markdown",
        }
    }

    fn boundary(&self) -> Option<&'static str> {
        match self {
            Self::Fixed => None,
            Self::Code => Some(CODE_BOUNDARY),
            Self::Markdown => Some(MARKDOWN_BOUNDARY),
        }
    }
}

impl std::fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "code" => Ok(Self::Code),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(Error::validation(format!(
                "unknown chunk strategy '{other}' (expected fixed, code or markdown)"
            ))),
        }
    }
}

/// Validate window parameters, clamping an overlap that would stall the split.
pub fn normalize(size: usize, overlap: usize) -> Result<(usize, usize)> {
    if size == 0 {
        return Err(Error::validation("chunk size must be greater than zero"));
    }
    if overlap >= size {
        let clamped = size - 1;
        warn!(size, overlap, clamped, "Chunk overlap clamped below size");
        return Ok((size, clamped));
    }
    Ok((size, overlap))
}

/// Byte ranges of each window over `text`.
fn windows(text: &str, size: usize, overlap: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let len = bounds.len();
    bounds.push(text.len());

    let step = size - overlap;
    let mut start = 0;
    let mut done = len == 0;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let end = (start + size).min(len);
        let range = (bounds[start], bounds[end]);
        if end == len {
            done = true;
        } else {
            start += step;
        }
        Some(range)
    })
}

/// Byte ranges of the sections of `text`, each starting at a line that
/// matches `boundary` (or at the start of the text).
fn sections(text: &str, boundary: &Regex) -> Vec<(usize, usize)> {
    let mut starts = vec![0];
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if offset > 0 && boundary.is_match(line) {
            starts.push(offset);
        }
        offset += line.len();
    }
    starts.push(text.len());
    starts.windows(2).map(|w| (w[0], w[1])).filter(|(a, b)| a < b).collect()
}

/// Pack whole sections into chunks of at most `size` characters. A section
/// longer than `size` is cut into plain windows of its own.
fn packed(text: &str, boundary: &Regex, size: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut current_len = 0;

    for (from, to) in sections(text, boundary) {
        let section_len = text[from..to].chars().count();
        if let Some(range) = current
            && current_len + section_len > size
        {
            ranges.push(range);
            current = None;
            current_len = 0;
        }
        if section_len > size {
            ranges.extend(windows(&text[from..to], size, 0).map(|(a, b)| (from + a, from + b)));
            continue;
        }
        current = Some(match current {
            Some((start, _)) => (start, to),
            None => (from, to),
        });
        current_len += section_len;
    }
    ranges.extend(current);
    ranges
}

/// Byte ranges of every chunk of `text` under `strategy`.
fn ranges(text: &str, strategy: ChunkStrategy, size: usize, overlap: usize) -> Result<Vec<(usize, usize)>> {
    match strategy.boundary() {
        None => Ok(windows(text, size, overlap).collect()),
        Some(pattern) => {
            let boundary = Regex::new(pattern)
                .map_err(|e| Error::validation(format!("bad {strategy} boundary: {e}")))?;
            Ok(packed(text, &boundary, size))
        }
    }
}

/// File name of chunk `index` for the source file named `source_name`.
///
/// The full file name, extension included, is the namespace: `a.txt` and
/// `a.json` never share chunks.
pub fn chunk_file_name(source_name: &str, index: usize) -> String {
    format!("{source_name}_chunk_{index:04}.txt")
}

/// Whether `file_name` is one of the chunks of `source_name`.
fn is_chunk_of(file_name: &str, source_name: &str) -> bool {
    file_name
        .strip_prefix(source_name)
        .and_then(|rest| rest.strip_prefix("_chunk_"))
        .and_then(|rest| rest.strip_suffix(".txt"))
        .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

/// Files written by a split, and the older chunks it deleted first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    pub paths: Vec<PathBuf>,
    pub replaced: Vec<PathBuf>,
}

/// Split the text at `source` into files under `out_dir`.
///
/// Previous chunks of the same source are replaced. Each chunk is written
/// before the next one is computed. `overlap` only applies to
/// [`ChunkStrategy::Fixed`].
pub async fn split(
    source: &Path,
    out_dir: &Path,
    size: usize,
    overlap: usize,
    strategy: ChunkStrategy,
) -> Result<SplitOutcome> {
    let (size, overlap) = normalize(size, overlap)?;

    let text = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| StorageError::io(source, e))?;
    let source_name = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| Error::validation(format!("{} has no file name", source.display())))?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| StorageError::io(out_dir, e))?;
    let replaced = remove_previous(out_dir, &source_name).await?;

    let mut paths = Vec::new();
    for (index, (from, to)) in ranges(&text, strategy, size, overlap)?.into_iter().enumerate() {
        let path = out_dir.join(chunk_file_name(&source_name, index));
        tokio::fs::write(&path, &text[from..to])
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        paths.push(path);
    }

    debug!(
        source = %source.display(),
        %strategy,
        size,
        overlap,
        chunks = paths.len(),
        replaced = replaced.len(),
        "Split source into chunks"
    );
    Ok(SplitOutcome { paths, replaced })
}

async fn remove_previous(out_dir: &Path, source_name: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir)
        .await
        .map_err(|e| StorageError::io(out_dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io(out_dir, e))?
    {
        let name = entry.file_name();
        if is_chunk_of(&name.to_string_lossy(), source_name) {
            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}
