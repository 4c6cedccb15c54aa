//! Deterministic splitting of a SQL script into chunk sources.
//!
//! Cuts happen right after the `;` nearest before each `CREATE TABLE`
//! (case-insensitive). A `CREATE TABLE` with no `;` before it adds no cut
//! and stays attached to whatever precedes it.

use once_cell::sync::Lazy;
use regex::Regex;

static CREATE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)create\s+table").expect("valid CREATE TABLE regex"));

static TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)create\s+table\s+([`"\[]?)([a-zA-Z0-9_.]+)"#).expect("valid table name regex")
});

/// Label used when no table identifier can be found in a chunk.
pub const FALLBACK_CHUNK_NAME: &str = "SQL Chunk";

/// Separator placed between merged segments.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Splits `text` into ordered chunk sources, merging `merge_factor`
/// consecutive segments into one chunk.
pub fn split(text: &str, merge_factor: usize) -> Vec<String> {
    merge(segments(text), merge_factor)
}

/// Splits `text` into trimmed, non-empty segments.
pub fn segments(text: &str) -> Vec<String> {
    let starts: Vec<usize> = CREATE_TABLE.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut boundaries: Vec<usize> = starts
        .iter()
        .filter_map(|&start| text[..start].rfind(';').map(|semi| semi + 1))
        .filter(|&b| b > 0 && b < text.len())
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut out = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for boundary in boundaries {
        if boundary <= start {
            continue;
        }
        let part = text[start..boundary].trim();
        if !part.is_empty() {
            out.push(part.to_string());
        }
        start = boundary;
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        out.push(last.to_string());
    }
    out
}

/// Groups consecutive segments into batches of `merge_factor` (at least 1).
pub fn merge(segments: Vec<String>, merge_factor: usize) -> Vec<String> {
    segments
        .chunks(merge_factor.max(1))
        .map(|batch| batch.join(SEGMENT_SEPARATOR))
        .collect()
}

/// Derives a label like `CREATE TABLE schema.orders` from a chunk source.
pub fn guess_name(source: &str) -> String {
    TABLE_NAME
        .captures(source)
        .and_then(|caps| caps.get(2))
        .map(|name| format!("CREATE TABLE {}", name.as_str()))
        .unwrap_or_else(|| FALLBACK_CHUNK_NAME.to_string())
}
