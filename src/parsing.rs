//! Defensive parsing for semantic-service replies.
//!
//! Models wrap JSON in code fences, prepend prose, or return garbage. This is
//! the single place raw reply text is handled; everything downstream works
//! with typed payloads or an explicit parse error.

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Strip a wrapping markdown code fence (with or without a language tag).
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open);
    without_close.trim().to_string()
}

/// Parse a structured payload out of a raw semantic reply.
///
/// Tries the fence-stripped text directly; if that fails, falls back to the
/// outermost `{...}` slice to tolerate surrounding prose.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> anyhow::Result<T> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => Ok(value),
        Err(direct_err) => {
            if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
                if start < end {
                    if let Ok(value) = serde_json::from_str::<T>(&cleaned[start..=end]) {
                        return Ok(value);
                    }
                }
            }
            Err(direct_err).context("semantic reply did not contain the expected JSON payload")
        }
    }
}

/// Last `n` characters of a string, respecting char boundaries. Used to slice
/// conversation context into prompts without splitting a multi-byte char.
pub fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
