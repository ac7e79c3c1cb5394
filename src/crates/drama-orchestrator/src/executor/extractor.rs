//! Response extraction
//!
//! Model output is free text: prose, markdown fences, sometimes a payload cut
//! off mid-way. [`locate_payload`] isolates the first object- or
//! array-shaped payload with a nesting-aware scan, and [`extract`]
//! deserializes it into the caller's schema.

use crate::{OrchestratorError, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Characters of the offending payload kept in errors and logs
const SNIPPET_CHARS: usize = 200;

/// Slice out the first structured payload in `text`
///
/// Depth is counted over the bracket family of the first opening character
/// (`{}` or `[]`); brackets inside JSON string literals are ignored. When the
/// payload never closes, the last closing bracket of that family is taken as
/// the end.
pub fn locate_payload(text: &str) -> Result<&str> {
    let start = text
        .find(|c: char| c == '{' || c == '[')
        .ok_or_else(|| OrchestratorError::extraction("no structured payload found", None))?;

    let (open, close) = match text.as_bytes()[start] {
        b'{' => (b'{', b'}'),
        _ => (b'[', b']'),
    };

    if let Some(end) = balanced_end(text.as_bytes(), start, open, close) {
        return Ok(&text[start..=end]);
    }

    match text.rfind(close as char) {
        Some(end) if end > start => {
            warn!(
                start,
                end, "Payload brackets never balance, falling back to last closing bracket"
            );
            Ok(&text[start..=end])
        }
        _ => Err(OrchestratorError::extraction(
            "structured payload is never closed",
            Some(snippet(&text[start..])),
        )),
    }
}

/// Locate and deserialize the payload in `text`
pub fn extract<T: DeserializeOwned>(text: &str) -> Result<T> {
    let payload = locate_payload(text)?;
    debug!(payload_len = payload.len(), "Located structured payload");

    serde_json::from_str(payload).map_err(|e| {
        OrchestratorError::extraction(
            format!("payload does not match expected schema: {}", e),
            Some(snippet(payload)),
        )
    })
}

/// Position of the bracket closing the one at `start`, if any
fn balanced_end(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(start + offset);
            }
        }
    }

    None
}

/// Leading part of `text`, cut on a char boundary
pub fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
