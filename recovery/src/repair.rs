//! Bracket-bounded substring repair for array replies.

use serde_json::Value;

use crate::sanitize::{parse_candidate, strip_trailing_commas};

/// Slices the text between the first `[` and the last `]`, repairs it and
/// parses the result as an array.
///
/// Repairs: trailing commas are dropped, and a slice that does not end with `]`
/// (a reply cut off by the token limit) is truncated back to its last `}` and
/// closed. Returns `None` when the repaired slice still does not parse.
#[must_use]
pub fn repair_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let tail = &text[start..];
    let slice = tail.rfind(']').map_or(tail, |end| &tail[..=end]);

    let mut candidate = strip_trailing_commas(slice).trim_end().to_string();
    if !candidate.ends_with(']') {
        let last_close = candidate.rfind('}')?;
        candidate.truncate(last_close + 1);
        candidate.push(']');
    }

    match parse_candidate(&candidate)? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}
