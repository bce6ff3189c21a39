//! Per-record streaming recovery.
//!
//! The scanner walks the reply one character at a time, counting brace depth
//! outside string literals. Every time depth returns to zero the buffered
//! object is parsed on its own, so one malformed record never blocks the ones
//! after it and a record cut off by the token limit is simply never emitted.

use serde_json::Value;

use crate::sanitize::{parse_candidate, strip_trailing_commas, QuoteTracker};

/// Recovers every complete top-level JSON object in `text`.
///
/// When the reply opens an array before its first object, scanning starts
/// inside that array. A reply whose only object is a truncated wrapper such as
/// `{"records": [{...}, {...` is rescanned from inside its first array.
///
/// # Examples
///
/// ```
/// use tradeflow_recovery::scan_records;
///
/// let records = scan_records("[{\"a\":1}, {\"a\": oops}, {\"a\":3}, {\"a\":");
/// assert_eq!(records.len(), 2);
/// ```
#[must_use]
pub fn scan_records(text: &str) -> Vec<Value> {
    let (records, truncated) = scan(scan_window(text));
    if records.is_empty() && truncated {
        if let Some(bracket) = text.find('[') {
            return scan(&text[bracket + 1..]).0;
        }
    }
    records
}

/// Returns the recovered records and whether the text ended inside an object.
fn scan(text: &str) -> (Vec<Value>, bool) {
    let mut records = Vec::new();
    let mut buffer = String::new();
    let mut depth: usize = 0;
    let mut quotes = QuoteTracker::default();

    for c in text.chars() {
        if depth == 0 {
            if c == '{' {
                depth = 1;
                quotes = QuoteTracker::default();
                buffer.push(c);
            }
            continue;
        }

        buffer.push(c);
        if !quotes.feed(c) {
            continue;
        }

        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    match parse_record(&buffer) {
                        Some(record) => records.push(record),
                        None => tracing::trace!(chars = buffer.len(), "discarding malformed record"),
                    }
                    buffer.clear();
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        tracing::trace!(chars = buffer.len(), "dropping truncated trailing record");
    }

    (records, depth > 0)
}

/// Starts the scan after an array opener that precedes the first object.
fn scan_window(text: &str) -> &str {
    match (text.find('['), text.find('{')) {
        (Some(bracket), Some(brace)) if bracket < brace => &text[bracket + 1..],
        _ => text,
    }
}

fn parse_record(buffer: &str) -> Option<Value> {
    let candidate = strip_trailing_commas(buffer);
    if !candidate.trim_end().ends_with('}') {
        return None;
    }
    parse_candidate(&candidate).filter(Value::is_object)
}
