//! Single-object replies (classification and field-extraction results).

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::sanitize::{parse_candidate, strip_trailing_commas};

/// Greedy first-`{` to last-`}` span across lines.
#[allow(clippy::expect_used)]
static OBJECT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("object span pattern is valid"));

/// Parses the outermost `{...}` span of `text` as a JSON object.
///
/// A span that only fails because of trailing commas is repaired once.
#[must_use]
pub fn object_span(text: &str) -> Option<Map<String, Value>> {
    let span = OBJECT_SPAN.find(text)?.as_str();

    let parsed = parse_candidate(span).or_else(|| parse_candidate(&strip_trailing_commas(span)))?;
    match parsed {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
