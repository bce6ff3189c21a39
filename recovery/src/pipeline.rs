//! The ordered fallback chain.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::fence::unwrap_markdown;
use crate::object::object_span;
use crate::repair::repair_array;
use crate::sanitize::parse_candidate;
use crate::scanner::scan_records;

/// Shape the caller expects the reply to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    /// A JSON array of records.
    Array,
    /// A single JSON object.
    Object,
}

/// Recovery stage that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The (markdown-unwrapped) reply parsed as-is.
    DirectParse,
    /// The `[`...`]` slice parsed after trailing-comma and truncation repair.
    BracketRepair,
    /// Complete records were salvaged one by one.
    RecordScan,
    /// The outermost `{`...`}` span parsed as an object.
    ObjectSpan,
}

impl Stage {
    /// Stable name used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectParse => "direct_parse",
            Self::BracketRepair => "bracket_repair",
            Self::RecordScan => "record_scan",
            Self::ObjectSpan => "object_span",
        }
    }

    /// Whether reaching this stage suggests the reply was cut off.
    #[must_use]
    pub const fn suggests_truncation(self) -> bool {
        matches!(self, Self::BracketRepair | Self::RecordScan)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered value together with the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    /// The recovered structure; empty when nothing could be salvaged.
    pub value: T,
    /// Stage that succeeded, `None` on total failure.
    pub stage: Option<Stage>,
}

impl<T> Recovered<T> {
    /// Returns `true` if some stage succeeded.
    #[must_use]
    pub const fn is_recovered(&self) -> bool {
        self.stage.is_some()
    }
}

type ArrayAttempt = fn(&str) -> Option<Vec<Value>>;
type ObjectAttempt = fn(&str) -> Option<Map<String, Value>>;

const ARRAY_STAGES: [(Stage, ArrayAttempt); 3] = [
    (Stage::DirectParse, direct_array),
    (Stage::BracketRepair, repair_array),
    (Stage::RecordScan, scan_all),
];

const OBJECT_STAGES: [(Stage, ObjectAttempt); 2] = [
    (Stage::DirectParse, direct_object),
    (Stage::ObjectSpan, object_span),
];

fn direct_array(text: &str) -> Option<Vec<Value>> {
    match parse_candidate(text)? {
        Value::Array(items) => Some(items),
        object @ Value::Object(_) => Some(vec![object]),
        _ => None,
    }
}

fn direct_object(text: &str) -> Option<Map<String, Value>> {
    match parse_candidate(text)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn scan_all(text: &str) -> Option<Vec<Value>> {
    Some(scan_records(text))
}

/// Runs the array chain over `raw` and reports the stage that succeeded.
///
/// A well-formed single object is wrapped into a one-element array.
#[must_use]
pub fn recover_array(raw: &str) -> Recovered<Vec<Value>> {
    let text = unwrap_markdown(raw);

    for (stage, attempt) in ARRAY_STAGES {
        match attempt(text) {
            Some(records) if !records.is_empty() => {
                tracing::debug!(%stage, records = records.len(), "recovered JSON array");
                return Recovered {
                    value: records,
                    stage: Some(stage),
                };
            }
            _ => tracing::trace!(%stage, "stage recovered nothing"),
        }
    }

    tracing::debug!(chars = raw.len(), "no JSON records recoverable");
    Recovered {
        value: Vec::new(),
        stage: None,
    }
}

/// Runs the object chain over `raw` and reports the stage that succeeded.
#[must_use]
pub fn recover_object(raw: &str) -> Recovered<Map<String, Value>> {
    let text = unwrap_markdown(raw);

    for (stage, attempt) in OBJECT_STAGES {
        match attempt(text) {
            Some(map) if !map.is_empty() => {
                tracing::debug!(%stage, keys = map.len(), "recovered JSON object");
                return Recovered {
                    value: map,
                    stage: Some(stage),
                };
            }
            _ => tracing::trace!(%stage, "stage recovered nothing"),
        }
    }

    tracing::debug!(chars = raw.len(), "no JSON object recoverable");
    Recovered {
        value: Map::new(),
        stage: None,
    }
}

/// Recovers the records of an array reply; empty on total failure.
#[must_use]
pub fn extract_array(raw: &str) -> Vec<Value> {
    recover_array(raw).value
}

/// Recovers a single-object reply; empty on total failure.
#[must_use]
pub fn extract_object(raw: &str) -> Map<String, Value> {
    recover_object(raw).value
}

/// Recovers the most complete structure of the expected shape from `raw`.
///
/// Never fails: returns `[]` or `{}` when nothing can be salvaged.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tradeflow_recovery::{extract_structured, Expect};
///
/// let raw = "Here is your data:\n```json\n[{\"a\":1},{\"a\":2},]\n```";
/// assert_eq!(extract_structured(raw, Expect::Array), json!([{"a": 1}, {"a": 2}]));
///
/// let cut = "[{\"a\":1},{\"a\":2";
/// assert_eq!(extract_structured(cut, Expect::Array), json!([{"a": 1}]));
/// ```
#[must_use]
pub fn extract_structured(raw: &str, expect: Expect) -> Value {
    match expect {
        Expect::Array => Value::Array(extract_array(raw)),
        Expect::Object => Value::Object(extract_object(raw)),
    }
}
