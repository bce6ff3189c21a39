//! Textual repairs applied to JSON candidates before parsing.

use std::borrow::Cow;

use serde_json::Value;

/// Tracks whether a character stream is currently inside a JSON string literal.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct QuoteTracker {
    in_string: bool,
    escaped: bool,
}

impl QuoteTracker {
    /// Feeds one character and returns `true` when it is structural, i.e. outside
    /// any string literal and not itself a quote.
    pub(crate) fn feed(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            false
        } else if c == '"' {
            self.in_string = true;
            false
        } else {
            true
        }
    }
}

const fn is_control(c: char) -> bool {
    c <= '\u{1f}' || c == '\u{7f}'
}

/// Removes ASCII control characters (0x00-0x1F and 0x7F).
///
/// Models occasionally emit raw control bytes inside string values, which
/// strict JSON rejects.
#[must_use]
pub fn strip_control_chars(text: &str) -> Cow<'_, str> {
    if text.chars().any(is_control) {
        Cow::Owned(text.chars().filter(|&c| !is_control(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Removes commas that directly precede a closing `}` or `]`.
///
/// Commas inside string literals are left untouched.
///
/// # Examples
///
/// ```
/// use tradeflow_recovery::strip_trailing_commas;
///
/// assert_eq!(strip_trailing_commas("[{\"a\":1},{\"a\":2},]"), "[{\"a\":1},{\"a\":2}]");
/// assert_eq!(strip_trailing_commas("{\"s\":\",}\"}"), "{\"s\":\",}\"}");
/// ```
#[must_use]
pub fn strip_trailing_commas(text: &str) -> Cow<'_, str> {
    let mut quotes = QuoteTracker::default();
    let mut out: Option<String> = None;

    for (idx, c) in text.char_indices() {
        let structural = quotes.feed(c);
        let dangling = structural
            && c == ','
            && text[idx + 1..].trim_start().starts_with(['}', ']']);

        if dangling {
            out.get_or_insert_with(|| text[..idx].to_string());
        } else if let Some(buf) = out.as_mut() {
            buf.push(c);
        }
    }

    out.map_or(Cow::Borrowed(text), Cow::Owned)
}

/// Parses one candidate after stripping control characters.
pub(crate) fn parse_candidate(candidate: &str) -> Option<Value> {
    let cleaned = strip_control_chars(candidate);
    serde_json::from_str(cleaned.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_control_chars() {
        assert_eq!(strip_control_chars("a\u{0}b\u{7f}c\u{1b}"), "abc");
        assert!(matches!(strip_control_chars("clean"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_strip_control_chars_removes_raw_newlines() {
        assert_eq!(strip_control_chars("{\"a\":\n1}"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_trailing_commas_nested() {
        let fixed = strip_trailing_commas("{\"a\": [1, 2, ], \"b\": {\"c\": 3 , } , }");
        assert_eq!(fixed, "{\"a\": [1, 2 ], \"b\": {\"c\": 3  }  }");
    }

    #[test]
    fn test_strip_trailing_commas_keeps_escaped_quotes() {
        let text = r#"{"s": "he said \",]\"",}"#;
        assert_eq!(strip_trailing_commas(text), r#"{"s": "he said \",]\""}"#);
    }

    #[test]
    fn test_strip_trailing_commas_untouched_is_borrowed() {
        assert!(matches!(strip_trailing_commas("[1, 2]"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_quote_tracker_escapes() {
        let mut quotes = QuoteTracker::default();
        let structural: Vec<bool> = r#""a\"b"{"#.chars().map(|c| quotes.feed(c)).collect();
        assert_eq!(structural, vec![false, false, false, false, false, false, true]);
    }

    #[test]
    fn test_parse_candidate_strips_controls() {
        assert_eq!(
            parse_candidate("{\"a\":\"x\u{7}y\"}"),
            Some(serde_json::json!({"a": "xy"}))
        );
        assert_eq!(parse_candidate("{\"a\":"), None);
    }
}
