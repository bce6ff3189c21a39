//! Markdown code-fence unwrapping.

const FENCE: &str = "```";

/// Returns the body of the first fenced code block in `text`.
///
/// The info string after the opening fence (`json`, `JSON`, `jsonc`, ...) is
/// skipped up to the end of its line. The closing fence must start a line,
/// unless the whole block sits on the opening line (```` ```[1, 2]``` ````).
/// Text without a complete fence pair is returned unmodified.
///
/// # Examples
///
/// ```
/// use tradeflow_recovery::unwrap_markdown;
///
/// let raw = "Here you go:\n```json\n[{\"a\":1}]\n```\nAnything else?";
/// assert_eq!(unwrap_markdown(raw), "[{\"a\":1}]");
/// assert_eq!(unwrap_markdown("[1, 2]"), "[1, 2]");
/// ```
#[must_use]
pub fn unwrap_markdown(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after_open = &text[open + FENCE.len()..];
    let info_len = info_string_len(after_open);
    let body = &after_open[info_len..];

    let inline = if info_len == 0 { inline_close(body) } else { None };
    inline
        .or_else(|| line_start_close(body))
        .map_or(text, |close| body[..close].trim())
}

/// Closing fence on the opening line itself.
fn inline_close(body: &str) -> Option<usize> {
    body.split('\n').next()?.find(FENCE)
}

/// Offset of the first line that starts with a fence.
fn line_start_close(body: &str) -> Option<usize> {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with(FENCE) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Length of the info string line (including its newline) following an opening fence.
fn info_string_len(rest: &str) -> usize {
    match rest.find('\n') {
        Some(newline) if is_info_string(&rest[..newline]) => newline + 1,
        _ => 0,
    }
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}
