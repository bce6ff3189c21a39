//! Feedback appended to the prompt after a rejected attempt.

use serde_json::Value;

/// Characters of the previous reply echoed back in recovery feedback.
const ECHO_LIMIT: usize = 500;

fn push_schema(feedback: &mut String, schema: Option<&Value>) {
    if let Some(schema) = schema {
        feedback.push_str("\n\nExpected schema:\n");
        let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        feedback.push_str(&schema_str);
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

/// Build feedback for records that failed schema validation.
///
/// Includes the attempt counter, every validation error, the expected schema
/// (when given) and the rejected submission.
///
/// # Examples
///
/// ```
/// use tradeflow_llm::generation::build_validation_feedback;
/// use serde_json::json;
///
/// let instance = json!([{"amount": "ten"}]);
/// let errors = vec!["record 0: At path '/amount': \"ten\" is not of type \"number\"".to_string()];
///
/// let feedback = build_validation_feedback(None, &instance, &errors, 1, 3);
/// assert!(feedback.contains("Attempt 1/3"));
/// assert!(feedback.contains("failed validation"));
/// ```
#[must_use]
pub fn build_validation_feedback(
    schema: Option<&Value>,
    instance: &Value,
    errors: &[String],
    attempt: u32,
    max_attempts: u32,
) -> String {
    let mut feedback = format!("Attempt {attempt}/{max_attempts}: your JSON failed validation.\n\n");

    feedback.push_str("Errors:\n");
    for error in errors {
        feedback.push_str("  - ");
        feedback.push_str(error);
        feedback.push('\n');
    }

    push_schema(&mut feedback, schema);

    feedback.push_str("\n\nYour submission:\n");
    let instance_str = serde_json::to_string_pretty(instance).unwrap_or_else(|_| instance.to_string());
    feedback.push_str(&instance_str);

    feedback.push_str("\n\nFix every error and reply with the complete JSON only.");
    feedback
}

/// Build feedback for a reply from which no JSON could be recovered.
///
/// Echoes the first 500 characters of the reply.
#[must_use]
pub fn build_recovery_feedback(
    raw_text: &str,
    reason: &str,
    attempt: u32,
    max_attempts: u32,
    schema: Option<&Value>,
) -> String {
    let mut feedback = format!(
        "Attempt {attempt}/{max_attempts}: could not read JSON from your reply ({reason}).\n\n"
    );

    feedback.push_str("Your reply (first 500 chars):\n");
    feedback.push_str(&truncate_chars(raw_text, ECHO_LIMIT));

    push_schema(&mut feedback, schema);

    feedback.push_str("\n\nReply with valid JSON only, without commentary or markdown.");
    feedback
}

/// Build feedback for a reply cut off by the token limit.
#[must_use]
pub fn build_truncation_feedback(records_kept: usize, attempt: u32, max_attempts: u32) -> String {
    format!(
        "Attempt {attempt}/{max_attempts}: your reply was cut off after {records_kept} complete \
         record(s). Reply with the complete JSON array, keeping each record compact."
    )
}

/// Validate every record, returning per-record errors prefixed with the record index.
#[must_use]
pub fn collect_record_errors(validator: &jsonschema::Validator, records: &[Value]) -> Vec<String> {
    records
        .iter()
        .enumerate()
        .flat_map(|(index, record)| {
            validator
                .iter_errors(record)
                .map(move |error| format!("record {index}: At path '{}': {error}", error.instance_path))
        })
        .collect()
}

/// Validate one instance, returning errors with instance paths.
#[must_use]
pub fn collect_validation_errors(validator: &jsonschema::Validator, instance: &Value) -> Vec<String> {
    validator
        .iter_errors(instance)
        .map(|error| format!("At path '{}': {error}", error.instance_path))
        .collect()
}
