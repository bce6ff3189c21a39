//! Behavioural properties of the recovery chain over generated replies.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use tradeflow_recovery::{extract_array, extract_structured, recover_array, Expect, Stage};

/// Flat trade-finance style records with awkward string content.
fn arb_record() -> impl Strategy<Value = Value> {
    (
        "[A-Z]{2}-[0-9]{3,6}",
        prop::sample::select(vec![
            "plain",
            "a { b } c",
            "quote \" inside",
            "back\\slash",
            "brackets ] [ , }",
            "unicode ✓ naïve",
        ]),
        0u32..1_000_000,
        any::<bool>(),
    )
        .prop_map(|(reference, note, amount, confirmed)| {
            json!({
                "reference": reference,
                "note": note,
                "amount": amount,
                "confirmed": confirmed,
                "parties": {"applicant": "ACME", "beneficiary": note},
            })
        })
}

fn arb_records() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(arb_record(), 1..8)
}

fn arb_prose() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "",
        "Here is your data:\n",
        "Sure! I found these letters of credit.\n\n",
        "Result (JSON below)\n",
    ])
    .prop_map(str::to_string)
}

proptest! {
    #[test]
    fn embedded_array_round_trips(records in arb_records(), before in arb_prose(), fenced in any::<bool>()) {
        let body = serde_json::to_string_pretty(&records).unwrap_or_default();
        let raw = if fenced {
            format!("{before}```json\n{body}\n```\nLet me know if you need more.")
        } else {
            format!("{before}{body}\nLet me know if you need more.")
        };

        prop_assert_eq!(extract_array(&raw), records);
    }

    #[test]
    fn truncated_array_keeps_closed_records(records in arb_records(), cut_fraction in 0.05f64..0.95) {
        // Serialize the last record on its own so the cut point is known to be inside it.
        let (last, complete) = records.split_last().unwrap_or((&Value::Null, &[]));
        let mut raw = String::from("[");
        for record in complete {
            raw.push_str(&record.to_string());
            raw.push(',');
        }
        let last_text = last.to_string();
        let cut = ((last_text.len() as f64) * cut_fraction) as usize;
        let cut = (1..=cut.max(1)).rev().find(|&i| last_text.is_char_boundary(i)).unwrap_or(1);
        raw.push_str(&last_text[..cut]);

        prop_assert_eq!(extract_array(&raw), complete.to_vec());
    }
}

#[test]
fn test_end_to_end_fenced_trailing_comma() {
    let raw = "Here is your data:\n```json\n[{\"a\":1},{\"a\":2},]\n```";
    assert_eq!(
        extract_structured(raw, Expect::Array),
        json!([{"a": 1}, {"a": 2}])
    );
}

#[test]
fn test_end_to_end_hard_cutoff() {
    let raw = "[{\"a\":1},{\"a\":2";
    assert_eq!(extract_structured(raw, Expect::Array), json!([{"a": 1}]));
}

#[test]
fn test_braces_in_strings_preserved() {
    let raw = r#"[{"note": "a { b } c"}, {"note": "x \" } y"}, {"note": "#;
    let recovered = recover_array(raw);
    assert_eq!(
        recovered.value,
        vec![json!({"note": "a { b } c"}), json!({"note": "x \" } y"})]
    );
}

#[test]
fn test_malformed_middle_record_does_not_block_rest() {
    let raw = "[{\"id\": 1}, {\"id\": 2 \"broken\": true}, {\"id\": 3}, {\"id\": 4";
    let recovered = recover_array(raw);
    assert_eq!(recovered.stage, Some(Stage::RecordScan));
    assert_eq!(recovered.value, vec![json!({"id": 1}), json!({"id": 3})]);
}

#[test]
fn test_object_reply_in_markdown() {
    let raw = "```json\n{\"intent\": \"document_query\", \"fields\": [\"lc_number\"]}\n```";
    let mut expected = Map::new();
    expected.insert("intent".into(), json!("document_query"));
    expected.insert("fields".into(), json!(["lc_number"]));
    assert_eq!(extract_structured(raw, Expect::Object), Value::Object(expected));
}

#[test]
fn test_nothing_recoverable_is_empty_not_error() {
    assert_eq!(extract_structured("Sorry, I can't help.", Expect::Array), json!([]));
    assert_eq!(extract_structured("Sorry, I can't help.", Expect::Object), json!({}));
}
