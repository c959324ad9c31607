//! Recovery of a [`PlaybookRecord`] from raw model output.
//!
//! Model output is unpredictable, so cheap strategies run first: the trimmed
//! text as-is, then with markdown fences removed, then a scan for the first
//! balanced `{...}` span embedded in prose. The first JSON object found is
//! validated; nothing here does I/O or keeps state.

use serde_json::{Map, Value};

use crate::{PlaybookRecord, SkipReason, SkippedBlock, StepBlock};

/// Why no usable record could be produced. Both variants keep the original
/// text so callers can show what the model actually returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("model output contains no parseable JSON object")]
    MalformedOutput { raw: String },
    #[error("model output contains no usable playbook blocks")]
    EmptyPlaybook { raw: String },
}

impl ExtractionError {
    pub fn raw_text(&self) -> &str {
        match self {
            ExtractionError::MalformedOutput { raw } | ExtractionError::EmptyPlaybook { raw } => raw,
        }
    }
}

/// Parse raw model output into a validated playbook.
///
/// Blocks that are not objects or lack a non-empty string `block_name` are
/// dropped and listed in `skipped_blocks`; if none survive the result is
/// [`ExtractionError::EmptyPlaybook`]. Missing text fields become `""`,
/// missing lists become empty.
pub fn extract(raw: &str) -> Result<PlaybookRecord, ExtractionError> {
    let Some(object) = locate_object(raw) else {
        return Err(ExtractionError::MalformedOutput {
            raw: raw.to_string(),
        });
    };
    validate(object).ok_or_else(|| ExtractionError::EmptyPlaybook {
        raw: raw.to_string(),
    })
}

fn locate_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    parse_object(trimmed)
        .or_else(|| strip_fences(trimmed).and_then(parse_object))
        .or_else(|| scan_embedded(trimmed))
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Remove a leading "```lang" line and a trailing "```". Returns None when
/// the text carries neither.
fn strip_fences(text: &str) -> Option<&str> {
    let mut body = text;
    let mut stripped = false;

    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            Some((_lang, after)) => after,
            // Single-line fence: ```json{...}```
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        };
        stripped = true;
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
        stripped = true;
    }

    stripped.then(|| body.trim())
}

/// Find the first top-level `{...}` span that parses as a JSON object.
/// A balanced span that fails to parse (a `{placeholder}` in prose) is
/// skipped whole. An opening brace that never closes is skipped alone, so
/// scanning resumes at the next `{`.
fn scan_embedded(text: &str) -> Option<Map<String, Value>> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        match matching_brace(&text[start..]) {
            Some(close) => {
                let end = start + close + 1;
                if let Some(map) = parse_object(&text[start..end]) {
                    return Some(map);
                }
                from = end;
            }
            None => from = start + 1,
        }
    }
    None
}

/// Byte offset of the brace closing the `{` that starts `text`. Braces inside
/// string literals (including escaped quotes) do not count.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn validate(mut object: Map<String, Value>) -> Option<PlaybookRecord> {
    let Some(Value::Array(items)) = object.remove("blocks") else {
        return None;
    };

    let mut blocks = Vec::with_capacity(items.len());
    let mut skipped_blocks = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match step_block(item) {
            Ok(block) => blocks.push(block),
            Err(reason) => skipped_blocks.push(SkippedBlock { index, reason }),
        }
    }
    if blocks.is_empty() {
        return None;
    }

    Some(PlaybookRecord {
        blocks,
        documentation: object.get("documentation").and_then(optional_text),
        skipped_blocks,
    })
}

fn step_block(item: Value) -> Result<StepBlock, SkipReason> {
    let Value::Object(mut fields) = item else {
        return Err(SkipReason::NotAnObject);
    };
    let block_name = match fields.remove("block_name") {
        None | Some(Value::Null) => return Err(SkipReason::MissingBlockName),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(SkipReason::EmptyBlockName),
        Some(Value::String(s)) => s,
        Some(_) => return Err(SkipReason::NonStringBlockName),
    };

    Ok(StepBlock {
        block_name,
        purpose: text_field(fields.get("purpose")),
        inputs: list_field(fields.get("inputs")),
        outputs: list_field(fields.get("outputs")),
        failure_handling: text_field(fields.get("failure_handling")),
        sla_impact: text_field(fields.get("sla_impact")),
        analyst_notes: text_field(fields.get("analyst_notes")),
    })
}

/// Strings as-is, null as empty, anything else as compact JSON.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_field(value: Option<&Value>) -> String {
    value.map(text).unwrap_or_default()
}

fn list_field(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).map(text).collect(),
        Some(Value::String(s)) if s.trim().is_empty() => vec![],
        Some(other) => vec![text(other)],
    }
}

fn optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(text(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLAYBOOK: &str = r#"{
  "blocks": [
    {
      "block_name": "Trigger",
      "purpose": "Receive the SIEM alert",
      "inputs": ["siem_alert"],
      "outputs": ["normalized_alert"],
      "failure_handling": "Retry ingestion",
      "sla_impact": "Starts the clock",
      "analyst_notes": "Check source"
    },
    {
      "block_name": "Enrich",
      "purpose": "Look up {asset} owner and IP reputation",
      "inputs": ["normalized_alert"],
      "outputs": ["context"],
      "failure_handling": "Continue without enrichment",
      "sla_impact": "None",
      "analyst_notes": ""
    },
    {
      "block_name": "Contain",
      "purpose": "Isolate host after approval",
      "inputs": ["context"],
      "outputs": ["containment_status"],
      "failure_handling": "Escalate to IR",
      "sla_impact": "Critical",
      "analyst_notes": "Requires approval"
    }
  ],
  "documentation": "Brute-force response playbook."
}"#;

    fn names(record: &PlaybookRecord) -> Vec<&str> {
        record.blocks.iter().map(|b| b.block_name.as_str()).collect()
    }

    #[test]
    fn clean_json_parses_directly() {
        let record = extract(PLAYBOOK).unwrap();
        assert_eq!(record.blocks[0].block_name, "Trigger");
        assert_eq!(record.blocks[0].inputs, vec!["siem_alert"]);
        assert_eq!(
            record.documentation.as_deref(),
            Some("Brute-force response playbook.")
        );
        assert!(record.skipped_blocks.is_empty());
    }

    #[test]
    fn block_order_is_preserved() {
        let record = extract(PLAYBOOK).unwrap();
        assert_eq!(names(&record), vec!["Trigger", "Enrich", "Contain"]);
    }

    #[test]
    fn fences_are_transparent() {
        let plain = extract(PLAYBOOK).unwrap();
        for fenced in [
            format!("```json\n{PLAYBOOK}\n```"),
            format!("```\n{PLAYBOOK}\n```"),
            format!("  ```JSON\n{PLAYBOOK}\n```  \n"),
            format!("```json{}```", PLAYBOOK.replace('\n', " ")),
        ] {
            assert_eq!(extract(&fenced).unwrap(), plain, "input: {fenced}");
        }
    }

    #[test]
    fn prose_around_json_is_ignored() {
        let plain = extract(PLAYBOOK).unwrap();
        let wrapped = format!(
            "Sure! Here is the playbook you asked for:\n\n{PLAYBOOK}\n\nLet me know if you need changes."
        );
        assert_eq!(extract(&wrapped).unwrap(), plain);

        let fenced_in_prose = format!("Here you go:\n```json\n{PLAYBOOK}\n```\nThanks.");
        assert_eq!(extract(&fenced_in_prose).unwrap(), plain);
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_scan() {
        let raw = r#"Output: {"blocks": [{"block_name": "Parse }{ \"quoted\" }", "purpose": "{"}], "documentation": "}"} trailing } junk"#;
        let record = extract(raw).unwrap();
        assert_eq!(record.blocks[0].block_name, r#"Parse }{ "quoted" }"#);
        assert_eq!(record.blocks[0].purpose, "{");
        assert_eq!(record.documentation.as_deref(), Some("}"));
    }

    #[test]
    fn stray_braces_in_prose_are_skipped() {
        let plain = extract(PLAYBOOK).unwrap();
        let raw = format!("Fill the {{alert_id}} and {{host}} placeholders:\n{PLAYBOOK}");
        assert_eq!(extract(&raw).unwrap(), plain);
    }

    #[test]
    fn empty_input_is_malformed() {
        assert_eq!(
            extract(""),
            Err(ExtractionError::MalformedOutput { raw: String::new() })
        );
        assert!(matches!(
            extract("   \n\t"),
            Err(ExtractionError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn text_without_json_is_malformed_and_keeps_raw() {
        let raw = "I'm sorry, I can't help with that.";
        let err = extract(raw).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedOutput { .. }));
        assert_eq!(err.raw_text(), raw);
    }

    #[test]
    fn unclosed_brace_in_prose_does_not_hide_the_playbook() {
        let raw = "Blocks use the form {block_name, purpose...\n{\"blocks\":[{\"block_name\":\"Trigger\"}]}";
        let record = extract(raw).unwrap();
        assert_eq!(record.blocks.len(), 1);
        assert_eq!(record.blocks[0].block_name, "Trigger");
    }

    #[test]
    fn truncated_json_is_rejected_with_raw_text() {
        let cut = &PLAYBOOK[..PLAYBOOK.len() / 2];
        let err = extract(cut).unwrap_err();
        assert_eq!(err.raw_text(), cut);
    }

    #[test]
    fn truncated_json_without_inner_objects_is_malformed() {
        assert!(matches!(
            extract(r#"Sure: {"blocks": ["#),
            Err(ExtractionError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn non_object_json_is_malformed() {
        assert!(matches!(
            extract("[1, 2, 3]"),
            Err(ExtractionError::MalformedOutput { .. })
        ));
        assert!(matches!(
            extract("\"just a string\""),
            Err(ExtractionError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn zero_blocks_is_empty_playbook() {
        let raw = r#"{"blocks": [], "documentation": "x"}"#;
        assert_eq!(
            extract(raw),
            Err(ExtractionError::EmptyPlaybook {
                raw: raw.to_string()
            })
        );
    }

    #[test]
    fn missing_or_mistyped_blocks_is_empty_playbook() {
        for raw in [
            r#"{"documentation": "x"}"#,
            r#"{"blocks": "Trigger, Enrich"}"#,
            r#"{"blocks": {"block_name": "Trigger"}}"#,
        ] {
            assert!(
                matches!(extract(raw), Err(ExtractionError::EmptyPlaybook { .. })),
                "input: {raw}"
            );
        }
    }

    #[test]
    fn block_without_name_is_excluded() {
        assert!(matches!(
            extract(r#"{"blocks": [{"purpose": "p"}]}"#),
            Err(ExtractionError::EmptyPlaybook { .. })
        ));

        let raw = json!({
            "blocks": [
                {"purpose": "p"},
                {"block_name": "Enrich"},
                "Contain",
                {"block_name": "   "},
                {"block_name": 7},
                {"block_name": null},
                {"block_name": "Notify"}
            ]
        })
        .to_string();
        let record = extract(&raw).unwrap();
        assert_eq!(names(&record), vec!["Enrich", "Notify"]);
        assert_eq!(
            record.skipped_blocks,
            vec![
                SkippedBlock { index: 0, reason: SkipReason::MissingBlockName },
                SkippedBlock { index: 2, reason: SkipReason::NotAnObject },
                SkippedBlock { index: 3, reason: SkipReason::EmptyBlockName },
                SkippedBlock { index: 4, reason: SkipReason::NonStringBlockName },
                SkippedBlock { index: 5, reason: SkipReason::MissingBlockName },
            ]
        );
    }

    #[test]
    fn missing_fields_get_defaults() {
        let record = extract(r#"{"blocks": [{"block_name": "Trigger"}]}"#).unwrap();
        let block = &record.blocks[0];
        assert_eq!(
            *block,
            StepBlock {
                block_name: "Trigger".into(),
                ..Default::default()
            }
        );
        assert_eq!(record.documentation, None);
    }

    #[test]
    fn loosely_typed_fields_are_normalized() {
        let raw = json!({
            "blocks": [{
                "block_name": "Enrich",
                "purpose": null,
                "inputs": "alert",
                "outputs": ["ip", 42, null, {"k": "v"}],
                "failure_handling": false,
                "sla_impact": 15,
                "analyst_notes": ["a", "b"]
            }],
            "documentation": {"summary": "s"}
        })
        .to_string();
        let record = extract(&raw).unwrap();
        let block = &record.blocks[0];
        assert_eq!(block.purpose, "");
        assert_eq!(block.inputs, vec!["alert"]);
        assert_eq!(block.outputs, vec!["ip", "42", r#"{"k":"v"}"#]);
        assert_eq!(block.failure_handling, "false");
        assert_eq!(block.sla_impact, "15");
        assert_eq!(block.analyst_notes, r#"["a","b"]"#);
        assert_eq!(record.documentation.as_deref(), Some(r#"{"summary":"s"}"#));
    }

    #[test]
    fn empty_documentation_is_kept() {
        let record = extract(r#"{"blocks": [{"block_name": "A"}], "documentation": ""}"#).unwrap();
        assert_eq!(record.documentation.as_deref(), Some(""));
    }

    #[test]
    fn extraction_is_idempotent() {
        for raw in [PLAYBOOK, "", "no json", r#"{"blocks": []}"#] {
            assert_eq!(extract(raw), extract(raw));
        }
    }

    #[test]
    fn matching_brace_handles_escapes_and_unicode() {
        assert_eq!(matching_brace(r#"{"a":"\\"}"#), Some(9));
        assert_eq!(matching_brace("{\"é\":{}}"), Some(8));
        assert_eq!(matching_brace("{ unclosed"), None);
    }

    #[test]
    fn strip_fences_requires_a_fence() {
        assert_eq!(strip_fences("{}"), None);
        assert_eq!(strip_fences("```json\n{}\n```"), Some("{}"));
        assert_eq!(strip_fences("{}\n```"), Some("{}"));
    }
}
