use serde::{Deserialize, Serialize};
use soar_core::{Depth, Mode};

/// What the analyst asked for: the alert as raised by the SIEM plus how the
/// playbook should be pitched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PlaybookRequest {
    pub alert: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub depth: Depth,
}

impl PlaybookRequest {
    pub fn new(alert: impl Into<String>, mode: Mode, depth: Depth) -> Self {
        Self {
            alert: alert.into(),
            mode,
            depth,
        }
    }
}

const OUTPUT_SCHEMA: &str = r#"{
  "blocks": [
    {
      "block_name": "",
      "purpose": "",
      "inputs": [],
      "outputs": [],
      "failure_handling": "",
      "sla_impact": "",
      "analyst_notes": ""
    }
  ],
  "documentation": ""
}"#;

pub fn system_prompt() -> String {
    format!(
        "You are a SENIOR SOC SOAR ARCHITECT designing production-grade SOAR playbooks for \
security alerts raised by a SIEM.\n\n\
Design the playbook as an ordered list of blocks. Each block is one step the SOAR platform \
executes or one decision an analyst makes.\n\n\
## Rules\n{}\n\n\
## Output\n\
Return ONLY valid JSON matching this schema. No markdown. No commentary.\n\
{}\n\
- \"block_name\": short title of the step (required, never empty)\n\
- \"inputs\" / \"outputs\": arrays of artifact names\n\
- \"documentation\": SOC-ready documentation covering every block, as plain text\n\n\
Output ONLY the JSON object, nothing else.",
        soar_core::rules::RULES,
        OUTPUT_SCHEMA
    )
}

fn mode_guidance(mode: Mode) -> &'static str {
    match mode {
        Mode::Learning => {
            "Teach while designing. In each block's purpose explain why the step exists and what \
the SOC loses if it is skipped; use analyst_notes for the SOC role that owns the step and the \
decision logic behind it."
        }
        Mode::Deployment => {
            "Design for production execution. Make human approvals explicit, give every block \
concrete failure handling and SLA impact, and keep analyst_notes to operational instructions."
        }
    }
}

fn depth_guidance(depth: Depth) -> &'static str {
    match depth {
        Depth::Beginner => "Audience: new L1 analysts. Spell out acronyms and keep 4-6 blocks.",
        Depth::Intermediate => "Audience: L1/L2 analysts. Use standard SOC terminology, 6-9 blocks.",
        Depth::Advanced => {
            "Audience: senior responders. Include detection engineering and DFIR detail, \
MITRE ATT&CK technique IDs where supported, 8-12 blocks."
        }
    }
}

/// The per-request message: reference material, the alert, and mode/depth guidance.
pub fn user_message(request: &PlaybookRequest, reference: &str) -> String {
    let mut out = String::with_capacity(1024 + reference.len() + request.alert.len());

    if !reference.trim().is_empty() {
        out.push_str("REFERENCE MATERIAL (USE THIS CONTEXT):\n");
        out.push_str(reference.trim());
        out.push_str("\n\n");
    }

    out.push_str("ALERT INPUT:\n");
    out.push_str(request.alert.trim());
    out.push_str("\n\n");

    out.push_str("MODE: ");
    out.push_str(&request.mode.to_string());
    out.push('\n');
    out.push_str(mode_guidance(request.mode));
    out.push_str("\n\n");

    out.push_str("DEPTH: ");
    out.push_str(&request.depth.to_string());
    out.push('\n');
    out.push_str(depth_guidance(request.depth));
    out.push_str("\n\n");

    out.push_str("TASK:\nAnalyze the alert and design the SOAR playbook. Return only the JSON object.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_carries_rules_and_schema() {
        let p = system_prompt();
        assert!(p.contains(soar_core::rules::RULES));
        for field in [
            "block_name",
            "purpose",
            "inputs",
            "outputs",
            "failure_handling",
            "sla_impact",
            "analyst_notes",
            "documentation",
        ] {
            assert!(p.contains(&format!("\"{field}\"")), "schema missing {field}");
        }
    }

    #[test]
    fn schema_is_valid_json_the_extractor_rejects_as_empty() {
        let value: serde_json::Value = serde_json::from_str(OUTPUT_SCHEMA).unwrap();
        assert!(value["blocks"].is_array());
        assert!(matches!(
            soar_core::extract(OUTPUT_SCHEMA),
            Err(soar_core::ExtractionError::EmptyPlaybook { .. })
        ));
    }

    #[test]
    fn user_message_includes_alert_mode_and_depth() {
        let req = PlaybookRequest::new(
            "  Multiple failed logins from 203.0.113.7  ",
            Mode::Deployment,
            Depth::Advanced,
        );
        let msg = user_message(&req, "");
        assert!(msg.starts_with("ALERT INPUT:\nMultiple failed logins from 203.0.113.7\n\n"));
        assert!(msg.contains("MODE: deployment\nDesign for production execution."));
        assert!(msg.contains("DEPTH: advanced\n"));
        assert!(!msg.contains("REFERENCE MATERIAL"));
    }

    #[test]
    fn reference_material_precedes_alert() {
        let req = PlaybookRequest::new("alert", Mode::Learning, Depth::Beginner);
        let msg = user_message(&req, "\n--- reference_context.txt ---\nrunbook\n");
        let reference = msg.find("REFERENCE MATERIAL").unwrap();
        let alert = msg.find("ALERT INPUT").unwrap();
        assert!(reference < alert);
        assert!(msg.contains("--- reference_context.txt ---\nrunbook"));
        assert!(msg.contains("Teach while designing."));
    }

    #[test]
    fn request_defaults_when_deserialized_from_alert_only() {
        let req: PlaybookRequest = serde_json::from_str(r#"{"alert": "phishing"}"#).unwrap();
        assert_eq!(req, PlaybookRequest::new("phishing", Mode::Learning, Depth::Beginner));
    }
}
