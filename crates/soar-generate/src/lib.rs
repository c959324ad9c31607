pub mod engine;
pub mod prompt;

use std::path::Path;

use serde::Serialize;
use soar_core::{AiSettings, ExtractionError, PlaybookRecord};

pub use engine::{GenerateError, LlmGenerator, TextGenerator};
pub use prompt::PlaybookRequest;

#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("alert description is empty")]
    EmptyAlert,
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl PlaybookError {
    /// Model output behind an extraction failure, if the model answered at all.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            PlaybookError::Extraction(e) => Some(e.raw_text()),
            _ => None,
        }
    }
}

/// A parsed playbook together with the text it was parsed from.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub raw: String,
    pub record: PlaybookRecord,
}

/// Reference material configured in settings, or empty when none is set.
pub fn reference_material(settings: &AiSettings) -> String {
    match settings.reference_dir.as_deref() {
        Some(dir) if !dir.is_empty() => soar_core::reference::load_reference_material(
            Path::new(dir),
            soar_core::reference::DEFAULT_MAX_CHARS,
        ),
        _ => String::new(),
    }
}

/// Prompt the model for a playbook and extract it from the reply.
pub async fn generate_playbook(
    generator: &dyn TextGenerator,
    request: &PlaybookRequest,
    reference: &str,
) -> Result<Generated, PlaybookError> {
    if request.alert.trim().is_empty() {
        return Err(PlaybookError::EmptyAlert);
    }

    let system = prompt::system_prompt();
    let user_msg = prompt::user_message(request, reference);

    tracing::info!(mode = %request.mode, depth = %request.depth, "generating playbook");

    let raw = generator
        .generate(&system, &user_msg)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "generate failed"))?;
    tracing::debug!(raw = %raw, "raw LLM output");

    match soar_core::extract(&raw) {
        Ok(record) => {
            tracing::info!(
                blocks = record.blocks.len(),
                skipped = record.skipped_blocks.len(),
                "parsed playbook"
            );
            Ok(Generated { raw, record })
        }
        Err(e) => {
            tracing::warn!(error = %e, "model output could not be parsed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use soar_core::{Depth, Mode};
    use std::sync::Mutex;

    /// Replays a canned reply and records the prompts it was given.
    struct Canned {
        reply: Result<String, fn() -> GenerateError>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(vec![]),
            }
        }

        fn failing(err: fn() -> GenerateError) -> Self {
            Self {
                reply: Err(err),
                seen: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, system: &str, user_msg: &str) -> Result<String, GenerateError> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), user_msg.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn request(alert: &str) -> PlaybookRequest {
        PlaybookRequest::new(alert, Mode::Deployment, Depth::Intermediate)
    }

    #[tokio::test]
    async fn fenced_reply_becomes_record() {
        let reply = "```json\n{\"blocks\":[{\"block_name\":\"Trigger\"},{\"block_name\":\"Contain\"}],\"documentation\":\"d\"}\n```";
        let generator = Canned::ok(reply);

        let generated = generate_playbook(&generator, &request("Impossible travel"), "refs")
            .await
            .unwrap();
        assert_eq!(generated.raw, reply);
        let names: Vec<_> = generated.record.blocks.iter().map(|b| b.block_name.as_str()).collect();
        assert_eq!(names, vec!["Trigger", "Contain"]);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("SOAR ARCHITECT"));
        assert!(seen[0].1.contains("Impossible travel"));
        assert!(seen[0].1.contains("refs"));
    }

    #[tokio::test]
    async fn unparseable_reply_keeps_raw_text() {
        let generator = Canned::ok("The model is overloaded, try later.");
        let err = generate_playbook(&generator, &request("alert"), "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaybookError::Extraction(ExtractionError::MalformedOutput { .. })
        ));
        assert_eq!(err.raw_text(), Some("The model is overloaded, try later."));
    }

    #[tokio::test]
    async fn empty_playbook_is_an_error() {
        let generator = Canned::ok(r#"{"blocks": [], "documentation": "x"}"#);
        let err = generate_playbook(&generator, &request("alert"), "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlaybookError::Extraction(ExtractionError::EmptyPlaybook { .. })
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_not_an_extraction_failure() {
        let generator = Canned::failing(|| GenerateError::EmptyResponse);
        let err = generate_playbook(&generator, &request("alert"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Generate(GenerateError::EmptyResponse)));
        assert_eq!(err.raw_text(), None);
    }

    #[tokio::test]
    async fn blank_alert_never_reaches_the_model() {
        let generator = Canned::ok("{}");
        let err = generate_playbook(&generator, &request(" \n "), "")
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybookError::EmptyAlert));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn reference_material_is_empty_without_dir() {
        assert_eq!(reference_material(&AiSettings::default()), "");
        let settings = AiSettings {
            reference_dir: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(reference_material(&settings), "");
    }
}
