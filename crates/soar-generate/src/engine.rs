use std::time::Duration;

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use soar_core::AiSettings;

/// Transport-level failures of the model call. Kept apart from
/// `ExtractionError`: these mean the model produced nothing to parse.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Chat(String),
    #[error("LLM did not answer within {0:?}")]
    Timeout(Duration),
    #[error("LLM returned empty text")]
    EmptyResponse,
    #[error("LLM returned no text")]
    NoText,
}

/// A text-generation service. Passed explicitly to whoever needs one.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, user_msg: &str) -> Result<String, GenerateError>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

fn map_backend(provider: &str) -> Result<LLMBackend, GenerateError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(GenerateError::UnknownProvider(other.to_string())),
    }
}

/// [`TextGenerator`] backed by the `llm` crate, configured from [`AiSettings`].
pub struct LlmGenerator {
    settings: AiSettings,
    timeout: Duration,
}

impl LlmGenerator {
    pub fn new(settings: AiSettings) -> Self {
        Self {
            settings,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, system: &str, user_msg: &str) -> Result<String, GenerateError> {
        let settings = &self.settings;
        let backend = map_backend(&settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&settings.model)
            .system(system);

        if !settings.api_key.is_empty() {
            builder = builder.api_key(&settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| GenerateError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(user_msg).build()];

        tracing::debug!(provider = %settings.provider, model = %settings.model, "sending chat request");
        let response = tokio::time::timeout(self.timeout, llm.chat(&messages))
            .await
            .map_err(|_| GenerateError::Timeout(self.timeout))?
            .map_err(|e| GenerateError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(GenerateError::EmptyResponse),
            None => Err(GenerateError::NoText),
        }
    }
}
