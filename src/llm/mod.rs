mod openrouter;

pub use openrouter::OpenRouterProvider;

use crate::config::CompletionConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion provider not configured")]
    NotConfigured,

    #[error("API request failed: {0}")]
    Api(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("response parsing failed: {0}")]
    Parse(String),

    #[error("all model candidates failed")]
    Exhausted,
}

/// Free-tier fallback models tried after the configured preferred model.
const DEFAULT_MODELS: &[&str] = &[
    "meta-llama/llama-3.3-70b-instruct:free",
    "google/gemma-3-27b-it:free",
];

/// Returned by the safe entry point when no caller fallback is supplied and
/// the provider is unavailable or every candidate failed.
pub const GENERIC_FALLBACK: &str =
    "[llm-unavailable] Default response: completion provider not configured or request failed.";

/// One role-tagged entry in a chat transcript.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Request for one assistant-authored completion.
///
/// Callers either give a system + user prompt pair or a pre-built message
/// list; the message list wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user_prompt: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user_prompt: Some(user_prompt.into()),
            ..Default::default()
        }
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Some(messages),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Per-attempt sampling parameters handed to the provider.
#[derive(Debug, Clone, Copy)]
pub struct CallParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// One chat call against one named model.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: CallParams,
    ) -> LlmResult<String>;
}

/// Wraps the external chat-completion API with availability fallback across
/// an ordered list of model candidates.
///
/// Each call restarts the candidate list from the top; there are no retries
/// with backoff and no per-model health tracking across calls.
pub struct CompletionGateway {
    provider: Option<Arc<dyn ChatProvider>>,
    candidates: Vec<String>,
    timeout: Duration,
    default_max_tokens: u32,
}

const DEFAULT_TEMPERATURE: f32 = 0.8;

impl CompletionGateway {
    pub fn from_config(config: &CompletionConfig) -> Self {
        let provider: Option<Arc<dyn ChatProvider>> = config.api_key.as_ref().map(|key| {
            Arc::new(OpenRouterProvider::new(key.clone(), config.base_url.clone()))
                as Arc<dyn ChatProvider>
        });
        Self {
            provider,
            candidates: Self::candidates(config.preferred_model.as_deref()),
            timeout: config.timeout,
            default_max_tokens: config.max_tokens,
        }
    }

    /// Test seam: inject a scripted provider and explicit candidate list.
    pub fn with_provider(provider: Arc<dyn ChatProvider>, candidates: Vec<String>) -> Self {
        Self {
            provider: Some(provider),
            candidates,
            timeout: Duration::from_secs(30),
            default_max_tokens: 300,
        }
    }

    /// Gateway with no credential configured; the strict entry point always
    /// fails with [`LlmError::NotConfigured`].
    pub fn unconfigured() -> Self {
        Self {
            provider: None,
            candidates: Self::candidates(None),
            timeout: Duration::from_secs(30),
            default_max_tokens: 300,
        }
    }

    /// Preferred model first, then the free-tier defaults, deduplicated.
    fn candidates(preferred: Option<&str>) -> Vec<String> {
        let mut list: Vec<String> = Vec::new();
        if let Some(model) = preferred {
            list.push(model.to_string());
        }
        for model in DEFAULT_MODELS {
            if !list.iter().any(|m| m == model) {
                list.push(model.to_string());
            }
        }
        list
    }

    fn build_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
        if let Some(messages) = &request.messages {
            if !messages.is_empty() {
                return messages.clone();
            }
        }
        vec![
            ChatMessage::system(
                request
                    .system
                    .clone()
                    .unwrap_or_else(|| "You are a helpful AI assistant.".to_string()),
            ),
            ChatMessage::user(request.user_prompt.clone().unwrap_or_default()),
        ]
    }

    /// Strict entry point: the first model candidate that returns any
    /// non-empty text wins. Fails immediately when no credential is
    /// configured, and with [`LlmError::Exhausted`] when every candidate
    /// errors or returns only empty text.
    pub async fn complete(&self, request: CompletionRequest) -> LlmResult<String> {
        let provider = self.provider.as_ref().ok_or(LlmError::NotConfigured)?;

        let messages = Self::build_messages(&request);
        let params = CallParams {
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            timeout: self.timeout,
        };

        for model in &self.candidates {
            match provider.chat(model, &messages, params).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Ok(text.to_string());
                    }
                    tracing::warn!(model, "model returned empty completion, trying next");
                }
                Err(e) => {
                    tracing::warn!(model, error = %e, "model candidate failed, trying next");
                }
            }
        }

        Err(LlmError::Exhausted)
    }

    /// Safe entry point: never fails. On any failure (including a missing
    /// credential) returns the caller's fallback, or a fixed generic
    /// placeholder so game controllers always have something to display.
    pub async fn complete_or(&self, request: CompletionRequest, fallback: Option<&str>) -> String {
        match self.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(error = %e, "completion failed, using fallback");
                fallback.unwrap_or(GENERIC_FALLBACK).to_string()
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;
    use std::sync::Mutex;

    fn gateway_with(
        outcomes: Vec<LlmResult<String>>,
        candidates: &[&str],
    ) -> (CompletionGateway, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(outcomes));
        let gateway = CompletionGateway::with_provider(
            provider.clone(),
            candidates.iter().map(|s| s.to_string()).collect(),
        );
        (gateway, provider)
    }

    #[test]
    fn test_candidate_order_and_dedup() {
        let list = CompletionGateway::candidates(Some("meta-llama/llama-3.3-70b-instruct:free"));
        assert_eq!(
            list,
            vec![
                "meta-llama/llama-3.3-70b-instruct:free".to_string(),
                "google/gemma-3-27b-it:free".to_string(),
            ]
        );

        let list = CompletionGateway::candidates(Some("custom/model"));
        assert_eq!(list.len(), 3);
        assert_eq!(list[0], "custom/model");

        let list = CompletionGateway::candidates(None);
        assert_eq!(list.len(), 2);
    }

    #[tokio::test]
    async fn test_first_nonempty_candidate_wins() {
        let (gateway, provider) = gateway_with(
            vec![
                Err(LlmError::Api("503".into())),
                Ok("   ".into()),
                Ok("A shadow stirs.".into()),
            ],
            &["m1", "m2", "m3", "m4"],
        );

        let text = gateway
            .complete(CompletionRequest::new("sys", "prompt"))
            .await
            .unwrap();
        assert_eq!(text, "A shadow stirs.");
        // Exactly M+1 attempts: two failures plus the winner
        assert_eq!(provider.call_count(), 3);
        assert_eq!(*provider.calls.lock().unwrap(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_exhaustion_raises_and_safe_variant_falls_back() {
        let (gateway, provider) = gateway_with(
            vec![Err(LlmError::Api("500".into())), Ok("".into())],
            &["m1", "m2"],
        );

        let err = gateway
            .complete(CompletionRequest::new("sys", "prompt"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Exhausted));
        assert_eq!(provider.call_count(), 2);

        let (gateway, _) = gateway_with(vec![Err(LlmError::Api("500".into()))], &["m1"]);
        let text = gateway
            .complete_or(
                CompletionRequest::new("sys", "prompt"),
                Some("The dice are silent."),
            )
            .await;
        assert_eq!(text, "The dice are silent.");

        let (gateway, _) = gateway_with(vec![Err(LlmError::Api("500".into()))], &["m1"]);
        let text = gateway
            .complete_or(CompletionRequest::new("sys", "prompt"), None)
            .await;
        assert_eq!(text, GENERIC_FALLBACK);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_any_call() {
        let gateway = CompletionGateway::unconfigured();

        let err = gateway
            .complete(CompletionRequest::new("sys", "prompt"))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured));

        let text = gateway
            .complete_or(CompletionRequest::new("sys", "prompt"), Some("fallback"))
            .await;
        assert_eq!(text, "fallback");
    }

    struct CaptureProvider(Mutex<Vec<ChatMessage>>);

    #[async_trait]
    impl ChatProvider for CaptureProvider {
        async fn chat(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _params: CallParams,
        ) -> LlmResult<String> {
            *self.0.lock().unwrap() = messages.to_vec();
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn test_message_list_wins_over_prompt_pair() {
        let capture = Arc::new(CaptureProvider(Mutex::new(Vec::new())));
        let gateway = CompletionGateway::with_provider(capture.clone(), vec!["m".to_string()]);

        let mut request = CompletionRequest::new("ignored system", "ignored prompt");
        request.messages = Some(vec![
            ChatMessage::system("real system"),
            ChatMessage::assistant("earlier turn"),
            ChatMessage::user("latest"),
        ]);
        gateway.complete(request).await.unwrap();

        let seen = capture.0.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].content, "real system");
        assert_eq!(seen[1].role, "assistant");
    }
}
