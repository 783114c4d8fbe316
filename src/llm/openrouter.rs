use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// Provider for any OpenAI-compatible chat-completions endpoint; pointed at
/// OpenRouter by default.
pub struct OpenRouterProvider {
    client: Client<OpenAIConfig>,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url.trim_end_matches('/').to_string());
        Self {
            client: Client::with_config(config),
        }
    }

    fn convert(messages: &[ChatMessage]) -> LlmResult<Vec<ChatCompletionRequestMessage>> {
        messages
            .iter()
            .map(|m| {
                let converted: ChatCompletionRequestMessage = match m.role.as_str() {
                    "system" => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| LlmError::Api(e.to_string()))?
                        .into(),
                    "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| LlmError::Api(e.to_string()))?
                        .into(),
                    // Everything else is treated as a user turn
                    _ => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| LlmError::Api(e.to_string()))?
                        .into(),
                };
                Ok(converted)
            })
            .collect()
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: CallParams,
    ) -> LlmResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(Self::convert(messages)?)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = tokio::time::timeout(params.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(params.timeout))?
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::Parse("no content in response".to_string()))?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    #[ignore] // Only run with a real OPENROUTER_API_KEY
    async fn test_openrouter_chat() {
        let api_key = std::env::var("OPENROUTER_API_KEY").expect("OPENROUTER_API_KEY not set");
        let provider =
            OpenRouterProvider::new(api_key, "https://openrouter.ai/api/v1".to_string());

        let messages = vec![
            ChatMessage::system("You are a concise narrator."),
            ChatMessage::user("Describe a dungeon entrance in one sentence."),
        ];
        let params = CallParams {
            temperature: 0.8,
            max_tokens: 100,
            timeout: Duration::from_secs(30),
        };

        let text = provider
            .chat("meta-llama/llama-3.3-70b-instruct:free", &messages, params)
            .await
            .unwrap();
        assert!(!text.is_empty());
        println!("Generated text: {text}");
    }
}
