use super::models::{AiConfig, AiMessage, AiProviderResponse};
use async_trait::async_trait;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Error generating questions: {0}")]
    Provider(String),

    #[error("Failed to generate content. Please check your API key or model configuration.")]
    EmptyCompletion,
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a chat completion request to the AI provider.
    ///
    /// Returns an `AiProviderResponse` containing both the main content
    /// and optional thinking/reasoning from the model.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Blanket implementation for Box<dyn AiProvider> so the provider can be
// picked at runtime from configuration (Gemini, OpenRouter).
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}

/// One-shot text generation on top of an `AiProvider`.
pub struct AiService<P: AiProvider> {
    provider: P,
    config: AiConfig,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, config: AiConfig) -> Self {
        Self { provider, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sends a single free-text prompt and returns the completion text.
    ///
    /// A blank completion is an error: there is nothing downstream can parse.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let messages = [AiMessage::user(prompt)];

        tracing::info!(
            "Requesting completion from {} ({} prompt chars)",
            self.config.model,
            prompt.len()
        );

        let response = self
            .provider
            .chat_complete(&messages, &self.config)
            .await
            .map_err(|e| GenerationError::Provider(e.to_string()))?;

        if let Some(thinking) = &response.thinking {
            tracing::debug!("Model returned {} chars of reasoning", thinking.len());
        }

        if response.content.trim().is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<String, String>,
        seen: Mutex<Vec<AiMessage>>,
    }

    impl ScriptedProvider {
        fn new(reply: Result<&str, &str>) -> Self {
            Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        async fn chat_complete(
            &self,
            messages: &[AiMessage],
            _config: &AiConfig,
        ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
            self.seen.lock().unwrap().extend(messages.iter().cloned());
            match &self.reply {
                Ok(content) => Ok(AiProviderResponse {
                    content: content.clone(),
                    thinking: None,
                }),
                Err(message) => Err(message.clone().into()),
            }
        }
    }

    #[tokio::test]
    async fn test_generate_sends_single_user_message() {
        let service = AiService::new(ScriptedProvider::new(Ok("Answer Key")), AiConfig::default());

        let text = service.generate("make questions").await.unwrap();

        assert_eq!(text, "Answer Key");
        let seen = service.provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].role, "user");
        assert_eq!(seen[0].content, "make questions");
    }

    #[tokio::test]
    async fn test_blank_completion_is_an_error() {
        let service = AiService::new(ScriptedProvider::new(Ok("  \n")), AiConfig::default());

        let result = service.generate("prompt").await;
        assert!(matches!(result, Err(GenerationError::EmptyCompletion)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_wrapped() {
        let service = AiService::new(ScriptedProvider::new(Err("quota exceeded")), AiConfig::default());

        match service.generate("prompt").await {
            Err(GenerationError::Provider(message)) => assert!(message.contains("quota exceeded")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
