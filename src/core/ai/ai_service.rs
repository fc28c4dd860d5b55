use super::models::{AiConfig, AiError, AiMessage, AiProviderResponse, LlmCallResult};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Sends a single-turn completion request to the provider.
    async fn complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, AiError>;
}

// Blanket implementation for Box<dyn AiProvider>
// so the service can hold whichever backend the configuration selected.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    async fn complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, AiError> {
        (**self).complete(messages, config).await
    }
}

/// Wraps a provider so every call is time-bounded and never returns an error.
pub struct AiService<P: AiProvider> {
    provider: P,
    config: AiConfig,
    timeout: Duration,
}

impl<P: AiProvider> AiService<P> {
    pub fn new(provider: P, config: AiConfig, timeout: Duration) -> Self {
        Self {
            provider,
            config,
            timeout,
        }
    }

    /// Sends `prompt` as one user message.
    ///
    /// Provider errors and timeouts are captured in the returned
    /// `LlmCallResult` rather than propagated.
    pub async fn call(&self, prompt: &str) -> LlmCallResult {
        let messages = [AiMessage::user(prompt)];

        let outcome =
            tokio::time::timeout(self.timeout, self.provider.complete(&messages, &self.config))
                .await;

        match outcome {
            Ok(Ok(response)) => {
                if response.content.trim().is_empty() {
                    LlmCallResult::failed("empty response from provider")
                } else {
                    LlmCallResult::ok(response.content)
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("LLM call failed: {}", e);
                LlmCallResult::failed(e.to_string())
            }
            Err(_) => {
                let e = AiError::Timeout(self.timeout.as_secs());
                tracing::warn!("LLM call failed: {}", e);
                LlmCallResult::failed(e.to_string())
            }
        }
    }
}
