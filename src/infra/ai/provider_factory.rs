use super::{AnthropicClient, LocalModelClient, OpenAiClient};
use crate::core::ai::{AiError, AiProvider, LlmProviderKind};
use crate::core::organizer::OrganizerConfig;
use std::time::Duration;

/// Builds the backend selected by `config.provider`.
///
/// Hosted providers need an API key; the local model server does not.
pub fn build_provider(config: &OrganizerConfig) -> Result<Box<dyn AiProvider>, AiError> {
    let base_url = config.provider_url();
    let timeout = Duration::from_secs(config.llm_timeout_secs.max(1));

    let provider: Box<dyn AiProvider> = match config.provider {
        LlmProviderKind::OpenAi => {
            require_key(config)?;
            Box::new(OpenAiClient::new(base_url, config.api_key.clone(), timeout)?)
        }
        LlmProviderKind::Anthropic => {
            require_key(config)?;
            Box::new(AnthropicClient::new(base_url, config.api_key.clone(), timeout)?)
        }
        LlmProviderKind::Local => Box::new(LocalModelClient::new(base_url, timeout)?),
    };

    tracing::info!(
        "LLM classification enabled: provider={}, model={}",
        config.provider,
        config.model
    );
    Ok(provider)
}

fn require_key(config: &OrganizerConfig) -> Result<(), AiError> {
    if config.api_key.trim().is_empty() {
        return Err(AiError::Request(format!(
            "no API key configured for provider '{}'",
            config.provider
        )));
    }
    Ok(())
}
