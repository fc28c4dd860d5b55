use crate::core::ai::LlmProviderKind;
use chrono::{Datelike, Local};

/// Settings the organizer is constructed with.
///
/// There are two distinct confidence gates. `confidence_threshold` decides
/// whether an LLM folder suggestion is applied; `skip_confidence_threshold`
/// decides whether a negative verdict is strong enough to skip a file. They
/// are kept separate on purpose and have different defaults.
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    pub llm_enabled: bool,
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub api_url: Option<String>,
    pub model: String,
    pub llm_timeout_secs: u64,
    pub confidence_threshold: f64,
    pub skip_confidence_threshold: f64,
    pub smart_folders_enabled: bool,
    pub batch_size: usize,
    pub email_context_chars: usize,
    pub default_folder: Option<String>,
    pub request_timeout_secs: u64,
}

impl OrganizerConfig {
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;
    pub const DEFAULT_SKIP_CONFIDENCE_THRESHOLD: f64 = 0.7;

    /// Folder used when neither the caller nor the classifier picked one.
    pub fn fallback_folder(&self) -> String {
        match &self.default_folder {
            Some(folder) if !folder.trim().trim_matches('/').is_empty() => {
                folder.trim().trim_matches('/').to_string()
            }
            _ => format!("Attachments/{}", Local::now().year()),
        }
    }

    /// Base URL for the selected provider, honoring an explicit override.
    pub fn provider_url(&self) -> String {
        self.api_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            llm_enabled: false,
            provider: LlmProviderKind::OpenAi,
            api_key: String::new(),
            api_url: None,
            model: "gpt-4o-mini".to_string(),
            llm_timeout_secs: 30,
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            skip_confidence_threshold: Self::DEFAULT_SKIP_CONFIDENCE_THRESHOLD,
            smart_folders_enabled: true,
            batch_size: 5,
            email_context_chars: 1000,
            default_folder: None,
            request_timeout_secs: 60,
        }
    }
}
