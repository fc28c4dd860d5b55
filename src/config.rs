//! Loads `OrganizerConfig` from `ORGANIZER_*` environment variables.
//!
//! Unset variables take their defaults. Values that fail to parse are logged
//! and replaced by the default rather than aborting the run.

use crate::core::ai::{AiConfig, LlmProviderKind};
use crate::core::organizer::OrganizerConfig;
use std::str::FromStr;

const LLM_TEMPERATURE: f32 = 0.1;
const LLM_MAX_TOKENS: u32 = 500;

pub fn load_from_env() -> OrganizerConfig {
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the configuration from any key lookup.
fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OrganizerConfig {
    let defaults = OrganizerConfig::default();
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let provider = match get("ORGANIZER_LLM_PROVIDER") {
        Some(name) => name.parse::<LlmProviderKind>().unwrap_or_else(|e| {
            tracing::warn!("{}; using {}", e, defaults.provider);
            defaults.provider
        }),
        None => defaults.provider,
    };

    let confidence_threshold = parse_or(
        "ORGANIZER_CONFIDENCE_THRESHOLD",
        get("ORGANIZER_CONFIDENCE_THRESHOLD"),
        defaults.confidence_threshold,
    );
    let skip_confidence_threshold = parse_or(
        "ORGANIZER_SKIP_CONFIDENCE_THRESHOLD",
        get("ORGANIZER_SKIP_CONFIDENCE_THRESHOLD"),
        defaults.skip_confidence_threshold,
    );

    OrganizerConfig {
        llm_enabled: parse_or(
            "ORGANIZER_LLM_ENABLED",
            get("ORGANIZER_LLM_ENABLED"),
            defaults.llm_enabled,
        ),
        provider,
        api_key: get("ORGANIZER_LLM_API_KEY").unwrap_or_default(),
        api_url: get("ORGANIZER_LLM_API_URL"),
        model: get("ORGANIZER_LLM_MODEL").unwrap_or(defaults.model),
        llm_timeout_secs: parse_or(
            "ORGANIZER_LLM_TIMEOUT_SECS",
            get("ORGANIZER_LLM_TIMEOUT_SECS"),
            defaults.llm_timeout_secs,
        ),
        confidence_threshold: unit_interval(confidence_threshold, defaults.confidence_threshold),
        skip_confidence_threshold: unit_interval(
            skip_confidence_threshold,
            defaults.skip_confidence_threshold,
        ),
        smart_folders_enabled: parse_or(
            "ORGANIZER_SMART_FOLDERS",
            get("ORGANIZER_SMART_FOLDERS"),
            defaults.smart_folders_enabled,
        ),
        batch_size: parse_or(
            "ORGANIZER_BATCH_SIZE",
            get("ORGANIZER_BATCH_SIZE"),
            defaults.batch_size,
        )
        .max(1),
        email_context_chars: parse_or(
            "ORGANIZER_EMAIL_CONTEXT_CHARS",
            get("ORGANIZER_EMAIL_CONTEXT_CHARS"),
            defaults.email_context_chars,
        ),
        default_folder: get("ORGANIZER_DEFAULT_FOLDER"),
        request_timeout_secs: parse_or(
            "ORGANIZER_REQUEST_TIMEOUT_SECS",
            get("ORGANIZER_REQUEST_TIMEOUT_SECS"),
            defaults.request_timeout_secs,
        ),
    }
}

/// Model settings sent with every classification call.
pub fn ai_config(config: &OrganizerConfig) -> AiConfig {
    AiConfig {
        model: config.model.clone(),
        temperature: LLM_TEMPERATURE,
        max_tokens: Some(LLM_MAX_TOKENS),
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn unit_interval(value: f64, default: f64) -> f64 {
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        tracing::warn!("Threshold {} is outside 0..=1; using {}", value, default);
        default
    }
}
