// =============================================================================
// CLASSIFICATION ENGINE
// =============================================================================
//
// Decides per attachment whether it is relevant and where it should be filed.
//
// The engine never fails. Each tier degrades to a permissive verdict
// (relevant = true) so an unusable reply can't drop user data:
//
//   LLM disabled        -> relevant, 0.6
//   call failed/timeout -> relevant, 0.5
//   reply unparseable   -> relevant, 0.5
//   reply parsed        -> LLM verdict, confidence clamped to [0, 1]

use super::organizer_models::{AttachmentRecord, Classification};
use crate::core::ai::{AiConfig, AiProvider, AiService, LlmCallResult};
use serde_json::Value;
use std::time::Duration;

pub const DISABLED_CONFIDENCE: f64 = 0.6;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const RESPONSE_SHAPE: &str = r#"Respond with ONLY a JSON object in this exact shape:
{"relevant": true or false, "confidence": number between 0.0 and 1.0, "reasoning": "one short sentence", "suggested_folder": "Category/Subcategory" or null}"#;

/// Everything the engine looks at for one attachment.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub attachment: &'a AttachmentRecord,
    /// Body text of the owning email; truncated to the context budget.
    pub body_preview: &'a str,
    /// Filenames of the other attachments on the same email.
    pub sibling_filenames: &'a [String],
}

pub struct ClassificationEngine {
    /// `None` when LLM usage is disabled.
    llm: Option<AiService<Box<dyn AiProvider>>>,
    email_context_chars: usize,
}

impl ClassificationEngine {
    pub fn disabled(email_context_chars: usize) -> Self {
        Self {
            llm: None,
            email_context_chars,
        }
    }

    pub fn with_provider(
        provider: Box<dyn AiProvider>,
        config: AiConfig,
        timeout: Duration,
        email_context_chars: usize,
    ) -> Self {
        Self {
            llm: Some(AiService::new(provider, config, timeout)),
            email_context_chars,
        }
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn classify(
        &self,
        input: ClassificationInput<'_>,
        custom_prompt: Option<&str>,
    ) -> Classification {
        let Some(llm) = &self.llm else {
            return Classification::new(true, DISABLED_CONFIDENCE, "LLM disabled — fallback", None);
        };

        let prompt = self.build_prompt(input, custom_prompt);
        let result = llm.call(&prompt).await;
        interpret_call_result(&result, &input.attachment.filename)
    }

    /// Builds the prompt sent to the model.
    pub fn build_prompt(&self, input: ClassificationInput<'_>, custom_prompt: Option<&str>) -> String {
        let attachment = input.attachment;
        let email = &attachment.email_context;
        // The search snippet stands in when the body could not be read.
        let body = match input.body_preview.trim() {
            "" => email.attachment_summary_text.trim(),
            body => body,
        };
        let preview = truncate_chars(body, self.email_context_chars);

        match custom_prompt {
            Some(custom) => format!(
                "{custom}\n\n\
                 Email: \"{subject}\" from {from}\n\
                 Attachment: {filename} ({mime}, {size})\n\n\
                 {RESPONSE_SHAPE}",
                custom = custom.trim(),
                subject = email.subject,
                from = email.from,
                filename = attachment.filename,
                mime = label_or_unknown(&attachment.mime_type_label),
                size = label_or_unknown(&attachment.size_label),
            ),
            None => {
                let siblings = if input.sibling_filenames.is_empty() {
                    "none".to_string()
                } else {
                    input.sibling_filenames.join(", ")
                };

                format!(
                    "You are filing email attachments into cloud storage folders. \
                     Decide whether this attachment is worth keeping and suggest a folder.\n\n\
                     EMAIL\n\
                     Subject: {subject}\n\
                     From: {from}\n\
                     Date: {date}\n\
                     Body preview: {preview}\n\n\
                     ATTACHMENT\n\
                     Filename: {filename}\n\
                     Type: {mime}\n\
                     Size: {size}\n\
                     Other attachments on this email: {siblings}\n\n\
                     RULES\n\
                     1. The filename takes precedence over the email subject when they disagree.\n\
                     2. Filenames containing marketing, banner, logo, promo or similar tokens are \
                     decorative: mark them not relevant with high confidence.\n\
                     3. If you are unsure, prefer marking the attachment not relevant with low \
                     confidence over guessing.\n\
                     4. When several attachments compete, single out the one that best matches the \
                     email's purpose and mark the others not relevant.\n\
                     5. suggested_folder is a short category path such as \"Finance/Invoices\", \
                     or null.\n\n\
                     {RESPONSE_SHAPE}",
                    subject = email.subject,
                    from = email.from,
                    date = email.date,
                    filename = attachment.filename,
                    mime = label_or_unknown(&attachment.mime_type_label),
                    size = label_or_unknown(&attachment.size_label),
                )
            }
        }
    }
}

/// Maps a call result to a classification, applying the fallback tiers.
pub fn interpret_call_result(result: &LlmCallResult, filename: &str) -> Classification {
    if !result.success {
        let error = result.error.as_deref().unwrap_or("unknown error");
        return Classification::new(
            true,
            FALLBACK_CONFIDENCE,
            format!("LLM call failed: {} — fallback", error),
            None,
        );
    }

    match parse_classification(&result.response_text) {
        Some(classification) => classification,
        None => {
            tracing::warn!("Unparseable classification reply for {}", filename);
            Classification::new(
                true,
                FALLBACK_CONFIDENCE,
                "LLM response parsing failed — fallback",
                None,
            )
        }
    }
}

/// Parses a model reply into a classification.
///
/// Accepts `{"classifications": [{...}, ...]}` (first element used) or a flat
/// object. `relevant`, `confidence` and `reasoning` are required.
pub fn parse_classification(response_text: &str) -> Option<Classification> {
    let json = extract_json_object(response_text)?;
    let value: Value = serde_json::from_str(json).ok()?;

    let object = match value.get("classifications") {
        Some(Value::Array(items)) => items.first()?.as_object()?,
        Some(_) => return None,
        None => value.as_object()?,
    };

    let relevant = match object.get("relevant")? {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().parse::<bool>().ok()?,
        _ => return None,
    };
    let confidence = match object.get("confidence")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let reasoning = match object.get("reasoning")? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    let suggested_folder = ["suggested_folder", "suggestedFolder", "folder"]
        .iter()
        .find_map(|key| object.get(*key))
        .and_then(Value::as_str)
        .map(|s| s.trim().trim_matches('/').to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"));

    Some(Classification::new(
        relevant,
        confidence,
        reasoning,
        suggested_folder,
    ))
}

/// Returns the first balanced `{...}` span, skipping braces inside strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

fn label_or_unknown(label: &str) -> &str {
    if label.trim().is_empty() {
        "unknown"
    } else {
        label
    }
}
