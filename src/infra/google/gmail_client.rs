// =============================================================================
// GMAIL CLIENT
// =============================================================================
//
// Implements `MailClient` on the Gmail REST API (v1).
//
// Search and attachment listings are rendered as numbered text reports:
//
//   1. **Subject**
//      From: sender
//      Date: date
//      Preview: snippet
//      ID: `message-id`
//
// Attachments carry either `Attachment ID: \`...\`` or, when Gmail inlined the
// data and gave no id, a positional `Use: download_attachment('<index>')`.

use super::google_auth::GoogleAuth;
use crate::core::organizer::{MailClient, MailError};
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Attachments above this size get a warning in the listing.
const LARGE_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;

/// Gmail encodes bodies as base64url, sometimes without padding.
const GMAIL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartBody {
    #[serde(default)]
    attachment_id: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    data: String,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GmailClient {
    client: Client,
    auth: Arc<GoogleAuth>,
    base_url: String,
}

impl GmailClient {
    pub fn new(auth: Arc<GoogleAuth>, timeout: Duration) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Api(e.to_string()))?;
        Ok(Self {
            client,
            auth,
            base_url: GMAIL_API_BASE.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MailError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| MailError::Auth(e.to_string()))?;

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| MailError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, path, body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::Api(format!("unexpected response for {}: {}", path, e)))
    }

    async fn get_message(&self, id: &str, format: &str) -> Result<Message, MailError> {
        let mut query = vec![("format", format.to_string())];
        if format == "metadata" {
            for header in ["Subject", "From", "Date"] {
                query.push(("metadataHeaders", header.to_string()));
            }
        }
        self.get_json(&format!("messages/{}", id), &query).await
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn search_emails(&self, query: &str, max_results: u32) -> Result<String, MailError> {
        tracing::debug!("Gmail search: {}", query);
        let list: MessageList = self
            .get_json(
                "messages",
                &[
                    ("q", query.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )
            .await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for message_ref in &list.messages {
            match self.get_message(&message_ref.id, "metadata").await {
                Ok(message) => messages.push(message),
                Err(e) => tracing::warn!("Skipping message {}: {}", message_ref.id, e),
            }
        }

        Ok(render_search_report(query, &messages))
    }

    async fn list_attachments(&self, email_id: &str) -> Result<String, MailError> {
        let message = self.get_message(email_id, "full").await?;
        Ok(render_attachment_report(&message))
    }

    async fn get_email_preview(&self, email_id: &str) -> Result<String, MailError> {
        let message = self.get_message(email_id, "full").await?;
        let body = message
            .payload
            .as_ref()
            .and_then(find_plain_text)
            .unwrap_or_default();

        if body.trim().is_empty() {
            Ok(message.snippet)
        } else {
            Ok(body)
        }
    }

    async fn get_attachment_bytes(
        &self,
        email_id: &str,
        attachment_ref: &str,
    ) -> Result<Vec<u8>, MailError> {
        let attachment_id = match positional_index(attachment_ref) {
            Some(index) => {
                let message = self.get_message(email_id, "full").await?;
                let parts = message
                    .payload
                    .as_ref()
                    .map(attachment_parts)
                    .unwrap_or_default();
                let part = parts.get(index).ok_or_else(|| {
                    MailError::NotFound(format!("attachment #{} in {}", index, email_id))
                })?;

                if let Some(data) = &part.body.data {
                    return decode_body(data);
                }
                part.body.attachment_id.clone().ok_or_else(|| {
                    MailError::NotFound(format!("attachment #{} has no data", index))
                })?
            }
            None => attachment_ref.to_string(),
        };

        let body: AttachmentBody = self
            .get_json(
                &format!("messages/{}/attachments/{}", email_id, attachment_id),
                &[],
            )
            .await?;
        decode_body(&body.data)
    }
}

/// Gmail attachment ids are long opaque tokens and never all digits, so an
/// all-digit ref can only be a position from a `Use:` line.
fn positional_index(attachment_ref: &str) -> Option<usize> {
    let attachment_ref = attachment_ref.trim();
    if attachment_ref.is_empty() || !attachment_ref.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    attachment_ref.parse().ok()
}

fn status_error(status: StatusCode, path: &str, body: String) -> MailError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MailError::Auth(format!("{}: {}", status, body))
        }
        StatusCode::NOT_FOUND => MailError::NotFound(path.to_string()),
        _ => MailError::Api(format!("{}: {}", status, body)),
    }
}

// =============================================================================
// RENDERING
// =============================================================================

fn render_search_report(query: &str, messages: &[Message]) -> String {
    if messages.is_empty() {
        return format!("📭 No emails found for `{}`.", query);
    }

    let mut out = format!("📧 Found {} email(s) for `{}`:\n", messages.len(), query);
    for (i, message) in messages.iter().enumerate() {
        let headers = message
            .payload
            .as_ref()
            .map(|p| p.headers.as_slice())
            .unwrap_or_default();
        let subject = header_value(headers, "Subject").unwrap_or("(no subject)");

        let _ = writeln!(out, "\n{}. **{}**", i + 1, subject);
        let _ = writeln!(out, "   From: {}", header_value(headers, "From").unwrap_or(""));
        let _ = writeln!(out, "   Date: {}", header_value(headers, "Date").unwrap_or(""));
        if !message.snippet.trim().is_empty() {
            let _ = writeln!(out, "   Preview: {}", one_line(&message.snippet));
        }
        let _ = writeln!(out, "   ID: `{}`", message.id);
    }
    out
}

fn render_attachment_report(message: &Message) -> String {
    let parts = message
        .payload
        .as_ref()
        .map(attachment_parts)
        .unwrap_or_default();

    if parts.is_empty() {
        return format!("📭 Email `{}` has no attachments.", message.id);
    }

    let mut out = format!(
        "📎 {} attachment(s) in email `{}`:\n",
        parts.len(),
        message.id
    );
    for (index, part) in parts.iter().enumerate() {
        let _ = writeln!(out, "\n{}. **{}**", index + 1, part.filename);
        let _ = writeln!(out, "   Type: {}", part.mime_type);

        let mut size = human_size(part.body.size);
        if part.body.size > LARGE_ATTACHMENT_BYTES {
            size.push_str(" ⚠️ large file");
        }
        let _ = writeln!(out, "   Size: {}", size);

        match &part.body.attachment_id {
            Some(id) => {
                let _ = writeln!(out, "   Attachment ID: `{}`", id);
            }
            None => {
                let _ = writeln!(out, "   Use: download_attachment('{}')", index);
            }
        }
    }
    out
}

/// Every part with a filename, depth-first in document order.
fn attachment_parts(root: &MessagePart) -> Vec<&MessagePart> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(part) = stack.pop() {
        if !part.filename.is_empty() {
            found.push(part);
        }
        stack.extend(part.parts.iter().rev());
    }
    found
}

fn find_plain_text(part: &MessagePart) -> Option<String> {
    if part.mime_type == "text/plain" && part.filename.is_empty() {
        if let Some(data) = &part.body.data {
            return decode_body(data)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    part.parts.iter().find_map(find_plain_text)
}

fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.trim())
        .filter(|v| !v.is_empty())
}

fn decode_body(data: &str) -> Result<Vec<u8>, MailError> {
    // Gmail occasionally hands back standard-alphabet data.
    let normalized = data.trim().replace('+', "-").replace('/', "_");
    GMAIL_BASE64
        .decode(normalized)
        .map_err(|e| MailError::Decode(e.to_string()))
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::organizer::report_parser::{parse_attachment_list, parse_email_list};

    fn message_json() -> &'static str {
        r#"{
            "id": "18c2f",
            "snippet": "Please find the   invoice attached",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "Subject", "value": "Invoice #42"},
                    {"name": "From", "value": "Billing <billing@acme.com>"},
                    {"name": "Date", "value": "Mon, 2 Sep 2024 10:00:00 +0000"}
                ],
                "parts": [
                    {
                        "mimeType": "multipart/alternative",
                        "parts": [
                            {"mimeType": "text/plain", "body": {"size": 11, "data": "SGVsbG8gd29ybGQ"}},
                            {"mimeType": "text/html", "body": {"size": 20, "data": "PGI-aGk8L2I-"}}
                        ]
                    },
                    {"mimeType": "application/pdf", "filename": "invoice.pdf",
                     "body": {"size": 2048, "attachmentId": "ANGjdJ8"}},
                    {"mimeType": "text/csv", "filename": "rows.csv",
                     "body": {"size": 5, "data": "YSxiLGM"}}
                ]
            }
        }"#
    }

    fn message() -> Message {
        serde_json::from_str(message_json()).unwrap()
    }

    #[test]
    fn test_search_report_is_readable_by_parser() {
        let report = render_search_report("invoice has:attachment", &[message()]);
        let emails = parse_email_list(&report);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].id, "18c2f");
        assert_eq!(emails[0].subject, "Invoice #42");
        assert_eq!(emails[0].from, "Billing <billing@acme.com>");
        assert!(emails[0]
            .attachment_summary_text
            .contains("Please find the invoice attached"));
    }

    #[test]
    fn test_empty_search_has_no_entries() {
        let report = render_search_report("nothing", &[]);
        assert!(parse_email_list(&report).is_empty());
    }

    #[test]
    fn test_attachment_report_uses_ids_or_positions() {
        let report = render_attachment_report(&message());
        let records = parse_attachment_list(&report, "18c2f");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "invoice.pdf");
        assert_eq!(records[0].attachment_ref, "ANGjdJ8");
        assert_eq!(records[0].size_label, "2.0 KB");
        assert_eq!(records[1].filename, "rows.csv");
        assert_eq!(records[1].attachment_ref, "1");
    }

    #[test]
    fn test_plain_text_body_is_found_in_nested_parts() {
        let message = message();
        let body = message.payload.as_ref().and_then(find_plain_text);
        assert_eq!(body.as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_inline_data_decodes_without_padding() {
        let message = message();
        let parts = attachment_parts(message.payload.as_ref().unwrap());
        let data = parts[1].body.data.as_deref().unwrap();
        assert_eq!(decode_body(data).unwrap(), b"a,b,c");
        assert!(matches!(decode_body("!!!"), Err(MailError::Decode(_))));
    }

    #[test]
    fn test_large_attachment_is_flagged() {
        let mut message = message();
        if let Some(payload) = message.payload.as_mut() {
            payload.parts[1].body.size = 30 * 1024 * 1024;
        }
        let report = render_attachment_report(&message);
        assert!(report.contains("Size: 30.0 MB ⚠️ large file"));
        let records = parse_attachment_list(&report, "18c2f");
        assert_eq!(records[0].size_label, "30.0 MB");
    }

    #[test]
    fn test_only_all_digit_refs_are_positional() {
        assert_eq!(positional_index("0"), Some(0));
        assert_eq!(positional_index(" 12 "), Some(12));
        assert_eq!(positional_index("ANGjdJ8"), None);
        assert_eq!(positional_index("+3"), None);
        assert_eq!(positional_index("1e3"), None);
        assert_eq!(positional_index(""), None);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "messages", String::new()),
            MailError::Auth(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "messages/x", String::new()),
            MailError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "messages", String::new()),
            MailError::Api(_)
        ));
    }
}
