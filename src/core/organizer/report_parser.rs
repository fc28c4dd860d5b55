//! Parsers for the line-oriented text reports produced by the mail client.
//!
//! Both parsers are total: malformed lines are skipped, unknown lines are
//! ignored, and an empty or unrecognizable report yields an empty list.
//! Callers check for the error marker before handing text to these functions.

use super::organizer_models::{AttachmentRecord, EmailSummary};
use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix the mail client uses for reports describing a failed call.
pub const ERROR_MARKER: &str = "❌";

/// Warning glyph that may trail a size label ("30 MB ⚠️ too large").
const WARNING_GLYPH: char = '⚠';

/// `3. **Subject**`, optionally with glyphs between the number and the bold text.
static NUMBERED_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\.(?:\s+|$)").expect("valid regex"));

static BOLD_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

/// `   📧 From: value` - leading glyphs are tolerated, leading words are not,
/// so "Attachment ID:" never matches as "ID:".
static EMAIL_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[^\w\s]*\s*(From|Date|ID|Preview|Attachments):\s*(.*?)\s*$")
        .expect("valid regex")
});

static ATTACHMENT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[^\w\s]*\s*(Type|Size|Attachment ID|Use):\s*(.*?)\s*$").expect("valid regex")
});

static BACKTICKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));

/// `fn_name('first', ...)` - captures the first quoted argument after the function name.
static USAGE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[A-Za-z_][A-Za-z0-9_]*\s*\(\s*['"]([^'"]+)['"]"#).expect("valid regex")
});

/// Returns true when a collaborator report describes a failure rather than data.
pub fn is_error_report(report: &str) -> bool {
    report.trim_start().starts_with(ERROR_MARKER)
}

// ============================================================================
// EMAIL LIST
// ============================================================================

#[derive(Default)]
struct PartialEmail {
    subject: String,
    from: String,
    date: String,
    id: Option<String>,
    summary: Vec<String>,
}

impl PartialEmail {
    fn finish(self) -> Option<EmailSummary> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(EmailSummary {
            id,
            subject: self.subject,
            from: self.from,
            date: self.date,
            attachment_summary_text: self.summary.join(" "),
        })
    }
}

/// Parses a search report into email summaries, in order of appearance.
///
/// Entries without an `ID:` line are dropped since they can't be addressed.
pub fn parse_email_list(report: &str) -> Vec<EmailSummary> {
    let mut emails = Vec::new();
    let mut current: Option<PartialEmail> = None;

    for line in report.lines() {
        if NUMBERED_ENTRY.is_match(line) {
            if let Some(done) = current.take().and_then(PartialEmail::finish) {
                emails.push(done);
            }
            let subject = BOLD_TEXT
                .captures(line)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default();
            current = Some(PartialEmail {
                subject,
                ..Default::default()
            });
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        let Some(caps) = EMAIL_FIELD.captures(line) else {
            continue;
        };

        let value = caps[2].to_string();
        match &caps[1] {
            "From" => entry.from = value,
            "Date" => entry.date = value,
            "ID" => entry.id = Some(strip_backticks(&value)),
            "Preview" | "Attachments" => {
                let value = value.trim_end_matches("...").trim().to_string();
                if !value.is_empty() {
                    entry.summary.push(value);
                }
            }
            _ => {}
        }
    }

    if let Some(done) = current.and_then(PartialEmail::finish) {
        emails.push(done);
    }

    emails
}

// ============================================================================
// ATTACHMENT LIST
// ============================================================================

struct PartialAttachment {
    index: usize,
    filename: String,
    mime_type_label: String,
    size_label: String,
    explicit_ref: Option<String>,
    usage_ref: Option<String>,
}

impl PartialAttachment {
    fn finish(self, email: &EmailSummary) -> AttachmentRecord {
        let attachment_ref = self
            .explicit_ref
            .or(self.usage_ref)
            .unwrap_or_else(|| self.index.to_string());

        AttachmentRecord {
            email_id: email.id.clone(),
            index: self.index,
            attachment_ref,
            filename: self.filename,
            mime_type_label: self.mime_type_label,
            size_label: self.size_label,
            email_context: email.clone(),
        }
    }
}

/// Parses an attachment listing for one email known only by id.
#[cfg(test)]
pub fn parse_attachment_list(report: &str, email_id: &str) -> Vec<AttachmentRecord> {
    let email = EmailSummary {
        id: email_id.to_string(),
        ..Default::default()
    };
    parse_attachment_list_for(report, &email)
}

/// Parses an attachment listing and decorates each record with `email`.
pub fn parse_attachment_list_for(report: &str, email: &EmailSummary) -> Vec<AttachmentRecord> {
    let mut records: Vec<AttachmentRecord> = Vec::new();
    // `None` while inside an entry that was discarded (no filename / bad number).
    let mut current: Option<PartialAttachment> = None;

    let flush = |partial: Option<PartialAttachment>, records: &mut Vec<AttachmentRecord>| {
        if let Some(partial) = partial {
            if records.iter().any(|r| r.index == partial.index) {
                tracing::debug!(
                    "Dropping duplicate attachment index {} for email {}",
                    partial.index,
                    email.id
                );
                return;
            }
            records.push(partial.finish(email));
        }
    };

    for line in report.lines() {
        if let Some(caps) = NUMBERED_ENTRY.captures(line) {
            flush(current.take(), &mut records);

            let number = caps[1].parse::<usize>().ok().filter(|n| *n >= 1);
            let filename = BOLD_TEXT
                .captures(line)
                .map(|c| c[1].trim().to_string())
                .filter(|f| !f.is_empty());

            current = match (number, filename) {
                (Some(number), Some(filename)) => Some(PartialAttachment {
                    index: number - 1,
                    filename,
                    mime_type_label: String::new(),
                    size_label: String::new(),
                    explicit_ref: None,
                    usage_ref: None,
                }),
                _ => None,
            };
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        let Some(caps) = ATTACHMENT_FIELD.captures(line) else {
            continue;
        };

        let value = &caps[2];
        match &caps[1] {
            "Type" => entry.mime_type_label = value.to_string(),
            "Size" => entry.size_label = strip_warning(value),
            "Attachment ID" => {
                let id = strip_backticks(value);
                if !id.is_empty() {
                    entry.explicit_ref = Some(id);
                }
            }
            "Use" => {
                if let Some(arg) = USAGE_CALL.captures(value) {
                    entry.usage_ref = Some(arg[1].to_string());
                }
            }
            _ => {}
        }
    }

    flush(current.take(), &mut records);
    records
}

fn strip_backticks(value: &str) -> String {
    BACKTICKED
        .captures(value)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| value.trim().to_string())
}

fn strip_warning(value: &str) -> String {
    value
        .split(WARNING_GLYPH)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
