//! Renders an [`OrganizerReport`] as the markdown-ish text returned to the caller.

use super::organizer_models::{
    ClassifiedAttachment, Decision, OrganizerReport, RunOutcome, UploadOutcome, UploadStatus,
};
use std::fmt::Write;

/// Longest reasoning shown per attachment before it is cut.
const MAX_REASONING_CHARS: usize = 200;

pub fn render_report(report: &OrganizerReport) -> String {
    let mut out = String::new();
    let mode = if report.dry_run {
        "🧪 DRY RUN (no files uploaded)"
    } else {
        "🚀 EXECUTE"
    };

    let _ = writeln!(out, "📂 **Smart Attachment Organizer**");
    let _ = writeln!(out, "Mode: {}", mode);
    let _ = writeln!(out, "Query: `{}`\n", report.query);

    match &report.outcome {
        RunOutcome::InputError(message) => {
            let _ = writeln!(out, "❌ **Could not search emails**: {}", message);
            return out;
        }
        RunOutcome::NothingFound => {
            let _ = writeln!(out, "📭 No emails with attachments found for this query.");
            let _ = writeln!(
                out,
                "💡 Try a broader query or a larger date range."
            );
            return out;
        }
        RunOutcome::NoAttachments => {
            let _ = writeln!(
                out,
                "📭 Found {} email(s), but no attachments matched the filter.",
                report.counts.emails_found
            );
        }
        RunOutcome::Cancelled => {
            let _ = writeln!(out, "⏹️ Run cancelled; showing partial results.");
        }
        RunOutcome::Completed => {}
    }

    render_summary(&mut out, report);

    for (i, section) in report.sections.iter().enumerate() {
        let subject = if section.email.subject.is_empty() {
            "(no subject)"
        } else {
            section.email.subject.as_str()
        };
        let _ = writeln!(out, "\n{}. **{}**", i + 1, subject);
        if !section.email.from.is_empty() {
            let _ = writeln!(out, "   From: {}", section.email.from);
        }

        if let Some(error) = &section.listing_error {
            let _ = writeln!(out, "   ⚠️ Attachments could not be listed: {}", error);
            continue;
        }

        for item in &section.attachments {
            render_attachment(&mut out, item, report);
        }
    }

    if !report.dry_run && !report.uploads.is_empty() {
        render_uploads(&mut out, &report.uploads);
    }

    if report.dry_run && report.counts.uploaded > 0 {
        let _ = writeln!(out, "\n💡 Re-run with dry run disabled to upload these files.");
    }

    out
}

fn render_summary(out: &mut String, report: &OrganizerReport) {
    let counts = &report.counts;
    let (upload_label, skip_label) = if report.dry_run {
        ("Would upload", "Would skip")
    } else {
        ("Uploaded", "Skipped")
    };

    let _ = writeln!(out, "**Summary**");
    let _ = writeln!(out, "- Emails found: {}", counts.emails_found);
    if counts.emails_failed > 0 {
        let _ = writeln!(out, "- Emails not readable: {}", counts.emails_failed);
    }
    let _ = writeln!(out, "- Attachments discovered: {}", counts.attachments_discovered);
    let _ = writeln!(out, "- Classified relevant: {}", counts.classified_relevant);
    let _ = writeln!(out, "- High confidence: {}", counts.high_confidence);
    let _ = writeln!(out, "- {}: {}", upload_label, counts.uploaded);
    let _ = writeln!(out, "- {}: {}", skip_label, counts.skipped);
    if !report.dry_run {
        let _ = writeln!(out, "- Failed: {}", counts.failed);
    }
}

fn render_attachment(out: &mut String, item: &ClassifiedAttachment, report: &OrganizerReport) {
    let verdict = match (item.decision, report.dry_run) {
        (Decision::Upload, true) => "✅ would upload",
        (Decision::Skip, true) => "⏭️ would skip",
        (Decision::Skip, false) => "⏭️ skipped",
        // Execute mode reports what happened, not what was planned.
        (Decision::Upload, false) => match report.upload_for(&item.attachment) {
            Some(upload) => match upload.status {
                UploadStatus::Uploaded => "✅ uploaded",
                UploadStatus::Failed => "❌ failed",
                UploadStatus::Skipped => "⏭️ skipped",
            },
            None => "⏸️ not uploaded (cancelled)",
        },
    };

    let mut line = format!(
        "   📎 {} ({}) - {} | confidence {:.2}",
        item.attachment.filename,
        label_or(&item.attachment.size_label, "size unknown"),
        verdict,
        item.classification.confidence
    );
    if let Some(destination) = &item.destination {
        let _ = write!(line, " → `{}`", destination);
    }
    let _ = writeln!(out, "{}", line);
    let _ = writeln!(
        out,
        "      Reason: {}",
        shorten(&item.classification.reasoning, MAX_REASONING_CHARS)
    );
}

fn render_uploads(out: &mut String, uploads: &[UploadOutcome]) {
    let _ = writeln!(out, "\n**Upload results**");
    for upload in uploads {
        let icon = match upload.status {
            UploadStatus::Uploaded => "✅",
            UploadStatus::Skipped => "⏭️",
            UploadStatus::Failed => "❌",
        };
        let folder = upload
            .folder_path
            .as_deref()
            .map(|f| format!(" → `{}`", f))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{} {} [{}]{}: {}",
            icon,
            upload.filename,
            upload.status,
            folder,
            shorten(&upload.detail, MAX_REASONING_CHARS)
        );
    }
}

fn label_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max_chars).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::organizer::organizer_models::{
        AttachmentRecord, Classification, EmailSection, EmailSummary,
    };

    fn item(filename: &str, decision: Decision, destination: Option<&str>) -> ClassifiedAttachment {
        ClassifiedAttachment {
            attachment: AttachmentRecord {
                email_id: "m1".to_string(),
                index: 0,
                attachment_ref: "a1".to_string(),
                filename: filename.to_string(),
                mime_type_label: "application/pdf".to_string(),
                size_label: "20 KB".to_string(),
                email_context: EmailSummary::default(),
            },
            classification: Classification::new(
                decision == Decision::Upload,
                0.9,
                "because",
                None,
            ),
            decision,
            destination: destination.map(str::to_string),
        }
    }

    fn report(dry_run: bool) -> OrganizerReport {
        let mut report = OrganizerReport::new(dry_run, "invoice has:attachment".to_string());
        report.counts.emails_found = 1;
        report.counts.attachments_discovered = 2;
        report.counts.uploaded = 1;
        report.counts.skipped = 1;
        report.sections.push(EmailSection {
            email: EmailSummary {
                id: "m1".to_string(),
                subject: "Invoice".to_string(),
                from: "billing@acme.com".to_string(),
                ..Default::default()
            },
            attachments: vec![
                item("invoice.pdf", Decision::Upload, Some("Finance/Invoices")),
                item("banner.png", Decision::Skip, None),
            ],
            listing_error: None,
        });
        report
    }

    #[test]
    fn test_dry_run_report_shows_decisions() {
        let text = render_report(&report(true));
        assert!(text.contains("DRY RUN"));
        assert!(text.contains("invoice.pdf (20 KB) - ✅ would upload | confidence 0.90 → `Finance/Invoices`"));
        assert!(text.contains("banner.png (20 KB) - ⏭️ would skip"));
        assert!(text.contains("- Would upload: 1"));
        assert!(text.contains("Reason: because"));
        assert!(!text.contains("Upload results"));
    }

    #[test]
    fn test_execute_report_lists_upload_results() {
        let mut report = report(false);
        report.uploads.push(UploadOutcome {
            email_id: "m1".to_string(),
            attachment_ref: "a1".to_string(),
            filename: "invoice.pdf".to_string(),
            status: UploadStatus::Failed,
            detail: "upload failed: 403".to_string(),
            folder_path: Some("Finance/Invoices".to_string()),
        });
        let text = render_report(&report);
        assert!(text.contains("EXECUTE"));
        assert!(text.contains("- Failed: 0"));
        assert!(text.contains("❌ invoice.pdf [failed] → `Finance/Invoices`: upload failed: 403"));
        assert!(text.contains("invoice.pdf (20 KB) - ❌ failed | confidence 0.90"));
    }

    #[test]
    fn test_execute_item_without_outcome_is_not_shown_as_uploaded() {
        let mut report = report(false);
        report.outcome = RunOutcome::Cancelled;
        report.counts.uploaded = 0;
        let text = render_report(&report);
        assert!(text.contains("Run cancelled"));
        assert!(text.contains("invoice.pdf (20 KB) - ⏸️ not uploaded (cancelled)"));
        assert!(!text.contains("✅ upload"));
        assert!(text.contains("- Uploaded: 0"));
    }

    #[test]
    fn test_terminal_outcomes() {
        let mut nothing = OrganizerReport::new(true, "q".to_string());
        nothing.outcome = RunOutcome::NothingFound;
        let text = render_report(&nothing);
        assert!(text.contains("No emails with attachments found"));
        assert!(!text.contains("Summary"));

        let mut failed = OrganizerReport::new(false, "q".to_string());
        failed.outcome = RunOutcome::InputError("token expired".to_string());
        let text = render_report(&failed);
        assert!(text.contains("EXECUTE"));
        assert!(text.contains("Could not search emails**: token expired"));
    }

    #[test]
    fn test_listing_error_is_itemized() {
        let mut report = report(true);
        report.sections[0].listing_error = Some("403 Forbidden".to_string());
        let text = render_report(&report);
        assert!(text.contains("Attachments could not be listed: 403 Forbidden"));
    }
}
