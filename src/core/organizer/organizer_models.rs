// Domain models for the attachment organizer.
//
// Nothing here outlives a single organizer run. Uploaded files persist in
// Drive, but the bookkeeping below is built and dropped per invocation.

use std::fmt;

// ============================================================================
// DISCOVERY
// ============================================================================

/// One email as recovered from a search report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailSummary {
    pub id: String,
    pub subject: String,
    pub from: String,
    pub date: String,
    /// Free text shown in the report next to the email (the search preview).
    pub attachment_summary_text: String,
}

/// One attachment within one email.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRecord {
    pub email_id: String,
    /// 0-based position among the email's attachments.
    pub index: usize,
    /// Provider attachment id, or the stringified index for inline parts
    /// that have no id. Both forms are passed to the byte fetcher as-is.
    pub attachment_ref: String,
    pub filename: String,
    pub mime_type_label: String,
    pub size_label: String,
    pub email_context: EmailSummary,
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub relevant: bool,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_folder: Option<String>,
}

impl Classification {
    /// Builds a classification, saturating `confidence` into `[0.0, 1.0]`.
    pub fn new(
        relevant: bool,
        confidence: f64,
        reasoning: impl Into<String>,
        suggested_folder: Option<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Self {
            relevant,
            confidence,
            reasoning: reasoning.into(),
            suggested_folder,
        }
    }
}

/// An attachment together with the verdict reached for it.
#[derive(Debug, Clone)]
pub struct ClassifiedAttachment {
    pub attachment: AttachmentRecord,
    pub classification: Classification,
    pub decision: Decision,
    /// Logical folder path the attachment goes (or would go) to. `None` when skipped.
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Upload,
    Skip,
}

// ============================================================================
// EXECUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    Skipped,
    Failed,
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Uploaded => write!(f, "uploaded"),
            UploadStatus::Skipped => write!(f, "skipped"),
            UploadStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub email_id: String,
    pub attachment_ref: String,
    pub filename: String,
    pub status: UploadStatus,
    pub detail: String,
    /// Logical destination path, when one was computed.
    pub folder_path: Option<String>,
}

// ============================================================================
// REQUEST / REPORT
// ============================================================================

/// Parameters of one organizer invocation.
#[derive(Debug, Clone)]
pub struct OrganizeRequest {
    pub search_query: String,
    pub classification_prompt: Option<String>,
    pub target_folder: Option<String>,
    pub dry_run: bool,
    pub max_emails: u32,
    pub attachment_filter: Option<String>,
    pub date_range_days: u32,
}

impl OrganizeRequest {
    pub const MAX_EMAILS_RANGE: (u32, u32) = (1, 50);
    pub const DATE_RANGE_DAYS_RANGE: (u32, u32) = (1, 365);

    pub fn new(search_query: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
            classification_prompt: None,
            target_folder: None,
            dry_run: true,
            max_emails: 10,
            attachment_filter: None,
            date_range_days: 30,
        }
    }

    /// Clamps numeric parameters into their supported ranges and drops
    /// blank optional strings.
    pub fn normalized(mut self) -> Self {
        let (min_emails, max_emails) = Self::MAX_EMAILS_RANGE;
        let (min_days, max_days) = Self::DATE_RANGE_DAYS_RANGE;
        self.max_emails = self.max_emails.clamp(min_emails, max_emails);
        self.date_range_days = self.date_range_days.clamp(min_days, max_days);
        self.classification_prompt = non_blank(self.classification_prompt);
        self.target_folder = non_blank(self.target_folder).map(|f| f.trim_matches('/').to_string());
        self.attachment_filter = non_blank(self.attachment_filter);
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    /// Search succeeded but matched nothing.
    NothingFound,
    /// Emails matched but none had attachments passing the filter.
    NoAttachments,
    /// The mail service could not be reached or refused the request.
    InputError(String),
    /// Stopped by the caller; counts cover what was processed.
    Cancelled,
}

/// Summary counts. In dry-run mode `uploaded` and `skipped` count decisions
/// ("would upload" / "would skip") and `failed` stays at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizerCounts {
    pub emails_found: usize,
    /// Emails whose attachment listing could not be fetched.
    pub emails_failed: usize,
    pub attachments_discovered: usize,
    pub classified_relevant: usize,
    pub high_confidence: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Per-email section of the report.
#[derive(Debug, Clone)]
pub struct EmailSection {
    pub email: EmailSummary,
    pub attachments: Vec<ClassifiedAttachment>,
    /// Set when the attachment listing for this email failed.
    pub listing_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrganizerReport {
    pub dry_run: bool,
    pub query: String,
    pub outcome: RunOutcome,
    pub counts: OrganizerCounts,
    pub sections: Vec<EmailSection>,
    /// Execute mode only, in discovery order.
    pub uploads: Vec<UploadOutcome>,
}

impl OrganizerReport {
    pub fn new(dry_run: bool, query: String) -> Self {
        Self {
            dry_run,
            query,
            outcome: RunOutcome::Completed,
            counts: OrganizerCounts::default(),
            sections: Vec::new(),
            uploads: Vec::new(),
        }
    }

    /// The upload outcome recorded for `attachment`, if the upload phase reached it.
    pub fn upload_for(&self, attachment: &AttachmentRecord) -> Option<&UploadOutcome> {
        self.uploads.iter().find(|u| {
            u.email_id == attachment.email_id
                && u.attachment_ref == attachment.attachment_ref
                && u.filename == attachment.filename
        })
    }
}
