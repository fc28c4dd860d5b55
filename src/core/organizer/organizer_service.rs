// Organizer orchestrator.
//
// Drives one run through the pipeline:
//
//   Searching -> Enumerating -> Classifying -> Deciding
//             -> (DryRunReport | Uploading) -> Reporting
//
// Every path ends in Reporting. Failures of a single email or attachment are
// recorded on that item and the run continues; nothing here returns an error.

use super::attachment_filter::filter_attachments;
use super::classification::{ClassificationEngine, ClassificationInput};
use super::collaborators::{DriveClient, MailClient};
use super::folder_policy::{FolderPolicy, FolderResolver};
use super::organizer_config::OrganizerConfig;
use super::organizer_models::{
    AttachmentRecord, Classification, ClassifiedAttachment, Decision, EmailSection,
    EmailSummary, OrganizeRequest, OrganizerReport, RunOutcome, UploadOutcome, UploadStatus,
};
use super::report_parser::{is_error_report, parse_attachment_list_for, parse_email_list};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Query operators that already bound the search window.
const FRESHNESS_OPERATORS: &[&str] = &["newer_than:", "older_than:", "after:", "before:"];
const ATTACHMENT_PREDICATE: &str = "has:attachment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Searching,
    Enumerating,
    Classifying,
    Deciding,
    DryRunReport,
    Uploading,
    Reporting,
}

fn enter(stage: Stage) {
    tracing::debug!(?stage, "organizer stage");
}

/// Caller-owned cancellation signal, checked between emails, batches and uploads.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Appends the attachment predicate and, unless the caller already bounded
/// the window, a `newer_than:` filter.
pub fn build_search_query(user_query: &str, date_range_days: u32) -> String {
    let mut parts: Vec<String> = Vec::new();
    let user_query = user_query.trim();
    let lowered = user_query.to_lowercase();

    if !user_query.is_empty() {
        parts.push(user_query.to_string());
    }
    if !lowered.contains(ATTACHMENT_PREDICATE) {
        parts.push(ATTACHMENT_PREDICATE.to_string());
    }
    if !FRESHNESS_OPERATORS.iter().any(|op| lowered.contains(op)) {
        parts.push(format!("newer_than:{}d", date_range_days));
    }

    parts.join(" ")
}

/// Only a confident negative skips a file; an unsure negative is still uploaded.
pub fn should_skip(classification: &Classification, skip_threshold: f64) -> bool {
    !classification.relevant && classification.confidence >= skip_threshold
}

pub struct OrganizerService<M: MailClient, D: DriveClient> {
    mail: M,
    drive: D,
    engine: ClassificationEngine,
    config: OrganizerConfig,
}

impl<M, D> OrganizerService<M, D>
where
    M: MailClient,
    D: DriveClient,
{
    pub fn new(mail: M, drive: D, engine: ClassificationEngine, config: OrganizerConfig) -> Self {
        Self {
            mail,
            drive,
            engine,
            config,
        }
    }

    fn folder_policy(&self) -> FolderPolicy {
        FolderPolicy {
            smart_folders_enabled: self.config.smart_folders_enabled,
            confidence_threshold: self.config.confidence_threshold,
            fallback_folder: self.config.fallback_folder(),
        }
    }

    /// Runs the whole pipeline and always returns a report.
    pub async fn organize(&self, request: OrganizeRequest, cancel: &CancelFlag) -> OrganizerReport {
        let request = request.normalized();
        let query = build_search_query(&request.search_query, request.date_range_days);
        let mut report = OrganizerReport::new(request.dry_run, query.clone());

        tracing::info!(
            query = %query,
            dry_run = request.dry_run,
            llm = self.engine.llm_enabled(),
            "Starting attachment organizer run"
        );

        // ------------------------------------------------------------------
        // Searching
        // ------------------------------------------------------------------
        enter(Stage::Searching);
        let emails = match self.search(&query, request.max_emails).await {
            Ok(emails) => emails,
            Err(message) => {
                tracing::error!("Email search failed: {}", message);
                report.outcome = RunOutcome::InputError(message);
                enter(Stage::Reporting);
                return report;
            }
        };

        report.counts.emails_found = emails.len();
        if emails.is_empty() {
            tracing::info!("No emails matched '{}'", query);
            report.outcome = RunOutcome::NothingFound;
            enter(Stage::Reporting);
            return report;
        }

        // ------------------------------------------------------------------
        // Enumerating / Classifying / Deciding, one email at a time
        // ------------------------------------------------------------------
        let policy = self.folder_policy();

        for email in emails {
            if cancel.is_cancelled() {
                report.outcome = RunOutcome::Cancelled;
                break;
            }

            enter(Stage::Enumerating);
            let attachments = match self.enumerate(&email, request.attachment_filter.as_deref()).await {
                Ok(attachments) => attachments,
                Err(message) => {
                    tracing::warn!("Skipping email {}: {}", email.id, message);
                    report.counts.emails_failed += 1;
                    report.sections.push(EmailSection {
                        email,
                        attachments: Vec::new(),
                        listing_error: Some(message),
                    });
                    continue;
                }
            };

            if attachments.is_empty() {
                continue;
            }
            report.counts.attachments_discovered += attachments.len();

            enter(Stage::Classifying);
            let expected = attachments.len();
            let classifications = self
                .classify_email(&attachments, request.classification_prompt.as_deref(), cancel)
                .await;

            enter(Stage::Deciding);
            let mut decided = Vec::with_capacity(classifications.len());
            for (attachment, classification) in attachments.into_iter().zip(classifications) {
                decided.push(self.decide(attachment, classification, &policy, &request, &mut report));
            }

            let stopped_early = decided.len() < expected;
            report.sections.push(EmailSection {
                email,
                attachments: decided,
                listing_error: None,
            });
            if stopped_early {
                report.outcome = RunOutcome::Cancelled;
                break;
            }
        }

        if report.counts.attachments_discovered == 0 && report.outcome == RunOutcome::Completed {
            report.outcome = RunOutcome::NoAttachments;
        }

        // ------------------------------------------------------------------
        // DryRunReport | Uploading
        // ------------------------------------------------------------------
        if request.dry_run {
            enter(Stage::DryRunReport);
        } else if report.outcome == RunOutcome::Completed {
            enter(Stage::Uploading);
            self.upload_all(&mut report, cancel).await;
        }

        enter(Stage::Reporting);
        tracing::info!(
            emails = report.counts.emails_found,
            attachments = report.counts.attachments_discovered,
            uploaded = report.counts.uploaded,
            skipped = report.counts.skipped,
            failed = report.counts.failed,
            "Attachment organizer run finished"
        );
        report
    }

    async fn search(&self, query: &str, max_emails: u32) -> Result<Vec<EmailSummary>, String> {
        let text = self
            .mail
            .search_emails(query, max_emails)
            .await
            .map_err(|e| e.to_string())?;

        if is_error_report(&text) {
            return Err(text.trim().to_string());
        }

        let mut emails = parse_email_list(&text);
        emails.truncate(max_emails as usize);
        Ok(emails)
    }

    async fn enumerate(
        &self,
        email: &EmailSummary,
        filter: Option<&str>,
    ) -> Result<Vec<AttachmentRecord>, String> {
        let text = self
            .mail
            .list_attachments(&email.id)
            .await
            .map_err(|e| e.to_string())?;

        if is_error_report(&text) {
            return Err(text.trim().to_string());
        }

        let records = parse_attachment_list_for(&text, email);
        let filtered = filter_attachments(&records, filter);
        tracing::debug!(
            "Email {}: {} attachment(s), {} after filter",
            email.id,
            records.len(),
            filtered.len()
        );
        Ok(filtered)
    }

    /// Classifies an email's attachments in batches. Batches run one after
    /// another; attachments inside a batch run concurrently. Output order
    /// matches input order. When cancelled the result is shorter than the input.
    async fn classify_email(
        &self,
        attachments: &[AttachmentRecord],
        custom_prompt: Option<&str>,
        cancel: &CancelFlag,
    ) -> Vec<Classification> {
        let body_preview = match (self.engine.llm_enabled(), attachments.first()) {
            (true, Some(first)) => match self.mail.get_email_preview(&first.email_id).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("No body preview for {}: {}", first.email_id, e);
                    String::new()
                }
            },
            _ => String::new(),
        };

        let filenames: Vec<String> = attachments.iter().map(|a| a.filename.clone()).collect();
        let siblings: Vec<Vec<String>> = attachments
            .iter()
            .map(|a| {
                filenames
                    .iter()
                    .filter(|name| **name != a.filename)
                    .cloned()
                    .collect()
            })
            .collect();

        let batch_size = self.config.batch_size.max(1);
        let mut results = Vec::with_capacity(attachments.len());

        for (batch_index, batch) in attachments.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let offset = batch_index * batch_size;
            let futures = batch.iter().enumerate().map(|(i, attachment)| {
                let input = ClassificationInput {
                    attachment,
                    body_preview: &body_preview,
                    sibling_filenames: &siblings[offset + i],
                };
                self.engine.classify(input, custom_prompt)
            });

            results.extend(futures::future::join_all(futures).await);
        }

        results
    }

    fn decide(
        &self,
        attachment: AttachmentRecord,
        classification: Classification,
        policy: &FolderPolicy,
        request: &OrganizeRequest,
        report: &mut OrganizerReport,
    ) -> ClassifiedAttachment {
        if classification.relevant {
            report.counts.classified_relevant += 1;
        }
        if classification.confidence >= self.config.confidence_threshold {
            report.counts.high_confidence += 1;
        }

        let (decision, destination) =
            if should_skip(&classification, self.config.skip_confidence_threshold) {
                report.counts.skipped += 1;
                (Decision::Skip, None)
            } else {
                let path = policy.resolve_folder(&classification, request.target_folder.as_deref());
                if request.dry_run {
                    report.counts.uploaded += 1;
                }
                (Decision::Upload, Some(path))
            };

        ClassifiedAttachment {
            attachment,
            classification,
            decision,
            destination,
        }
    }

    async fn upload_all(&self, report: &mut OrganizerReport, cancel: &CancelFlag) {
        let mut resolver = FolderResolver::new(&self.drive);
        let mut outcomes = Vec::new();
        let mut cancelled = false;

        'sections: for section in &report.sections {
            for item in &section.attachments {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'sections;
                }

                let outcome = match (&item.decision, &item.destination) {
                    (Decision::Upload, Some(path)) => {
                        self.upload_one(&item.attachment, path, &mut resolver).await
                    }
                    _ => UploadOutcome {
                        email_id: item.attachment.email_id.clone(),
                        attachment_ref: item.attachment.attachment_ref.clone(),
                        filename: item.attachment.filename.clone(),
                        status: UploadStatus::Skipped,
                        detail: item.classification.reasoning.clone(),
                        folder_path: None,
                    },
                };
                outcomes.push(outcome);
            }
        }

        for outcome in &outcomes {
            match outcome.status {
                UploadStatus::Uploaded => report.counts.uploaded += 1,
                UploadStatus::Failed => report.counts.failed += 1,
                // Skips were counted while deciding.
                UploadStatus::Skipped => {}
            }
        }
        tracing::info!(
            folders_created = resolver.created_count(),
            uploads = outcomes.len(),
            "Upload phase finished"
        );
        report.uploads = outcomes;
        if cancelled {
            report.outcome = RunOutcome::Cancelled;
        }
    }

    async fn upload_one(
        &self,
        attachment: &AttachmentRecord,
        path: &str,
        resolver: &mut FolderResolver<'_, D>,
    ) -> UploadOutcome {
        let mut outcome = UploadOutcome {
            email_id: attachment.email_id.clone(),
            attachment_ref: attachment.attachment_ref.clone(),
            filename: attachment.filename.clone(),
            status: UploadStatus::Failed,
            detail: String::new(),
            folder_path: Some(path.to_string()),
        };

        let folder_id = match resolver.resolve_or_create(path).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Could not resolve folder '{}': {}", path, e);
                outcome.detail = format!("folder '{}' could not be resolved: {}", path, e);
                return outcome;
            }
        };

        let bytes = match self
            .mail
            .get_attachment_bytes(&attachment.email_id, &attachment.attachment_ref)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Could not fetch {}: {}", attachment.filename, e);
                outcome.detail = format!("download failed: {}", e);
                return outcome;
            }
        };

        // Staged bytes live only for the duration of the upload call.
        let staged = match stage_bytes(&bytes) {
            Ok(file) => file,
            Err(e) => {
                outcome.detail = format!("staging failed: {}", e);
                return outcome;
            }
        };

        let result = self
            .drive
            .upload_file(staged.path(), &folder_id, &attachment.filename)
            .await;

        if let Err(e) = staged.close() {
            tracing::warn!("Failed to remove staging file: {}", e);
        }

        match result {
            Ok(detail) => {
                tracing::info!("Uploaded {} to {}", attachment.filename, path);
                outcome.status = UploadStatus::Uploaded;
                outcome.detail = detail;
            }
            Err(e) => {
                tracing::warn!("Upload of {} failed: {}", attachment.filename, e);
                outcome.detail = format!("upload failed: {}", e);
            }
        }
        outcome
    }
}

fn stage_bytes(bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("organizer-")
        .suffix(".part")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::{AiConfig, AiError, AiMessage, AiProvider, AiProviderResponse};
    use crate::core::organizer::collaborators::MailError;
    use crate::core::organizer::folder_policy::tests::InMemoryDrive;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeMail {
        search_report: String,
        listings: HashMap<String, String>,
        failing_downloads: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeMail {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailClient for FakeMail {
        async fn search_emails(&self, query: &str, _: u32) -> Result<String, MailError> {
            self.calls.lock().unwrap().push(format!("search:{}", query));
            Ok(self.search_report.clone())
        }

        async fn list_attachments(&self, email_id: &str) -> Result<String, MailError> {
            self.calls.lock().unwrap().push(format!("list:{}", email_id));
            self.listings
                .get(email_id)
                .cloned()
                .ok_or_else(|| MailError::Api("listing unavailable".to_string()))
        }

        async fn get_email_preview(&self, _: &str) -> Result<String, MailError> {
            Ok("Hi, attached is the document.".to_string())
        }

        async fn get_attachment_bytes(
            &self,
            email_id: &str,
            attachment_ref: &str,
        ) -> Result<Vec<u8>, MailError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("fetch:{}:{}", email_id, attachment_ref));
            if self.failing_downloads.iter().any(|r| r == attachment_ref) {
                return Err(MailError::NotFound(attachment_ref.to_string()));
            }
            Ok(format!("bytes of {}", attachment_ref).into_bytes())
        }
    }

    /// Answers like a well-behaved model: banners are confidently irrelevant,
    /// invoices are confidently relevant.
    struct RuleFollowingModel {
        suggested_folder: &'static str,
        invoice_confidence: f64,
    }

    #[async_trait]
    impl AiProvider for RuleFollowingModel {
        async fn complete(
            &self,
            messages: &[AiMessage],
            _: &AiConfig,
        ) -> Result<AiProviderResponse, AiError> {
            let prompt = &messages[0].content;
            let content = if prompt.contains("Filename: company_banner.png") {
                r#"{"relevant": false, "confidence": 0.95, "reasoning": "Banner image, decorative", "suggested_folder": null}"#
                    .to_string()
            } else {
                format!(
                    "```json\n{{\"relevant\": true, \"confidence\": {}, \"reasoning\": \"Invoice document\", \"suggested_folder\": \"{}\"}}\n```",
                    self.invoice_confidence, self.suggested_folder
                )
            };
            Ok(AiProviderResponse { content })
        }
    }

    /// Relevant verdict for everything, and trips the cancel flag on its first reply.
    struct CancellingModel {
        cancel: CancelFlag,
    }

    #[async_trait]
    impl AiProvider for CancellingModel {
        async fn complete(
            &self,
            _: &[AiMessage],
            _: &AiConfig,
        ) -> Result<AiProviderResponse, AiError> {
            self.cancel.cancel();
            Ok(AiProviderResponse {
                content: r#"{"relevant": true, "confidence": 0.9, "reasoning": "Invoice", "suggested_folder": null}"#
                    .to_string(),
            })
        }
    }

    fn listing(filename: &str, id: &str, mime: &str) -> String {
        format!(
            "📎 **Attachments** (1 found):\n\n1. **{}**\n   Type: {}\n   Size: 20 KB\n   Attachment ID: `{}`\n",
            filename, mime, id
        )
    }

    fn two_email_mail() -> FakeMail {
        let search_report = "🔍 **Search Results** (2 found):\n\n\
            1. **Invoice 2024-03**\n   From: billing@acme.com\n   Date: Mon\n   ID: `m1`\n\n\
            2. **Spring newsletter**\n   From: news@shop.com\n   Date: Tue\n   ID: `m2`\n"
            .to_string();

        let mut listings = HashMap::new();
        listings.insert(
            "m1".to_string(),
            listing("invoice_2024.pdf", "att-1", "application/pdf"),
        );
        listings.insert(
            "m2".to_string(),
            listing("company_banner.png", "att-2", "image/png"),
        );

        FakeMail {
            search_report,
            listings,
            ..Default::default()
        }
    }

    fn llm_engine(model: RuleFollowingModel) -> ClassificationEngine {
        ClassificationEngine::with_provider(
            Box::new(model),
            AiConfig {
                model: "test".to_string(),
                temperature: 0.1,
                max_tokens: Some(500),
            },
            Duration::from_secs(5),
            500,
        )
    }

    fn default_model() -> RuleFollowingModel {
        RuleFollowingModel {
            suggested_folder: "Finance/Invoices",
            invoice_confidence: 0.92,
        }
    }

    fn config() -> OrganizerConfig {
        OrganizerConfig {
            default_folder: Some("Attachments/Test".to_string()),
            batch_size: 2,
            ..Default::default()
        }
    }

    fn all_items(report: &OrganizerReport) -> Vec<&ClassifiedAttachment> {
        report
            .sections
            .iter()
            .flat_map(|s| s.attachments.iter())
            .collect()
    }

    // ------------------------------------------------------------------
    // Pure helpers
    // ------------------------------------------------------------------

    #[test]
    fn test_query_gets_attachment_and_freshness_predicates() {
        assert_eq!(
            build_search_query("from:acme", 30),
            "from:acme has:attachment newer_than:30d"
        );
        assert_eq!(
            build_search_query("has:attachment after:2024/01/01", 30),
            "has:attachment after:2024/01/01"
        );
        assert_eq!(
            build_search_query("  ", 7),
            "has:attachment newer_than:7d"
        );
        assert_eq!(
            build_search_query("invoice OLDER_THAN:1y", 7),
            "invoice OLDER_THAN:1y has:attachment"
        );
    }

    #[test]
    fn test_skip_rule_boundary() {
        let skip = 0.7;
        assert!(should_skip(&Classification::new(false, 0.7, "", None), skip));
        assert!(!should_skip(&Classification::new(false, 0.6999, "", None), skip));
        assert!(!should_skip(&Classification::new(true, 1.0, "", None), skip));
        // The skip gate is independent of the smart-folder threshold.
        let config = OrganizerConfig::default();
        assert_ne!(config.skip_confidence_threshold, config.confidence_threshold);
        assert!(should_skip(
            &Classification::new(false, 0.75, "", None),
            config.skip_confidence_threshold
        ));
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    // ------------------------------------------------------------------
    // End-to-end scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_a_llm_skips_banner_in_dry_run() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            llm_engine(default_model()),
            config(),
        );

        let report = service
            .organize(OrganizeRequest::new("invoice"), &CancelFlag::new())
            .await;

        assert!(report.dry_run);
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.counts.emails_found, 2);
        assert_eq!(report.counts.attachments_discovered, 2);
        assert_eq!(report.counts.uploaded, 1);
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.classified_relevant, 1);
        assert_eq!(report.counts.high_confidence, 2);

        let items = all_items(&report);
        assert_eq!(items[0].attachment.filename, "invoice_2024.pdf");
        assert_eq!(items[0].decision, Decision::Upload);
        assert_eq!(items[0].destination.as_deref(), Some("Finance/Invoices"));
        assert_eq!(items[1].attachment.filename, "company_banner.png");
        assert_eq!(items[1].decision, Decision::Skip);

        // Dry run: no folders, no uploads, no downloads.
        assert_eq!(service.drive.folder_count(), 0);
        assert!(service.drive.uploads.lock().unwrap().is_empty());
        assert!(!service.mail.calls().iter().any(|c| c.starts_with("fetch:")));
    }

    #[tokio::test]
    async fn test_scenario_b_llm_disabled_uploads_everything() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            ClassificationEngine::disabled(500),
            config(),
        );

        let report = service
            .organize(OrganizeRequest::new("invoice"), &CancelFlag::new())
            .await;

        let items = all_items(&report);
        assert_eq!(items.len(), 2);
        for item in items {
            assert!(item.classification.relevant);
            assert_eq!(item.classification.confidence, 0.6);
            assert_eq!(item.decision, Decision::Upload);
            assert_eq!(item.destination.as_deref(), Some("Attachments/Test"));
        }
        assert_eq!(report.counts.uploaded, 2);
        assert_eq!(report.counts.skipped, 0);
    }

    #[tokio::test]
    async fn test_scenario_c_nothing_found_has_no_side_effects() {
        let mail = FakeMail {
            search_report: "📧 No emails found for query: 'x'".to_string(),
            ..Default::default()
        };
        let service = OrganizerService::new(
            mail,
            InMemoryDrive::default(),
            llm_engine(default_model()),
            config(),
        );

        let mut request = OrganizeRequest::new("x");
        request.dry_run = false;
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.outcome, RunOutcome::NothingFound);
        assert_eq!(report.counts.emails_found, 0);
        assert_eq!(service.mail.calls().len(), 1);
        assert_eq!(service.drive.folder_count(), 0);
        assert!(service.drive.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_d_suggestion_nests_under_target_folder() {
        let mut mail = two_email_mail();
        mail.listings.remove("m2");
        let service = OrganizerService::new(
            mail,
            InMemoryDrive::default(),
            llm_engine(RuleFollowingModel {
                suggested_folder: "Invoices/Acme",
                invoice_confidence: 0.9,
            }),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.target_folder = Some("Finance/2024".to_string());
        request.dry_run = false;
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.uploads.len(), 1);
        let upload = &report.uploads[0];
        assert_eq!(upload.status, UploadStatus::Uploaded);
        assert_eq!(upload.folder_path.as_deref(), Some("Finance/2024/Acme"));

        let uploads = service.drive.uploads.lock().unwrap();
        let (folder_id, filename, bytes) = &uploads[0];
        assert_eq!(service.drive.path_of(folder_id), "Finance/2024/Acme");
        assert_eq!(filename, "invoice_2024.pdf");
        assert_eq!(bytes, b"bytes of att-1");

        // The second email's listing failed; recorded, not fatal.
        assert_eq!(report.counts.emails_failed, 1);
        assert_eq!(report.counts.uploaded, 1);
    }

    #[tokio::test]
    async fn test_search_error_report_is_terminal() {
        let mail = FakeMail {
            search_report: "❌ **Error searching emails**: invalid_grant".to_string(),
            ..Default::default()
        };
        let service = OrganizerService::new(
            mail,
            InMemoryDrive::default(),
            ClassificationEngine::disabled(100),
            config(),
        );

        let report = service
            .organize(OrganizeRequest::new("x"), &CancelFlag::new())
            .await;
        match report.outcome {
            RunOutcome::InputError(message) => assert!(message.contains("invalid_grant")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_download_does_not_stop_other_uploads() {
        let mut mail = two_email_mail();
        mail.failing_downloads.push("att-1".to_string());
        let service = OrganizerService::new(
            mail,
            InMemoryDrive::default(),
            ClassificationEngine::disabled(100),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.dry_run = false;
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.uploads.len(), 2);
        assert_eq!(report.uploads[0].status, UploadStatus::Failed);
        assert!(report.uploads[0].detail.contains("download failed"));
        assert_eq!(report.uploads[1].status, UploadStatus::Uploaded);
        assert_eq!(report.counts.failed, 1);
        assert_eq!(report.counts.uploaded, 1);
        // Folder for both was created once.
        assert_eq!(service.drive.folder_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_is_recorded_and_staging_removed() {
        let drive = InMemoryDrive {
            fail_uploads: true,
            ..Default::default()
        };
        let service = OrganizerService::new(
            two_email_mail(),
            drive,
            ClassificationEngine::disabled(100),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.dry_run = false;
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.counts.failed, 2);
        assert!(report
            .uploads
            .iter()
            .all(|u| u.status == UploadStatus::Failed && u.detail.contains("quota exceeded")));
    }

    #[tokio::test]
    async fn test_skipped_items_appear_in_execute_outcomes() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            llm_engine(default_model()),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.dry_run = false;
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.uploads.len(), 2);
        assert_eq!(report.uploads[0].status, UploadStatus::Uploaded);
        assert_eq!(report.uploads[1].status, UploadStatus::Skipped);
        assert_eq!(report.uploads[1].detail, "Banner image, decorative");
        assert_eq!(report.counts.skipped, 1);
        assert_eq!(report.counts.uploaded, 1);
    }

    #[tokio::test]
    async fn test_filter_removes_non_matching_attachments() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            ClassificationEngine::disabled(100),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.attachment_filter = Some("pdf".to_string());
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.counts.attachments_discovered, 1);
        assert_eq!(all_items(&report)[0].attachment.filename, "invoice_2024.pdf");
    }

    #[tokio::test]
    async fn test_no_matching_attachments_outcome() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            ClassificationEngine::disabled(100),
            config(),
        );

        let mut request = OrganizeRequest::new("invoice");
        request.attachment_filter = Some("spreadsheet".to_string());
        let report = service.organize(request, &CancelFlag::new()).await;

        assert_eq!(report.outcome, RunOutcome::NoAttachments);
        assert_eq!(report.counts.emails_found, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_reports_partial() {
        let service = OrganizerService::new(
            two_email_mail(),
            InMemoryDrive::default(),
            ClassificationEngine::disabled(100),
            config(),
        );

        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut request = OrganizeRequest::new("invoice");
        request.dry_run = false;
        let report = service.organize(request, &cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.counts.emails_found, 2);
        assert!(report.sections.is_empty());
        assert!(service.drive.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mid_run_reports_nothing_as_uploaded() {
        let cancel = CancelFlag::new();
        let engine = ClassificationEngine::with_provider(
            Box::new(CancellingModel {
                cancel: cancel.clone(),
            }),
            AiConfig {
                model: "test".to_string(),
                temperature: 0.1,
                max_tokens: Some(500),
            },
            Duration::from_secs(5),
            500,
        );
        let service =
            OrganizerService::new(two_email_mail(), InMemoryDrive::default(), engine, config());

        let mut request = OrganizeRequest::new("invoice");
        request.dry_run = false;
        let report = service.organize(request, &cancel).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        // The first email was classified before the flag was seen.
        assert_eq!(report.sections.len(), 1);
        assert_eq!(all_items(&report)[0].decision, Decision::Upload);
        assert!(report.uploads.is_empty());
        assert_eq!(report.counts.uploaded, 0);
        assert!(service.drive.uploads.lock().unwrap().is_empty());

        let text = crate::core::organizer::render_report(&report);
        assert!(text.contains("invoice_2024.pdf (20 KB) - ⏸️ not uploaded (cancelled)"));
        assert!(!text.contains("✅ upload"));
        assert!(text.contains("- Uploaded: 0"));
    }
}
