use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors raised by the mail service binding.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail authentication failed: {0}")]
    Auth(String),
    #[error("mail API error: {0}")]
    Api(String),
    #[error("could not decode attachment data: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Errors raised by the storage service binding.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("drive authentication failed: {0}")]
    Auth(String),
    #[error("drive API error: {0}")]
    Api(String),
    #[error("staging file error: {0}")]
    Io(#[from] std::io::Error),
}

/// The mail operations the organizer needs.
///
/// Listing calls return text reports in the layout `report_parser` reads.
/// A report starting with the error marker describes a failure.
#[async_trait]
pub trait MailClient: Send + Sync {
    async fn search_emails(&self, query: &str, max_results: u32) -> Result<String, MailError>;

    async fn list_attachments(&self, email_id: &str) -> Result<String, MailError>;

    /// Plain-text body of an email, used as classification context.
    async fn get_email_preview(&self, email_id: &str) -> Result<String, MailError>;

    /// `attachment_ref` is either a provider attachment id or a zero-based
    /// positional index. Implementations treat an all-digit ref as positional,
    /// so a provider whose ids can be purely numeric must not list them as
    /// `Attachment ID` lines.
    async fn get_attachment_bytes(
        &self,
        email_id: &str,
        attachment_ref: &str,
    ) -> Result<Vec<u8>, MailError>;
}

/// The storage operations the organizer needs.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Id of the folder every logical path is resolved from.
    fn root_folder_id(&self) -> &str {
        "root"
    }

    /// Finds a direct child folder of `parent_id` named exactly `name`.
    async fn find_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<Option<String>, DriveError>;

    /// Creates a child folder and returns its id.
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, DriveError>;

    /// Uploads a local file and returns a short human-readable result.
    async fn upload_file(
        &self,
        local_path: &Path,
        folder_id: &str,
        filename: &str,
    ) -> Result<String, DriveError>;
}
