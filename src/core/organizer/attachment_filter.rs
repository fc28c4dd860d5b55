use super::organizer_models::AttachmentRecord;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];
const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "doc", "txt"];

/// File-type category requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentFilter {
    Pdf,
    Image,
    Spreadsheet,
    Document,
    /// Case-insensitive substring of the filename or type label.
    Substring(String),
}

impl AttachmentFilter {
    /// Parses a user-supplied category. Blank input means "no filtering".
    pub fn parse(category: Option<&str>) -> Option<Self> {
        let category = category?.trim().to_lowercase();
        match category.as_str() {
            "" => None,
            "pdf" => Some(AttachmentFilter::Pdf),
            "image" => Some(AttachmentFilter::Image),
            "spreadsheet" => Some(AttachmentFilter::Spreadsheet),
            "document" => Some(AttachmentFilter::Document),
            _ => Some(AttachmentFilter::Substring(category)),
        }
    }

    pub fn matches(&self, record: &AttachmentRecord) -> bool {
        let filename = record.filename.to_lowercase();
        let type_label = record.mime_type_label.to_lowercase();

        match self {
            AttachmentFilter::Pdf => filename.ends_with(".pdf") || type_label.contains("pdf"),
            AttachmentFilter::Image => has_extension(&filename, IMAGE_EXTENSIONS),
            AttachmentFilter::Spreadsheet => has_extension(&filename, SPREADSHEET_EXTENSIONS),
            AttachmentFilter::Document => has_extension(&filename, DOCUMENT_EXTENSIONS),
            AttachmentFilter::Substring(needle) => {
                filename.contains(needle.as_str()) || type_label.contains(needle.as_str())
            }
        }
    }
}

fn has_extension(filename: &str, extensions: &[&str]) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.contains(&ext))
}

/// Returns the records matching `category`, in their original order.
pub fn filter_attachments(
    records: &[AttachmentRecord],
    category: Option<&str>,
) -> Vec<AttachmentRecord> {
    match AttachmentFilter::parse(category) {
        None => records.to_vec(),
        Some(filter) => records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect(),
    }
}
