pub mod attachment_filter;
pub mod classification;
pub mod collaborators;
pub mod folder_policy;
pub mod organizer_config;
pub mod organizer_models;
pub mod organizer_service;
pub mod report_formatting;
pub mod report_parser;

pub use classification::ClassificationEngine;
pub use collaborators::{DriveClient, DriveError, MailClient, MailError};
pub use organizer_config::OrganizerConfig;
pub use organizer_models::OrganizeRequest;
pub use organizer_service::{CancelFlag, OrganizerService};
pub use report_formatting::render_report;
