pub mod drive_client;
pub mod gmail_client;
pub mod google_auth;

pub use drive_client::GoogleDriveClient;
pub use gmail_client::GmailClient;
pub use google_auth::GoogleAuth;
