// Entry point of the attachment organizer CLI.
//
// **Architecture Overview:**
// - `core/` = Business logic (search, classify, decide, upload orchestration)
// - `infra/` = Implementations of core traits (Gmail, Drive, LLM backends)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run one organizer pass and print the report

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with several mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::core::organizer::{
    render_report, CancelFlag, ClassificationEngine, OrganizeRequest, OrganizerService,
};
use crate::infra::ai::build_provider;
use crate::infra::google::{GmailClient, GoogleAuth, GoogleDriveClient};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

/// Sorts email attachments into Drive folders, deciding relevance and
/// destination per file.
#[derive(Debug, Parser)]
#[command(name = "attachment-organizer", version, about)]
struct Cli {
    /// Mail search query, e.g. "from:billing@acme.com invoice".
    #[arg(short, long)]
    query: String,

    /// Instructions describing which attachments matter and where they go.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Drive folder path for relevant files (e.g. "Finance/Invoices").
    #[arg(short, long)]
    target_folder: Option<String>,

    /// Actually upload. Without this flag the run only reports decisions.
    #[arg(long)]
    execute: bool,

    /// Maximum emails to examine (1-50).
    #[arg(short, long, default_value_t = 10)]
    max_emails: u32,

    /// Attachment filter: pdf, image, spreadsheet, document, or a filename substring.
    #[arg(short, long)]
    filter: Option<String>,

    /// Only consider emails newer than this many days (1-365).
    #[arg(short, long, default_value_t = 30)]
    days: u32,
}

impl Cli {
    fn into_request(self) -> OrganizeRequest {
        OrganizeRequest {
            classification_prompt: self.prompt,
            target_folder: self.target_folder,
            dry_run: !self.execute,
            max_emails: self.max_emails,
            attachment_filter: self.filter,
            date_range_days: self.days,
            ..OrganizeRequest::new(self.query)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let request_timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let auth = Arc::new(
        GoogleAuth::from_env(request_timeout)
            .await
            .context("Google credentials are required")?,
    );
    let mail = GmailClient::new(Arc::clone(&auth), request_timeout)?;
    let drive = GoogleDriveClient::new(Arc::clone(&auth), request_timeout)?;

    let engine = if config.llm_enabled {
        match build_provider(&config) {
            Ok(provider) => ClassificationEngine::with_provider(
                provider,
                config::ai_config(&config),
                Duration::from_secs(config.llm_timeout_secs.max(1)),
                config.email_context_chars,
            ),
            Err(e) => {
                tracing::warn!("LLM unavailable, classifying without it: {}", e);
                ClassificationEngine::disabled(config.email_context_chars)
            }
        }
    } else {
        ClassificationEngine::disabled(config.email_context_chars)
    };

    let service = OrganizerService::new(mail, drive, engine, config);

    // Ctrl-C stops the run at the next checkpoint; the partial report is still printed.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Cancellation requested");
                cancel.cancel();
            }
        });
    }

    let report = service.organize(cli.into_request(), &cancel).await;
    println!("{}", render_report(&report));

    Ok(())
}
