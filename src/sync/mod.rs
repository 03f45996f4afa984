// reddit-transfer/src/sync/mod.rs
pub(crate) mod logic;
pub(crate) mod preferences;
pub(crate) mod progress;
pub(crate) mod reconcile;
pub(crate) mod report;

#[cfg(test)]
pub(crate) mod fake;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::auth::{self, CredentialStore};
use crate::config::{AppConfig, TransferConfig};
use crate::reddit::RedditApi;
pub use report::SyncSummary;

/// Returned when Ctrl-C stopped the transfer before every pass finished.
#[derive(Debug, Error)]
#[error("transfer interrupted before all passes finished")]
pub struct Interrupted;

/// Everything a pass needs: both sessions, the options and the cancellation token.
pub struct SyncContext<'a> {
    pub source: &'a dyn RedditApi,
    pub destination: &'a dyn RedditApi,
    pub options: &'a TransferConfig,
    pub cancel: CancellationToken,
}

impl SyncContext<'_> {
    /// Passes call this before every request; an in-flight request is never abandoned.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Public entry point for the transfer process.
///
/// Opens both sessions (setup errors abort here), runs every pass and prints
/// the summary. Per-item failures do not fail the run.
pub async fn run_sync_flow(
    app_config: &AppConfig,
    transfer_config: &TransferConfig,
    cancel: CancellationToken,
) -> Result<SyncSummary> {
    let store = CredentialStore::new(&app_config.credentials_path);
    let source = auth::open_session(app_config, &store, &transfer_config.source_username)
        .await
        .context("Failed to open the source account session")?;
    let destination =
        auth::open_session(app_config, &store, &transfer_config.destination_username)
            .await
            .context("Failed to open the destination account session")?;

    let ctx = SyncContext {
        source: &source,
        destination: &destination,
        options: transfer_config,
        cancel,
    };
    let summary = logic::perform_sync_orchestration(&ctx).await;
    println!("\n{}", summary);

    if summary.interrupted() {
        return Err(Interrupted.into());
    }
    Ok(summary)
}
