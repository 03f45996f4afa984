// reddit-transfer/src/sync/logic.rs
use tracing::info;

use super::SyncContext;
use super::preferences::copy_preferences;
use super::reconcile::{Friends, Saved, Subscriptions, reconcile};
use super::report::{PassReport, SyncSummary};
use crate::config::ResourceKind;

/// Orchestrates the account transfer.
///
/// Runs the passes in a fixed order:
/// 1. Subscriptions
/// 2. Saved posts and comments
/// 3. Friends
/// 4. Preferences
///
/// A pass whose listing fails is aborted and the next one still runs. After an
/// interrupt the remaining passes are reported as skipped.
pub async fn perform_sync_orchestration(ctx: &SyncContext<'_>) -> SyncSummary {
    println!(
        "⚙️ Transferring u/{} → u/{} ({:?} strategy{})",
        ctx.source.username(),
        ctx.destination.username(),
        ctx.options.strategy,
        if ctx.options.dry_run { ", dry run" } else { "" }
    );

    let mut summary = SyncSummary {
        source: ctx.source.username().to_string(),
        destination: ctx.destination.username().to_string(),
        dry_run: ctx.options.dry_run,
        passes: Vec::new(),
    };

    for kind in ResourceKind::ALL {
        if !ctx.options.categories.contains(&kind) || summary.interrupted() {
            summary.passes.push(PassReport::skipped(kind));
            continue;
        }
        println!("\n🚀 Transferring {}", kind);
        let report = match kind {
            ResourceKind::Subscriptions => reconcile(ctx, &Subscriptions).await,
            ResourceKind::Saved => reconcile(ctx, &Saved).await,
            ResourceKind::Friends => reconcile(ctx, &Friends).await,
            ResourceKind::Preferences => copy_preferences(ctx).await,
        };
        if report.is_interrupted() {
            println!("⚠️ Interrupted during {}; remaining passes skipped.", kind);
        }
        summary.passes.push(report);
    }

    info!(
        failures = summary.total_failures(),
        interrupted = summary.interrupted(),
        "Transfer finished"
    );
    summary
}
