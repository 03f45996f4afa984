// reddit-transfer/src/sync/preferences.rs
use tracing::{debug, info, warn};

use super::SyncContext;
use super::progress::item_bar;
use super::report::{Action, PassReport};
use crate::config::ResourceKind;
use crate::errors::ApiError;
use crate::reddit::Preferences;

/// Copies every writable preference from source to destination.
///
/// The destination's own preference keys are taken as the writable key space.
/// A rejected bulk write is narrowed down instead of abandoned: keys the API
/// names are dropped and the rest resubmitted; if it names none, each key is
/// written on its own.
pub(crate) async fn copy_preferences(ctx: &SyncContext<'_>) -> PassReport {
    let report = PassReport::new(ResourceKind::Preferences);

    if ctx.is_cancelled() {
        return report.interrupted();
    }
    let source = match ctx.source.preferences().await {
        Ok(prefs) => prefs,
        Err(e) => return abort_read(report, ctx.source.username(), e),
    };
    if ctx.is_cancelled() {
        return report.interrupted();
    }
    let destination = match ctx.destination.preferences().await {
        Ok(prefs) => prefs,
        Err(e) => return abort_read(report, ctx.destination.username(), e),
    };

    let mut report = report;
    let mut payload = Preferences::new();
    for (key, value) in source {
        if ctx.options.excluded_preferences.contains(&key) {
            debug!(preference = %key, "Excluded by configuration");
            continue;
        }
        match destination.get(&key) {
            None => debug!(preference = %key, "Not writable on destination, skipping"),
            Some(current) if *current == value => report.unchanged += 1,
            Some(_) => {
                payload.insert(key, value);
            }
        }
    }
    println!(
        "🔄 {}: {} to update, {} already equal",
        ResourceKind::Preferences,
        payload.len(),
        report.unchanged
    );

    if ctx.options.dry_run {
        for (key, value) in &payload {
            info!(preference = %key, value = %value, "Dry run, not writing");
        }
        report.added = payload.len();
        return report;
    }

    while !payload.is_empty() {
        if ctx.is_cancelled() {
            return report.interrupted();
        }
        let error = match ctx.destination.update_preferences(&payload).await {
            Ok(()) => {
                report.added += payload.len();
                break;
            }
            Err(e) => e,
        };

        let named: Vec<String> = error
            .rejected_fields()
            .iter()
            .filter(|key| payload.contains_key(*key))
            .cloned()
            .collect();
        if !named.is_empty() {
            for key in named {
                warn!(preference = %key, error = %error, "Preference rejected, retrying without it");
                if let Some(value) = payload.remove(&key) {
                    report.fail(format!("{key}={value}"), Action::Write, &error);
                }
            }
            continue;
        }

        if error.is_transient() {
            warn!(error = %error, keys = payload.len(), "Preference write failed after retries");
            for (key, value) in &payload {
                report.fail(format!("{key}={value}"), Action::Write, &error);
            }
            break;
        }

        if payload.len() > 1 {
            warn!(error = %error, "Bulk preference write rejected without naming a key, writing keys one by one");
        }
        if !write_individually(ctx, payload, &mut report).await {
            return report.interrupted();
        }
        break;
    }

    info!(
        updated = report.added,
        unchanged = report.unchanged,
        failed = report.failures.len(),
        "Preferences pass complete"
    );
    report
}

async fn write_individually(ctx: &SyncContext<'_>, payload: Preferences, report: &mut PassReport) -> bool {
    let bar = item_bar(payload.len(), format!("Writing {}", ResourceKind::Preferences));
    for (key, value) in payload {
        if ctx.is_cancelled() {
            bar.abandon();
            return false;
        }
        bar.set_message(key.clone());
        let single = Preferences::from([(key.clone(), value.clone())]);
        match ctx.destination.update_preferences(&single).await {
            Ok(()) => report.added += 1,
            Err(e) => {
                bar.suspend(|| warn!(preference = %key, error = %e, "Preference rejected"));
                report.fail(format!("{key}={value}"), Action::Write, e);
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    true
}

fn abort_read(report: PassReport, username: &str, error: ApiError) -> PassReport {
    let reason = format!("could not read preferences of u/{}: {}", username, error);
    warn!(account = username, error = %error, "Preference read failed, skipping pass");
    println!("❌ {}", reason);
    report.abort(reason)
}
