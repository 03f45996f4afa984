// reddit-transfer/src/sync/reconcile.rs
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::SyncContext;
use super::progress::item_bar;
use super::report::{Action, PassReport};
use crate::config::{ResourceKind, Strategy};
use crate::errors::ApiError;
use crate::reddit::{Friend, Page, RedditApi, SavedItem, Subscription};

/// Listing endpoints stop returning items somewhere around this count.
const LISTING_SOFT_LIMIT: usize = 1000;

/// A set-shaped resource category: list it, add to it, remove from it.
#[async_trait]
pub(crate) trait Category: Send + Sync {
    type Item: Clone + Eq + Hash + fmt::Display + Send + Sync;

    const KIND: ResourceKind;

    /// Apply additions in reverse listing order so the newest source item is
    /// also the newest on the destination.
    const ADD_OLDEST_FIRST: bool = false;

    async fn page(&self, api: &dyn RedditApi, after: Option<&str>)
    -> Result<Page<Self::Item>, ApiError>;
    async fn add(&self, api: &dyn RedditApi, item: &Self::Item) -> Result<(), ApiError>;
    async fn remove(&self, api: &dyn RedditApi, item: &Self::Item) -> Result<(), ApiError>;
}

pub(crate) struct Subscriptions;
pub(crate) struct Saved;
pub(crate) struct Friends;

#[async_trait]
impl Category for Subscriptions {
    type Item = Subscription;
    const KIND: ResourceKind = ResourceKind::Subscriptions;

    async fn page(&self, api: &dyn RedditApi, after: Option<&str>) -> Result<Page<Subscription>, ApiError> {
        api.subscriptions_page(after).await
    }
    async fn add(&self, api: &dyn RedditApi, item: &Subscription) -> Result<(), ApiError> {
        api.subscribe(item).await
    }
    async fn remove(&self, api: &dyn RedditApi, item: &Subscription) -> Result<(), ApiError> {
        api.unsubscribe(item).await
    }
}

#[async_trait]
impl Category for Saved {
    type Item = SavedItem;
    const KIND: ResourceKind = ResourceKind::Saved;
    const ADD_OLDEST_FIRST: bool = true;

    async fn page(&self, api: &dyn RedditApi, after: Option<&str>) -> Result<Page<SavedItem>, ApiError> {
        api.saved_page(after).await
    }
    async fn add(&self, api: &dyn RedditApi, item: &SavedItem) -> Result<(), ApiError> {
        api.save(item).await
    }
    async fn remove(&self, api: &dyn RedditApi, item: &SavedItem) -> Result<(), ApiError> {
        api.unsave(item).await
    }
}

#[async_trait]
impl Category for Friends {
    type Item = Friend;
    const KIND: ResourceKind = ResourceKind::Friends;

    async fn page(&self, api: &dyn RedditApi, after: Option<&str>) -> Result<Page<Friend>, ApiError> {
        api.friends_page(after).await
    }
    async fn add(&self, api: &dyn RedditApi, item: &Friend) -> Result<(), ApiError> {
        api.add_friend(item).await
    }
    async fn remove(&self, api: &dyn RedditApi, item: &Friend) -> Result<(), ApiError> {
        api.remove_friend(item).await
    }
}

/// Work computed from the two listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan<T> {
    pub removals: Vec<T>,
    pub additions: Vec<T>,
    pub unchanged: usize,
}

pub(crate) fn plan<T: Clone + Eq + Hash>(strategy: Strategy, source: &[T], destination: &[T]) -> Plan<T> {
    match strategy {
        Strategy::Clear => Plan {
            removals: destination.to_vec(),
            additions: source.to_vec(),
            unchanged: 0,
        },
        Strategy::Diff => {
            let in_source: HashSet<&T> = source.iter().collect();
            let in_destination: HashSet<&T> = destination.iter().collect();
            Plan {
                removals: destination
                    .iter()
                    .filter(|item| !in_source.contains(item))
                    .cloned()
                    .collect(),
                additions: source
                    .iter()
                    .filter(|item| !in_destination.contains(item))
                    .cloned()
                    .collect(),
                unchanged: source.iter().filter(|item| in_destination.contains(item)).count(),
            }
        }
    }
}

enum FetchError {
    Interrupted,
    Api(ApiError),
    /// The API handed back a cursor it had already given, so the listing
    /// cannot be drained.
    CursorCycle { cursor: String, fetched: usize },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Interrupted => f.write_str("interrupted"),
            FetchError::Api(e) => write!(f, "{}", e),
            FetchError::CursorCycle { cursor, fetched } => write!(
                f,
                "listing cursor {} repeated after {} items, listing is incomplete",
                cursor, fetched
            ),
        }
    }
}

/// Drains a listing until the API reports no further page.
///
/// A listing that cannot be read to the end is an error: reconciling against a
/// partial listing would silently drop items.
async fn fetch_all<C: Category>(
    ctx: &SyncContext<'_>,
    category: &C,
    api: &dyn RedditApi,
) -> Result<Vec<C::Item>, FetchError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut after: Option<String> = None;
    let mut cursors = HashSet::new();
    let mut pages = 0usize;

    loop {
        if ctx.is_cancelled() {
            return Err(FetchError::Interrupted);
        }
        let page = category
            .page(api, after.as_deref())
            .await
            .map_err(FetchError::Api)?;
        pages += 1;
        for item in page.items {
            if seen.insert(item.clone()) {
                items.push(item);
            }
        }
        match page.after {
            None => break,
            Some(next) if !cursors.insert(next.clone()) => {
                return Err(FetchError::CursorCycle {
                    cursor: next,
                    fetched: items.len(),
                });
            }
            Some(next) => after = Some(next),
        }
    }

    debug!(account = api.username(), category = %C::KIND, pages, items = items.len(), "Listing complete");
    if items.len() >= LISTING_SOFT_LIMIT {
        warn!(
            account = api.username(),
            category = %C::KIND,
            items = items.len(),
            "Listing reached the API's ~1000 item limit; older items may be missing"
        );
    }
    Ok(items)
}

/// Brings one list-shaped category on the destination in line with the source.
///
/// Both listings are fetched before anything is written, so a failed listing
/// leaves the destination untouched. Item failures are recorded and skipped.
pub(crate) async fn reconcile<C: Category>(ctx: &SyncContext<'_>, category: &C) -> PassReport {
    let report = PassReport::new(C::KIND);

    let destination_items = match fetch_all(ctx, category, ctx.destination).await {
        Ok(items) => items,
        Err(FetchError::Interrupted) => return report.interrupted(),
        Err(e) => return abort_listing(report, ctx.destination, e),
    };
    let source_items = match fetch_all(ctx, category, ctx.source).await {
        Ok(items) => items,
        Err(FetchError::Interrupted) => return report.interrupted(),
        Err(e) => return abort_listing(report, ctx.source, e),
    };

    let mut work = plan(ctx.options.strategy, &source_items, &destination_items);
    if C::ADD_OLDEST_FIRST {
        work.additions.reverse();
    }
    println!(
        "🔄 {}: source has {}, destination has {} → removing {}, adding {}",
        C::KIND,
        source_items.len(),
        destination_items.len(),
        work.removals.len(),
        work.additions.len()
    );

    let mut report = report;
    report.unchanged = work.unchanged;
    if !apply(ctx, category, &work.removals, Action::Remove, &mut report).await
        || !apply(ctx, category, &work.additions, Action::Add, &mut report).await
    {
        return report.interrupted();
    }
    info!(
        category = %C::KIND,
        removed = report.removed,
        added = report.added,
        failed = report.failures.len(),
        "Pass complete"
    );
    report
}

fn abort_listing(report: PassReport, api: &dyn RedditApi, error: FetchError) -> PassReport {
    let reason = format!("could not list {} of u/{}: {}", report.kind, api.username(), error);
    warn!(category = %report.kind, account = api.username(), error = %error, "Listing failed, skipping pass");
    println!("❌ {}", reason);
    report.abort(reason)
}

/// Applies one side of the plan to the destination. Returns false when interrupted.
async fn apply<C: Category>(
    ctx: &SyncContext<'_>,
    category: &C,
    items: &[C::Item],
    action: Action,
    report: &mut PassReport,
) -> bool {
    let verb = if action == Action::Add { "Adding" } else { "Removing" };
    let bar = item_bar(items.len(), format!("{} {}", verb, C::KIND));
    for item in items {
        if ctx.is_cancelled() {
            bar.abandon();
            return false;
        }
        bar.set_message(item.to_string());
        let result = if ctx.options.dry_run {
            bar.suspend(|| info!(category = %C::KIND, item = %item, action = %action, "Dry run, not writing"));
            Ok(())
        } else if action == Action::Add {
            category.add(ctx.destination, item).await
        } else {
            category.remove(ctx.destination, item).await
        };

        match result {
            Ok(()) => {
                debug!(category = %C::KIND, item = %item, action = %action, "Applied");
                if action == Action::Add {
                    report.added += 1;
                } else {
                    report.removed += 1;
                }
            }
            Err(e) => {
                bar.suspend(|| {
                    warn!(category = %C::KIND, item = %item, action = %action, error = %e, "Item failed, continuing")
                });
                report.fail(item, action, e);
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fake::{FakeAccount, transfer_options};
    use crate::sync::report::PassStatus;
    use tokio_util::sync::CancellationToken;

    fn subs(names: &[&str]) -> Vec<Subscription> {
        names.iter().map(|n| Subscription::new(*n)).collect()
    }

    #[test]
    fn test_clear_plan_removes_everything() {
        let work = plan(Strategy::Clear, &[1, 2, 3], &[3, 4]);
        assert_eq!(work.removals, vec![3, 4]);
        assert_eq!(work.additions, vec![1, 2, 3]);
        assert_eq!(work.unchanged, 0);
    }

    #[test]
    fn test_diff_plan_touches_only_differences() {
        let work = plan(Strategy::Diff, &[1, 2, 3], &[3, 4]);
        assert_eq!(work.removals, vec![4]);
        assert_eq!(work.additions, vec![1, 2]);
        assert_eq!(work.unchanged, 1);
    }

    #[tokio::test]
    async fn test_subscriptions_are_replaced() {
        let source = FakeAccount::new("old");
        source.set_subscriptions(subs(&["rust", "programming"]));
        let destination = FakeAccount::new("new");
        destination.set_subscriptions(subs(&["funny", "rust"]));
        let options = transfer_options(Strategy::Clear);
        let ctx = SyncContext {
            source: &source,
            destination: &destination,
            options: &options,
            cancel: CancellationToken::new(),
        };

        let report = reconcile(&ctx, &Subscriptions).await;

        assert_eq!(report.removed, 2);
        assert_eq!(report.added, 2);
        assert!(report.failures.is_empty());
        assert_eq!(destination.subscription_names(), vec!["programming", "rust"]);
    }

    #[tokio::test]
    async fn test_repeated_cursor_aborts_without_writing() {
        let source = FakeAccount::new("old").with_page_size(1);
        source.set_subscriptions(subs(&["a", "b", "c"]));
        source.stick_cursor();
        let destination = FakeAccount::new("new");
        destination.set_subscriptions(subs(&["x", "y"]));
        let options = transfer_options(Strategy::Clear);
        let ctx = SyncContext {
            source: &source,
            destination: &destination,
            options: &options,
            cancel: CancellationToken::new(),
        };

        let report = reconcile(&ctx, &Subscriptions).await;

        assert!(matches!(
            report.status,
            PassStatus::Aborted(ref reason) if reason.contains("u/old") && reason.contains("incomplete")
        ));
        assert_eq!(destination.write_count(), 0);
        assert_eq!(destination.subscription_names(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_cursor_cycle_over_several_pages_aborts() {
        let source = FakeAccount::new("old").with_page_size(1);
        source.set_subscriptions(subs(&["a", "b", "c", "d"]));
        source.cycle_cursor_after(2);
        let destination = FakeAccount::new("new");
        destination.set_subscriptions(subs(&["x"]));
        let options = transfer_options(Strategy::Clear);
        let ctx = SyncContext {
            source: &source,
            destination: &destination,
            options: &options,
            cancel: CancellationToken::new(),
        };

        let report = reconcile(&ctx, &Subscriptions).await;

        assert!(matches!(report.status, PassStatus::Aborted(_)));
        assert_eq!(destination.subscription_names(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_interrupt_during_writes_stops_before_next_write() {
        let source = FakeAccount::new("old");
        source.set_subscriptions(subs(&["a", "b"]));
        let destination = FakeAccount::new("new");
        destination.set_subscriptions(subs(&["x", "y", "z"]));
        let options = transfer_options(Strategy::Clear);
        let cancel = CancellationToken::new();
        // Three removals, then Ctrl-C during the first addition.
        destination.cancel_after_requests(&cancel, 4);
        let ctx = SyncContext {
            source: &source,
            destination: &destination,
            options: &options,
            cancel,
        };

        let report = reconcile(&ctx, &Subscriptions).await;

        assert!(report.is_interrupted());
        assert_eq!(destination.write_count(), 4);
        assert_eq!(report.removed, 3);
        assert_eq!(report.added, 1);
        assert_eq!(destination.subscription_names(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_nothing() {
        let source = FakeAccount::new("old");
        source.set_subscriptions(subs(&["rust"]));
        let destination = FakeAccount::new("new");
        destination.set_subscriptions(subs(&["funny"]));
        let options = transfer_options(Strategy::Clear);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = SyncContext {
            source: &source,
            destination: &destination,
            options: &options,
            cancel,
        };

        let report = reconcile(&ctx, &Subscriptions).await;

        assert!(report.is_interrupted());
        assert_eq!(destination.write_count(), 0);
        assert_eq!(destination.subscription_names(), vec!["funny"]);
    }
}
