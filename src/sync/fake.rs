// reddit-transfer/src/sync/fake.rs
//! In-memory account used by the sync tests.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::config::{ResourceKind, Strategy, TransferConfig};
use crate::errors::ApiError;
use crate::reddit::{Friend, Page, Preferences, RedditApi, SavedItem, Subscription};

pub(crate) fn transfer_options(strategy: Strategy) -> TransferConfig {
    TransferConfig {
        source_username: "old".to_string(),
        destination_username: "new".to_string(),
        strategy,
        dry_run: false,
        categories: ResourceKind::ALL.to_vec(),
        excluded_preferences: BTreeSet::new(),
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        message: format!("{what} not found"),
        fields: Vec::new(),
        retry_after: None,
    }
}

fn unavailable() -> ApiError {
    ApiError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "listing unavailable".to_string(),
        fields: Vec::new(),
        retry_after: None,
    }
}

#[derive(Default)]
struct State {
    subscriptions: Vec<Subscription>,
    saved: Vec<SavedItem>,
    friends: Vec<Friend>,
    preferences: Preferences,
    /// Display strings of items whose writes fail.
    broken_items: HashSet<String>,
    failing_listings: HashSet<ResourceKind>,
    /// Rejected preference key -> whether the error names it.
    rejected_preferences: Vec<(String, bool)>,
    stuck_cursor: bool,
    /// Once a page ends at or past this index, the next cursor points back to the start.
    cycle_cursor_after: Option<usize>,
    /// Cancelled as soon as `requests` reaches the count.
    cancel_after: Option<(CancellationToken, usize)>,
    /// Write requests received, failed ones included.
    requests: usize,
    /// Write requests that succeeded.
    writes: usize,
}

impl State {
    fn record_request(&mut self) {
        self.requests += 1;
        if let Some((token, after)) = &self.cancel_after {
            if self.requests >= *after {
                token.cancel();
            }
        }
    }
}

pub(crate) struct FakeAccount {
    username: String,
    page_size: usize,
    state: Mutex<State>,
}

impl FakeAccount {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            page_size: 100,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake account state")
    }

    pub fn set_subscriptions(&self, items: Vec<Subscription>) {
        self.state().subscriptions = items;
    }

    pub fn set_saved(&self, items: Vec<SavedItem>) {
        self.state().saved = items;
    }

    pub fn set_friends(&self, items: Vec<Friend>) {
        self.state().friends = items;
    }

    pub fn set_preferences(&self, prefs: Preferences) {
        self.state().preferences = prefs;
    }

    /// Writes touching this item (by its display string) fail with 404.
    pub fn break_item(&self, item: impl ToString) {
        self.state().broken_items.insert(item.to_string());
    }

    pub fn fail_listing(&self, kind: ResourceKind) {
        self.state().failing_listings.insert(kind);
    }

    pub fn reject_preference(&self, key: &str, named: bool) {
        self.state().rejected_preferences.push((key.to_string(), named));
    }

    /// Every page after the first returns the cursor it was given.
    pub fn stick_cursor(&self) {
        self.state().stuck_cursor = true;
    }

    /// Cursors run 1, 2, ... until a page reaches `index`, then restart at 0.
    pub fn cycle_cursor_after(&self, index: usize) {
        self.state().cycle_cursor_after = Some(index);
    }

    /// Simulates Ctrl-C arriving while the `requests`-th write request is in flight.
    pub fn cancel_after_requests(&self, token: &CancellationToken, requests: usize) {
        self.state().cancel_after = Some((token.clone(), requests));
    }

    pub fn subscription_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().subscriptions.iter().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }

    pub fn saved_snapshot(&self) -> Vec<SavedItem> {
        self.state().saved.clone()
    }

    pub fn saved_set(&self) -> BTreeSet<SavedItem> {
        self.state().saved.iter().cloned().collect()
    }

    pub fn friend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().friends.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names
    }

    pub fn preferences_snapshot(&self) -> Preferences {
        self.state().preferences.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    fn page_of<T: Clone>(&self, kind: ResourceKind, items: &[T], after: Option<&str>) -> Result<Page<T>, ApiError> {
        let (stuck, cycle_after) = {
            let state = self.state();
            if state.failing_listings.contains(&kind) {
                return Err(unavailable());
            }
            (state.stuck_cursor, state.cycle_cursor_after)
        };
        let start = match after {
            Some(cursor) => cursor.parse::<usize>().map_err(|_| not_found("cursor"))?,
            None => 0,
        };
        let end = (start + self.page_size).min(items.len());
        let next = if end >= items.len() {
            None
        } else if stuck && after.is_some() {
            after.map(str::to_string)
        } else if cycle_after.is_some_and(|limit| end >= limit) {
            Some("0".to_string())
        } else {
            Some(end.to_string())
        };
        Ok(Page {
            items: items.get(start..end).unwrap_or_default().to_vec(),
            after: next,
        })
    }

    fn write(&self, item: &impl ToString) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.state();
        state.record_request();
        let key = item.to_string();
        if state.broken_items.contains(&key) {
            return Err(not_found(&key));
        }
        state.writes += 1;
        Ok(state)
    }
}

#[async_trait]
impl RedditApi for FakeAccount {
    fn username(&self) -> &str {
        &self.username
    }

    async fn subscriptions_page(&self, after: Option<&str>) -> Result<Page<Subscription>, ApiError> {
        let items = self.state().subscriptions.clone();
        self.page_of(ResourceKind::Subscriptions, &items, after)
    }

    async fn subscribe(&self, subreddit: &Subscription) -> Result<(), ApiError> {
        let mut state = self.write(subreddit)?;
        if !state.subscriptions.contains(subreddit) {
            state.subscriptions.push(subreddit.clone());
        }
        Ok(())
    }

    async fn unsubscribe(&self, subreddit: &Subscription) -> Result<(), ApiError> {
        let mut state = self.write(subreddit)?;
        state.subscriptions.retain(|s| s != subreddit);
        Ok(())
    }

    async fn saved_page(&self, after: Option<&str>) -> Result<Page<SavedItem>, ApiError> {
        let items = self.state().saved.clone();
        self.page_of(ResourceKind::Saved, &items, after)
    }

    async fn save(&self, item: &SavedItem) -> Result<(), ApiError> {
        let mut state = self.write(item)?;
        // Newest saves are listed first.
        state.saved.retain(|s| s != item);
        state.saved.insert(0, item.clone());
        Ok(())
    }

    async fn unsave(&self, item: &SavedItem) -> Result<(), ApiError> {
        let mut state = self.write(item)?;
        state.saved.retain(|s| s != item);
        Ok(())
    }

    async fn friends_page(&self, after: Option<&str>) -> Result<Page<Friend>, ApiError> {
        let items = self.state().friends.clone();
        self.page_of(ResourceKind::Friends, &items, after)
    }

    async fn add_friend(&self, friend: &Friend) -> Result<(), ApiError> {
        let mut state = self.write(friend)?;
        if !state.friends.contains(friend) {
            state.friends.push(friend.clone());
        }
        Ok(())
    }

    async fn remove_friend(&self, friend: &Friend) -> Result<(), ApiError> {
        let mut state = self.write(friend)?;
        state.friends.retain(|f| f != friend);
        Ok(())
    }

    async fn preferences(&self) -> Result<Preferences, ApiError> {
        let state = self.state();
        if state.failing_listings.contains(&ResourceKind::Preferences) {
            return Err(unavailable());
        }
        Ok(state.preferences.clone())
    }

    async fn update_preferences(&self, changes: &Preferences) -> Result<(), ApiError> {
        let mut state = self.state();
        state.record_request();
        let rejected = changes.keys().find_map(|key| {
            state
                .rejected_preferences
                .iter()
                .find(|(rejected, _)| rejected == key)
                .map(|(rejected, named)| (rejected.clone(), *named))
        });
        if let Some((key, named)) = rejected {
            return Err(ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                message: "invalid preference value".to_string(),
                fields: if named { vec![key] } else { Vec::new() },
                retry_after: None,
            });
        }
        state.writes += 1;
        for (key, value) in changes {
            state.preferences.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
