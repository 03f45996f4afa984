// reddit-transfer/src/reddit/mod.rs
pub(crate) mod client;
pub(crate) mod models;
pub(crate) mod retry;

use async_trait::async_trait;

use crate::errors::ApiError;
pub use client::RedditClient;
pub use models::{Friend, Page, PreferenceValue, Preferences, SavedItem, Subscription};
pub use retry::RetryPolicy;

/// Operations the transfer needs from one authenticated account.
///
/// Listings are exposed a page at a time; callers drive pagination until
/// [`Page::after`] is `None`.
#[async_trait]
pub trait RedditApi: Send + Sync {
    /// Username the session is authenticated as.
    fn username(&self) -> &str;

    async fn subscriptions_page(&self, after: Option<&str>) -> Result<Page<Subscription>, ApiError>;
    async fn subscribe(&self, subreddit: &Subscription) -> Result<(), ApiError>;
    async fn unsubscribe(&self, subreddit: &Subscription) -> Result<(), ApiError>;

    async fn saved_page(&self, after: Option<&str>) -> Result<Page<SavedItem>, ApiError>;
    async fn save(&self, item: &SavedItem) -> Result<(), ApiError>;
    async fn unsave(&self, item: &SavedItem) -> Result<(), ApiError>;

    async fn friends_page(&self, after: Option<&str>) -> Result<Page<Friend>, ApiError>;
    async fn add_friend(&self, friend: &Friend) -> Result<(), ApiError>;
    async fn remove_friend(&self, friend: &Friend) -> Result<(), ApiError>;

    async fn preferences(&self) -> Result<Preferences, ApiError>;
    async fn update_preferences(&self, changes: &Preferences) -> Result<(), ApiError>;
}
