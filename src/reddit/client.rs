// reddit-transfer/src/reddit/client.rs
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::models::{
    Identity, Listing, SavedThing, SubredditThing, UserList, preferences_from_json,
};
use super::{Friend, Page, Preferences, RedditApi, RetryPolicy, SavedItem, Subscription};
use crate::errors::ApiError;

/// Page size requested from listing endpoints (the API maximum).
const LISTING_PAGE_SIZE: &str = "100";

/// Builds the HTTP client shared by the OAuth and API calls.
pub fn build_http_client(user_agent: &str) -> Result<reqwest::Client, ApiError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .build()?)
}

#[derive(Debug, Default)]
struct RateLimit {
    remaining: Option<f64>,
    reset_at: Option<Instant>,
}

/// Session for one authenticated account against the OAuth API host.
pub struct RedditClient {
    http: reqwest::Client,
    api_base: Url,
    username: String,
    access_token: String,
    retry: RetryPolicy,
    rate_limit: Mutex<RateLimit>,
}

impl RedditClient {
    pub fn new(
        http: reqwest::Client,
        api_base: Url,
        username: &str,
        access_token: &str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            api_base,
            username: username.to_string(),
            access_token: access_token.to_string(),
            retry,
            rate_limit: Mutex::new(RateLimit::default()),
        }
    }

    /// Name of the account the token belongs to, as reported by the API.
    pub async fn identity(&self) -> Result<String, ApiError> {
        let me: Identity = self.get_json("identity", "api/v1/me", &[]).await?;
        Ok(me.name)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.api_base.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.access_token)
            .query(&[("raw_json", "1")])
    }

    async fn wait_for_rate_limit(&self) {
        let wait = {
            let state = self.rate_limit.lock().unwrap_or_else(|e| e.into_inner());
            match (state.remaining, state.reset_at) {
                (Some(remaining), Some(reset_at)) if remaining < 1.0 => {
                    reset_at.checked_duration_since(Instant::now())
                }
                _ => None,
            }
        };
        if let Some(wait) = wait {
            info!(
                account = %self.username,
                wait_secs = wait.as_secs(),
                "Rate limit budget exhausted, waiting for reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        let remaining = header("x-ratelimit-remaining");
        let reset = header("x-ratelimit-reset");
        if remaining.is_none() && reset.is_none() {
            return;
        }
        let mut state = self.rate_limit.lock().unwrap_or_else(|e| e.into_inner());
        state.remaining = remaining;
        state.reset_at = reset
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        self.wait_for_rate_limit().await;
        let response = request.send().await?;
        self.record_rate_limit(response.headers());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &headers, &body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.retry
            .run(operation, || async {
                let url = self.endpoint(path)?;
                let response = self.send(self.request(Method::GET, url).query(query)).await?;
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            })
            .await
    }

    async fn post_form(
        &self,
        operation: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<(), ApiError> {
        self.retry
            .run(operation, || async {
                let url = self.endpoint(path)?;
                self.send(self.request(Method::POST, url).form(form)).await?;
                Ok(())
            })
            .await
    }

    async fn listing<T, U>(
        &self,
        operation: &str,
        path: &str,
        after: Option<&str>,
        map: impl FnMut(T) -> U,
    ) -> Result<Page<U>, ApiError>
    where
        T: DeserializeOwned,
    {
        let mut query = vec![("limit", LISTING_PAGE_SIZE)];
        if let Some(cursor) = after {
            query.push(("after", cursor));
        }
        let listing: Listing<T> = self.get_json(operation, path, &query).await?;
        let page = listing.into_page(map);
        debug!(
            account = %self.username,
            operation,
            items = page.items.len(),
            more = page.after.is_some(),
            "Fetched listing page"
        );
        Ok(page)
    }

    fn friend_path(name: &str) -> String {
        format!("api/v1/me/friends/{name}")
    }
}

#[async_trait]
impl RedditApi for RedditClient {
    fn username(&self) -> &str {
        &self.username
    }

    async fn subscriptions_page(&self, after: Option<&str>) -> Result<Page<Subscription>, ApiError> {
        self.listing(
            "list subscriptions",
            "subreddits/mine/subscriber",
            after,
            |thing: SubredditThing| Subscription::new(thing.data.display_name),
        )
        .await
    }

    async fn subscribe(&self, subreddit: &Subscription) -> Result<(), ApiError> {
        self.post_form(
            "subscribe",
            "api/subscribe",
            &[
                ("action", "sub"),
                ("sr_name", subreddit.name.as_str()),
                ("skip_initial_defaults", "true"),
            ],
        )
        .await
    }

    async fn unsubscribe(&self, subreddit: &Subscription) -> Result<(), ApiError> {
        self.post_form(
            "unsubscribe",
            "api/subscribe",
            &[("action", "unsub"), ("sr_name", subreddit.name.as_str())],
        )
        .await
    }

    async fn saved_page(&self, after: Option<&str>) -> Result<Page<SavedItem>, ApiError> {
        let path = format!("user/{}/saved", self.username);
        self.listing("list saved", &path, after, |thing: SavedThing| {
            SavedItem::from(thing)
        })
        .await
    }

    async fn save(&self, item: &SavedItem) -> Result<(), ApiError> {
        let fullname = item.fullname();
        self.post_form("save", "api/save", &[("id", fullname.as_str())])
            .await
    }

    async fn unsave(&self, item: &SavedItem) -> Result<(), ApiError> {
        let fullname = item.fullname();
        self.post_form("unsave", "api/unsave", &[("id", fullname.as_str())])
            .await
    }

    async fn friends_page(&self, _after: Option<&str>) -> Result<Page<Friend>, ApiError> {
        // The friends endpoint returns the whole relation in one response.
        let list: UserList = self.get_json("list friends", "api/v1/me/friends", &[]).await?;
        Ok(Page::last(
            list.data
                .children
                .into_iter()
                .map(|entry| Friend::new(entry.name))
                .collect(),
        ))
    }

    async fn add_friend(&self, friend: &Friend) -> Result<(), ApiError> {
        let path = Self::friend_path(&friend.name);
        self.retry
            .run("add friend", || async {
                let url = self.endpoint(&path)?;
                self.send(
                    self.request(Method::PUT, url)
                        .json(&json!({ "name": friend.name })),
                )
                .await?;
                Ok(())
            })
            .await
    }

    async fn remove_friend(&self, friend: &Friend) -> Result<(), ApiError> {
        let path = Self::friend_path(&friend.name);
        self.retry
            .run("remove friend", || async {
                let url = self.endpoint(&path)?;
                self.send(self.request(Method::DELETE, url)).await?;
                Ok(())
            })
            .await
    }

    async fn preferences(&self) -> Result<Preferences, ApiError> {
        let raw: serde_json::Map<String, serde_json::Value> =
            self.get_json("read preferences", "api/v1/me/prefs", &[]).await?;
        Ok(preferences_from_json(raw))
    }

    async fn update_preferences(&self, changes: &Preferences) -> Result<(), ApiError> {
        self.retry
            .run("update preferences", || async {
                let url = self.endpoint("api/v1/me/prefs")?;
                self.send(self.request(Method::PATCH, url).json(changes))
                    .await?;
                Ok(())
            })
            .await
    }
}
