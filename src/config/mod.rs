// reddit-transfer/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::reddit::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "rust:reddit-transfer:v0.1.0";
const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com/";
const DEFAULT_AUTH_BASE_URL: &str = "https://www.reddit.com/";
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRetryOptions {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonTransferOptions {
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub excluded_preferences: Vec<String>,
    #[serde(default)]
    pub skip_categories: Vec<ResourceKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub auth_base_url: Option<String>,
    pub retry: Option<JsonRetryOptions>,
    pub transfer: Option<JsonTransferOptions>,
}

/// Registered script application used for the OAuth password grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// How list passes turn destination state into source state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Remove everything on the destination, then add everything from the source.
    #[default]
    Clear,
    /// Remove only destination extras and add only what the destination lacks.
    Diff,
}

/// The four resource categories, in the order they are transferred.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Subscriptions,
    Saved,
    Friends,
    Preferences,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Subscriptions,
        ResourceKind::Saved,
        ResourceKind::Friends,
        ResourceKind::Preferences,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Subscriptions => "subscriptions",
            ResourceKind::Saved => "saved items",
            ResourceKind::Friends => "friends",
            ResourceKind::Preferences => "preferences",
        })
    }
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_credentials: Option<AppCredentials>,
    pub user_agent: String,
    pub credentials_path: PathBuf,
    pub api_base: Url,
    pub auth_base: Url,
    pub retry: RetryPolicy,
    pub raw_json_config: RawJsonConfig, // Store the parsed raw config
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    pub source_username: String,
    pub destination_username: String,
    pub strategy: Strategy,
    pub dry_run: bool,
    pub categories: Vec<ResourceKind>,
    pub excluded_preferences: BTreeSet<String>,
}

/// Flags given on the `transfer` command line; they win over config.json.
#[derive(Debug, Clone, Default)]
pub struct TransferOverrides {
    pub strategy: Option<Strategy>,
    pub dry_run: bool,
    pub skip: Vec<ResourceKind>,
}

impl AppConfig {
    /// Loads config.json if present, then applies `REDDIT_*` environment overrides.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw_json_config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file at {}", config_path.display())
            })?;
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?
        } else {
            tracing::debug!(path = %config_path.display(), "No config file found, using defaults");
            RawJsonConfig::default()
        };

        let raw_json_config = apply_env_overrides(raw_json_config, |key| std::env::var(key).ok());
        Self::from_raw(raw_json_config)
    }

    pub fn from_raw(raw_json_config: RawJsonConfig) -> Result<Self> {
        let app_credentials = match (
            raw_json_config.client_id.as_ref().filter(|s| !s.trim().is_empty()),
            raw_json_config.client_secret.as_ref().filter(|s| !s.trim().is_empty()),
        ) {
            (Some(client_id), Some(client_secret)) => Some(AppCredentials {
                client_id: client_id.trim().to_string(),
                client_secret: client_secret.trim().to_string(),
            }),
            (None, None) => None,
            _ => {
                println!("⚠️ Only one of client_id / client_secret is configured. Application credentials from the configuration will be ignored.");
                None
            }
        };

        let user_agent = raw_json_config
            .user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let credentials_path = raw_json_config
            .credentials_file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));

        let api_base = parse_base_url(
            raw_json_config.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL),
            "api_base_url",
        )?;
        let auth_base = parse_base_url(
            raw_json_config.auth_base_url.as_deref().unwrap_or(DEFAULT_AUTH_BASE_URL),
            "auth_base_url",
        )?;

        let retry = retry_policy_from_json(raw_json_config.retry.as_ref())?;

        Ok(AppConfig {
            app_credentials,
            user_agent,
            credentials_path,
            api_base,
            auth_base,
            retry,
            raw_json_config,
        })
    }
}

pub fn load_transfer_config(
    raw_config: &RawJsonConfig,
    source_username: &str,
    destination_username: &str,
    overrides: &TransferOverrides,
) -> Result<TransferConfig> {
    let source_username = normalize_username(source_username)
        .context("source username must not be empty")?;
    let destination_username = normalize_username(destination_username)
        .context("destination username must not be empty")?;
    if source_username.eq_ignore_ascii_case(&destination_username) {
        return Err(anyhow::anyhow!(
            "source and destination accounts must differ (both are u/{})",
            source_username
        ));
    }

    let options = raw_config.transfer.clone().unwrap_or_default();
    let skipped: BTreeSet<ResourceKind> = options
        .skip_categories
        .iter()
        .chain(overrides.skip.iter())
        .copied()
        .collect();
    let categories: Vec<ResourceKind> = ResourceKind::ALL
        .into_iter()
        .filter(|kind| !skipped.contains(kind))
        .collect();
    if categories.is_empty() {
        println!("Warning: every category is skipped. The transfer will only verify both sessions.");
    }

    Ok(TransferConfig {
        source_username,
        destination_username,
        strategy: overrides.strategy.or(options.strategy).unwrap_or_default(),
        dry_run: overrides.dry_run,
        categories,
        excluded_preferences: options
            .excluded_preferences
            .iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect(),
    })
}

/// Strips a leading `u/` or `/u/` and surrounding whitespace.
pub fn normalize_username(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let name = trimmed
        .strip_prefix("/u/")
        .or_else(|| trimmed.strip_prefix("u/"))
        .unwrap_or(trimmed)
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Environment values win over config.json so secrets can stay in `.env`.
fn apply_env_overrides(
    mut raw: RawJsonConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> RawJsonConfig {
    if let Some(value) = lookup("REDDIT_CLIENT_ID") {
        raw.client_id = Some(value);
    }
    if let Some(value) = lookup("REDDIT_CLIENT_SECRET") {
        raw.client_secret = Some(value);
    }
    if let Some(value) = lookup("REDDIT_USER_AGENT") {
        raw.user_agent = Some(value);
    }
    if let Some(value) = lookup("REDDIT_CREDENTIALS_FILE") {
        raw.credentials_file = Some(PathBuf::from(value));
    }
    raw
}

fn parse_base_url(value: &str, field: &str) -> Result<Url> {
    let mut url = Url::parse(value.trim())
        .with_context(|| format!("Invalid {} in config.json: {}", field, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow::anyhow!(
            "{} must be an http(s) URL, got {}",
            field,
            value
        ));
    }
    // Url::join drops the last path segment unless the base ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn retry_policy_from_json(options: Option<&JsonRetryOptions>) -> Result<RetryPolicy> {
    let defaults = RetryPolicy::default();
    let Some(options) = options else {
        return Ok(defaults);
    };
    let policy = RetryPolicy {
        max_attempts: options.max_attempts.unwrap_or(defaults.max_attempts),
        base_delay: options
            .base_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.base_delay),
        max_delay: options
            .max_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_delay),
    };
    if policy.max_attempts == 0 {
        return Err(anyhow::anyhow!("retry.max_attempts must be at least 1"));
    }
    if policy.max_delay < policy.base_delay {
        return Err(anyhow::anyhow!(
            "retry.max_delay_ms must not be smaller than retry.base_delay_ms"
        ));
    }
    Ok(policy)
}
