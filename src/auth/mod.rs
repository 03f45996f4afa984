// reddit-transfer/src/auth/mod.rs
pub(crate) mod credentials;
pub(crate) mod oauth;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use crate::config::{AppConfig, AppCredentials, normalize_username};
use crate::reddit::RedditClient;
use crate::reddit::client::build_http_client;
use crate::utils::{prompt_optional, prompt_secret, prompt_value};
pub use credentials::{CredentialStore, StoredCredentials};

/// Tokens closer than this to expiry are refreshed before a transfer starts.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Public entry point for the `login` command.
///
/// Prompts for the account password (and an optional two-factor code),
/// exchanges it for a token, verifies it and caches the result.
pub async fn run_login_flow(app_config: &AppConfig, username: &str) -> Result<()> {
    let username = normalize_username(username).context("username must not be empty")?;
    let store = CredentialStore::new(&app_config.credentials_path);
    println!("🔑 Logging in as u/{}", username);

    let existing = store
        .load(&username)
        .context("Failed to read the credential cache")?;
    let app = match app_config
        .app_credentials
        .clone()
        .or_else(|| existing.as_ref().map(StoredCredentials::app))
    {
        Some(app) => app,
        None => prompt_app_credentials(&username)?,
    };

    let password = prompt_secret(&format!("Password [{}]", username))?;
    let otp = prompt_optional(&format!("Auth code [{}] (optional)", username))?;
    let password = oauth::password_with_otp(&password, otp.as_deref());

    let http = build_http_client(&app_config.user_agent)?;
    let grant = oauth::password_grant(&http, &app_config.auth_base, &app, &username, &password)
        .await
        .with_context(|| format!("Login failed for u/{}", username))?;
    let credentials = StoredCredentials::from_grant(&username, &app, grant, Utc::now());

    let client = RedditClient::new(
        http,
        app_config.api_base.clone(),
        &username,
        &credentials.access_token,
        app_config.retry,
    );
    verify_identity(&client, &username).await?;

    store
        .save(&credentials)
        .context("Failed to write the credential cache")?;
    println!(
        "✅ Stored credentials for u/{} in {} (valid until {})",
        username,
        store.path().display(),
        credentials.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

/// Opens an authenticated session from the credential cache.
///
/// Refreshes a token that is about to expire when a refresh token is stored;
/// otherwise an expired token is a setup error.
pub async fn open_session(
    app_config: &AppConfig,
    store: &CredentialStore,
    username: &str,
) -> Result<RedditClient> {
    let mut credentials = store
        .load(username)
        .context("Failed to read the credential cache")?
        .with_context(|| {
            format!(
                "No cached credentials for u/{username} in {}. Run `reddit-transfer login {username}` first.",
                store.path().display()
            )
        })?;

    let http = build_http_client(&app_config.user_agent)?;
    let now = Utc::now();
    if credentials.expires_within(now, Duration::minutes(EXPIRY_MARGIN_MINUTES)) {
        let refresh_token = credentials.refresh_token.clone().with_context(|| {
            format!(
                "Cached token for u/{username} expired at {}. Run `reddit-transfer login {username}` again.",
                credentials.expires_at.format("%Y-%m-%d %H:%M UTC")
            )
        })?;
        println!("🔄 Refreshing access token for u/{}", username);
        let grant = oauth::refresh_grant(&http, &app_config.auth_base, &credentials.app(), &refresh_token)
            .await
            .with_context(|| format!("Failed to refresh the token for u/{}", username))?;
        credentials = credentials.refreshed(grant, now);
        store
            .save(&credentials)
            .context("Failed to write the credential cache")?;
    }

    let client = RedditClient::new(
        http,
        app_config.api_base.clone(),
        &credentials.username,
        &credentials.access_token,
        app_config.retry,
    );
    verify_identity(&client, username).await?;
    Ok(client)
}

/// Checks that the token really belongs to `username`.
async fn verify_identity(client: &RedditClient, username: &str) -> Result<()> {
    let identity = match client.identity().await {
        Ok(identity) => identity,
        Err(e) if e.is_unauthorized() => {
            return Err(anyhow::Error::new(e).context(format!(
                "The API rejected the token for u/{username}. Run `reddit-transfer login {username}` again."
            )));
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to verify the session for u/{}", username)));
        }
    };
    if !identity.eq_ignore_ascii_case(username) {
        return Err(anyhow::anyhow!(
            "Token for u/{} belongs to u/{}",
            username,
            identity
        ));
    }
    println!("✓ Authenticated as u/{}", identity);
    Ok(())
}

fn prompt_app_credentials(username: &str) -> Result<AppCredentials> {
    println!("No application credentials configured. Set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET, or enter them now.");
    Ok(AppCredentials {
        client_id: prompt_value(&format!("Client ID [{}]", username))?,
        client_secret: prompt_secret(&format!("Client secret [{}]", username))?,
    })
}
