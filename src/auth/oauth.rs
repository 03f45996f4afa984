// reddit-transfer/src/auth/oauth.rs
use serde::Deserialize;
use url::Url;

use crate::config::AppCredentials;
use crate::errors::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// Reddit reports a refused grant with HTTP 200 and an "error" member.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenReply {
    Granted(TokenGrant),
    Refused {
        error: String,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Password to send for an account, with the two-factor code appended when given.
pub fn password_with_otp(password: &str, otp: Option<&str>) -> String {
    match otp.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => format!("{password}:{code}"),
        None => password.to_string(),
    }
}

/// Exchanges account credentials for a token (script-app password grant).
pub async fn password_grant(
    http: &reqwest::Client,
    auth_base: &Url,
    app: &AppCredentials,
    username: &str,
    password: &str,
) -> Result<TokenGrant, ApiError> {
    request_token(
        http,
        auth_base,
        app,
        &[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ],
    )
    .await
}

pub async fn refresh_grant(
    http: &reqwest::Client,
    auth_base: &Url,
    app: &AppCredentials,
    refresh_token: &str,
) -> Result<TokenGrant, ApiError> {
    request_token(
        http,
        auth_base,
        app,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

async fn request_token(
    http: &reqwest::Client,
    auth_base: &Url,
    app: &AppCredentials,
    form: &[(&str, &str)],
) -> Result<TokenGrant, ApiError> {
    let url = auth_base.join("api/v1/access_token")?;
    let response = http
        .post(url)
        .basic_auth(&app.client_id, Some(&app.client_secret))
        .form(form)
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Auth(
            "application credentials were rejected (check client id and secret)".to_string(),
        ));
    }
    if !status.is_success() {
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_response(status, &headers, &body));
    }

    let body = response.bytes().await?;
    match serde_json::from_slice::<TokenReply>(&body)? {
        TokenReply::Granted(grant) => Ok(grant),
        TokenReply::Refused { error, message } => Err(ApiError::Auth(match message {
            Some(message) => format!("{error}: {message}"),
            None => error,
        })),
    }
}
