use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::config::Config;
use crate::storage::credentials::{ClientSecret, CredentialsError};
use crate::sync::loopback::LoopbackReceiver;

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to read token file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse token: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Client credentials unavailable: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("No refresh token available")]
    NoRefreshToken,
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("OAuth error: {0}")]
    OAuthError(String),
    #[error("Authorization was denied: {0}")]
    AuthorizationDenied(String),
    #[error("OAuth redirect carried an unexpected state parameter")]
    StateMismatch,
    #[error("OAuth redirect listener failed: {0}")]
    CallbackServer(#[from] warp::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save_token(&self, token: &TokenInfo) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(token)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("Saved token to {}", self.path.display());
        Ok(())
    }

    pub fn load_token(&self) -> Result<TokenInfo, AuthError> {
        let content = std::fs::read_to_string(&self.path)?;
        let token: TokenInfo = serde_json::from_str(&content)?;
        Ok(token)
    }

    pub fn needs_refresh(&self, token: &TokenInfo) -> bool {
        let buffer = chrono::Duration::minutes(5);
        token.expires_at <= Utc::now() + buffer
    }
}

impl TokenInfo {
    pub fn new(access_token: String, expires_in_seconds: i64) -> Self {
        Self {
            access_token,
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_seconds),
            token_type: "Bearer".to_string(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: String) -> Self {
        self.refresh_token = Some(refresh_token);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Owns the credential token lifecycle: cache, refresh, interactive consent.
pub struct GoogleAuthenticator {
    secret: ClientSecret,
    storage: TokenStorage,
    client: reqwest::Client,
}

impl GoogleAuthenticator {
    pub fn new(secret: ClientSecret, token_path: PathBuf) -> Self {
        Self {
            secret,
            storage: TokenStorage::new(token_path),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let secret = ClientSecret::from_config(&config.google)?;
        Ok(Self::new(secret, config.google.token_cache.clone()))
    }

    /// Cached token, if one can be read. A corrupt cache counts as absent.
    pub fn cached_token(&self) -> Option<TokenInfo> {
        match self.storage.load_token() {
            Ok(token) => Some(token),
            Err(AuthError::ReadError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No cached token found");
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache: {}", e);
                None
            }
        }
    }

    /// Returns a usable token, refreshing or re-authorizing as needed.
    pub async fn obtain_token(&self) -> Result<TokenInfo, AuthError> {
        if let Some(token) = self.usable_or_refreshed().await {
            return Ok(token);
        }

        self.authorize_interactively().await
    }

    /// Cache and refresh steps only; `None` means consent is required.
    pub async fn usable_or_refreshed(&self) -> Option<TokenInfo> {
        let token = self.cached_token()?;

        if token.is_valid() && !self.storage.needs_refresh(&token) {
            tracing::info!("Using cached token");
            return Some(token);
        }

        if token.refresh_token.is_none() {
            if token.is_valid() {
                tracing::info!("Cached token expires soon and cannot be refreshed; using it");
                return Some(token);
            }
            tracing::info!("Cached token expired and has no refresh token");
            return None;
        }

        match self.refresh_token(&token).await {
            Ok(refreshed) => Some(refreshed),
            Err(e) if token.is_valid() => {
                tracing::warn!("Token refresh failed, using still-valid cached token: {}", e);
                Some(token)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, falling back to consent flow: {}", e);
                None
            }
        }
    }

    pub async fn reauthorize(&self) -> Result<TokenInfo, AuthError> {
        self.authorize_interactively().await
    }

    pub async fn refresh_token(&self, token: &TokenInfo) -> Result<TokenInfo, AuthError> {
        let refresh_token = token.refresh_token.as_ref()
            .ok_or(AuthError::NoRefreshToken)?;

        tracing::info!("Refreshing access token");

        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let token_response = self.request_token(&params).await?;

        // Google usually omits the refresh token on refresh
        let kept_refresh = token_response.refresh_token
            .unwrap_or_else(|| refresh_token.clone());
        let new_token = TokenInfo::new(token_response.access_token, token_response.expires_in)
            .with_refresh_token(kept_refresh);

        self.storage.save_token(&new_token)?;

        Ok(new_token)
    }

    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
            self.secret.auth_uri,
            urlencoding::encode(&self.secret.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state)
        )
    }

    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenInfo, AuthError> {
        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let token_response = self.request_token(&params).await?;

        let mut new_token = TokenInfo::new(token_response.access_token, token_response.expires_in);
        match token_response.refresh_token {
            Some(refresh_token) => new_token = new_token.with_refresh_token(refresh_token),
            None => tracing::warn!("Token response had no refresh token; consent will be needed on expiry"),
        }

        self.storage.save_token(&new_token)?;
        tracing::info!("Stored new token from authorization code");

        Ok(new_token)
    }

    async fn authorize_interactively(&self) -> Result<TokenInfo, AuthError> {
        let state = Uuid::new_v4().simple().to_string();
        let receiver = LoopbackReceiver::bind(&state)?;
        let redirect_uri = receiver.redirect_uri();

        self.print_auth_instructions(&self.authorization_url(&redirect_uri, &state));

        let code = receiver.wait_for_code().await?;
        self.exchange_code_for_token(&code, &redirect_uri).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.client
            .post(&self.secret.token_uri)
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::OAuthError(error_text));
        }

        Ok(response.json().await?)
    }

    fn print_auth_instructions(&self, url: &str) {
        println!("\n=== Google Calendar Authorization ===\n");
        println!("Open this URL in a browser and grant calendar access:\n");
        println!("{}\n", url);
        println!("Waiting for the browser to redirect back...\n");
    }
}
