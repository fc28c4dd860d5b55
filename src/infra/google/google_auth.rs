// =============================================================================
// GOOGLE AUTHENTICATION
// =============================================================================
//
// Produces bearer tokens for the Gmail and Drive clients.
//
// **Options:**
//
// 1. **Service account with domain-wide delegation:**
//    - `GOOGLE_SERVICE_ACCOUNT_KEY` (path) or `GOOGLE_SERVICE_ACCOUNT_JSON`
//    - `GOOGLE_IMPERSONATE_USER` - mailbox owner to act as. Gmail access
//      through a service account always needs this.
//
// 2. **Pre-issued access token:**
//    - `GOOGLE_ACCESS_TOKEN` - e.g. from an OAuth flow run elsewhere.
//      Not refreshed; the run fails with an auth error once it expires.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::RwLock;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no Google credentials configured: set GOOGLE_SERVICE_ACCOUNT_KEY, GOOGLE_SERVICE_ACCOUNT_JSON or GOOGLE_ACCESS_TOKEN")]
    NotConfigured,
    #[error("invalid service account key: {0}")]
    InvalidKey(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
}

// =============================================================================
// SERVICE ACCOUNT
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: String,
}

/// JWT claims for the OAuth2 JWT-bearer grant.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
    /// User to impersonate (domain-wide delegation).
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    subject: Option<String>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(
        path: &str,
        subject: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AuthError::InvalidKey(format!("{}: {}", path, e)))?;
        Self::from_json(&content, subject, timeout)
    }

    /// `timeout` bounds each token exchange.
    pub fn from_json(
        json: &str,
        subject: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let credentials: ServiceAccountCredentials =
            serde_json::from_str(json).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Exchange(e.to_string()))?;
        Ok(Self {
            credentials,
            subject,
            client,
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + Duration::from_secs(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let (token, lifetime) = self.fetch_new_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(CachedToken {
                token: token.clone(),
                expires_at: SystemTime::now() + lifetime,
            });
        }

        Ok(token)
    }

    async fn fetch_new_token(&self) -> Result<(String, Duration), AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Exchange(e.to_string()))?
            .as_secs();

        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
            sub: self.subject.clone(),
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        let jwt = encode(&header, &claims, &key).map_err(|e| AuthError::InvalidKey(e.to_string()))?;

        let token_response = self.exchange_assertion(&jwt).await?;

        // Refresh a little before Google says the token expires.
        let lifetime = Duration::from_secs(token_response.expires_in.saturating_sub(300).max(60));
        tracing::debug!("Obtained Google access token for {}", self.credentials.client_email);
        Ok((token_response.access_token, lifetime))
    }

    async fn exchange_assertion(&self, jwt: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange(format!("{}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))
    }
}

// =============================================================================
// AUTH SOURCE
// =============================================================================

/// Where bearer tokens come from. Shared by the Gmail and Drive clients.
pub enum GoogleAuth {
    ServiceAccount(ServiceAccountAuth),
    StaticToken(String),
}

impl GoogleAuth {
    /// Picks an auth source from the environment.
    pub async fn from_env(timeout: Duration) -> Result<Self, AuthError> {
        let subject = std::env::var("GOOGLE_IMPERSONATE_USER")
            .ok()
            .filter(|s| !s.trim().is_empty());

        if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            return Ok(GoogleAuth::ServiceAccount(
                ServiceAccountAuth::from_file(&path, subject, timeout).await?,
            ));
        }

        if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            return Ok(GoogleAuth::ServiceAccount(ServiceAccountAuth::from_json(
                &json, subject, timeout,
            )?));
        }

        match std::env::var("GOOGLE_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                Ok(GoogleAuth::StaticToken(token.trim().to_string()))
            }
            _ => Err(AuthError::NotConfigured),
        }
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        match self {
            GoogleAuth::ServiceAccount(auth) => auth.get_access_token().await,
            GoogleAuth::StaticToken(token) => Ok(token.clone()),
        }
    }
}
