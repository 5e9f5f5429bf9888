//! Access-token sources for the Google Calendar API.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tonneli_core::ports::GatewayError;
use tracing::debug;

use crate::{error_message, status_error};

/// OAuth scope granting read/write access to calendars.
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh a little before Google would start rejecting the token.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[async_trait]
/// Supplies bearer tokens for API requests.
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when no token can be obtained.
    async fn access_token(&self) -> Result<String, GatewayError>;
}

/// Pre-issued access token, used as is.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Wrap an access token obtained elsewhere.
    #[must_use]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, GatewayError> {
        if self.token.trim().is_empty() {
            return Err(GatewayError::Credentials("access token is empty".into()));
        }
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone)]
/// The parts of a Google service-account JSON key needed to mint tokens.
pub struct ServiceAccountKey {
    /// Service account identity, used as JWT issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    /// OAuth token endpoint.
    pub token_uri: String,
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    client_email: Option<String>,
    private_key: Option<String>,
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a key file's JSON contents.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Credentials`] when the JSON is malformed or
    /// lacks `client_email` or `private_key`.
    pub fn from_json(text: &str) -> Result<Self, GatewayError> {
        let raw: RawServiceAccountKey = serde_json::from_str(text).map_err(|err| {
            GatewayError::Credentials(format!("Invalid service account key file: {err}"))
        })?;

        let (Some(client_email), Some(private_key)) = (
            raw.client_email.filter(|email| !email.is_empty()),
            raw.private_key.filter(|key| !key.is_empty()),
        ) else {
            return Err(GatewayError::Credentials(
                "Invalid service account key file: missing client_email or private_key".into(),
            ));
        };

        Ok(Self {
            client_email,
            private_key,
            token_uri: raw
                .token_uri
                .filter(|uri| !uri.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_owned()),
        })
    }

    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Credentials`] when the file cannot be read or is
    /// not a usable key.
    pub async fn from_file(path: &Path) -> Result<Self, GatewayError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|err| {
            GatewayError::Credentials(format!(
                "Service account key file not readable at {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(&text)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    refresh_at: i64,
}

/// Mints access tokens from a service-account key via the JWT bearer grant.
///
/// Tokens are cached and reused until shortly before they expire.
pub struct ServiceAccount {
    client: Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    /// Create a token source for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Credentials`] when the private key is not a
    /// valid RSA PEM key.
    pub fn new(client: Client, key: ServiceAccountKey) -> Result<Self, GatewayError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|err| {
            GatewayError::Credentials(format!("Unusable service account private key: {err}"))
        })?;

        Ok(Self {
            client,
            key,
            signing_key,
            cached: Mutex::new(None),
        })
    }

    fn assertion(&self, now: i64) -> Result<String, GatewayError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CALENDAR_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|err| GatewayError::Credentials(format!("Failed to sign assertion: {err}")))
    }

    async fn exchange(&self, now: i64) -> Result<CachedToken, GatewayError> {
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(status_error(status, &body));
            }
            return Err(GatewayError::Credentials(format!(
                "Failed to authenticate with service account ({status}): {}",
                error_message(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(format!("token response: {err}")))?;
        let lifetime = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        debug!(account = %self.key.client_email, lifetime, "service account token issued");
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: now + lifetime - EXPIRY_MARGIN_SECS,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccount {
    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(current) = cached.as_ref()
            && current.refresh_at > now
        {
            return Ok(current.token.clone());
        }

        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_requires_email_and_private_key() {
        let err = ServiceAccountKey::from_json(r#"{"client_email": "sync@example.iam"}"#)
            .expect_err("private key missing");
        assert!(
            err.to_string().contains("missing client_email or private_key"),
            "{err}"
        );

        let err = ServiceAccountKey::from_json("not json").expect_err("malformed");
        assert!(matches!(err, GatewayError::Credentials(_)));
    }

    #[test]
    fn key_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "sync@example.iam", "private_key": "pem", "type": "service_account"}"#,
        )
        .expect("complete key");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn garbage_private_key_is_a_credentials_error() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "sync@example.iam", "private_key": "not a pem"}"#,
        )
        .expect("fields present");
        let result = ServiceAccount::new(Client::new(), key);
        assert!(matches!(result, Err(GatewayError::Credentials(_))));
    }

    #[tokio::test]
    async fn expired_token_is_exchanged_again() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        // Lifetime inside the expiry margin, so the cached token is stale at once.
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "first",
                "expires_in": EXPIRY_MARGIN_SECS / 2
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "second",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = ServiceAccountKey {
            client_email: "sync@example.iam".to_owned(),
            private_key: include_str!("../tests/fixtures/test-service-account.pem").to_owned(),
            token_uri: format!("{}/token", server.uri()),
        };
        let account = ServiceAccount::new(Client::new(), key).expect("valid key");

        assert_eq!(account.access_token().await.expect("first exchange"), "first");
        assert_eq!(account.access_token().await.expect("refresh"), "second");
        assert_eq!(account.access_token().await.expect("cached"), "second");
    }

    #[tokio::test]
    async fn empty_static_token_is_rejected() {
        assert!(StaticToken::new("  ").access_token().await.is_err());
        assert_eq!(
            StaticToken::new("ya29.token").access_token().await.ok().as_deref(),
            Some("ya29.token")
        );
    }
}
