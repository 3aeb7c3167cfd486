// # Access Tokens
//
// Bearer tokens for the Sheets API.
//
// A fixed `access_token` is sent as is. A service-account key is turned
// into short-lived tokens with the OAuth 2.0 JWT bearer grant:
//
// 1. Sign `{iss, scope, aud, iat, exp}` with the account's RSA key (RS256)
// 2. POST `grant_type=urn:ietf:params:oauth:grant-type:jwt-bearer&assertion=<jwt>`
//    to the key's `token_uri`
// 3. Cache the returned token until shortly before `expires_in` runs out
//
// A recurring daemon therefore keeps working past the one-hour lifetime
// of a single token.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use storewatch_core::credentials::{Credentials, Grant, ServiceAccountKey};
use storewatch_core::{Error, Result};
use tokio::sync::Mutex;

/// OAuth scope for reading and writing spreadsheets
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for a signed assertion (the maximum Google accepts)
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// A cached token is replaced once less than this many seconds are left
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Hands out bearer tokens, minting and refreshing them when needed
pub struct TokenSource {
    credentials: Credentials,
    signing_key: Option<EncodingKey>,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl TokenSource {
    /// Validate the credentials and parse the private key, if any
    ///
    /// A malformed key is reported here, at startup, rather than on the
    /// first API call.
    pub fn new(credentials: Credentials, client: reqwest::Client) -> Result<Self> {
        let signing_key = match credentials.grant()? {
            Grant::Bearer(_) => None,
            Grant::ServiceAccount(key) => Some(
                EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
                    Error::credentials(format!(
                        "service-account private_key is not a valid RSA PEM key: {}",
                        e
                    ))
                })?,
            ),
        };

        Ok(Self {
            credentials,
            signing_key,
            client,
            cached: Mutex::new(None),
        })
    }

    /// Credentials behind this source
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn mint(
        &self,
        key: &ServiceAccountKey<'_>,
        signing_key: &EncodingKey,
        now: DateTime<Utc>,
    ) -> Result<CachedToken> {
        let claims = Claims {
            iss: key.client_email,
            scope: SHEETS_SCOPE,
            aud: key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.map(str::to_string);

        let assertion = jsonwebtoken::encode(&header, &claims, signing_key)
            .map_err(|e| Error::credentials(format!("Failed to sign token request: {}", e)))?;

        let response = self
            .client
            .post(key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::http(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                400 | 401 | 403 => Error::auth(format!(
                    "Token endpoint rejected service account {}: {} - {}",
                    key.client_email, status, error_text
                )),
                429 => Error::rate_limited(format!("Token endpoint rate limited: {}", status)),
                _ => Error::http(format!(
                    "Token endpoint failed: {} - {}",
                    status, error_text
                )),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Token endpoint answer is unreadable: {}", e)))?;

        tracing::debug!(
            "Minted access token for {}, valid for {}s",
            key.client_email,
            body.expires_in
        );

        Ok(CachedToken {
            token: body.access_token,
            expires_at: now + TimeDelta::seconds(body.expires_in),
        })
    }

    /// A token valid for at least a few more minutes
    pub async fn token(&self) -> Result<String> {
        let key = match self.credentials.grant()? {
            Grant::Bearer(token) => return Ok(token.to_string()),
            Grant::ServiceAccount(key) => key,
        };
        let signing_key = self
            .signing_key
            .as_ref()
            .ok_or_else(|| Error::credentials("service-account key was not loaded"))?;

        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.is_fresh(now)
        {
            return Ok(token.token.clone());
        }

        let fresh = self.mint(&key, signing_key, now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Forget the cached token; called after the API rejected it
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
