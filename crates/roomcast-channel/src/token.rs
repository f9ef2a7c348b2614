//! OAuth2-style token management.
//!
//! Owns credential exchange and refresh against the provider's token
//! endpoint, and caches short-lived access tokens per
//! (connection, operation class). A cached token is only handed out while
//! its expiry is more than a safety margin in the future, so callers never
//! receive a token about to lapse mid-call. Refresh for a given cache key is
//! single-flight: concurrent requesters await the in-flight refresh instead
//! of stampeding the provider's auth endpoint.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{ChannelError, ChannelResult};
use crate::store::{ChannelStore, ConnectionHandle};

/// API family a token is scoped to. Providers issue tokens per family, so
/// the cache is keyed by it alongside the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Availability/rate/restriction pushes.
    Ari,
    /// Inbound booking pulls.
    Bookings,
    /// Property-list and account setup calls.
    Setup,
}

impl OperationClass {
    /// Scope string sent to the token endpoint.
    #[must_use]
    pub fn scope(self) -> &'static str {
        match self {
            OperationClass::Ari => "ari",
            OperationClass::Bookings => "bookings",
            OperationClass::Setup => "setup",
        }
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scope())
    }
}

/// Normalized token-endpoint response.
///
/// Provider payloads disagree on field naming; each field is populated by
/// trying a fixed priority list of source keys, so payload variance stops
/// here.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_credential: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub remote_account_id: Option<String>,
    pub scopes: Vec<String>,
}

/// Source keys tried, in priority order, per normalized field.
const ACCESS_TOKEN_KEYS: &[&str] = &["access_token", "accessToken", "token"];
const REFRESH_TOKEN_KEYS: &[&str] = &["refresh_token", "refreshToken", "refresh"];
const EXPIRES_IN_KEYS: &[&str] = &["expires_in", "expiresIn", "expires"];
const ACCOUNT_ID_KEYS: &[&str] = &["account_id", "accountId", "hotel_id", "hotelId"];
const SCOPE_KEYS: &[&str] = &["scope", "scopes"];

/// Default token lifetime assumed when the provider omits an expiry.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

impl TokenGrant {
    /// Normalize a raw token-endpoint payload.
    pub fn from_payload(payload: &Value) -> ChannelResult<Self> {
        let access_token = first_string(payload, ACCESS_TOKEN_KEYS).ok_or_else(|| {
            ChannelError::Auth("token response carried no access token".into())
        })?;

        let expires_in = first_i64(payload, EXPIRES_IN_KEYS).unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        let scopes = first_string(payload, SCOPE_KEYS)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            access_token,
            refresh_credential: first_string(payload, REFRESH_TOKEN_KEYS),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            remote_account_id: first_string(payload, ACCOUNT_ID_KEYS),
            scopes,
        })
    }
}

fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        payload.get(*key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

fn first_i64(payload: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        payload.get(*key).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    })
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Whether the token expires within the safety margin.
    fn is_expiring(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

type CacheKey = (Uuid, OperationClass);

/// Token manager owning the per-(connection, operation class) cache.
pub struct TokenManager {
    http_client: reqwest::Client,
    token_url: String,
    store: Arc<dyn ChannelStore>,
    cache: RwLock<HashMap<CacheKey, CachedToken>>,
    /// One refresh lock per cache key; never held across the HTTP call of
    /// another key.
    refresh_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
    /// Tokens expiring within this margin are refreshed before use.
    margin: Duration,
}

impl TokenManager {
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        token_url: impl Into<String>,
        store: Arc<dyn ChannelStore>,
    ) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
            store,
            cache: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
            margin: Duration::minutes(5),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    ///
    /// The returned token is guaranteed to expire no sooner than the safety
    /// margin from now.
    #[instrument(skip(self, connection), fields(connection_id = %connection.id, class = %class))]
    pub async fn get_token(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
    ) -> ChannelResult<String> {
        let key = (connection.id.into_uuid(), class);

        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.get(&key) {
                if !token.is_expiring(self.margin) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        let lock = self.refresh_lock(key).await;
        let _guard = lock.lock().await;

        // Re-check after acquiring the lock: another caller may have just
        // refreshed this key.
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.get(&key) {
                if !token.is_expiring(self.margin) {
                    debug!("Token refreshed by concurrent caller");
                    return Ok(token.access_token.clone());
                }
            }
        }

        self.refresh_locked(connection, key).await
    }

    /// Force a refresh regardless of cache freshness.
    ///
    /// Used by the request client after a 401: the cached token may look
    /// fresh but has been revoked remotely.
    #[instrument(skip(self, connection), fields(connection_id = %connection.id, class = %class))]
    pub async fn refresh(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
    ) -> ChannelResult<String> {
        let key = (connection.id.into_uuid(), class);
        let lock = self.refresh_lock(key).await;
        let _guard = lock.lock().await;
        self.refresh_locked(connection, key).await
    }

    /// Exchange a one-time setup/invitation code for a token grant.
    ///
    /// Used only during initial linking; the caller persists the returned
    /// refresh credential as a new connection.
    #[instrument(skip(self, setup_code))]
    pub async fn exchange_setup_code(&self, setup_code: &str) -> ChannelResult<TokenGrant> {
        let params = [("grant_type", "setup_code"), ("code", setup_code)];
        let payload = self.token_request(&params).await?;
        let grant = TokenGrant::from_payload(&payload)?;

        if grant.refresh_credential.is_none() {
            return Err(ChannelError::Auth(
                "setup-code exchange returned no refresh credential".into(),
            ));
        }
        Ok(grant)
    }

    /// Perform the refresh while holding the per-key lock.
    async fn refresh_locked(
        &self,
        connection: &ConnectionHandle,
        key: CacheKey,
    ) -> ChannelResult<String> {
        debug!("Refreshing access token");

        let result = self.exchange_refresh_credential(connection, key.1).await;

        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                // Unrecoverable without a re-link; flag the connection for
                // the operator.
                if let Err(store_err) = self
                    .store
                    .mark_connection_error(key.0)
                    .await
                {
                    warn!(error = %store_err, "Failed to mark connection errored");
                }
                return Err(e);
            }
        };

        // Persist first; the cache is only updated once the store accepted
        // the new expiry, so both views move together.
        self.store
            .persist_token(key.0, &grant.access_token, grant.expires_at)
            .await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CachedToken {
                access_token: grant.access_token.clone(),
                expires_at: grant.expires_at,
            },
        );

        Ok(grant.access_token)
    }

    async fn exchange_refresh_credential(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
    ) -> ChannelResult<TokenGrant> {
        let params = [
            ("grant_type", "refresh_token"),
            (
                "refresh_token",
                connection.refresh_credential.expose_secret(),
            ),
            ("scope", class.scope()),
        ];
        let payload = self.token_request(&params).await?;
        TokenGrant::from_payload(&payload)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ChannelResult<Value> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ChannelError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ChannelError::Auth(format!("failed to parse token response: {e}")))
    }

    async fn refresh_lock(&self, key: CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(key).or_default().clone()
    }

    /// Drop any cached token for the key, forcing a refresh on next use.
    ///
    /// Also prunes the key's refresh lock so churned connections do not
    /// accumulate dead entries in the lock map.
    pub async fn invalidate(&self, connection_id: Uuid, class: OperationClass) {
        let key = (connection_id, class);
        self.cache.write().await.remove(&key);
        self.refresh_locks.lock().await.remove(&key);
    }
}
