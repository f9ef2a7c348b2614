//! Rate-aware HTTP client for provider API calls.
//!
//! Every outbound call goes through [`ChannelClient::call`], which attaches
//! the bearer token for the call's operation class, parses rate-limit
//! telemetry from the response, and handles the retryable failure classes:
//! transient transport errors get exponential backoff, 429s wait out the
//! provider's stated reset window, and a 401 triggers exactly one forced
//! token refresh before the call is declared an auth failure.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, ChannelResult};
use crate::store::{ChannelStore, ConnectionHandle};
use crate::token::{OperationClass, TokenManager};
use crate::usage::{parse_retry_after, UsageSnapshot};

/// Successful call outcome: the decoded body plus any telemetry the
/// provider reported on this response.
#[derive(Debug)]
pub struct CallOutcome<T> {
    pub body: T,
    pub usage: Option<UsageSnapshot>,
}

/// HTTP client wrapping one provider connection's API surface.
pub struct ChannelClient {
    http_client: reqwest::Client,
    config: ChannelConfig,
    tokens: Arc<TokenManager>,
    store: Arc<dyn ChannelStore>,
}

impl ChannelClient {
    pub fn new(
        config: ChannelConfig,
        tokens: Arc<TokenManager>,
        store: Arc<dyn ChannelStore>,
    ) -> ChannelResult<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
            tokens,
            store,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// GET a path and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
        path: &str,
    ) -> ChannelResult<CallOutcome<T>> {
        self.call(connection, class, Method::GET, path, None::<&()>)
            .await
    }

    /// POST a JSON body to a path and decode the response.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
        path: &str,
        body: &B,
    ) -> ChannelResult<CallOutcome<T>> {
        self.call(connection, class, Method::POST, path, Some(body))
            .await
    }

    /// Execute one API call with retry, rate-limit, and auth handling.
    #[instrument(skip(self, connection, body), fields(connection_id = %connection.id, %method))]
    pub async fn call<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        connection: &ConnectionHandle,
        class: OperationClass,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ChannelResult<CallOutcome<T>> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let mut attempt: u32 = 0;
        let mut refreshed_after_401 = false;
        let mut last_retry_after: Option<u64> = None;

        loop {
            let token = self.tokens.get_token(connection, class).await?;

            let mut request = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let error = ChannelError::from(e);
                    if self.config.retry.should_retry(attempt, &error) {
                        let delay = self.config.retry.with_jitter(
                            self.config.retry.backoff_delay(attempt),
                        );
                        warn!(%error, attempt, ?delay, "Transport error, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(error);
                }
            };

            let status = response.status();
            let usage = UsageSnapshot::from_headers(response.headers());
            if let Some(usage) = usage {
                self.record_usage(connection, path, usage);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response.headers())
                    .or_else(|| usage.and_then(|u| u.window_reset_secs).map(|s| s.max(0) as u64));
                last_retry_after = retry_after.or(last_retry_after);

                if attempt < self.config.retry.max_attempts {
                    let delay = self
                        .config
                        .retry
                        .with_jitter(self.config.retry.rate_limit_delay(attempt, retry_after));
                    warn!(attempt, ?delay, "Rate limited, waiting for window reset");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(ChannelError::RateLimitExceeded {
                    retry_after_secs: last_retry_after,
                });
            }

            if status == StatusCode::UNAUTHORIZED {
                // The cached token may be revoked remotely. One forced
                // refresh; a second 401 means the credential itself is dead.
                if !refreshed_after_401 {
                    debug!("401 received, forcing token refresh");
                    refreshed_after_401 = true;
                    self.tokens.refresh(connection, class).await?;
                    continue;
                }
                self.store
                    .mark_connection_error(connection.id.into_uuid())
                    .await?;
                return Err(ChannelError::Auth(
                    "provider rejected a freshly refreshed token".into(),
                ));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ChannelError::Provider {
                    status: status.as_u16(),
                    body,
                });
            }

            let decoded = response.json::<T>().await?;
            self.touch(connection);
            return Ok(CallOutcome {
                body: decoded,
                usage,
            });
        }
    }

    /// Persist a telemetry sample without blocking the call path.
    fn record_usage(&self, connection: &ConnectionHandle, endpoint: &str, usage: UsageSnapshot) {
        let store = Arc::clone(&self.store);
        let connection_id = connection.id.into_uuid();
        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.record_usage(connection_id, &endpoint, &usage).await {
                warn!(error = %e, "Failed to record usage telemetry");
            }
        });
    }

    fn touch(&self, connection: &ConnectionHandle) {
        let store = Arc::clone(&self.store);
        let connection_id = connection.id.into_uuid();
        tokio::spawn(async move {
            if let Err(e) = store.touch_connection(connection_id).await {
                warn!(error = %e, "Failed to touch connection");
            }
        });
    }
}
