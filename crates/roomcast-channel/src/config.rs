//! Engine configuration.

use std::time::Duration;

use crate::error::{ChannelError, ChannelResult};
use crate::retry::RetryPolicy;

/// Configuration for one provider integration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Base URL for API calls (no trailing slash).
    pub api_base_url: String,
    /// Token endpoint for credential exchange and refresh.
    pub token_url: String,
    /// Maximum calendar lines the provider accepts per push call.
    pub batch_line_limit: usize,
    /// Fixed pause between sequential batch submissions.
    pub inter_batch_delay: Duration,
    /// Per-HTTP-call timeout.
    pub request_timeout: Duration,
    /// Retry/backoff policy applied by the request client.
    pub retry: RetryPolicy,
}

impl ChannelConfig {
    /// Create a configuration with production defaults for the given endpoints.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            batch_line_limit: 50,
            inter_batch_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Configuration with short delays for tests.
    #[must_use]
    pub fn for_testing(api_base_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            batch_line_limit: 50,
            inter_batch_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(5),
            retry: RetryPolicy::for_testing(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ChannelResult<()> {
        if self.api_base_url.is_empty() {
            return Err(ChannelError::Config("api_base_url must be set".into()));
        }
        if self.token_url.is_empty() {
            return Err(ChannelError::Config("token_url must be set".into()));
        }
        if self.batch_line_limit == 0 {
            return Err(ChannelError::Config("batch_line_limit must be > 0".into()));
        }
        self.retry.validate()
    }
}
