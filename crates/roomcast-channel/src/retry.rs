//! Retry/backoff policy for provider calls.
//!
//! One policy object consolidates every retry decision the request client
//! makes: whether an error class is retryable at a given attempt, and how
//! long to wait before the next attempt. Rate-limited calls honor the
//! provider's stated reset window when present; everything else uses
//! exponential backoff with jitter.

use std::time::Duration;

use crate::error::ChannelError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts per call (0 = no retries).
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter added on top of the computed delay, as a fraction of it.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Policy with minimal delays for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
            jitter_factor: 0.0,
        }
    }

    /// Validate the policy.
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.base_delay_ms == 0 {
            return Err(ChannelError::Config("base_delay_ms must be > 0".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ChannelError::Config(
                "max_delay_ms must be >= base_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ChannelError::Config(
                "jitter_factor must be in range [0.0, 1.0]".into(),
            ));
        }
        Ok(())
    }

    /// Whether another attempt is allowed for this error at this attempt
    /// number (0-indexed).
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &ChannelError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Backoff delay for the given attempt: `base * 2^attempt`, capped.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64;
        let delay_ms = (base * 2_f64.powi(attempt as i32)).min(self.max_delay_ms as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Delay before the next attempt after a 429.
    ///
    /// The provider's stated reset window is authoritative and never capped;
    /// retrying before it expires just burns an attempt on another 429. Only
    /// the exponential fallback (no window stated) honors the delay cap.
    #[must_use]
    pub fn rate_limit_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.backoff_delay(attempt),
        }
    }

    /// Add random jitter to a delay using the configured factor.
    #[must_use]
    pub fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        use rand::Rng;

        let delay_ms = delay.as_millis() as f64;
        let jitter_range = delay_ms * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_range.max(f64::MIN_POSITIVE));
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}
