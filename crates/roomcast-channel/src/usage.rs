//! Rate-limit telemetry parsing.
//!
//! Providers report quota state in response headers whose names vary between
//! vendors. [`UsageSnapshot::from_headers`] tries a fixed priority list of
//! known names for each field, so the rest of the engine only ever sees the
//! normalized struct. Telemetry is read opportunistically on every response,
//! not only on 429s.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header names tried, in priority order, for the remaining-quota field.
const REMAINING_HEADERS: &[&str] = &[
    "x-ratelimit-remaining",
    "x-rate-limit-remaining",
    "ratelimit-remaining",
];

/// Header names tried, in priority order, for seconds-until-window-reset.
const RESET_HEADERS: &[&str] = &[
    "x-ratelimit-reset",
    "x-rate-limit-reset",
    "ratelimit-reset",
];

/// Header names tried, in priority order, for the per-call cost.
const COST_HEADERS: &[&str] = &["x-ratelimit-cost", "x-rate-limit-cost", "x-request-cost"];

/// Normalized per-call rate-limit telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Remaining quota in the current window.
    pub quota_remaining: Option<i32>,
    /// Seconds until the window resets.
    pub window_reset_secs: Option<i32>,
    /// Cost the provider charged for this call.
    pub request_cost: Option<i32>,
}

impl UsageSnapshot {
    /// Parse telemetry from response headers. Returns `None` when no known
    /// header is present at all.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let snapshot = Self {
            quota_remaining: first_int(headers, REMAINING_HEADERS),
            window_reset_secs: first_int(headers, RESET_HEADERS),
            request_cost: first_int(headers, COST_HEADERS),
        };

        if snapshot == Self::default() {
            None
        } else {
            Some(snapshot)
        }
    }
}

/// Parse the Retry-After header (seconds form only; HTTP-date is rare on
/// rate-limit responses and falls back to computed backoff).
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn first_int(headers: &HeaderMap, names: &[&str]) -> Option<i32> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i32>().ok())
    })
}
