//! Reconciliation engine.
//!
//! Periodically compares the locally authoritative calendar against the
//! provider's view and records each divergence as a typed discrepancy for
//! the operator queue. Detection never mutates calendar state; pushing a
//! correction is a separate, deliberate operator action.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use roomcast_db::models::{
    CalendarEntry, CreateDiscrepancy, Discrepancy, DiscrepancySeverity, DiscrepancyType,
    RoomMapping,
};

use crate::client::ChannelClient;
use crate::error::ChannelResult;
use crate::store::{ChannelStore, ConnectionHandle};
use crate::token::OperationClass;

/// Severity thresholds applied at detection time.
#[derive(Debug, Clone)]
pub struct SeverityPolicy {
    /// Absolute rate delta at or above which a rate mismatch is high
    /// severity.
    pub rate_delta_high: f64,
    /// Absolute rate delta at or above which a rate mismatch is medium
    /// severity (below it, low).
    pub rate_delta_medium: f64,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            rate_delta_high: 10.0,
            rate_delta_medium: 1.0,
        }
    }
}

/// Remote ARI state for one date, as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAriDay {
    pub date: NaiveDate,
    #[serde(default, alias = "price")]
    pub rate: Option<f64>,
    #[serde(default, alias = "inventory", alias = "avail")]
    pub availability: Option<i32>,
    #[serde(default, alias = "closed")]
    pub stop_sell: Option<bool>,
    #[serde(default, alias = "cta")]
    pub closed_to_arrival: Option<bool>,
    #[serde(default, alias = "ctd")]
    pub closed_to_departure: Option<bool>,
    #[serde(default, alias = "minStay")]
    pub min_stay: Option<i32>,
}

/// Provider response shape for an ARI snapshot fetch.
#[derive(Debug, Deserialize)]
struct RemoteAriSnapshot {
    #[serde(default, alias = "items", alias = "calendar")]
    days: Vec<RemoteAriDay>,
}

/// One divergence found by comparison, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub discrepancy_type: DiscrepancyType,
    pub date: NaiveDate,
    pub severity: DiscrepancySeverity,
    pub local_value: Option<serde_json::Value>,
    pub remote_value: Option<serde_json::Value>,
    pub description: String,
}

/// Counters for one reconciliation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationStats {
    pub dates_compared: usize,
    pub discrepancies_found: usize,
    pub high_severity: usize,
}

/// Compare local calendar entries against the remote snapshot.
///
/// Comparison is field-by-field per date. A field absent on either side is
/// not compared; a date the remote omits entirely while the local side shows
/// sellable inventory is an inventory discrepancy.
#[must_use]
pub fn compare_entries(
    local: &[CalendarEntry],
    remote: &[RemoteAriDay],
    policy: &SeverityPolicy,
) -> Vec<Finding> {
    let remote_by_date: HashMap<NaiveDate, &RemoteAriDay> =
        remote.iter().map(|d| (d.date, d)).collect();

    let mut findings = Vec::new();
    for entry in local {
        let Some(remote_day) = remote_by_date.get(&entry.date) else {
            if entry.availability.unwrap_or(0) > 0 {
                findings.push(Finding {
                    discrepancy_type: DiscrepancyType::Inventory,
                    date: entry.date,
                    severity: DiscrepancySeverity::High,
                    local_value: Some(serde_json::json!({
                        "availability": entry.availability
                    })),
                    remote_value: None,
                    description: format!(
                        "date {} is sellable locally but absent from the channel",
                        entry.date
                    ),
                });
            }
            continue;
        };

        compare_day(entry, remote_day, policy, &mut findings);
    }
    findings
}

fn compare_day(
    local: &CalendarEntry,
    remote: &RemoteAriDay,
    policy: &SeverityPolicy,
    findings: &mut Vec<Finding>,
) {
    if let (Some(local_rate), Some(remote_rate)) = (local.rate, remote.rate) {
        let delta = (local_rate - remote_rate).abs();
        if delta > f64::EPSILON {
            let severity = if delta >= policy.rate_delta_high {
                DiscrepancySeverity::High
            } else if delta >= policy.rate_delta_medium {
                DiscrepancySeverity::Medium
            } else {
                DiscrepancySeverity::Low
            };
            findings.push(Finding {
                discrepancy_type: DiscrepancyType::Rate,
                date: local.date,
                severity,
                local_value: Some(serde_json::json!(local_rate)),
                remote_value: Some(serde_json::json!(remote_rate)),
                description: format!(
                    "rate differs on {}: local {local_rate}, channel {remote_rate}",
                    local.date
                ),
            });
        }
    }

    if let (Some(local_avail), Some(remote_avail)) = (local.availability, remote.availability) {
        if local_avail != remote_avail {
            // A sold-out divergence risks overbooking on one side.
            let sold_out_divergence = (local_avail == 0) != (remote_avail == 0);
            findings.push(Finding {
                discrepancy_type: DiscrepancyType::Availability,
                date: local.date,
                severity: if sold_out_divergence {
                    DiscrepancySeverity::High
                } else {
                    DiscrepancySeverity::Medium
                },
                local_value: Some(serde_json::json!(local_avail)),
                remote_value: Some(serde_json::json!(remote_avail)),
                description: format!(
                    "availability differs on {}: local {local_avail}, channel {remote_avail}",
                    local.date
                ),
            });
        }
    }

    let restrictions: [(&str, Option<bool>, Option<bool>, DiscrepancySeverity); 3] = [
        (
            "stop_sell",
            local.stop_sell,
            remote.stop_sell,
            // An open channel while locally stopped can take bookings it
            // should not.
            DiscrepancySeverity::Medium,
        ),
        (
            "closed_to_arrival",
            local.closed_to_arrival,
            remote.closed_to_arrival,
            DiscrepancySeverity::Low,
        ),
        (
            "closed_to_departure",
            local.closed_to_departure,
            remote.closed_to_departure,
            DiscrepancySeverity::Low,
        ),
    ];
    for (field, local_flag, remote_flag, severity) in restrictions {
        if let (Some(l), Some(r)) = (local_flag, remote_flag) {
            if l != r {
                findings.push(Finding {
                    discrepancy_type: DiscrepancyType::Restriction,
                    date: local.date,
                    severity,
                    local_value: Some(serde_json::json!({ field: l })),
                    remote_value: Some(serde_json::json!({ field: r })),
                    description: format!(
                        "{field} differs on {}: local {l}, channel {r}",
                        local.date
                    ),
                });
            }
        }
    }

    if let (Some(l), Some(r)) = (local.min_stay, remote.min_stay) {
        if l != r {
            findings.push(Finding {
                discrepancy_type: DiscrepancyType::Restriction,
                date: local.date,
                severity: DiscrepancySeverity::Low,
                local_value: Some(serde_json::json!({ "min_stay": l })),
                remote_value: Some(serde_json::json!({ "min_stay": r })),
                description: format!(
                    "min_stay differs on {}: local {l}, channel {r}",
                    local.date
                ),
            });
        }
    }
}

/// Detects and records local/remote ARI divergence.
pub struct ReconciliationEngine {
    client: Arc<ChannelClient>,
    store: Arc<dyn ChannelStore>,
    policy: SeverityPolicy,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(client: Arc<ChannelClient>, store: Arc<dyn ChannelStore>) -> Self {
        Self {
            client,
            store,
            policy: SeverityPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SeverityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Reconcile one mapping over a date window (inclusive).
    ///
    /// Fetches the remote snapshot, compares it against local calendar
    /// state, and records a discrepancy per divergence. Returns run
    /// counters.
    #[instrument(skip(self, connection, mapping), fields(
        connection_id = %connection.id,
        room = %mapping.remote_room_id,
        %from,
        %to,
    ))]
    pub async fn reconcile(
        &self,
        connection: &ConnectionHandle,
        mapping: &RoomMapping,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ChannelResult<ReconciliationStats> {
        let path = format!(
            "/ari/snapshot?property_id={}&room_id={}&from={}&to={}",
            mapping.remote_property_id, mapping.remote_room_id, from, to
        );
        let remote = self
            .client
            .get::<RemoteAriSnapshot>(connection, OperationClass::Ari, &path)
            .await?;

        let local = self
            .store
            .fetch_calendar_range(mapping.hotel_id, mapping.room_type_id, from, to)
            .await?;

        let findings = compare_entries(&local, &remote.body.days, &self.policy);
        let stats = ReconciliationStats {
            dates_compared: local.len(),
            discrepancies_found: findings.len(),
            high_severity: findings
                .iter()
                .filter(|f| f.severity == DiscrepancySeverity::High)
                .count(),
        };

        for finding in findings {
            self.store
                .create_discrepancy(&CreateDiscrepancy {
                    hotel_id: mapping.hotel_id,
                    connection_id: mapping.connection_id,
                    discrepancy_type: finding.discrepancy_type,
                    room_type_id: mapping.room_type_id,
                    date: finding.date,
                    severity: finding.severity,
                    local_value: finding.local_value,
                    remote_value: finding.remote_value,
                    description: finding.description,
                })
                .await?;
        }

        info!(
            dates = stats.dates_compared,
            found = stats.discrepancies_found,
            high = stats.high_severity,
            "Reconciliation run finished"
        );
        Ok(stats)
    }

    /// Close a discrepancy as resolved. Returns `None` if already closed.
    pub async fn resolve(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        resolved_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        self.store.resolve_discrepancy(hotel_id, id, resolved_by).await
    }

    /// Close a discrepancy as ignored. Returns `None` if already closed.
    pub async fn ignore(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        ignored_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        self.store.ignore_discrepancy(hotel_id, id, ignored_by).await
    }
}
