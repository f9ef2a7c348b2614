//! Push executor.
//!
//! Drives a compiled ARI delta out to the provider: batches are submitted
//! sequentially with a fixed pause between them, a failed batch is recorded
//! and skipped rather than aborting the run, and the local calendar is
//! updated exactly once after all batches have been attempted so local state
//! reflects the pushed intent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use roomcast_db::models::{CalendarUpdate, RoomMapping};

use crate::ari::{compile, compile_days, PushBatch};
use crate::client::ChannelClient;
use crate::error::{ChannelError, ChannelResult};
use crate::store::{ChannelStore, ConnectionHandle};
use crate::token::OperationClass;

/// Provider response to one batch submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushBatchResponse {
    /// Lines the provider accepted.
    #[serde(default)]
    pub modified: u32,
    /// Line-level rejections the provider reported alongside a 2xx.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Non-fatal notes from the provider.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A batch that failed during a push run.
#[derive(Debug)]
pub struct BatchError {
    /// Zero-based index of the batch within the run.
    pub batch_index: usize,
    pub line_count: usize,
    pub error: ChannelError,
}

/// Outcome of one push run.
#[derive(Debug, Default)]
pub struct PushSummary {
    /// Days in the requested range.
    pub lines_total: usize,
    /// Wire lines after span merging.
    pub lines_after_merge: usize,
    pub batch_count: usize,
    pub succeeded_batches: usize,
    /// Lines the provider confirmed as modified.
    pub modified: u32,
    /// Provider warnings collected across batches.
    pub warnings: Vec<String>,
    /// Failed batches, in submission order.
    pub batch_errors: Vec<BatchError>,
}

impl PushSummary {
    /// Whether every batch was accepted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.batch_errors.is_empty()
    }
}

/// Executes ARI pushes against one provider.
pub struct PushExecutor {
    client: Arc<ChannelClient>,
    store: Arc<dyn ChannelStore>,
}

impl PushExecutor {
    #[must_use]
    pub fn new(client: Arc<ChannelClient>, store: Arc<dyn ChannelStore>) -> Self {
        Self { client, store }
    }

    /// Push a uniform update over a date range (inclusive) for one mapping.
    ///
    /// Partial failure is not fatal: surviving batches still go out and the
    /// failures are reported in the summary. The local calendar is written
    /// once, after the provider calls, regardless of partial failure, so a
    /// later reconciliation run can surface any divergence the failed
    /// batches left behind.
    #[instrument(skip(self, connection, mapping, update), fields(
        connection_id = %connection.id,
        room = %mapping.remote_room_id,
        %from,
        %to,
    ))]
    pub async fn push_update(
        &self,
        connection: &ConnectionHandle,
        mapping: &RoomMapping,
        from: NaiveDate,
        to: NaiveDate,
        update: &CalendarUpdate,
    ) -> ChannelResult<PushSummary> {
        if to < from {
            return Err(ChannelError::Config(format!(
                "invalid date range: {from} > {to}"
            )));
        }
        if update.is_empty() {
            return Err(ChannelError::Config(
                "push update carries no fields".into(),
            ));
        }

        let batches = compile(
            mapping,
            from,
            to,
            update,
            self.client.config().batch_line_limit,
        );

        let mut summary = PushSummary {
            lines_total: (to - from).num_days() as usize + 1,
            lines_after_merge: batches.iter().map(|b| b.lines.len()).sum(),
            batch_count: batches.len(),
            ..Default::default()
        };
        self.execute_batches(connection, &batches, &mut summary).await;

        self.store
            .apply_calendar_update(mapping.hotel_id, mapping.room_type_id, from, to, update)
            .await?;

        info!(
            batches = summary.batch_count,
            succeeded = summary.succeeded_batches,
            modified = summary.modified,
            "Push run finished"
        );
        Ok(summary)
    }

    /// Push per-day updates for one mapping.
    ///
    /// Same submission and partial-failure semantics as [`push_update`];
    /// each day's intent is written back to the local calendar after the
    /// provider calls.
    ///
    /// [`push_update`]: PushExecutor::push_update
    #[instrument(skip(self, connection, mapping, days), fields(
        connection_id = %connection.id,
        room = %mapping.remote_room_id,
        days = days.len(),
    ))]
    pub async fn push_days(
        &self,
        connection: &ConnectionHandle,
        mapping: &RoomMapping,
        days: &[(NaiveDate, CalendarUpdate)],
    ) -> ChannelResult<PushSummary> {
        let batches = compile_days(mapping, days, self.client.config().batch_line_limit);

        let mut summary = PushSummary {
            lines_total: days.len(),
            lines_after_merge: batches.iter().map(|b| b.lines.len()).sum(),
            batch_count: batches.len(),
            ..Default::default()
        };
        self.execute_batches(connection, &batches, &mut summary).await;

        for (date, update) in days {
            if update.is_empty() {
                continue;
            }
            self.store
                .apply_calendar_update(mapping.hotel_id, mapping.room_type_id, *date, *date, update)
                .await?;
        }

        info!(
            batches = summary.batch_count,
            succeeded = summary.succeeded_batches,
            modified = summary.modified,
            "Push run finished"
        );
        Ok(summary)
    }

    /// Submit batches sequentially, pausing between them and collecting
    /// per-batch failures instead of aborting.
    async fn execute_batches(
        &self,
        connection: &ConnectionHandle,
        batches: &[PushBatch],
        summary: &mut PushSummary,
    ) {
        for (index, batch) in batches.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.client.config().inter_batch_delay).await;
            }

            match self.submit_batch(connection, batch).await {
                Ok(response) => {
                    summary.succeeded_batches += 1;
                    summary.modified += response.modified;
                    summary.warnings.extend(response.warnings);
                    for error in response.errors {
                        summary.warnings.push(format!("line rejected: {error}"));
                    }
                }
                Err(error) => {
                    warn!(batch_index = index, %error, "Batch submission failed, continuing");
                    summary.batch_errors.push(BatchError {
                        batch_index: index,
                        line_count: batch.lines.len(),
                        error,
                    });
                }
            }
        }
    }

    async fn submit_batch(
        &self,
        connection: &ConnectionHandle,
        batch: &PushBatch,
    ) -> ChannelResult<PushBatchResponse> {
        let outcome = self
            .client
            .post::<PushBatchResponse, _>(connection, OperationClass::Ari, "/ari/push", batch)
            .await?;
        Ok(outcome.body)
    }
}
