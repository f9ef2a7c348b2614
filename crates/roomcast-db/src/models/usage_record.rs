//! API usage telemetry model.
//!
//! Append-only record of rate-limit headers observed on each provider call.
//! Feeds operator dashboards and backoff decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One observed rate-limit window sample.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub connection_id: Uuid,
    pub endpoint: String,
    pub quota_remaining: Option<i32>,
    pub window_reset_secs: Option<i32>,
    pub request_cost: Option<i32>,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    /// Append a telemetry sample.
    pub async fn append(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
        endpoint: &str,
        quota_remaining: Option<i32>,
        window_reset_secs: Option<i32>,
        request_cost: Option<i32>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (
                connection_id, endpoint, quota_remaining, window_reset_secs, request_cost
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(connection_id)
        .bind(endpoint)
        .bind(quota_remaining)
        .bind(window_reset_secs)
        .bind(request_cost)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Latest sample for a connection, if any.
    pub async fn latest(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM usage_records
            WHERE connection_id = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(connection_id)
        .fetch_optional(pool)
        .await
    }

    /// Recent samples for a connection, newest first.
    pub async fn recent(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM usage_records
            WHERE connection_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(connection_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
