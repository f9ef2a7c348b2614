//! Inbound booking model.
//!
//! Stores every raw booking payload received from the channel along with its
//! processing outcome, keyed by (connection, remote booking id) so redelivery
//! updates the existing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Processing state of a received booking payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Received, not yet ingested.
    Pending,
    /// Successfully turned into a local reservation. Terminal.
    Processed,
    /// Ingest failed; held for operator retry.
    Error,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processed => write!(f, "processed"),
            ProcessingStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processed" => Ok(ProcessingStatus::Processed),
            "error" => Ok(ProcessingStatus::Error),
            _ => Err(format!("Unknown processing status: {s}")),
        }
    }
}

/// A raw booking payload received from the channel plus derived state.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InboundBooking {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub connection_id: Uuid,
    pub remote_booking_id: String,
    pub raw_payload: serde_json::Value,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub reservation_id: Option<Uuid>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl InboundBooking {
    /// Record receipt of a payload. Redelivery of the same remote booking id
    /// refreshes the stored payload and resets the row to pending.
    pub async fn record_receipt(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        connection_id: Uuid,
        remote_booking_id: &str,
        raw_payload: &serde_json::Value,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO inbound_bookings (
                hotel_id, connection_id, remote_booking_id, raw_payload, processing_status
            )
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (connection_id, remote_booking_id) DO UPDATE SET
                raw_payload = EXCLUDED.raw_payload,
                processing_status = 'pending',
                error_message = NULL,
                received_at = NOW()
            RETURNING *
            "#,
        )
        .bind(hotel_id)
        .bind(connection_id)
        .bind(remote_booking_id)
        .bind(raw_payload)
        .fetch_one(pool)
        .await
    }

    /// Mark the booking as processed, linking the created reservation.
    pub async fn mark_processed(
        pool: &sqlx::PgPool,
        id: Uuid,
        reservation_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE inbound_bookings
            SET processing_status = 'processed',
                reservation_id = $2,
                error_message = NULL,
                processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reservation_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the booking as failed with the causing message.
    pub async fn mark_error(
        pool: &sqlx::PgPool,
        id: Uuid,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE inbound_bookings
            SET processing_status = 'error', error_message = $2, processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List bookings held in error state for a hotel, newest first.
    pub async fn list_errors(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM inbound_bookings
            WHERE hotel_id = $1 AND processing_status = 'error'
            ORDER BY received_at DESC
            LIMIT $2
            "#,
        )
        .bind(hotel_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ProcessingStatus::Pending.to_string(), "pending");
        assert_eq!(ProcessingStatus::Processed.to_string(), "processed");
        assert_eq!(ProcessingStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "processed".parse::<ProcessingStatus>().unwrap(),
            ProcessingStatus::Processed
        );
        assert!("done".parse::<ProcessingStatus>().is_err());
    }
}
