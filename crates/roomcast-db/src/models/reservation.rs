//! Reservation model.
//!
//! Reservations created from channel bookings are keyed by
//! (hotel, remote booking id), making ingest idempotent: redelivered or
//! corrected bookings update the same row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A local reservation linked to a remote channel booking.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub remote_booking_id: String,
    pub guest_id: Uuid,
    pub room_type_id: Uuid,
    pub rate_plan_id: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reservation fields derived from an inbound booking payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertReservation {
    pub hotel_id: Uuid,
    pub remote_booking_id: String,
    pub guest_id: Uuid,
    pub room_type_id: Uuid,
    pub rate_plan_id: Option<Uuid>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub status: String,
}

impl Reservation {
    /// Upsert by (hotel, remote booking id). First delivery creates the row;
    /// repeated deliveries update it in place.
    pub async fn upsert(
        pool: &sqlx::PgPool,
        input: &UpsertReservation,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO reservations (
                hotel_id, remote_booking_id, guest_id, room_type_id, rate_plan_id,
                check_in, check_out, total_amount, currency, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (hotel_id, remote_booking_id) DO UPDATE SET
                guest_id = EXCLUDED.guest_id,
                room_type_id = EXCLUDED.room_type_id,
                rate_plan_id = EXCLUDED.rate_plan_id,
                check_in = EXCLUDED.check_in,
                check_out = EXCLUDED.check_out,
                total_amount = EXCLUDED.total_amount,
                currency = EXCLUDED.currency,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.hotel_id)
        .bind(&input.remote_booking_id)
        .bind(input.guest_id)
        .bind(input.room_type_id)
        .bind(input.rate_plan_id)
        .bind(input.check_in)
        .bind(input.check_out)
        .bind(input.total_amount)
        .bind(&input.currency)
        .bind(&input.status)
        .fetch_one(pool)
        .await
    }

    /// Find a reservation by its remote booking id.
    pub async fn find_by_remote_booking(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        remote_booking_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM reservations WHERE hotel_id = $1 AND remote_booking_id = $2",
        )
        .bind(hotel_id)
        .bind(remote_booking_id)
        .fetch_optional(pool)
        .await
    }
}
