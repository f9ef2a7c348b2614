//! Local ARI calendar model.
//!
//! One row per (hotel, room type, date) holding the locally authoritative
//! rate, availability, and restriction state. The Push Executor writes intent
//! back here after a push run; the Reconciliation Engine reads ranges to
//! compare against the remote snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Local ARI state for one room type on one date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub date: NaiveDate,
    pub rate: Option<f64>,
    pub availability: Option<i32>,
    pub stop_sell: Option<bool>,
    pub closed_to_arrival: Option<bool>,
    pub closed_to_departure: Option<bool>,
    pub min_stay: Option<i32>,
    pub max_stay: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// Sparse field update applied over a date range. `None` fields are left
/// untouched by the upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarUpdate {
    pub rate: Option<f64>,
    pub availability: Option<i32>,
    pub stop_sell: Option<bool>,
    pub closed_to_arrival: Option<bool>,
    pub closed_to_departure: Option<bool>,
    pub min_stay: Option<i32>,
    pub max_stay: Option<i32>,
}

impl CalendarUpdate {
    /// Whether the update carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl CalendarEntry {
    /// Fetch entries for a room type over a date window (inclusive).
    pub async fn fetch_range(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM calendar_entries
            WHERE hotel_id = $1 AND room_type_id = $2 AND date BETWEEN $3 AND $4
            ORDER BY date
            "#,
        )
        .bind(hotel_id)
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    /// Apply a sparse update to every date in the range (inclusive).
    ///
    /// Untouched fields keep their previous value via COALESCE; absent rows
    /// are created with only the updated fields populated.
    pub async fn apply_update(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        update: &CalendarUpdate,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO calendar_entries (
                hotel_id, room_type_id, date, rate, availability,
                stop_sell, closed_to_arrival, closed_to_departure, min_stay, max_stay
            )
            SELECT $1, $2, d::date, $5, $6, $7, $8, $9, $10, $11
            FROM generate_series($3::date, $4::date, '1 day') AS d
            ON CONFLICT (hotel_id, room_type_id, date) DO UPDATE SET
                rate = COALESCE(EXCLUDED.rate, calendar_entries.rate),
                availability = COALESCE(EXCLUDED.availability, calendar_entries.availability),
                stop_sell = COALESCE(EXCLUDED.stop_sell, calendar_entries.stop_sell),
                closed_to_arrival =
                    COALESCE(EXCLUDED.closed_to_arrival, calendar_entries.closed_to_arrival),
                closed_to_departure =
                    COALESCE(EXCLUDED.closed_to_departure, calendar_entries.closed_to_departure),
                min_stay = COALESCE(EXCLUDED.min_stay, calendar_entries.min_stay),
                max_stay = COALESCE(EXCLUDED.max_stay, calendar_entries.max_stay),
                updated_at = NOW()
            "#,
        )
        .bind(hotel_id)
        .bind(room_type_id)
        .bind(from)
        .bind(to)
        .bind(update.rate)
        .bind(update.availability)
        .bind(update.stop_sell)
        .bind(update.closed_to_arrival)
        .bind(update.closed_to_departure)
        .bind(update.min_stay)
        .bind(update.max_stay)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
