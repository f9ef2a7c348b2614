//! Guest model.
//!
//! Guests are keyed by (hotel, email) so repeated stays update the existing
//! profile instead of creating duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A hotel-scoped guest profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Guest fields carried by an inbound booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertGuest {
    pub hotel_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
}

impl Guest {
    /// Insert-if-absent, update-if-exists by (hotel, email).
    pub async fn upsert(pool: &sqlx::PgPool, input: &UpsertGuest) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO guests (hotel_id, email, first_name, last_name, phone, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (hotel_id, email) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                phone = COALESCE(EXCLUDED.phone, guests.phone),
                country = COALESCE(EXCLUDED.country, guests.country),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.hotel_id)
        .bind(&input.email)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.country)
        .fetch_one(pool)
        .await
    }

    /// Find a guest by (hotel, email).
    pub async fn find_by_email(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM guests WHERE hotel_id = $1 AND email = $2")
            .bind(hotel_id)
            .bind(email)
            .fetch_optional(pool)
            .await
    }
}
