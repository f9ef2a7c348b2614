//! Room/rate mapping model.
//!
//! Maps a local room type (and optionally rate plan) to the remote property,
//! room, and rate identifiers used by the channel. Immutable once established
//! except by re-link, which re-upserts on the natural key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Mapping between a local room type and a remote room/rate pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoomMapping {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub connection_id: Uuid,
    pub room_type_id: Uuid,
    pub rate_plan_id: Option<Uuid>,
    pub remote_property_id: String,
    pub remote_room_id: String,
    pub remote_rate_id: Option<String>,
    /// Hotel-level fallback used when an inbound booking carries an unmapped
    /// remote code.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Request to establish (or re-establish) a mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRoomMapping {
    pub hotel_id: Uuid,
    pub connection_id: Uuid,
    pub room_type_id: Uuid,
    pub rate_plan_id: Option<Uuid>,
    pub remote_property_id: String,
    pub remote_room_id: String,
    pub remote_rate_id: Option<String>,
    pub is_default: bool,
}

impl RoomMapping {
    /// Upsert a mapping by its (connection, remote room, remote rate) key.
    ///
    /// The conflict target coalesces `remote_rate_id` so rate-less mappings
    /// upsert too instead of accumulating duplicate rows.
    pub async fn upsert(
        pool: &sqlx::PgPool,
        input: &UpsertRoomMapping,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO room_mappings (
                hotel_id, connection_id, room_type_id, rate_plan_id,
                remote_property_id, remote_room_id, remote_rate_id, is_default
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (connection_id, remote_room_id, COALESCE(remote_rate_id, '')) DO UPDATE SET
                room_type_id = EXCLUDED.room_type_id,
                rate_plan_id = EXCLUDED.rate_plan_id,
                remote_property_id = EXCLUDED.remote_property_id,
                is_default = EXCLUDED.is_default
            RETURNING *
            "#,
        )
        .bind(input.hotel_id)
        .bind(input.connection_id)
        .bind(input.room_type_id)
        .bind(input.rate_plan_id)
        .bind(&input.remote_property_id)
        .bind(&input.remote_room_id)
        .bind(&input.remote_rate_id)
        .bind(input.is_default)
        .fetch_one(pool)
        .await
    }

    /// List all mappings for a connection.
    pub async fn list_by_connection(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM room_mappings WHERE connection_id = $1 ORDER BY remote_room_id",
        )
        .bind(connection_id)
        .fetch_all(pool)
        .await
    }

    /// Find the mapping for a remote room (and optionally rate) code.
    pub async fn find_by_remote(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
        remote_room_id: &str,
        remote_rate_id: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM room_mappings
            WHERE connection_id = $1
                AND remote_room_id = $2
                AND remote_rate_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(connection_id)
        .bind(remote_room_id)
        .bind(remote_rate_id)
        .fetch_optional(pool)
        .await
    }

    /// Find the hotel-level default mapping for a connection, if any.
    pub async fn find_default(
        pool: &sqlx::PgPool,
        connection_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM room_mappings
            WHERE connection_id = $1 AND is_default = TRUE
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(connection_id)
        .fetch_optional(pool)
        .await
    }
}
