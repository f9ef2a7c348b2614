//! Channel connection model.
//!
//! One row per authenticated link to a remote channel-manager account. The
//! refresh credential is stored encrypted by the caller; this layer treats it
//! as opaque text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Healthy; tokens can be refreshed.
    Active,
    /// Unrecoverable auth failure; requires manual re-link.
    Error,
    /// Manually unlinked by an operator.
    Disabled,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Active => write!(f, "active"),
            ConnectionStatus::Error => write!(f, "error"),
            ConnectionStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ConnectionStatus::Active),
            "error" => Ok(ConnectionStatus::Error),
            "disabled" => Ok(ConnectionStatus::Disabled),
            _ => Err(format!("Unknown connection status: {s}")),
        }
    }
}

/// An authenticated link to a remote channel account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChannelConnection {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub remote_account_id: String,
    /// Opaque encrypted refresh credential.
    pub refresh_credential: String,
    /// Persisted copy of the last issued access token (warm-start only; the
    /// in-process cache is authoritative).
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: ConnectionStatus,
    pub scopes: Vec<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a connection after a successful credential exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConnection {
    pub hotel_id: Uuid,
    pub remote_account_id: String,
    pub refresh_credential: String,
    pub access_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl ChannelConnection {
    /// Create a new connection, or update credentials on re-link of the same
    /// remote account.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: &CreateConnection,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO channel_connections (
                hotel_id, remote_account_id, refresh_credential,
                access_token, token_expires_at, status, scopes
            )
            VALUES ($1, $2, $3, $4, $5, 'active', $6)
            ON CONFLICT (hotel_id, remote_account_id) DO UPDATE SET
                refresh_credential = EXCLUDED.refresh_credential,
                access_token = EXCLUDED.access_token,
                token_expires_at = EXCLUDED.token_expires_at,
                status = 'active',
                scopes = EXCLUDED.scopes,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(input.hotel_id)
        .bind(&input.remote_account_id)
        .bind(&input.refresh_credential)
        .bind(&input.access_token)
        .bind(input.token_expires_at)
        .bind(&input.scopes)
        .fetch_one(pool)
        .await
    }

    /// Find a connection by ID.
    pub async fn find_by_id(pool: &sqlx::PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM channel_connections WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List connections for a hotel.
    pub async fn list_by_hotel(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM channel_connections WHERE hotel_id = $1 ORDER BY created_at",
        )
        .bind(hotel_id)
        .fetch_all(pool)
        .await
    }

    /// Persist a freshly issued access token and its expiry.
    pub async fn update_token(
        pool: &sqlx::PgPool,
        id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE channel_connections
            SET access_token = $2, token_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(access_token)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record that the connection was used for an outbound call.
    pub async fn touch(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE channel_connections SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Mark the connection as failed after an unrecoverable auth error.
    pub async fn mark_error(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE channel_connections SET status = 'error', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Disable the connection on manual unlink.
    pub async fn disable(pool: &sqlx::PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE channel_connections SET status = 'disabled', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Whether the connection can be used for outbound calls.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.status == ConnectionStatus::Active
    }
}
