//! Discrepancy model.
//!
//! A detected mismatch between local and remote ARI state for one room/date.
//! Open is the only non-terminal status; resolve and ignore are guarded in
//! SQL so a closed discrepancy can never transition again.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which ARI dimension diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    Rate,
    Availability,
    Restriction,
    Inventory,
}

impl std::fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyType::Rate => write!(f, "rate"),
            DiscrepancyType::Availability => write!(f, "availability"),
            DiscrepancyType::Restriction => write!(f, "restriction"),
            DiscrepancyType::Inventory => write!(f, "inventory"),
        }
    }
}

impl std::str::FromStr for DiscrepancyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rate" => Ok(DiscrepancyType::Rate),
            "availability" => Ok(DiscrepancyType::Availability),
            "restriction" => Ok(DiscrepancyType::Restriction),
            "inventory" => Ok(DiscrepancyType::Inventory),
            _ => Err(format!("Unknown discrepancy type: {s}")),
        }
    }
}

/// Operator-facing severity, assigned by magnitude policy at detection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancySeverity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DiscrepancySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancySeverity::Low => write!(f, "low"),
            DiscrepancySeverity::Medium => write!(f, "medium"),
            DiscrepancySeverity::High => write!(f, "high"),
        }
    }
}

/// Workflow status. Resolved and Ignored are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Open,
    Resolved,
    Ignored,
}

impl std::fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyStatus::Open => write!(f, "open"),
            DiscrepancyStatus::Resolved => write!(f, "resolved"),
            DiscrepancyStatus::Ignored => write!(f, "ignored"),
        }
    }
}

impl DiscrepancyStatus {
    /// Whether the status permits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DiscrepancyStatus::Resolved | DiscrepancyStatus::Ignored)
    }
}

/// A detected local/remote mismatch.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub connection_id: Uuid,
    pub discrepancy_type: DiscrepancyType,
    pub room_type_id: Uuid,
    pub date: NaiveDate,
    pub severity: DiscrepancySeverity,
    pub status: DiscrepancyStatus,
    pub local_value: Option<serde_json::Value>,
    pub remote_value: Option<serde_json::Value>,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<Uuid>,
}

/// Request to record a detected discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDiscrepancy {
    pub hotel_id: Uuid,
    pub connection_id: Uuid,
    pub discrepancy_type: DiscrepancyType,
    pub room_type_id: Uuid,
    pub date: NaiveDate,
    pub severity: DiscrepancySeverity,
    pub local_value: Option<serde_json::Value>,
    pub remote_value: Option<serde_json::Value>,
    pub description: String,
}

impl Discrepancy {
    /// Record a detected discrepancy with status `open`.
    pub async fn create(
        pool: &sqlx::PgPool,
        input: &CreateDiscrepancy,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO discrepancies (
                hotel_id, connection_id, discrepancy_type, room_type_id, date,
                severity, status, local_value, remote_value, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'open', $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(input.hotel_id)
        .bind(input.connection_id)
        .bind(input.discrepancy_type.to_string())
        .bind(input.room_type_id)
        .bind(input.date)
        .bind(input.severity.to_string())
        .bind(&input.local_value)
        .bind(&input.remote_value)
        .bind(&input.description)
        .fetch_one(pool)
        .await
    }

    /// List open discrepancies for a hotel, most severe and newest first.
    pub async fn list_open(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM discrepancies
            WHERE hotel_id = $1 AND status = 'open'
            ORDER BY severity DESC, detected_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(hotel_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Resolve an open discrepancy: the operator accepts remote state as
    /// authoritative. Returns `None` if the discrepancy was already closed.
    pub async fn resolve(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        id: Uuid,
        resolved_by: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::close(pool, hotel_id, id, DiscrepancyStatus::Resolved, resolved_by).await
    }

    /// Ignore an open discrepancy. Returns `None` if already closed.
    pub async fn ignore(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        id: Uuid,
        ignored_by: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::close(pool, hotel_id, id, DiscrepancyStatus::Ignored, ignored_by).await
    }

    async fn close(
        pool: &sqlx::PgPool,
        hotel_id: Uuid,
        id: Uuid,
        status: DiscrepancyStatus,
        closed_by: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        // The `status = 'open'` guard makes terminal statuses unreachable
        // from one another.
        sqlx::query_as(
            r#"
            UPDATE discrepancies
            SET status = $3, closed_at = NOW(), closed_by = $4
            WHERE id = $1 AND hotel_id = $2 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(hotel_id)
        .bind(status.to_string())
        .bind(closed_by)
        .fetch_optional(pool)
        .await
    }
}
