//! Persistence seam for the engine.
//!
//! The engine treats local storage as a transactional key-value surface:
//! upsert-by-natural-key operations for connections, mappings, calendar
//! state, reservations, and discrepancies. [`ChannelStore`] is that surface;
//! [`PgChannelStore`] implements it over `roomcast-db`, and tests substitute
//! an in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use roomcast_core::{ConnectionId, HotelId};
use roomcast_db::models::{
    CalendarEntry, CalendarUpdate, ChannelConnection, CreateConnection, CreateDiscrepancy,
    Discrepancy, Guest, InboundBooking, Reservation, RoomMapping, UpsertGuest, UpsertReservation,
    UpsertRoomMapping,
};

use crate::error::ChannelResult;
use crate::usage::UsageSnapshot;

/// The engine's view of one linked channel account.
///
/// Carries only what outbound calls need; the full row stays in the store.
/// The `Debug` impl never exposes the refresh credential because
/// [`SecretString`] redacts it.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub hotel_id: HotelId,
    pub refresh_credential: SecretString,
}

impl From<&ChannelConnection> for ConnectionHandle {
    fn from(conn: &ChannelConnection) -> Self {
        Self {
            id: ConnectionId::from_uuid(conn.id),
            hotel_id: HotelId::from_uuid(conn.hotel_id),
            refresh_credential: conn.refresh_credential.clone().into(),
        }
    }
}

/// Upsert-by-natural-key storage surface consumed by the engine.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    // ── Connections ──────────────────────────────────────────────────

    /// Create (or re-link) a connection after a successful credential
    /// exchange.
    async fn create_connection(&self, input: &CreateConnection)
        -> ChannelResult<ChannelConnection>;

    /// Persist a freshly issued access token and expiry.
    async fn persist_token(
        &self,
        connection_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> ChannelResult<()>;

    /// Mark a connection as failed after an unrecoverable auth error.
    async fn mark_connection_error(&self, connection_id: Uuid) -> ChannelResult<()>;

    /// Record that a connection was used for an outbound call.
    async fn touch_connection(&self, connection_id: Uuid) -> ChannelResult<()>;

    /// Disable a connection on manual unlink.
    async fn disable_connection(&self, connection_id: Uuid) -> ChannelResult<()>;

    // ── Telemetry ────────────────────────────────────────────────────

    /// Append a usage telemetry sample.
    async fn record_usage(
        &self,
        connection_id: Uuid,
        endpoint: &str,
        usage: &UsageSnapshot,
    ) -> ChannelResult<()>;

    // ── Calendar state ───────────────────────────────────────────────

    /// Apply a sparse field update to every date in the range (inclusive).
    async fn apply_calendar_update(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        update: &CalendarUpdate,
    ) -> ChannelResult<u64>;

    /// Fetch local calendar state over a date window (inclusive).
    async fn fetch_calendar_range(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ChannelResult<Vec<CalendarEntry>>;

    // ── Mappings ─────────────────────────────────────────────────────

    /// Upsert a room/rate mapping.
    async fn upsert_mapping(&self, input: &UpsertRoomMapping) -> ChannelResult<RoomMapping>;

    /// Find the mapping for a remote room/rate code pair.
    async fn find_mapping(
        &self,
        connection_id: Uuid,
        remote_room_id: &str,
        remote_rate_id: Option<&str>,
    ) -> ChannelResult<Option<RoomMapping>>;

    /// Find the hotel-level default mapping, if configured.
    async fn find_default_mapping(&self, connection_id: Uuid)
        -> ChannelResult<Option<RoomMapping>>;

    // ── Bookings ─────────────────────────────────────────────────────

    /// Record receipt of an inbound booking payload (idempotent on the
    /// remote booking id). Returns the inbound row.
    async fn record_inbound(
        &self,
        hotel_id: Uuid,
        connection_id: Uuid,
        remote_booking_id: &str,
        raw_payload: &serde_json::Value,
    ) -> ChannelResult<InboundBooking>;

    /// Mark an inbound booking as processed, linking the reservation.
    async fn mark_inbound_processed(
        &self,
        inbound_id: Uuid,
        reservation_id: Uuid,
    ) -> ChannelResult<()>;

    /// Mark an inbound booking as failed with the causing message.
    async fn mark_inbound_error(&self, inbound_id: Uuid, message: &str) -> ChannelResult<()>;

    /// Upsert a guest by (hotel, email).
    async fn upsert_guest(&self, input: &UpsertGuest) -> ChannelResult<Guest>;

    /// Upsert a reservation by (hotel, remote booking id).
    ///
    /// Returns the reservation and whether it was newly created.
    async fn upsert_reservation(
        &self,
        input: &UpsertReservation,
    ) -> ChannelResult<(Reservation, bool)>;

    // ── Discrepancies ────────────────────────────────────────────────

    /// Record a detected discrepancy with status open.
    async fn create_discrepancy(&self, input: &CreateDiscrepancy) -> ChannelResult<Discrepancy>;

    /// Resolve an open discrepancy. Returns `None` if already closed.
    async fn resolve_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        resolved_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>>;

    /// Ignore an open discrepancy. Returns `None` if already closed.
    async fn ignore_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        ignored_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>>;
}

/// Postgres-backed store delegating to the `roomcast-db` models.
#[derive(Debug, Clone)]
pub struct PgChannelStore {
    pool: PgPool,
}

impl PgChannelStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelStore for PgChannelStore {
    async fn create_connection(
        &self,
        input: &CreateConnection,
    ) -> ChannelResult<ChannelConnection> {
        Ok(ChannelConnection::create(&self.pool, input).await?)
    }

    async fn persist_token(
        &self,
        connection_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> ChannelResult<()> {
        Ok(ChannelConnection::update_token(&self.pool, connection_id, access_token, expires_at)
            .await?)
    }

    async fn mark_connection_error(&self, connection_id: Uuid) -> ChannelResult<()> {
        Ok(ChannelConnection::mark_error(&self.pool, connection_id).await?)
    }

    async fn touch_connection(&self, connection_id: Uuid) -> ChannelResult<()> {
        Ok(ChannelConnection::touch(&self.pool, connection_id).await?)
    }

    async fn disable_connection(&self, connection_id: Uuid) -> ChannelResult<()> {
        Ok(ChannelConnection::disable(&self.pool, connection_id).await?)
    }

    async fn record_usage(
        &self,
        connection_id: Uuid,
        endpoint: &str,
        usage: &UsageSnapshot,
    ) -> ChannelResult<()> {
        Ok(roomcast_db::models::UsageRecord::append(
            &self.pool,
            connection_id,
            endpoint,
            usage.quota_remaining,
            usage.window_reset_secs,
            usage.request_cost,
        )
        .await?)
    }

    async fn apply_calendar_update(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        update: &CalendarUpdate,
    ) -> ChannelResult<u64> {
        Ok(
            CalendarEntry::apply_update(&self.pool, hotel_id, room_type_id, from, to, update)
                .await?,
        )
    }

    async fn fetch_calendar_range(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ChannelResult<Vec<CalendarEntry>> {
        Ok(CalendarEntry::fetch_range(&self.pool, hotel_id, room_type_id, from, to).await?)
    }

    async fn upsert_mapping(&self, input: &UpsertRoomMapping) -> ChannelResult<RoomMapping> {
        Ok(RoomMapping::upsert(&self.pool, input).await?)
    }

    async fn find_mapping(
        &self,
        connection_id: Uuid,
        remote_room_id: &str,
        remote_rate_id: Option<&str>,
    ) -> ChannelResult<Option<RoomMapping>> {
        Ok(RoomMapping::find_by_remote(&self.pool, connection_id, remote_room_id, remote_rate_id)
            .await?)
    }

    async fn find_default_mapping(
        &self,
        connection_id: Uuid,
    ) -> ChannelResult<Option<RoomMapping>> {
        Ok(RoomMapping::find_default(&self.pool, connection_id).await?)
    }

    async fn record_inbound(
        &self,
        hotel_id: Uuid,
        connection_id: Uuid,
        remote_booking_id: &str,
        raw_payload: &serde_json::Value,
    ) -> ChannelResult<InboundBooking> {
        Ok(InboundBooking::record_receipt(
            &self.pool,
            hotel_id,
            connection_id,
            remote_booking_id,
            raw_payload,
        )
        .await?)
    }

    async fn mark_inbound_processed(
        &self,
        inbound_id: Uuid,
        reservation_id: Uuid,
    ) -> ChannelResult<()> {
        Ok(InboundBooking::mark_processed(&self.pool, inbound_id, reservation_id).await?)
    }

    async fn mark_inbound_error(&self, inbound_id: Uuid, message: &str) -> ChannelResult<()> {
        Ok(InboundBooking::mark_error(&self.pool, inbound_id, message).await?)
    }

    async fn upsert_guest(&self, input: &UpsertGuest) -> ChannelResult<Guest> {
        Ok(Guest::upsert(&self.pool, input).await?)
    }

    async fn upsert_reservation(
        &self,
        input: &UpsertReservation,
    ) -> ChannelResult<(Reservation, bool)> {
        let existing = Reservation::find_by_remote_booking(
            &self.pool,
            input.hotel_id,
            &input.remote_booking_id,
        )
        .await?;
        let created = existing.is_none();
        let reservation = Reservation::upsert(&self.pool, input).await?;
        Ok((reservation, created))
    }

    async fn create_discrepancy(&self, input: &CreateDiscrepancy) -> ChannelResult<Discrepancy> {
        Ok(Discrepancy::create(&self.pool, input).await?)
    }

    async fn resolve_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        resolved_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        Ok(Discrepancy::resolve(&self.pool, hotel_id, id, resolved_by).await?)
    }

    async fn ignore_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        ignored_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        Ok(Discrepancy::ignore(&self.pool, hotel_id, id, ignored_by).await?)
    }
}
