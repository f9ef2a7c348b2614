//! Shared test fixtures: an in-memory [`ChannelStore`] double and payload
//! builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use roomcast_channel::error::ChannelResult;
use roomcast_channel::store::{ChannelStore, ConnectionHandle};
use roomcast_channel::usage::UsageSnapshot;
use roomcast_core::{ConnectionId, HotelId};
use roomcast_db::models::{
    CalendarEntry, CalendarUpdate, ChannelConnection, ConnectionStatus, CreateConnection,
    CreateDiscrepancy, Discrepancy, DiscrepancyStatus, Guest, InboundBooking, ProcessingStatus,
    Reservation, RoomMapping, UpsertGuest, UpsertReservation, UpsertRoomMapping,
};

/// A recorded calendar write.
#[derive(Debug, Clone)]
pub struct AppliedUpdate {
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub update: CalendarUpdate,
}

/// In-memory store double mirroring the upsert-by-natural-key semantics of
/// the Postgres store.
#[derive(Default)]
pub struct InMemoryStore {
    pub connections: Mutex<HashMap<Uuid, ChannelConnection>>,
    pub persisted_tokens: Mutex<Vec<(Uuid, String, DateTime<Utc>)>>,
    pub errored_connections: Mutex<Vec<Uuid>>,
    pub touched_connections: Mutex<Vec<Uuid>>,
    pub disabled_connections: Mutex<Vec<Uuid>>,
    pub usage_samples: Mutex<Vec<(Uuid, String, UsageSnapshot)>>,
    pub applied_updates: Mutex<Vec<AppliedUpdate>>,
    pub calendar: Mutex<Vec<CalendarEntry>>,
    pub mappings: Mutex<Vec<RoomMapping>>,
    pub inbound: Mutex<HashMap<(Uuid, String), InboundBooking>>,
    pub guests: Mutex<HashMap<(Uuid, String), Guest>>,
    pub reservations: Mutex<HashMap<(Uuid, String), Reservation>>,
    pub discrepancies: Mutex<Vec<Discrepancy>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mapping and return it.
    pub fn add_mapping(&self, mapping: RoomMapping) -> RoomMapping {
        self.mappings.lock().unwrap().push(mapping.clone());
        mapping
    }

    pub fn inbound_status(&self, connection_id: Uuid, remote_booking_id: &str) -> ProcessingStatus {
        self.inbound
            .lock()
            .unwrap()
            .get(&(connection_id, remote_booking_id.to_string()))
            .expect("inbound booking recorded")
            .processing_status
    }

    pub fn open_discrepancies(&self) -> Vec<Discrepancy> {
        self.discrepancies
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.status == DiscrepancyStatus::Open)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChannelStore for InMemoryStore {
    async fn create_connection(
        &self,
        input: &CreateConnection,
    ) -> ChannelResult<ChannelConnection> {
        let mut connections = self.connections.lock().unwrap();
        // Re-link on the same (hotel, remote account) updates in place.
        if let Some(existing) = connections
            .values_mut()
            .find(|c| c.hotel_id == input.hotel_id && c.remote_account_id == input.remote_account_id)
        {
            existing.refresh_credential = input.refresh_credential.clone();
            existing.access_token = input.access_token.clone();
            existing.token_expires_at = input.token_expires_at;
            existing.status = ConnectionStatus::Active;
            existing.scopes = input.scopes.clone();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }

        let connection = ChannelConnection {
            id: Uuid::new_v4(),
            hotel_id: input.hotel_id,
            remote_account_id: input.remote_account_id.clone(),
            refresh_credential: input.refresh_credential.clone(),
            access_token: input.access_token.clone(),
            token_expires_at: input.token_expires_at,
            status: ConnectionStatus::Active,
            scopes: input.scopes.clone(),
            last_used_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        connections.insert(connection.id, connection.clone());
        Ok(connection)
    }

    async fn persist_token(
        &self,
        connection_id: Uuid,
        access_token: &str,
        expires_at: DateTime<Utc>,
    ) -> ChannelResult<()> {
        self.persisted_tokens
            .lock()
            .unwrap()
            .push((connection_id, access_token.to_string(), expires_at));
        Ok(())
    }

    async fn mark_connection_error(&self, connection_id: Uuid) -> ChannelResult<()> {
        self.errored_connections.lock().unwrap().push(connection_id);
        Ok(())
    }

    async fn touch_connection(&self, connection_id: Uuid) -> ChannelResult<()> {
        self.touched_connections.lock().unwrap().push(connection_id);
        Ok(())
    }

    async fn disable_connection(&self, connection_id: Uuid) -> ChannelResult<()> {
        self.disabled_connections.lock().unwrap().push(connection_id);
        if let Some(conn) = self.connections.lock().unwrap().get_mut(&connection_id) {
            conn.status = ConnectionStatus::Disabled;
        }
        Ok(())
    }

    async fn record_usage(
        &self,
        connection_id: Uuid,
        endpoint: &str,
        usage: &UsageSnapshot,
    ) -> ChannelResult<()> {
        self.usage_samples
            .lock()
            .unwrap()
            .push((connection_id, endpoint.to_string(), *usage));
        Ok(())
    }

    async fn apply_calendar_update(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        update: &CalendarUpdate,
    ) -> ChannelResult<u64> {
        let days = (to - from).num_days() as u64 + 1;
        self.applied_updates.lock().unwrap().push(AppliedUpdate {
            hotel_id,
            room_type_id,
            from,
            to,
            update: update.clone(),
        });
        Ok(days)
    }

    async fn fetch_calendar_range(
        &self,
        hotel_id: Uuid,
        room_type_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ChannelResult<Vec<CalendarEntry>> {
        Ok(self
            .calendar
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.hotel_id == hotel_id
                    && e.room_type_id == room_type_id
                    && e.date >= from
                    && e.date <= to
            })
            .cloned()
            .collect())
    }

    async fn upsert_mapping(&self, input: &UpsertRoomMapping) -> ChannelResult<RoomMapping> {
        let mut mappings = self.mappings.lock().unwrap();
        if let Some(existing) = mappings.iter_mut().find(|m| {
            m.connection_id == input.connection_id
                && m.remote_room_id == input.remote_room_id
                && m.remote_rate_id == input.remote_rate_id
        }) {
            existing.room_type_id = input.room_type_id;
            existing.rate_plan_id = input.rate_plan_id;
            existing.remote_property_id = input.remote_property_id.clone();
            existing.is_default = input.is_default;
            return Ok(existing.clone());
        }

        let mapping = RoomMapping {
            id: Uuid::new_v4(),
            hotel_id: input.hotel_id,
            connection_id: input.connection_id,
            room_type_id: input.room_type_id,
            rate_plan_id: input.rate_plan_id,
            remote_property_id: input.remote_property_id.clone(),
            remote_room_id: input.remote_room_id.clone(),
            remote_rate_id: input.remote_rate_id.clone(),
            is_default: input.is_default,
            created_at: Utc::now(),
        };
        mappings.push(mapping.clone());
        Ok(mapping)
    }

    async fn find_mapping(
        &self,
        connection_id: Uuid,
        remote_room_id: &str,
        remote_rate_id: Option<&str>,
    ) -> ChannelResult<Option<RoomMapping>> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.connection_id == connection_id
                    && m.remote_room_id == remote_room_id
                    && m.remote_rate_id.as_deref() == remote_rate_id
            })
            .cloned())
    }

    async fn find_default_mapping(
        &self,
        connection_id: Uuid,
    ) -> ChannelResult<Option<RoomMapping>> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.connection_id == connection_id && m.is_default)
            .cloned())
    }

    async fn record_inbound(
        &self,
        hotel_id: Uuid,
        connection_id: Uuid,
        remote_booking_id: &str,
        raw_payload: &serde_json::Value,
    ) -> ChannelResult<InboundBooking> {
        let mut inbound = self.inbound.lock().unwrap();
        let key = (connection_id, remote_booking_id.to_string());
        let row = inbound
            .entry(key)
            .and_modify(|row| {
                row.raw_payload = raw_payload.clone();
                row.processing_status = ProcessingStatus::Pending;
                row.error_message = None;
                row.received_at = Utc::now();
            })
            .or_insert_with(|| InboundBooking {
                id: Uuid::new_v4(),
                hotel_id,
                connection_id,
                remote_booking_id: remote_booking_id.to_string(),
                raw_payload: raw_payload.clone(),
                processing_status: ProcessingStatus::Pending,
                error_message: None,
                reservation_id: None,
                received_at: Utc::now(),
                processed_at: None,
            });
        Ok(row.clone())
    }

    async fn mark_inbound_processed(
        &self,
        inbound_id: Uuid,
        reservation_id: Uuid,
    ) -> ChannelResult<()> {
        let mut inbound = self.inbound.lock().unwrap();
        if let Some(row) = inbound.values_mut().find(|r| r.id == inbound_id) {
            row.processing_status = ProcessingStatus::Processed;
            row.reservation_id = Some(reservation_id);
            row.error_message = None;
            row.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_inbound_error(&self, inbound_id: Uuid, message: &str) -> ChannelResult<()> {
        let mut inbound = self.inbound.lock().unwrap();
        if let Some(row) = inbound.values_mut().find(|r| r.id == inbound_id) {
            row.processing_status = ProcessingStatus::Error;
            row.error_message = Some(message.to_string());
            row.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn upsert_guest(&self, input: &UpsertGuest) -> ChannelResult<Guest> {
        let mut guests = self.guests.lock().unwrap();
        let key = (input.hotel_id, input.email.clone());
        let guest = guests
            .entry(key)
            .and_modify(|g| {
                g.first_name = input.first_name.clone();
                g.last_name = input.last_name.clone();
                g.phone = input.phone.clone().or_else(|| g.phone.clone());
                g.country = input.country.clone().or_else(|| g.country.clone());
                g.updated_at = Utc::now();
            })
            .or_insert_with(|| Guest {
                id: Uuid::new_v4(),
                hotel_id: input.hotel_id,
                email: input.email.clone(),
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                phone: input.phone.clone(),
                country: input.country.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        Ok(guest.clone())
    }

    async fn upsert_reservation(
        &self,
        input: &UpsertReservation,
    ) -> ChannelResult<(Reservation, bool)> {
        let mut reservations = self.reservations.lock().unwrap();
        let key = (input.hotel_id, input.remote_booking_id.clone());
        let created = !reservations.contains_key(&key);
        let reservation = reservations
            .entry(key)
            .and_modify(|r| {
                r.guest_id = input.guest_id;
                r.room_type_id = input.room_type_id;
                r.rate_plan_id = input.rate_plan_id;
                r.check_in = input.check_in;
                r.check_out = input.check_out;
                r.total_amount = input.total_amount;
                r.currency = input.currency.clone();
                r.status = input.status.clone();
                r.updated_at = Utc::now();
            })
            .or_insert_with(|| Reservation {
                id: Uuid::new_v4(),
                hotel_id: input.hotel_id,
                remote_booking_id: input.remote_booking_id.clone(),
                guest_id: input.guest_id,
                room_type_id: input.room_type_id,
                rate_plan_id: input.rate_plan_id,
                check_in: input.check_in,
                check_out: input.check_out,
                total_amount: input.total_amount,
                currency: input.currency.clone(),
                status: input.status.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
        Ok((reservation.clone(), created))
    }

    async fn create_discrepancy(&self, input: &CreateDiscrepancy) -> ChannelResult<Discrepancy> {
        let discrepancy = Discrepancy {
            id: Uuid::new_v4(),
            hotel_id: input.hotel_id,
            connection_id: input.connection_id,
            discrepancy_type: input.discrepancy_type,
            room_type_id: input.room_type_id,
            date: input.date,
            severity: input.severity,
            status: DiscrepancyStatus::Open,
            local_value: input.local_value.clone(),
            remote_value: input.remote_value.clone(),
            description: input.description.clone(),
            detected_at: Utc::now(),
            closed_at: None,
            closed_by: None,
        };
        self.discrepancies.lock().unwrap().push(discrepancy.clone());
        Ok(discrepancy)
    }

    async fn resolve_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        resolved_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        self.close_discrepancy(hotel_id, id, DiscrepancyStatus::Resolved, resolved_by)
    }

    async fn ignore_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        ignored_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        self.close_discrepancy(hotel_id, id, DiscrepancyStatus::Ignored, ignored_by)
    }
}

impl InMemoryStore {
    fn close_discrepancy(
        &self,
        hotel_id: Uuid,
        id: Uuid,
        status: DiscrepancyStatus,
        closed_by: Option<Uuid>,
    ) -> ChannelResult<Option<Discrepancy>> {
        let mut discrepancies = self.discrepancies.lock().unwrap();
        let Some(d) = discrepancies
            .iter_mut()
            .find(|d| d.id == id && d.hotel_id == hotel_id && d.status == DiscrepancyStatus::Open)
        else {
            return Ok(None);
        };
        d.status = status;
        d.closed_at = Some(Utc::now());
        d.closed_by = closed_by;
        Ok(Some(d.clone()))
    }
}

/// Connection handle with fresh ids and a dummy refresh credential.
pub fn connection_handle() -> ConnectionHandle {
    ConnectionHandle {
        id: ConnectionId::new(),
        hotel_id: HotelId::new(),
        refresh_credential: "refresh-secret".to_string().into(),
    }
}

/// Mapping tied to the given handle.
pub fn mapping_for(handle: &ConnectionHandle) -> RoomMapping {
    RoomMapping {
        id: Uuid::new_v4(),
        hotel_id: handle.hotel_id.into_uuid(),
        connection_id: handle.id.into_uuid(),
        room_type_id: Uuid::new_v4(),
        rate_plan_id: None,
        remote_property_id: "prop-1".into(),
        remote_room_id: "DBL".into(),
        remote_rate_id: Some("BAR".into()),
        is_default: false,
        created_at: Utc::now(),
    }
}
