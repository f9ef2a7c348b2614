//! Database models for channel-manager state.

pub mod calendar_entry;
pub mod connection;
pub mod discrepancy;
pub mod guest;
pub mod inbound_booking;
pub mod reservation;
pub mod room_mapping;
pub mod usage_record;

pub use calendar_entry::{CalendarEntry, CalendarUpdate};
pub use connection::{ChannelConnection, ConnectionStatus, CreateConnection};
pub use discrepancy::{
    CreateDiscrepancy, Discrepancy, DiscrepancySeverity, DiscrepancyStatus, DiscrepancyType,
};
pub use guest::{Guest, UpsertGuest};
pub use inbound_booking::{InboundBooking, ProcessingStatus};
pub use reservation::{Reservation, UpsertReservation};
pub use room_mapping::{RoomMapping, UpsertRoomMapping};
pub use usage_record::UsageRecord;
