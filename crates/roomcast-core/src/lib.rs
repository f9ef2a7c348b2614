//! Shared foundation types for the roomcast channel-manager engine.
//!
//! Provides strongly typed identifiers used across the persistence layer and
//! the integration engine. Keeping them in one leaf crate prevents dependency
//! cycles between `roomcast-db` and `roomcast-channel`.

mod ids;

pub use ids::{
    ConnectionId, DiscrepancyId, GuestId, HotelId, InboundBookingId, ParseIdError, RatePlanId,
    ReservationId, RoomMappingId, RoomTypeId,
};
