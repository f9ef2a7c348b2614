//! Strongly typed identifiers.
//!
//! Newtype wrappers over [`Uuid`] so a `HotelId` can never be passed where a
//! `ConnectionId` is expected. The persistence layer stores plain UUIDs; the
//! engine APIs speak these types and unwrap at the query boundary.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to parse {id_type}: {message}")]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The underlying UUID parse error message.
    pub message: String,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Consumes the ID, returning the underlying UUID.
            #[must_use]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }
    };
}

define_id!(
    /// Identifier for a hotel (the local property owning all channel state).
    HotelId
);

define_id!(
    /// Identifier for an authenticated link to a remote channel account.
    ConnectionId
);

define_id!(
    /// Identifier for a local room type.
    RoomTypeId
);

define_id!(
    /// Identifier for a local rate plan.
    RatePlanId
);

define_id!(
    /// Identifier for a room/rate mapping row.
    RoomMappingId
);

define_id!(
    /// Identifier for a locally stored guest profile.
    GuestId
);

define_id!(
    /// Identifier for a local reservation.
    ReservationId
);

define_id!(
    /// Identifier for a stored inbound booking payload.
    InboundBookingId
);

define_id!(
    /// Identifier for a detected local/remote discrepancy.
    DiscrepancyId
);
