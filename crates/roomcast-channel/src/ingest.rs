//! Inbound booking ingestor.
//!
//! Turns raw provider booking payloads into local reservations. Every
//! payload is recorded before any processing, so a failed booking is held
//! with its raw body for operator retry instead of being lost. Ingest is
//! idempotent on the remote booking id: redelivery and corrections update
//! the same reservation row. One bad booking never aborts a pull run;
//! failures are data, not errors.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use roomcast_db::models::{UpsertGuest, UpsertReservation};

use crate::client::ChannelClient;
use crate::error::{ChannelError, ChannelResult};
use crate::store::{ChannelStore, ConnectionHandle};
use crate::token::OperationClass;

/// Identifier keys tried, in priority order, on a raw booking payload.
const BOOKING_ID_KEYS: &[&str] = &["booking_id", "bookingId", "id", "reservation_id"];

/// Booking fields extracted from a raw payload.
///
/// Field naming varies between providers; extraction tries the known
/// spellings for each field so the rest of the pipeline sees one shape.
#[derive(Debug, Clone)]
pub struct RemoteBooking {
    pub remote_booking_id: String,
    pub remote_room_id: String,
    pub remote_rate_id: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: String,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub guest_email: String,
    pub guest_first_name: String,
    pub guest_last_name: String,
    pub guest_phone: Option<String>,
    pub guest_country: Option<String>,
}

impl RemoteBooking {
    /// Pull the remote booking id out of a raw payload without requiring the
    /// rest of it to be valid. Used so even unparseable payloads can be
    /// recorded under their id.
    pub fn extract_id(raw: &Value) -> Option<String> {
        BOOKING_ID_KEYS.iter().find_map(|key| {
            raw.get(*key).and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        })
    }

    /// Parse a raw payload into the normalized shape.
    pub fn from_value(raw: &Value) -> ChannelResult<Self> {
        let remote_booking_id = Self::extract_id(raw)
            .ok_or_else(|| ChannelError::Processing("payload carries no booking id".into()))?;

        let remote_room_id = str_field(raw, &["room_id", "roomId", "room_type_code"])
            .ok_or_else(|| ChannelError::Processing("payload carries no room id".into()))?;
        let remote_rate_id = str_field(raw, &["rate_id", "rateId", "rate_plan_code"]);

        let check_in = date_field(raw, &["check_in", "checkIn", "arrival"])
            .ok_or_else(|| ChannelError::Processing("missing or invalid check-in date".into()))?;
        let check_out = date_field(raw, &["check_out", "checkOut", "departure"])
            .ok_or_else(|| ChannelError::Processing("missing or invalid check-out date".into()))?;
        if check_out <= check_in {
            return Err(ChannelError::Processing(format!(
                "check-out {check_out} not after check-in {check_in}"
            )));
        }

        let guest = raw.get("guest").unwrap_or(raw);
        let guest_email = str_field(guest, &["email", "guest_email"])
            .ok_or_else(|| ChannelError::Processing("payload carries no guest email".into()))?;

        Ok(Self {
            remote_booking_id,
            remote_room_id,
            remote_rate_id,
            check_in,
            check_out,
            status: str_field(raw, &["status", "state"]).unwrap_or_else(|| "confirmed".into()),
            total_amount: num_field(raw, &["total_amount", "totalAmount", "total"]),
            currency: str_field(raw, &["currency", "currency_code"]),
            guest_email,
            guest_first_name: str_field(guest, &["first_name", "firstName", "given_name"])
                .unwrap_or_else(|| "Guest".into()),
            guest_last_name: str_field(guest, &["last_name", "lastName", "surname"])
                .unwrap_or_default(),
            guest_phone: str_field(guest, &["phone", "telephone"]),
            guest_country: str_field(guest, &["country", "country_code"]),
        })
    }
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value.get(*key).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    })
}

fn date_field(value: &Value, keys: &[&str]) -> Option<NaiveDate> {
    str_field(value, keys).and_then(|s| s.parse().ok())
}

fn num_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        value.get(*key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    })
}

/// Outcome of ingesting one booking payload.
#[derive(Debug)]
pub enum IngestOutcome {
    /// A new reservation was created.
    Created { reservation_id: uuid::Uuid },
    /// An existing reservation was updated in place.
    Updated { reservation_id: uuid::Uuid },
    /// The booking failed and was held in error state.
    Failed {
        remote_booking_id: Option<String>,
        error: ChannelError,
    },
}

/// Filters for a bookings pull.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Stay-date window (inclusive).
    pub stay_from: Option<NaiveDate>,
    pub stay_to: Option<NaiveDate>,
    /// Only bookings modified at or after this instant.
    pub modified_since: Option<chrono::DateTime<chrono::Utc>>,
    /// Provider-side status filter (e.g. "confirmed", "cancelled").
    pub status: Option<String>,
}

impl BookingFilter {
    fn to_query(&self) -> String {
        let mut params = Vec::new();
        if let Some(from) = self.stay_from {
            params.push(format!("stay_from={from}"));
        }
        if let Some(to) = self.stay_to {
            params.push(format!("stay_to={to}"));
        }
        if let Some(since) = self.modified_since {
            params.push(format!("modified_since={}", since.to_rfc3339()));
        }
        if let Some(status) = &self.status {
            params.push(format!("status={status}"));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// Provider response shape for a bookings pull.
#[derive(Debug, Deserialize)]
struct BookingsPage {
    #[serde(default, alias = "items")]
    bookings: Vec<Value>,
}

/// Ingests inbound bookings for one provider.
pub struct BookingIngestor {
    store: Arc<dyn ChannelStore>,
}

impl BookingIngestor {
    #[must_use]
    pub fn new(store: Arc<dyn ChannelStore>) -> Self {
        Self { store }
    }

    /// Ingest one raw booking payload.
    ///
    /// The payload is recorded before processing; parse, mapping, and
    /// persistence failures mark the recorded row as errored and come back
    /// as [`IngestOutcome::Failed`] rather than an `Err`. Only store
    /// failures that prevent even recording the receipt surface as errors.
    #[instrument(skip(self, connection, raw), fields(connection_id = %connection.id))]
    pub async fn ingest(
        &self,
        connection: &ConnectionHandle,
        raw: &Value,
    ) -> ChannelResult<IngestOutcome> {
        let Some(remote_booking_id) = RemoteBooking::extract_id(raw) else {
            // Nothing to key the receipt on; the payload is unusable.
            warn!("Dropping inbound payload with no booking id");
            return Ok(IngestOutcome::Failed {
                remote_booking_id: None,
                error: ChannelError::Processing("payload carries no booking id".into()),
            });
        };

        let inbound = self
            .store
            .record_inbound(
                connection.hotel_id.into_uuid(),
                connection.id.into_uuid(),
                &remote_booking_id,
                raw,
            )
            .await?;

        match self.process(connection, raw).await {
            Ok((reservation_id, created)) => {
                self.store
                    .mark_inbound_processed(inbound.id, reservation_id)
                    .await?;
                info!(%remote_booking_id, %reservation_id, created, "Booking ingested");
                if created {
                    Ok(IngestOutcome::Created { reservation_id })
                } else {
                    Ok(IngestOutcome::Updated { reservation_id })
                }
            }
            Err(error) => {
                warn!(%remote_booking_id, %error, "Booking ingest failed, held for retry");
                self.store
                    .mark_inbound_error(inbound.id, &error.to_string())
                    .await?;
                Ok(IngestOutcome::Failed {
                    remote_booking_id: Some(remote_booking_id),
                    error,
                })
            }
        }
    }

    /// Pull bookings matching the filter and ingest each one independently.
    pub async fn pull_bookings(
        &self,
        client: &ChannelClient,
        connection: &ConnectionHandle,
        filter: &BookingFilter,
    ) -> ChannelResult<Vec<IngestOutcome>> {
        let path = format!("/bookings{}", filter.to_query());
        let page = client
            .get::<BookingsPage>(connection, OperationClass::Bookings, &path)
            .await?;

        let mut outcomes = Vec::with_capacity(page.body.bookings.len());
        for raw in &page.body.bookings {
            outcomes.push(self.ingest(connection, raw).await?);
        }
        Ok(outcomes)
    }

    async fn process(
        &self,
        connection: &ConnectionHandle,
        raw: &Value,
    ) -> ChannelResult<(uuid::Uuid, bool)> {
        let booking = RemoteBooking::from_value(raw)?;

        let mapping = self
            .store
            .find_mapping(
                connection.id.into_uuid(),
                &booking.remote_room_id,
                booking.remote_rate_id.as_deref(),
            )
            .await?;
        let mapping = match mapping {
            Some(mapping) => mapping,
            None => self
                .store
                .find_default_mapping(connection.id.into_uuid())
                .await?
                .ok_or_else(|| {
                    ChannelError::Mapping(format!(
                        "no mapping for remote room {} and no default configured",
                        booking.remote_room_id
                    ))
                })?,
        };

        let guest = self
            .store
            .upsert_guest(&UpsertGuest {
                hotel_id: connection.hotel_id.into_uuid(),
                email: booking.guest_email.clone(),
                first_name: booking.guest_first_name.clone(),
                last_name: booking.guest_last_name.clone(),
                phone: booking.guest_phone.clone(),
                country: booking.guest_country.clone(),
            })
            .await?;

        let (reservation, created) = self
            .store
            .upsert_reservation(&UpsertReservation {
                hotel_id: connection.hotel_id.into_uuid(),
                remote_booking_id: booking.remote_booking_id.clone(),
                guest_id: guest.id,
                room_type_id: mapping.room_type_id,
                rate_plan_id: mapping.rate_plan_id,
                check_in: booking.check_in,
                check_out: booking.check_out,
                total_amount: booking.total_amount,
                currency: booking.currency.clone(),
                status: booking.status.clone(),
            })
            .await?;

        Ok((reservation.id, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "booking_id": "BK-1001",
            "room_id": "DBL",
            "rate_id": "BAR",
            "check_in": "2024-07-10",
            "check_out": "2024-07-12",
            "status": "confirmed",
            "total_amount": 240.0,
            "currency": "EUR",
            "guest": {
                "email": "ada@example.com",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "phone": "+44 20 7946 0000"
            }
        })
    }

    #[test]
    fn test_parse_full_payload() {
        let booking = RemoteBooking::from_value(&payload()).unwrap();

        assert_eq!(booking.remote_booking_id, "BK-1001");
        assert_eq!(booking.remote_room_id, "DBL");
        assert_eq!(booking.remote_rate_id.as_deref(), Some("BAR"));
        assert_eq!(booking.check_in.to_string(), "2024-07-10");
        assert_eq!(booking.check_out.to_string(), "2024-07-12");
        assert_eq!(booking.total_amount, Some(240.0));
        assert_eq!(booking.guest_email, "ada@example.com");
        assert_eq!(booking.guest_last_name, "Lovelace");
    }

    #[test]
    fn test_parse_camel_case_flat_guest() {
        let booking = RemoteBooking::from_value(&json!({
            "bookingId": 42,
            "roomId": "TWN",
            "checkIn": "2024-08-01",
            "checkOut": "2024-08-03",
            "email": "g@example.com",
            "firstName": "Grace"
        }))
        .unwrap();

        assert_eq!(booking.remote_booking_id, "42");
        assert_eq!(booking.remote_room_id, "TWN");
        assert_eq!(booking.guest_first_name, "Grace");
        // Omitted status defaults to confirmed.
        assert_eq!(booking.status, "confirmed");
    }

    #[test]
    fn test_extract_id_survives_bad_payload() {
        let raw = json!({ "id": "BK-9", "check_in": "not a date" });
        assert_eq!(RemoteBooking::extract_id(&raw).as_deref(), Some("BK-9"));
        assert!(RemoteBooking::from_value(&raw).is_err());
    }

    #[test]
    fn test_rejects_inverted_stay() {
        let mut raw = payload();
        raw["check_in"] = json!("2024-07-12");
        raw["check_out"] = json!("2024-07-10");

        let err = RemoteBooking::from_value(&raw).unwrap_err();
        assert!(matches!(err, ChannelError::Processing(_)));
    }

    #[test]
    fn test_rejects_missing_email() {
        let mut raw = payload();
        raw["guest"] = json!({ "first_name": "Ada" });
        assert!(RemoteBooking::from_value(&raw).is_err());
    }

    #[test]
    fn test_missing_id_yields_none() {
        assert!(RemoteBooking::extract_id(&json!({ "room_id": "DBL" })).is_none());
    }

    #[test]
    fn test_filter_query_string() {
        assert_eq!(BookingFilter::default().to_query(), "");

        let filter = BookingFilter {
            stay_from: Some("2024-07-01".parse().unwrap()),
            stay_to: Some("2024-07-31".parse().unwrap()),
            modified_since: None,
            status: Some("confirmed".into()),
        };
        assert_eq!(
            filter.to_query(),
            "?stay_from=2024-07-01&stay_to=2024-07-31&status=confirmed"
        );
    }
}
