//! Booking ingest behavior: idempotency, mapping fallback, and
//! failure-as-data semantics.

mod helpers;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{connection_handle, mapping_for, InMemoryStore};
use roomcast_channel::client::ChannelClient;
use roomcast_channel::config::ChannelConfig;
use roomcast_channel::error::ChannelError;
use roomcast_channel::ingest::{BookingFilter, BookingIngestor, IngestOutcome};
use roomcast_channel::store::ChannelStore;
use roomcast_channel::token::TokenManager;
use roomcast_db::models::ProcessingStatus;

fn booking(id: &str, room: &str) -> serde_json::Value {
    json!({
        "booking_id": id,
        "room_id": room,
        "rate_id": "BAR",
        "check_in": "2024-07-10",
        "check_out": "2024-07-12",
        "status": "confirmed",
        "total_amount": 240.0,
        "currency": "EUR",
        "guest": {
            "email": "ada@example.com",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }
    })
}

#[tokio::test]
async fn test_ingest_creates_reservation_and_guest() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();
    let mapping = store.add_mapping(mapping_for(&connection));

    let outcome = ingestor
        .ingest(&connection, &booking("BK-1", "DBL"))
        .await
        .unwrap();

    let IngestOutcome::Created { reservation_id } = outcome else {
        panic!("expected created outcome, got {outcome:?}");
    };

    let reservations = store.reservations.lock().unwrap();
    let reservation = reservations
        .get(&(connection.hotel_id.into_uuid(), "BK-1".to_string()))
        .unwrap();
    assert_eq!(reservation.id, reservation_id);
    assert_eq!(reservation.room_type_id, mapping.room_type_id);
    assert_eq!(reservation.total_amount, Some(240.0));
    drop(reservations);

    let guests = store.guests.lock().unwrap();
    assert!(guests.contains_key(&(connection.hotel_id.into_uuid(), "ada@example.com".to_string())));
    drop(guests);

    assert_eq!(
        store.inbound_status(connection.id.into_uuid(), "BK-1"),
        ProcessingStatus::Processed
    );
}

#[tokio::test]
async fn test_redelivery_updates_in_place() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();
    store.add_mapping(mapping_for(&connection));

    let first = ingestor
        .ingest(&connection, &booking("BK-1", "DBL"))
        .await
        .unwrap();
    assert!(matches!(first, IngestOutcome::Created { .. }));

    // Correction arrives: same booking id, changed amount, and the guest
    // now carries a phone number.
    let mut corrected = booking("BK-1", "DBL");
    corrected["total_amount"] = json!(300.0);
    corrected["guest"]["phone"] = json!("+44 20 7946 0000");
    let second = ingestor.ingest(&connection, &corrected).await.unwrap();
    assert!(matches!(second, IngestOutcome::Updated { .. }));

    let reservations = store.reservations.lock().unwrap();
    assert_eq!(reservations.len(), 1);
    let reservation = reservations
        .get(&(connection.hotel_id.into_uuid(), "BK-1".to_string()))
        .unwrap();
    assert_eq!(reservation.total_amount, Some(300.0));
    drop(reservations);

    // Guest profile enriched in place, not duplicated.
    let guests = store.guests.lock().unwrap();
    assert_eq!(guests.len(), 1);
    let guest = guests
        .get(&(connection.hotel_id.into_uuid(), "ada@example.com".to_string()))
        .unwrap();
    assert_eq!(guest.phone.as_deref(), Some("+44 20 7946 0000"));
}

#[tokio::test]
async fn test_unmapped_room_falls_back_to_default_mapping() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();

    let mut fallback = mapping_for(&connection);
    fallback.remote_room_id = "OTHER".into();
    fallback.is_default = true;
    let fallback = store.add_mapping(fallback);

    let outcome = ingestor
        .ingest(&connection, &booking("BK-2", "UNKNOWN"))
        .await
        .unwrap();
    assert!(matches!(outcome, IngestOutcome::Created { .. }));

    let reservations = store.reservations.lock().unwrap();
    let reservation = reservations
        .get(&(connection.hotel_id.into_uuid(), "BK-2".to_string()))
        .unwrap();
    assert_eq!(reservation.room_type_id, fallback.room_type_id);
}

#[tokio::test]
async fn test_unmapped_room_without_default_is_held_in_error() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();

    let outcome = ingestor
        .ingest(&connection, &booking("BK-3", "UNKNOWN"))
        .await
        .unwrap();

    let IngestOutcome::Failed {
        remote_booking_id,
        error,
    } = outcome
    else {
        panic!("expected failed outcome");
    };
    assert_eq!(remote_booking_id.as_deref(), Some("BK-3"));
    assert!(matches!(error, ChannelError::Mapping(_)));

    // The raw payload is held for operator retry, not lost.
    assert_eq!(
        store.inbound_status(connection.id.into_uuid(), "BK-3"),
        ProcessingStatus::Error
    );
    assert!(store.reservations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_payload_is_recorded_before_failing() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();
    store.add_mapping(mapping_for(&connection));

    let raw = json!({ "booking_id": "BK-4", "room_id": "DBL", "check_in": "garbage" });
    let outcome = ingestor.ingest(&connection, &raw).await.unwrap();

    assert!(matches!(outcome, IngestOutcome::Failed { .. }));
    assert_eq!(
        store.inbound_status(connection.id.into_uuid(), "BK-4"),
        ProcessingStatus::Error
    );
    let inbound = store.inbound.lock().unwrap();
    let row = inbound
        .get(&(connection.id.into_uuid(), "BK-4".to_string()))
        .unwrap();
    assert_eq!(row.raw_payload, raw);
    assert!(row.error_message.is_some());
}

#[tokio::test]
async fn test_payload_without_id_is_dropped() {
    let store = Arc::new(InMemoryStore::new());
    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();

    let outcome = ingestor
        .ingest(&connection, &json!({ "room_id": "DBL" }))
        .await
        .unwrap();

    let IngestOutcome::Failed {
        remote_booking_id, ..
    } = outcome
    else {
        panic!("expected failed outcome");
    };
    assert!(remote_booking_id.is_none());
    assert!(store.inbound.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pull_ingests_each_booking_independently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bookings": [
                booking("BK-10", "DBL"),
                // Unparseable: no dates.
                { "booking_id": "BK-11", "room_id": "DBL" },
                booking("BK-12", "DBL"),
            ]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let config = ChannelConfig::for_testing(
        server.uri(),
        format!("{}/oauth/token", server.uri()),
    );
    let tokens = Arc::new(TokenManager::new(
        reqwest::Client::new(),
        config.token_url.clone(),
        Arc::clone(&store) as Arc<dyn ChannelStore>,
    ));
    let client =
        ChannelClient::new(config, tokens, Arc::clone(&store) as Arc<dyn ChannelStore>).unwrap();

    let ingestor = BookingIngestor::new(Arc::clone(&store) as Arc<dyn ChannelStore>);
    let connection = connection_handle();
    store.add_mapping(mapping_for(&connection));

    let outcomes = ingestor
        .pull_bookings(&client, &connection, &BookingFilter::default())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0], IngestOutcome::Created { .. }));
    assert!(matches!(outcomes[1], IngestOutcome::Failed { .. }));
    assert!(matches!(outcomes[2], IngestOutcome::Created { .. }));
    assert_eq!(store.reservations.lock().unwrap().len(), 2);
}
