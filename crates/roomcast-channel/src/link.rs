//! Account linking.
//!
//! Establishes a connection to a remote channel account from a one-time
//! setup code: exchanges the code for credentials, persists the connection
//! (re-linking the same remote account updates it in place), and fetches the
//! remote property list so the caller can establish room mappings.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use roomcast_core::HotelId;
use roomcast_db::models::{ChannelConnection, CreateConnection, RoomMapping, UpsertRoomMapping};

use crate::client::ChannelClient;
use crate::error::{ChannelError, ChannelResult};
use crate::store::{ChannelStore, ConnectionHandle};
use crate::token::{OperationClass, TokenManager};

/// One remote room/rate product available for mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProperty {
    #[serde(alias = "propertyId")]
    pub property_id: String,
    #[serde(alias = "roomId")]
    pub room_id: String,
    #[serde(default, alias = "rateId")]
    pub rate_id: Option<String>,
    #[serde(default, alias = "roomName")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyPage {
    #[serde(default, alias = "items", alias = "rooms")]
    properties: Vec<RemoteProperty>,
}

/// Outcome of linking a channel account.
#[derive(Debug)]
pub struct LinkResult {
    pub connection: ChannelConnection,
    /// Remote products the account exposes; the caller maps these to local
    /// room types via [`AccountLinker::map_room`].
    pub properties: Vec<RemoteProperty>,
}

/// Links channel accounts and establishes room mappings.
pub struct AccountLinker {
    client: Arc<ChannelClient>,
    tokens: Arc<TokenManager>,
    store: Arc<dyn ChannelStore>,
}

impl AccountLinker {
    #[must_use]
    pub fn new(
        client: Arc<ChannelClient>,
        tokens: Arc<TokenManager>,
        store: Arc<dyn ChannelStore>,
    ) -> Self {
        Self {
            client,
            tokens,
            store,
        }
    }

    /// Link a hotel to a remote account using a one-time setup code.
    ///
    /// Linking the same remote account twice re-links it: credentials are
    /// replaced and the connection returns to active.
    #[instrument(skip(self, setup_code), fields(hotel_id = %hotel_id))]
    pub async fn link(&self, hotel_id: HotelId, setup_code: &str) -> ChannelResult<LinkResult> {
        let grant = self.tokens.exchange_setup_code(setup_code).await?;

        let remote_account_id = grant.remote_account_id.clone().ok_or_else(|| {
            ChannelError::Auth("setup-code exchange returned no account id".into())
        })?;
        let refresh_credential = grant
            .refresh_credential
            .clone()
            .ok_or_else(|| ChannelError::Auth("setup-code exchange returned no refresh credential".into()))?;

        let connection = self
            .store
            .create_connection(&CreateConnection {
                hotel_id: hotel_id.into_uuid(),
                remote_account_id,
                refresh_credential,
                access_token: Some(grant.access_token.clone()),
                token_expires_at: Some(grant.expires_at),
                scopes: grant.scopes.clone(),
            })
            .await?;

        let handle = ConnectionHandle::from(&connection);
        let properties = self.fetch_properties(&handle).await?;

        info!(
            connection_id = %connection.id,
            remote_account = %connection.remote_account_id,
            properties = properties.len(),
            "Channel account linked"
        );
        Ok(LinkResult {
            connection,
            properties,
        })
    }

    /// Unlink a connection: it is disabled in the store and its cached
    /// tokens are dropped. A later [`link`](AccountLinker::link) with a
    /// fresh setup code re-activates the same remote account.
    pub async fn unlink(&self, connection: &ConnectionHandle) -> ChannelResult<()> {
        self.store.disable_connection(connection.id.into_uuid()).await?;
        self.tokens
            .invalidate(connection.id.into_uuid(), OperationClass::Ari)
            .await;
        self.tokens
            .invalidate(connection.id.into_uuid(), OperationClass::Bookings)
            .await;
        self.tokens
            .invalidate(connection.id.into_uuid(), OperationClass::Setup)
            .await;
        info!(connection_id = %connection.id, "Channel account unlinked");
        Ok(())
    }

    /// Fetch the remote property list for an already linked connection.
    pub async fn fetch_properties(
        &self,
        connection: &ConnectionHandle,
    ) -> ChannelResult<Vec<RemoteProperty>> {
        let page = self
            .client
            .get::<PropertyPage>(connection, OperationClass::Setup, "/properties")
            .await?;
        Ok(page.body.properties)
    }

    /// Map a remote product onto a local room type (and optional rate plan).
    pub async fn map_room(
        &self,
        connection: &ConnectionHandle,
        property: &RemoteProperty,
        room_type_id: uuid::Uuid,
        rate_plan_id: Option<uuid::Uuid>,
        is_default: bool,
    ) -> ChannelResult<RoomMapping> {
        self.store
            .upsert_mapping(&UpsertRoomMapping {
                hotel_id: connection.hotel_id.into_uuid(),
                connection_id: connection.id.into_uuid(),
                room_type_id,
                rate_plan_id,
                remote_property_id: property.property_id.clone(),
                remote_room_id: property.room_id.clone(),
                remote_rate_id: property.rate_id.clone(),
                is_default,
            })
            .await
    }
}
