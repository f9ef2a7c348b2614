//! Channel-manager integration engine.
//!
//! Connects a property-management system to external distribution channels:
//! authenticates against the provider, pushes availability/rate/restriction
//! calendars, ingests inbound bookings, and reconciles local state against
//! the provider's view.
//!
//! The engine is organized around a handful of collaborators sharing a
//! [`store::ChannelStore`]:
//!
//! - [`link::AccountLinker`] exchanges a setup code and establishes mappings
//! - [`token::TokenManager`] caches and single-flight-refreshes access tokens
//! - [`client::ChannelClient`] executes rate-aware, retrying API calls
//! - [`ari`] compiles calendar deltas into span-merged, batched payloads
//! - [`push::PushExecutor`] drives batches out with partial-failure reporting
//! - [`ingest::BookingIngestor`] turns inbound payloads into reservations
//! - [`reconcile::ReconciliationEngine`] records local/remote divergence

pub mod ari;
pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod link;
pub mod push;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod token;
pub mod usage;

pub use client::{CallOutcome, ChannelClient};
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult};
pub use ingest::{BookingFilter, BookingIngestor, IngestOutcome, RemoteBooking};
pub use link::{AccountLinker, LinkResult, RemoteProperty};
pub use push::{PushExecutor, PushSummary};
pub use reconcile::{ReconciliationEngine, ReconciliationStats, SeverityPolicy};
pub use retry::RetryPolicy;
pub use store::{ChannelStore, ConnectionHandle, PgChannelStore};
pub use token::{OperationClass, TokenGrant, TokenManager};
pub use usage::UsageSnapshot;
