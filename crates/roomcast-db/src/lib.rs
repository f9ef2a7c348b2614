//! Postgres persistence layer for the roomcast channel-manager engine.
//!
//! One model file per entity; queries live as inherent `async fn`s on the
//! model types and take a `&PgPool`. All channel state is scoped by hotel and
//! upserted by natural key, so every write is safe under at-least-once
//! delivery.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
