//! Genesis Database Layer
//!
//! Storage integration for the smart-contract execution engine. The engine
//! talks to storage only through the SPI in [`spi`]: a [`spi::Datastore`]
//! hands out serializable transactions ([`spi::StoreTx`]) that expose
//! structured select/insert/update/delete, the `next_id` primitive, and
//! table DDL for the ecosystem bootstrap path.
//!
//! Two backends implement the SPI:
//! - [`memory::MemoryDatastore`] - single-writer in-memory store; the unit
//!   of isolation is the whole store, which matches the engine's
//!   serial-within-block execution model.
//! - `postgres::PgDatastore` (feature `postgres`) - relational backend.

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod schema;
pub mod seed;
pub mod spi;

pub use error::{DbError, DbResult};
pub use memory::MemoryDatastore;
#[cfg(feature = "postgres")]
pub use postgres::PgDatastore;
pub use spi::{row, Datastore, Row, SelectQuery, StoreTx};
