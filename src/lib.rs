//! Nearest-neighbor lookups against a document store with a geospatial
//! index.
//!
//! [`query::NearestQuery`] describes a "records nearest to a point" query
//! and its post-processing. Any [`store::DocumentStore`] can run it: the
//! RethinkDB client in [`store::RethinkStore`] or the in-process
//! [`store::MemoryStore`]. [`demo`] drives the end-to-end walkthrough.

#[macro_use]
mod macros;

pub mod config;
pub mod demo;
pub mod error;
pub mod geo;
pub mod net;
pub mod query;
pub mod record;
pub mod reql;
pub mod store;

pub use config::{Config, ConnectOpts, Readiness, Schema};
pub use error::{Error, Result};
pub use geo::{Point, Unit};
pub use query::NearestQuery;
pub use record::{Record, RecordWithDistance};
pub use store::{DocumentStore, MemoryStore, RethinkStore};
