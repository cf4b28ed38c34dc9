use async_trait::async_trait;
use serde_json::Value;

use crate::{config::Schema, error::Result, query::NearestQuery, record::Record};

pub mod memory;
pub mod rethink;

pub use memory::MemoryStore;
pub use rethink::RethinkStore;

/// The operations the demo needs from a document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Removes the table and everything in it.
    async fn drop_table(&self, schema: &Schema) -> Result<()>;

    async fn create_table(&self, schema: &Schema) -> Result<()>;

    /// Creates a geospatial index named `schema.index` over the field of
    /// the same name.
    async fn create_geo_index(&self, schema: &Schema) -> Result<()>;

    /// Blocks until the table and its index accept reads.
    async fn wait_ready(&self, schema: &Schema) -> Result<()>;

    async fn list_tables(&self, schema: &Schema) -> Result<Vec<String>>;

    async fn list_indexes(&self, schema: &Schema) -> Result<Vec<String>>;

    /// Stores one record and returns the key the store generated for it.
    async fn insert(&self, schema: &Schema, record: &Record) -> Result<String>;

    async fn count(&self, schema: &Schema) -> Result<usize>;

    /// Rows ordered nearest first, after the query's stages ran.
    async fn get_nearest(&self, schema: &Schema, query: &NearestQuery) -> Result<Vec<Value>>;
}
