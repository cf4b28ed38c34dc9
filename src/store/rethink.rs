use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::{ConnectOpts, Schema},
    error::{Error, Result},
    net::Connection,
    query::NearestQuery,
    record::Record,
    reql::Term,
};

use super::DocumentStore;

/// Summary the server returns for a write.
#[derive(Debug, Default, Deserialize)]
struct WriteSummary {
    #[serde(default)]
    inserted: u64,
    #[serde(default)]
    errors: u64,
    #[serde(default)]
    first_error: Option<String>,
    #[serde(default)]
    generated_keys: Vec<String>,
}

/// A store backed by a RethinkDB server.
pub struct RethinkStore {
    connection: Connection,
}

impl RethinkStore {
    pub async fn connect(opts: &ConnectOpts) -> Result<Self> {
        Ok(RethinkStore {
            connection: Connection::connect(opts).await?,
        })
    }

    pub async fn close(self) -> Result<()> {
        self.connection.close().await
    }

    async fn run_as<T: DeserializeOwned>(&self, term: &Term) -> Result<T> {
        let value = self.connection.run(term).await?;
        Ok(serde_json::from_value(value)?)
    }

    fn table(schema: &Schema) -> Term {
        Term::db(&schema.database).table(&schema.table)
    }
}

#[async_trait]
impl DocumentStore for RethinkStore {
    async fn drop_table(&self, schema: &Schema) -> Result<()> {
        let term = Term::db(&schema.database).table_drop(&schema.table);
        self.connection.run(&term).await?;
        Ok(())
    }

    async fn create_table(&self, schema: &Schema) -> Result<()> {
        let term = Term::db(&schema.database).table_create(&schema.table);
        self.connection.run(&term).await?;
        Ok(())
    }

    async fn create_geo_index(&self, schema: &Schema) -> Result<()> {
        let term = RethinkStore::table(schema).index_create(&schema.index, true);
        self.connection.run(&term).await?;
        Ok(())
    }

    async fn wait_ready(&self, schema: &Schema) -> Result<()> {
        let table = RethinkStore::table(schema);
        self.connection.run(&table.wait()).await?;
        self.connection.run(&table.index_wait(&schema.index)).await?;
        Ok(())
    }

    async fn list_tables(&self, schema: &Schema) -> Result<Vec<String>> {
        self.run_as(&Term::db(&schema.database).table_list()).await
    }

    async fn list_indexes(&self, schema: &Schema) -> Result<Vec<String>> {
        self.run_as(&RethinkStore::table(schema).index_list()).await
    }

    async fn insert(&self, schema: &Schema, record: &Record) -> Result<String> {
        let document = Term::datum(serde_json::to_value(record)?);
        let summary: WriteSummary = self
            .run_as(&RethinkStore::table(schema).insert(document))
            .await?;
        if summary.errors > 0 {
            return Err(Error::Write(
                summary
                    .first_error
                    .unwrap_or_else(|| format!("{} errors", summary.errors)),
            ));
        }
        debug!(inserted = summary.inserted, "insert acknowledged");
        summary
            .generated_keys
            .into_iter()
            .next()
            .or_else(|| record.id.clone())
            .ok_or_else(|| Error::protocol("insert acknowledged without a key"))
    }

    async fn count(&self, schema: &Schema) -> Result<usize> {
        self.run_as(&RethinkStore::table(schema).count()).await
    }

    async fn get_nearest(&self, schema: &Schema, query: &NearestQuery) -> Result<Vec<Value>> {
        match self.connection.run(&query.to_term(schema)).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::protocol(format!(
                "get_nearest returned a non-sequence: {other}"
            ))),
        }
    }
}
