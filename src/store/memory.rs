use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::Schema,
    error::{Error, Result},
    geo::Point,
    query::NearestQuery,
    record::Record,
};

use super::DocumentStore;

#[derive(Debug, Default)]
struct Table {
    documents: Vec<Value>,
    geo_indexes: BTreeSet<String>,
}

/// A document store that lives in process memory.
///
/// Nearest queries scan the whole table and rank by haversine distance, so
/// results agree with a real server to within rounding but nothing here is
/// meant to scale.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<(String, String), Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

fn key(schema: &Schema) -> (String, String) {
    (schema.database.clone(), schema.table.clone())
}

fn qualified(schema: &Schema) -> String {
    format!("{}.{}", schema.database, schema.table)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn drop_table(&self, schema: &Schema) -> Result<()> {
        match self.tables.lock().await.remove(&key(schema)) {
            Some(_) => Ok(()),
            None => Err(Error::NoSuchTable(qualified(schema))),
        }
    }

    async fn create_table(&self, schema: &Schema) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.contains_key(&key(schema)) {
            return Err(Error::TableExists(qualified(schema)));
        }
        tables.insert(key(schema), Table::default());
        Ok(())
    }

    async fn create_geo_index(&self, schema: &Schema) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let table = tables
            .get_mut(&key(schema))
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))?;
        if !table.geo_indexes.insert(schema.index.clone()) {
            return Err(Error::IndexExists(schema.index.clone()));
        }
        Ok(())
    }

    async fn wait_ready(&self, schema: &Schema) -> Result<()> {
        let tables = self.tables.lock().await;
        let table = tables
            .get(&key(schema))
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))?;
        if !table.geo_indexes.contains(&schema.index) {
            return Err(Error::NoSuchIndex {
                table: qualified(schema),
                index: schema.index.clone(),
            });
        }
        Ok(())
    }

    async fn list_tables(&self, schema: &Schema) -> Result<Vec<String>> {
        let tables = self.tables.lock().await;
        let mut names: Vec<String> = tables
            .keys()
            .filter(|(database, _)| *database == schema.database)
            .map(|(_, table)| table.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_indexes(&self, schema: &Schema) -> Result<Vec<String>> {
        let tables = self.tables.lock().await;
        let table = tables
            .get(&key(schema))
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))?;
        Ok(table.geo_indexes.iter().cloned().collect())
    }

    async fn insert(&self, schema: &Schema, record: &Record) -> Result<String> {
        if !record.area.is_valid() {
            return Err(Error::Write(format!(
                "{} is not a valid coordinate",
                record.area
            )));
        }

        let mut tables = self.tables.lock().await;
        let table = tables
            .get_mut(&key(schema))
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))?;

        let id = Uuid::new_v4().to_string();
        let mut document = serde_json::to_value(record)?;
        document["id"] = Value::String(id.clone());
        table.documents.push(document);

        debug!(table = %qualified(schema), %id, "stored document");
        Ok(id)
    }

    async fn count(&self, schema: &Schema) -> Result<usize> {
        let tables = self.tables.lock().await;
        tables
            .get(&key(schema))
            .map(|table| table.documents.len())
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))
    }

    async fn get_nearest(&self, schema: &Schema, query: &NearestQuery) -> Result<Vec<Value>> {
        query.validate()?;

        let tables = self.tables.lock().await;
        let table = tables
            .get(&key(schema))
            .ok_or_else(|| Error::NoSuchTable(qualified(schema)))?;
        let index = query.index_name(schema);
        if !table.geo_indexes.contains(index) {
            return Err(Error::NoSuchIndex {
                table: qualified(schema),
                index: index.to_string(),
            });
        }

        let center = query.center();
        let unit = query.unit_or_default();
        let max_dist = query.max_dist_or_default();

        let mut ranked: Vec<(OrderedFloat<f64>, &Value)> = table
            .documents
            .iter()
            .filter_map(|document| {
                let point: Point = serde_json::from_value(document.get(index)?.clone()).ok()?;
                let dist = center.haversine_distance(&point, unit);
                (dist <= max_dist).then_some((OrderedFloat(dist), document))
            })
            .collect();
        // Stable, so equal distances keep insertion order.
        ranked.sort_by_key(|(dist, _)| *dist);
        ranked.truncate(query.max_results_or_default());

        let rows = ranked
            .into_iter()
            .map(|(dist, document)| json!({ "dist": dist.into_inner(), "doc": document }))
            .collect();
        Ok(query.apply_stages(rows))
    }
}

#[cfg(test)]
mod tests {
    use crate::geo::Unit;

    use super::*;

    fn schema() -> Schema {
        Schema::new("test", "places", "area")
    }

    async fn ready_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(&schema()).await.unwrap();
        store.create_geo_index(&schema()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_drop_missing_table_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.drop_table(&schema()).await,
            Err(Error::NoSuchTable(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_table_and_index_are_rejected() {
        let store = ready_store().await;
        assert!(matches!(
            store.create_table(&schema()).await,
            Err(Error::TableExists(_))
        ));
        assert!(matches!(
            store.create_geo_index(&schema()).await,
            Err(Error::IndexExists(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_generates_distinct_ids() {
        let store = ready_store().await;
        let record = Record::new("a", Point::new(1.0, 1.0));
        let first = store.insert(&schema(), &record).await.unwrap();
        let second = store.insert(&schema(), &record).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.count(&schema()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_point() {
        let store = ready_store().await;
        let record = Record::new("nowhere", Point::new(0.0, 120.0));
        assert!(matches!(
            store.insert(&schema(), &record).await,
            Err(Error::Write(_))
        ));
        assert_eq!(store.count(&schema()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nearest_orders_bounds_and_limits() {
        let store = ready_store().await;
        for (name, lat) in [("far", 3.0), ("near", 1.0), ("mid", 2.0), ("out", 10.0)] {
            store
                .insert(&schema(), &Record::new(name, Point::new(0.0, lat)))
                .await
                .unwrap();
        }

        let query = NearestQuery::new(Point::new(0.0, 0.0))
            .max_dist(500.0)
            .unit(Unit::Kilometer)
            .max_results(2)
            .docs();
        let rows = store.get_nearest(&schema(), &query).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|row| row["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_nearest_requires_index() {
        let store = MemoryStore::new();
        store.create_table(&schema()).await.unwrap();
        let result = store
            .get_nearest(&schema(), &NearestQuery::new(Point::new(0.0, 0.0)))
            .await;
        assert!(matches!(result, Err(Error::NoSuchIndex { .. })));
    }
}
