#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use geonear::{
        demo::{self, await_row_count, load_records, run_query, setup_schema, Outcome, QueryMode},
        record::seed_records,
        Config, DocumentStore, Error, MemoryStore, NearestQuery, Readiness, Record,
        RecordWithDistance, Schema,
    };
    use serde_json::Value;

    fn schema() -> Schema {
        Schema::new("test", "geospatial_it", "area")
    }

    fn readiness() -> Readiness {
        Readiness {
            timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            step_delay: Duration::ZERO,
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        assert!(setup_schema(&store, &schema(), &readiness()).await.is_complete());
        assert!(load_records(&store, &schema(), &seed_records()).await.is_complete());
        store
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Fault {
        Drop,
        CreateTable,
        CreateIndex,
        NeverReady,
    }

    /// A `MemoryStore` with one schema step rigged to fail.
    struct FaultyStore {
        inner: MemoryStore,
        fault: Fault,
        queries: AtomicUsize,
    }

    impl FaultyStore {
        fn new(fault: Fault) -> Self {
            FaultyStore {
                inner: MemoryStore::new(),
                fault,
                queries: AtomicUsize::new(0),
            }
        }

        fn rigged(&self, fault: Fault, step: &str) -> geonear::Result<()> {
            if self.fault == fault {
                return Err(Error::Write(format!("{step} rejected")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for FaultyStore {
        async fn drop_table(&self, schema: &Schema) -> geonear::Result<()> {
            self.rigged(Fault::Drop, "drop")?;
            self.inner.drop_table(schema).await
        }

        async fn create_table(&self, schema: &Schema) -> geonear::Result<()> {
            self.rigged(Fault::CreateTable, "table create")?;
            self.inner.create_table(schema).await
        }

        async fn create_geo_index(&self, schema: &Schema) -> geonear::Result<()> {
            self.rigged(Fault::CreateIndex, "index create")?;
            self.inner.create_geo_index(schema).await
        }

        async fn wait_ready(&self, schema: &Schema) -> geonear::Result<()> {
            if self.fault == Fault::NeverReady {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.inner.wait_ready(schema).await
        }

        async fn list_tables(&self, schema: &Schema) -> geonear::Result<Vec<String>> {
            self.inner.list_tables(schema).await
        }

        async fn list_indexes(&self, schema: &Schema) -> geonear::Result<Vec<String>> {
            self.inner.list_indexes(schema).await
        }

        async fn insert(&self, schema: &Schema, record: &Record) -> geonear::Result<String> {
            self.inner.insert(schema, record).await
        }

        async fn count(&self, schema: &Schema) -> geonear::Result<usize> {
            self.inner.count(schema).await
        }

        async fn get_nearest(
            &self,
            schema: &Schema,
            query: &NearestQuery,
        ) -> geonear::Result<Vec<Value>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.get_nearest(schema, query).await
        }
    }

    fn quick_config() -> Config {
        Config {
            schema: schema(),
            readiness: Readiness {
                timeout: Duration::from_millis(100),
                ..readiness()
            },
            ..Config::default()
        }
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|record| record.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_with_distances_returns_all_sorted() {
        let store = seeded_store().await;
        let rows: Vec<RecordWithDistance> =
            run_query(&store, &schema(), &QueryMode::WithDistances)
                .await
                .into_result()
                .unwrap();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|row| row.dist >= 0.0));
        assert!(rows.windows(2).all(|pair| pair[0].dist <= pair[1].dist));
        assert_eq!(rows.last().unwrap().doc.name, "fifth");
        assert!(rows.iter().all(|row| row.doc.id.is_some()));
    }

    #[tokio::test]
    async fn test_docs_excludes_far_record_and_distance() {
        let store = seeded_store().await;
        let query = QueryMode::Docs.query();
        let raw = store.get_nearest(&schema(), &query).await.unwrap();
        assert_eq!(raw.len(), 4);
        assert!(raw.iter().all(|row| row.get("dist").is_none()));

        let records: Vec<Record> = run_query(&store, &schema(), &QueryMode::Docs)
            .await
            .into_result()
            .unwrap();
        let mut found = names(&records);
        found.sort();
        assert_eq!(found, vec!["first", "fourth", "second", "third"]);
    }

    #[tokio::test]
    async fn test_by_name_returns_one_record() {
        let store = seeded_store().await;
        let records: Vec<Record> =
            run_query(&store, &schema(), &QueryMode::ByName("first".into()))
                .await
                .into_result()
                .unwrap();
        assert_eq!(names(&records), vec!["first"]);
    }

    #[tokio::test]
    async fn test_schema_setup_is_repeatable() {
        let store = MemoryStore::new();
        let first = setup_schema(&store, &schema(), &readiness()).await;
        assert!(!first.into_result().unwrap().dropped_existing);
        load_records(&store, &schema(), &seed_records()).await;

        let second = setup_schema(&store, &schema(), &readiness()).await;
        assert!(second.into_result().unwrap().dropped_existing);

        assert_eq!(store.list_tables(&schema()).await.unwrap(), vec!["geospatial_it"]);
        assert_eq!(store.list_indexes(&schema()).await.unwrap(), vec!["area"]);
        assert_eq!(store.count(&schema()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_loading_twice_appends_with_fresh_ids() {
        let store = seeded_store().await;
        load_records(&store, &schema(), &seed_records()).await;
        assert_eq!(
            await_row_count(&store, &schema(), 10, &readiness()).await.unwrap(),
            10
        );

        let rows: Vec<RecordWithDistance> =
            run_query(&store, &schema(), &QueryMode::WithDistances)
                .await
                .into_result()
                .unwrap();
        assert_eq!(rows.len(), 10);

        let mut ids: Vec<String> = rows.iter().filter_map(|row| row.doc.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        for name in ["first", "second", "third", "fourth", "fifth"] {
            assert_eq!(rows.iter().filter(|row| row.doc.name == name).count(), 2);
        }
    }

    #[tokio::test]
    async fn test_empty_table_is_complete_not_failed() {
        let store = MemoryStore::new();
        setup_schema(&store, &schema(), &readiness()).await;

        let outcome: Outcome<Vec<RecordWithDistance>> =
            run_query(&store, &schema(), &QueryMode::WithDistances).await;
        assert!(outcome.is_complete());
        assert!(outcome.value().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_on_missing_table_fails() {
        let store = MemoryStore::new();
        let outcome: Outcome<Vec<Record>> = run_query(&store, &schema(), &QueryMode::Docs).await;
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_partial_load_keeps_good_records() {
        let store = MemoryStore::new();
        setup_schema(&store, &schema(), &readiness()).await;

        let mut records = seed_records();
        records[2].area.lat = 95.0;
        match load_records(&store, &schema(), &records).await {
            Outcome::Partial { value, errors } => {
                assert_eq!(value.len(), 4);
                assert_eq!(errors.len(), 1);
            }
            other => panic!("expected a partial load, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_row_count_times_out() {
        let store = seeded_store().await;
        let result = await_row_count(&store, &schema(), 6, &readiness()).await;
        assert!(matches!(result, Err(geonear::Error::NotReady(_))));
    }

    #[tokio::test]
    async fn test_full_run_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            schema: schema(),
            readiness: readiness(),
            csv_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };

        let store = MemoryStore::new();
        let report = demo::run(&store, &config).await.unwrap();
        assert!(report.schema.is_complete());
        assert_eq!(report.loaded.value().unwrap().len(), 5);
        assert_eq!(report.with_distances.value().unwrap().len(), 5);
        assert_eq!(report.docs.value().unwrap().len(), 4);
        assert_eq!(report.by_name.value().unwrap().len(), 1);

        let csv = std::fs::read_to_string(dir.path().join("by_name.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().starts_with("by_name,first,"));
    }

    #[tokio::test]
    async fn test_schema_failures_stop_the_run() {
        for fault in [Fault::CreateTable, Fault::CreateIndex, Fault::NeverReady] {
            let store = FaultyStore::new(fault);
            let result = demo::run(&store, &quick_config()).await;
            assert!(result.is_err());
            assert_eq!(store.queries.load(Ordering::SeqCst), 0);
            assert_eq!(store.inner.count(&schema()).await.unwrap_or(0), 0);
        }
    }

    #[tokio::test]
    async fn test_readiness_timeout_is_not_ready() {
        let store = FaultyStore::new(Fault::NeverReady);
        let result = demo::run(&store, &quick_config()).await;
        assert!(matches!(result, Err(Error::NotReady(_))));
    }

    #[tokio::test]
    async fn test_drop_failure_is_not_fatal() {
        let store = FaultyStore::new(Fault::Drop);

        let report = demo::run(&store, &quick_config()).await.unwrap();
        assert!(!report.schema.into_result().unwrap().dropped_existing);
        assert_eq!(store.queries.load(Ordering::SeqCst), 3);
        assert_eq!(report.by_name.value().unwrap().len(), 1);
    }
}
