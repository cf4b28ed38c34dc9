//! The demo pipeline: schema setup, loading the seed records and the three
//! nearest-neighbor queries, each step reporting an [`Outcome`].

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use crate::{
    config::{Config, Readiness, Schema},
    error::{Error, Result},
    geo::Unit,
    query::NearestQuery,
    record::{seed_records, Record, RecordWithDistance, REFERENCE_POINT},
    store::DocumentStore,
};

pub mod logger;
pub mod outcome;
pub mod printer;

pub use outcome::Outcome;

use logger::{LoggableRow, ResultLogger};

pub const MAX_RESULTS: usize = 1024;
pub const WIDE_RADIUS_MILES: f64 = 250.0;
pub const NARROW_RADIUS_MILES: f64 = 100.0;

/// The three ways the demo asks for nearby records.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryMode {
    /// Each match with its distance.
    WithDistances,
    /// Only the matched records.
    Docs,
    /// Matched records with the given name.
    ByName(String),
}

impl QueryMode {
    pub fn label(&self) -> &'static str {
        match self {
            QueryMode::WithDistances => "with_distances",
            QueryMode::Docs => "docs",
            QueryMode::ByName(_) => "by_name",
        }
    }

    pub fn query(&self) -> NearestQuery {
        let nearest = NearestQuery::new(REFERENCE_POINT)
            .max_results(MAX_RESULTS)
            .unit(Unit::Mile);
        match self {
            QueryMode::WithDistances => nearest.max_dist(WIDE_RADIUS_MILES),
            QueryMode::Docs => nearest.max_dist(NARROW_RADIUS_MILES).docs(),
            QueryMode::ByName(name) => nearest
                .max_dist(NARROW_RADIUS_MILES)
                .docs()
                .filter_eq("name", name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaReport {
    pub dropped_existing: bool,
}

/// What a full run produced, step by step.
#[derive(Debug)]
pub struct Report {
    pub schema: Outcome<SchemaReport>,
    pub loaded: Outcome<Vec<String>>,
    pub with_distances: Outcome<Vec<RecordWithDistance>>,
    pub docs: Outcome<Vec<Record>>,
    pub by_name: Outcome<Vec<Record>>,
}

/// Drops the table if present, then recreates it with its geo index and
/// waits until both are usable.
pub async fn setup_schema<S>(store: &S, schema: &Schema, readiness: &Readiness) -> Outcome<SchemaReport>
where
    S: DocumentStore + ?Sized,
{
    info!(table = %schema.table, index = %schema.index, "create table and index");

    let dropped_existing = match store.drop_table(schema).await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "nothing to drop");
            false
        }
    };

    if let Err(err) = store.create_table(schema).await {
        error!(error = %err, "cannot create table");
        return Outcome::Failed(err);
    }
    if let Err(err) = store.create_geo_index(schema).await {
        error!(error = %err, "cannot create index");
        return Outcome::Failed(err);
    }

    match timeout(readiness.timeout, store.wait_ready(schema)).await {
        Ok(Ok(())) => Outcome::Complete(SchemaReport { dropped_existing }),
        Ok(Err(err)) => Outcome::Failed(err),
        Err(_) => Outcome::Failed(Error::NotReady(format!(
            "index {} on {}",
            schema.index, schema.table
        ))),
    }
}

/// Inserts the records one by one. Failures are logged and skipped.
pub async fn load_records<S>(store: &S, schema: &Schema, records: &[Record]) -> Outcome<Vec<String>>
where
    S: DocumentStore + ?Sized,
{
    info!(count = records.len(), "insert records");

    let mut keys = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    for record in records {
        match store.insert(schema, record).await {
            Ok(key) => keys.push(key),
            Err(err) => {
                warn!(name = %record.name, error = %err, "cannot create record");
                errors.push(err);
            }
        }
    }

    match (keys.is_empty(), errors.is_empty()) {
        (_, true) => Outcome::Complete(keys),
        (true, false) => Outcome::Failed(errors.remove(0)),
        (false, false) => Outcome::Partial {
            value: keys,
            errors,
        },
    }
}

/// Polls the row count until at least `expected` rows are visible.
pub async fn await_row_count<S>(
    store: &S,
    schema: &Schema,
    expected: usize,
    readiness: &Readiness,
) -> Result<usize>
where
    S: DocumentStore + ?Sized,
{
    let deadline = Instant::now() + readiness.timeout;
    loop {
        let count = store.count(schema).await?;
        if count >= expected {
            return Ok(count);
        }
        if Instant::now() >= deadline {
            return Err(Error::NotReady(format!(
                "{expected} rows in {}, saw {count}",
                schema.table
            )));
        }
        sleep(readiness.poll_interval).await;
    }
}

/// Runs one query mode and decodes its rows. A failure is logged and
/// reported, never propagated.
pub async fn run_query<T, S>(store: &S, schema: &Schema, mode: &QueryMode) -> Outcome<Vec<T>>
where
    T: DeserializeOwned,
    S: DocumentStore + ?Sized,
{
    match mode.query().run(store, schema).await {
        Ok(rows) => Outcome::Complete(rows),
        Err(err) => {
            error!(mode = mode.label(), error = %err, "query failed");
            Outcome::Failed(err)
        }
    }
}

async fn pause(readiness: &Readiness) {
    if !readiness.step_delay.is_zero() {
        sleep(readiness.step_delay).await;
    }
}

fn report_rows<T>(mode: &QueryMode, outcome: &Outcome<Vec<T>>, csv_dir: Option<&Path>)
where
    T: Serialize + LoggableRow,
{
    let Some(rows) = outcome.value() else {
        return;
    };
    info!(mode = mode.label(), rows = rows.len(), "query finished");
    printer::print_rows(rows);

    if let Some(dir) = csv_dir {
        let mut logger = ResultLogger::new(mode.label());
        for row in rows {
            logger.add_record(row);
        }
        let path = dir.join(format!("{}.csv", mode.label()));
        if let Err(err) = logger.write_to_csv(&path) {
            warn!(path = %path.display(), error = %err, "could not write csv");
        }
    }
}

/// Runs the whole demo. Only a failed schema setup aborts the run; every
/// later step reports its outcome and the run carries on.
pub async fn run<S>(store: &S, config: &Config) -> Result<Report>
where
    S: DocumentStore + ?Sized,
{
    let schema = &config.schema;
    let readiness = &config.readiness;
    let csv_dir = config.csv_dir.as_deref();

    let (schema_outcome, elapsed) = measure_time!(setup_schema(store, schema, readiness).await);
    info!(?elapsed, "schema ready");
    let schema_outcome = match schema_outcome {
        Outcome::Failed(err) => return Err(err),
        other => other,
    };
    pause(readiness).await;

    let records = seed_records();
    let (loaded, elapsed) = measure_time!(load_records(store, schema, &records).await);
    info!(?elapsed, "records loaded");
    if let Some(keys) = loaded.value() {
        if let Err(err) = await_row_count(store, schema, keys.len(), readiness).await {
            warn!(error = %err, "rows not visible yet");
        }
    }
    pause(readiness).await;

    let mode = QueryMode::WithDistances;
    info!("get nearest records with distances");
    let with_distances = run_query::<RecordWithDistance, _>(store, schema, &mode).await;
    report_rows(&mode, &with_distances, csv_dir);
    pause(readiness).await;

    let mode = QueryMode::Docs;
    info!("get just the nearest records");
    let docs = run_query::<Record, _>(store, schema, &mode).await;
    report_rows(&mode, &docs, csv_dir);
    pause(readiness).await;

    let mode = QueryMode::ByName("first".to_string());
    info!("chain some additional filters");
    let by_name = run_query::<Record, _>(store, schema, &mode).await;
    report_rows(&mode, &by_name, csv_dir);

    Ok(Report {
        schema: schema_outcome,
        loaded,
        with_distances,
        docs,
        by_name,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_modes_share_one_primitive() {
        let terms: Vec<_> = [
            QueryMode::WithDistances,
            QueryMode::Docs,
            QueryMode::ByName("first".into()),
        ]
        .iter()
        .map(|mode| mode.query().to_term(&Schema::default()).into_json())
        .collect();

        assert_eq!(terms[0][0], 168);
        assert_eq!(terms[0][2]["max_dist"], json!(250.0));
        assert_eq!(terms[1][1][0][0], 168);
        assert_eq!(terms[1][1][0][2]["max_dist"], json!(100.0));
        assert_eq!(terms[2][1][0][1][0][0], 168);
        assert_eq!(terms[2][1][0][1][0][2]["unit"], "mi");
    }

    #[test]
    fn test_labels() {
        assert_eq!(QueryMode::WithDistances.label(), "with_distances");
        assert_eq!(QueryMode::ByName("x".into()).label(), "by_name");
    }
}
