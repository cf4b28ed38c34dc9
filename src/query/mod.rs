use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    config::Schema,
    error::{Error, Result},
    geo::{Point, Unit},
    reql::Term,
    store::DocumentStore,
};

/// Server default for `max_results` when none is given.
pub const DEFAULT_MAX_RESULTS: usize = 100;
/// Server default for `max_dist` when none is given, in meters.
pub const DEFAULT_MAX_DIST_METERS: f64 = 100_000.0;

/// A step applied to the rows of a nearest query after the store has
/// ranked them.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Replace each row with one of its fields, dropping rows without it.
    Field(String),
    /// Keep the rows whose field equals the value.
    FilterEq { field: String, value: Value },
}

/// A "records nearest to a point" query plus its post-processing stages.
///
/// The same value can be compiled into a ReQL term for a remote store or
/// evaluated in-process, so every query mode is just a different chain of
/// builder calls:
///
/// ```ignore
/// let with_distances = NearestQuery::new(center).max_dist(250.0).unit(Unit::Mile);
/// let bare = with_distances.clone().docs();
/// let named = bare.clone().filter_eq("name", "first");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    center: Point,
    index: Option<String>,
    max_dist: Option<f64>,
    max_results: Option<usize>,
    unit: Option<Unit>,
    stages: Vec<Stage>,
}

impl NearestQuery {
    pub fn new(center: Point) -> Self {
        NearestQuery {
            center,
            index: None,
            max_dist: None,
            max_results: None,
            unit: None,
            stages: Vec::new(),
        }
    }

    /// Uses this index instead of the one named by the schema.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn max_dist(mut self, max_dist: f64) -> Self {
        self.max_dist = Some(max_dist);
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Field(field.into()));
        self
    }

    /// Drops the distance annotation and keeps only the documents.
    pub fn docs(self) -> Self {
        self.field("doc")
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.stages.push(Stage::FilterEq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn index_name<'a>(&'a self, schema: &'a Schema) -> &'a str {
        self.index.as_deref().unwrap_or(&schema.index)
    }

    pub fn unit_or_default(&self) -> Unit {
        self.unit.unwrap_or_default()
    }

    pub fn max_results_or_default(&self) -> usize {
        self.max_results.unwrap_or(DEFAULT_MAX_RESULTS)
    }

    /// The distance bound in the query's unit.
    pub fn max_dist_or_default(&self) -> f64 {
        self.max_dist
            .unwrap_or_else(|| self.unit_or_default().from_meters(DEFAULT_MAX_DIST_METERS))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Rejects arguments the store would refuse.
    pub fn validate(&self) -> Result<()> {
        if !self.center.is_valid() {
            return Err(Error::InvalidInput(format!(
                "{} is not a valid coordinate",
                self.center
            )));
        }
        let max_dist = self.max_dist_or_default();
        if !max_dist.is_finite() || max_dist <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "max_dist must be positive, got {max_dist}"
            )));
        }
        if self.max_results_or_default() == 0 {
            return Err(Error::InvalidInput("max_results must be at least 1".into()));
        }
        Ok(())
    }

    pub fn to_term(&self, schema: &Schema) -> Term {
        let mut optargs = Map::new();
        optargs.insert("index".into(), self.index_name(schema).into());
        if let Some(max_dist) = self.max_dist {
            optargs.insert("max_dist".into(), max_dist.into());
        }
        if let Some(max_results) = self.max_results {
            optargs.insert("max_results".into(), max_results.into());
        }
        if let Some(unit) = self.unit {
            optargs.insert("unit".into(), unit.as_str().into());
        }

        let table = Term::db(&schema.database).table(&schema.table);
        let mut term = table.get_nearest(self.center, optargs);
        for stage in &self.stages {
            term = match stage {
                Stage::Field(field) => term.get_field(field),
                Stage::FilterEq { field, value } => term.filter(Term::func1(
                    Term::var(1).get_field(field).eq(Term::datum(value.clone())),
                )),
            };
        }
        term
    }

    /// Runs the stages over rows already ranked by distance.
    pub fn apply_stages(&self, rows: Vec<Value>) -> Vec<Value> {
        self.stages.iter().fold(rows, |rows, stage| match stage {
            Stage::Field(field) => rows
                .into_iter()
                .filter_map(|mut row| row.get_mut(field.as_str()).map(Value::take))
                .collect(),
            Stage::FilterEq { field, value } => rows
                .into_iter()
                .filter(|row| row.get(field.as_str()) == Some(value))
                .collect(),
        })
    }

    /// Sends the query and decodes every row as `T`.
    pub async fn run<T, S>(&self, store: &S, schema: &Schema) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        S: DocumentStore + ?Sized,
    {
        store
            .get_nearest(schema, self)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(Error::from))
            .collect()
    }
}
