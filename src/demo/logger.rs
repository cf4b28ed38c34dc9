use std::{fs::File, path::Path};

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;

use crate::record::{Record, RecordWithDistance};

/// One query row flattened for CSV output.
#[derive(Debug, Clone, Serialize)]
struct ResultRecord {
    mode: String,
    name: String,
    id: String,
    longitude: f64,
    latitude: f64,
    distance: Option<f64>,
    queried_at: String,
}

/// Collects the rows of one query and writes them out as CSV.
pub struct ResultLogger {
    mode: String,
    queried_at: DateTime<Utc>,
    records: Vec<ResultRecord>,
}

/// Anything a query can return that can be flattened into a CSV row.
pub trait LoggableRow {
    fn record(&self) -> &Record;

    fn distance(&self) -> Option<f64> {
        None
    }
}

impl LoggableRow for Record {
    fn record(&self) -> &Record {
        self
    }
}

impl LoggableRow for RecordWithDistance {
    fn record(&self) -> &Record {
        &self.doc
    }

    fn distance(&self) -> Option<f64> {
        Some(self.dist)
    }
}

impl ResultLogger {
    pub fn new(mode: impl Into<String>) -> Self {
        ResultLogger {
            mode: mode.into(),
            queried_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn add_record<R: LoggableRow>(&mut self, row: &R) {
        let record = row.record();
        self.records.push(ResultRecord {
            mode: self.mode.clone(),
            name: record.name.clone(),
            id: record.id.clone().unwrap_or_default(),
            longitude: record.area.lon,
            latitude: record.area.lat,
            distance: row.distance(),
            queried_at: self.queried_at.to_rfc3339(),
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_to_csv(&self, file_path: impl AsRef<Path>) -> Result<(), csv::Error> {
        let file = File::create(file_path)?;
        let mut writer = Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Point;

    #[test]
    fn test_write_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("with_distances.csv");

        let mut logger = ResultLogger::new("with_distances");
        let mut doc = Record::new("first", Point::new(-122.423246, 37.77929790366427));
        doc.id = Some("52d34203".into());
        logger.add_record(&RecordWithDistance { dist: 0.5, doc });
        logger.add_record(&Record::new("second", Point::new(1.0, 2.0)));
        assert_eq!(logger.len(), 2);

        logger.write_to_csv(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines[0],
            "mode,name,id,longitude,latitude,distance,queried_at"
        );
        assert!(lines[1].starts_with("with_distances,first,52d34203,-122.423246,37.77929790366427,0.5,"));
        assert!(lines[2].starts_with("with_distances,second,,1.0,2.0,,"));
    }

    #[test]
    fn test_empty_logger_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let logger = ResultLogger::new("empty");
        assert!(logger.is_empty());
        logger.write_to_csv(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
