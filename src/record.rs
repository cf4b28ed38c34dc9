use serde::{Deserialize, Serialize};

use crate::geo::Point;

/// A named location. `id` is generated by the store on insert and is never
/// sent with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub area: Point,
}

impl Record {
    pub fn new(name: impl Into<String>, area: Point) -> Self {
        Record {
            id: None,
            name: name.into(),
            area,
        }
    }
}

/// One row of a nearest query before projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordWithDistance {
    pub dist: f64,
    pub doc: Record,
}

/// Where the demo queries are centred.
pub const REFERENCE_POINT: Point = Point::new(-122.4153346282659, 37.77874812639591);

/// The fixed records loaded on every run.
pub fn seed_records() -> Vec<Record> {
    vec![
        Record::new("first", Point::new(-122.423246, 37.77929790366427)),
        Record::new("second", Point::new(-122.42326814543915, 37.77929963483801)),
        Record::new("third", Point::new(-122.4232894398445, 37.779304761831504)),
        Record::new("fourth", Point::new(-122.423246, 37.779478096334365)),
        Record::new("fifth", Point::new(-124.423246, 37.779478096334365)),
    ]
}
