use serde::Serialize;
use tracing::{info, warn};

/// Logs every row as indented JSON.
pub fn print_rows<T: Serialize>(rows: &[T]) {
    for row in rows {
        match serde_json::to_string_pretty(row) {
            Ok(json) => info!("\n{}", json),
            Err(err) => warn!(error = %err, "could not render row"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{seed_records, RecordWithDistance};

    #[test]
    fn test_print_rows_accepts_both_shapes() {
        let records = seed_records();
        print_rows(&records);

        let with_distance = vec![RecordWithDistance {
            dist: 0.43,
            doc: records[0].clone(),
        }];
        print_rows(&with_distance);
        print_rows::<RecordWithDistance>(&[]);
    }
}
