use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// Rows of one output table, every row tagged with the filing it came from.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSet {
    pub name: String,
    /// Columns that identify a row; the sink enforces uniqueness over them.
    pub unique_keys: Vec<String>,
    pub rows: Vec<Row>,
}

impl RecordSet {
    pub fn new(name: &str, unique_keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            unique_keys: unique_keys.iter().map(|k| k.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Serializes `rows` and adds a `filing_id` column to each.
    pub fn from_rows<T: Serialize>(
        name: &str,
        unique_keys: &[&str],
        filing_id: &str,
        rows: impl IntoIterator<Item = T>,
    ) -> serde_json::Result<Self> {
        let mut set = Self::new(name, unique_keys);
        for row in rows {
            let mut map = match serde_json::to_value(row)? {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            };
            map.insert("filing_id".to_string(), Value::String(filing_id.to_string()));
            set.rows.push(map);
        }
        Ok(set)
    }

    /// Every column used by any row, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for key in self.rows.iter().flat_map(|r| r.keys()) {
            if !columns.contains(&key.as_str()) {
                columns.push(key.as_str());
            }
        }
        columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Destination for extracted record sets.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Configuration type specific to this sink
    type Config;

    async fn new(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Creates or widens each table as needed and inserts the rows, ignoring
    /// rows that collide with an existing unique key. Either every set is
    /// written or none is. Returns rows inserted.
    async fn write_all(&self, sets: &[RecordSet]) -> Result<u64>;

    async fn write(&self, set: &RecordSet) -> Result<u64> {
        self.write_all(std::slice::from_ref(set)).await
    }

    async fn count(&self, table: &str) -> Result<u64>;
}

pub mod sqlite;

pub use self::sqlite::{SqliteConfig, SqliteSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        concept: &'static str,
        order: Option<f64>,
    }

    #[test]
    fn test_rows_are_tagged_with_filing_id() {
        let set = RecordSet::from_rows(
            "edges",
            &["filing_id", "concept"],
            "081220230512582935",
            vec![
                Sample { concept: "NetSales", order: Some(1.0) },
                Sample { concept: "OperatingIncome", order: None },
            ],
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.rows[0]["filing_id"], "081220230512582935");
        assert_eq!(set.rows[1]["order"], Value::Null);
        let mut columns = set.columns();
        columns.sort();
        assert_eq!(columns, vec!["concept", "filing_id", "order"]);
    }
}
