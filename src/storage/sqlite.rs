use std::collections::HashSet;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row as _;

use crate::storage::{RecordSet, RecordSink};

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `sqlite://path/to/file.db` or `sqlite::memory:`
    pub url: String,
    pub max_connections: u32,
}

impl SqliteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 4,
        }
    }
}

/// SQLite sink. Tables are created from the shape of the rows written to
/// them, so no migrations are involved.
pub struct SqliteSink {
    pool: SqlitePool,
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn column_type(value: Option<&Value>) -> &'static str {
    match value {
        Some(Value::Bool(_)) => "INTEGER",
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "INTEGER",
        Some(Value::Number(_)) => "REAL",
        _ => "TEXT",
    }
}

async fn existing_columns(conn: &mut SqliteConnection, table: &str) -> Result<HashSet<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", quote(table)))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter()
        .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
        .collect()
}

/// Creates the table on first sight and adds columns for new keys.
async fn ensure_schema(conn: &mut SqliteConnection, set: &RecordSet) -> Result<()> {
    let existing = existing_columns(conn, &set.name).await?;
    let first_value = |column: &str| {
        set.rows
            .iter()
            .filter_map(|r| r.get(column))
            .find(|v| !v.is_null())
    };

    if existing.is_empty() {
        let columns = set
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote(c), column_type(first_value(c))))
            .collect::<Vec<_>>()
            .join(", ");
        info!("Creating table {}", set.name);
        sqlx::query(&format!("CREATE TABLE IF NOT EXISTS {} ({})", quote(&set.name), columns))
            .execute(&mut *conn)
            .await?;
    } else {
        for column in set.columns().into_iter().filter(|c| !existing.contains(*c)) {
            debug!("Adding column {} to {}", column, set.name);
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote(&set.name),
                quote(column),
                column_type(first_value(column))
            ))
            .execute(&mut *conn)
            .await?;
        }
    }

    if !set.unique_keys.is_empty() {
        // NULLs never collide in a plain unique index, so key on ifnull().
        let keys = set
            .unique_keys
            .iter()
            .map(|k| format!("ifnull({}, '')", quote(k)))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("ux_{}", set.name)),
            quote(&set.name),
            keys
        ))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn insert_set(conn: &mut SqliteConnection, set: &RecordSet) -> Result<u64> {
    if set.is_empty() {
        return Ok(0);
    }
    ensure_schema(conn, set).await?;

    let columns = set.columns();
    let sql = format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
        quote(&set.name),
        columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        vec!["?"; columns.len()].join(", ")
    );

    let mut inserted = 0;
    for row in &set.rows {
        let mut query = sqlx::query(&sql);
        for column in &columns {
            query = match row.get(*column) {
                None | Some(Value::Null) => query.bind(None::<String>),
                Some(Value::Bool(b)) => query.bind(*b),
                Some(Value::Number(n)) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64()),
                },
                Some(Value::String(s)) => query.bind(s.clone()),
                Some(other) => query.bind(other.to_string()),
            };
        }
        inserted += query.execute(&mut *conn).await?.rows_affected();
    }

    debug!("Inserted {} of {} rows into {}", inserted, set.len(), set.name);
    Ok(inserted)
}

impl SqliteSink {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn columns_of(&self, table: &str) -> Result<HashSet<String>> {
        let mut conn = self.pool.acquire().await?;
        existing_columns(&mut *conn, table).await
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    type Config = SqliteConfig;

    async fn new(config: Self::Config) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Schema changes and inserts share one transaction; an error anywhere
    /// rolls back every set.
    async fn write_all(&self, sets: &[RecordSet]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for set in sets {
            inserted += insert_set(&mut *tx, set).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) FROM {}", quote(table)))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)? as u64)
    }
}
