//! SQLite-backed record store
//!
//! One table per known series, created at startup. Timestamps are stored as
//! integer microseconds since the epoch so range filters and sorting stay in
//! SQL. Series names are validated identifiers (see
//! [`SeriesTable`](crate::codec::SeriesTable)), which keeps the generated
//! statements safe.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::Connection;

use crate::codec::{SeriesTable, TimeSeriesRecord};

use super::{QueryFilter, RecordStore, StoreError};

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Durable store on a single SQLite database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    tables: HashMap<String, String>,
}

impl SqliteStore {
    /// Open (or create) the database file and the per-series tables
    pub fn open(path: impl AsRef<Path>, series: &SeriesTable) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, series)
    }

    /// Open an in-memory database, mainly for tests
    pub fn open_in_memory(series: &SeriesTable) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, series)
    }

    fn with_connection(conn: Connection, series: &SeriesTable) -> Result<Self, StoreError> {
        let mut tables = HashMap::new();
        for name in series.names() {
            let table = format!("series_{}", name);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                     id INTEGER PRIMARY KEY AUTOINCREMENT,
                     payload REAL NOT NULL,
                     timestamp_us INTEGER NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_{table}_ts ON {table} (timestamp_us);"
            ))?;
            tables.insert(name.clone(), table);
        }

        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }

    fn table(&self, series: &str) -> Result<&str, StoreError> {
        self.tables
            .get(series)
            .map(String::as_str)
            .ok_or_else(|| StoreError::UnknownSeries(series.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock still holds a usable connection.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(&self, series: &str, record: TimeSeriesRecord) -> Result<(), StoreError> {
        let table = self.table(series)?;
        let conn = self.lock();
        conn.execute(
            &format!("INSERT INTO {table} (payload, timestamp_us) VALUES (?1, ?2)"),
            rusqlite::params![record.payload, record.timestamp.timestamp_micros()],
        )?;
        Ok(())
    }

    async fn query(
        &self,
        series: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<TimeSeriesRecord>, StoreError> {
        let table = self.table(series)?;

        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<i64> = Vec::new();
        if let Some(start) = filter.start() {
            clauses.push("timestamp_us >= ?");
            params.push(start.timestamp_micros());
        }
        if let Some(end) = filter.end() {
            clauses.push("timestamp_us <= ?");
            params.push(end.timestamp_micros());
        }

        let mut sql = format!("SELECT payload, timestamp_us FROM {table}");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        let order = if filter.descending() { "DESC" } else { "ASC" };
        sql.push_str(&format!(
            " ORDER BY timestamp_us {order} LIMIT {} OFFSET {}",
            filter.limit(),
            filter.offset()
        ));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (payload, micros) = row?;
            let timestamp = DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                StoreError::Backend(format!("Corrupt timestamp in {table}: {micros}"))
            })?;
            records.push(TimeSeriesRecord { payload, timestamp });
        }
        Ok(records)
    }
}
