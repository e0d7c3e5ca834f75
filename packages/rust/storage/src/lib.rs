//! libSQL relational store and the cleaned-file loader.
//!
//! The [`Store`] holds one table per metric:
//! `(id, Year INTEGER, League TEXT, Player TEXT, Team TEXT, <metric> REAL)`.
//! Every load drops and recreates the table, so it only ever holds the
//! latest import. [`SchemaLoader`] maps a cleaned file onto that shape.

mod loader;

use std::path::Path;

use libsql::{Connection, Database, Value, params};
use tracing::debug;

use almanac_shared::slug::quote_ident;
use almanac_shared::types::{LEAGUE_COLUMN, PLAYER_COLUMN, TEAM_COLUMN, YEAR_COLUMN};
use almanac_shared::{AlmanacError, CleanedRecord, MetricSpec, Result};

pub use loader::{LoadOutcome, SchemaLoader};

/// Row count, columns and a few sample rows of one table.
#[derive(Debug, Clone)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
    pub columns: Vec<String>,
    pub sample: Vec<Vec<String>>,
}

/// Handle to the relational store.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create the database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AlmanacError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        Ok(Self { db, conn })
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
            )
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| AlmanacError::Storage(e.to_string()))?
                > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(AlmanacError::Storage(e.to_string())),
        }
    }

    /// Column names of `table` in declaration order.
    pub async fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?
        {
            columns.push(
                row.get::<String>(1)
                    .map_err(|e| AlmanacError::Storage(e.to_string()))?,
            );
        }
        Ok(columns)
    }

    pub async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| AlmanacError::Storage(e.to_string()))? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(AlmanacError::Storage(e.to_string())),
        }
    }

    /// User tables in name order.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
                params![],
            )
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        let mut tables = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?
        {
            tables.push(
                row.get::<String>(0)
                    .map_err(|e| AlmanacError::Storage(e.to_string()))?,
            );
        }
        Ok(tables)
    }

    /// Up to `limit` rows of `table`, each value rendered as text.
    pub async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<Vec<String>>> {
        let sql = format!("SELECT * FROM {} LIMIT {limit}", quote_ident(table));
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        let mut sample = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?
        {
            let mut values = Vec::new();
            for idx in 0..row.column_count() {
                let value = row
                    .get_value(idx)
                    .map_err(|e| AlmanacError::Storage(e.to_string()))?;
                values.push(render_value(value));
            }
            sample.push(values);
        }
        Ok(sample)
    }

    /// Summaries of every table, for post-load checks.
    pub async fn summarize(&self, sample_limit: usize) -> Result<Vec<TableSummary>> {
        let mut summaries = Vec::new();
        for name in self.list_tables().await? {
            let rows = self.row_count(&name).await?;
            let columns = self.table_columns(&name).await?;
            let sample = if rows > 0 {
                self.sample_rows(&name, sample_limit).await?
            } else {
                Vec::new()
            };
            summaries.push(TableSummary {
                name,
                rows,
                columns,
                sample,
            });
        }
        Ok(summaries)
    }

    /// Drop `spec.table`, recreate it and insert `records`, all in one
    /// transaction. On error nothing changes.
    pub async fn replace_table(&self, spec: &MetricSpec, records: &[CleanedRecord]) -> Result<()> {
        let table = quote_ident(&spec.table);
        let column = quote_ident(&spec.column);

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        tx.execute(&format!("DROP TABLE IF EXISTS {table}"), params![])
            .await
            .map_err(|e| AlmanacError::Storage(format!("drop {}: {e}", spec.table)))?;

        let create = format!(
            "CREATE TABLE {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {YEAR_COLUMN} INTEGER,
                {LEAGUE_COLUMN} TEXT,
                {PLAYER_COLUMN} TEXT,
                {TEAM_COLUMN} TEXT,
                {column} {}
            )",
            spec.value_type.sql_type()
        );
        tx.execute(&create, params![])
            .await
            .map_err(|e| AlmanacError::Storage(format!("create {}: {e}", spec.table)))?;

        let insert = format!(
            "INSERT INTO {table} ({YEAR_COLUMN}, {LEAGUE_COLUMN}, {PLAYER_COLUMN}, {TEAM_COLUMN}, {column})
             VALUES (?1, ?2, ?3, ?4, ?5)"
        );
        for record in records {
            tx.execute(
                &insert,
                params![
                    record.year,
                    record.league.as_str(),
                    record.player.as_str(),
                    record.team.as_str(),
                    record.value
                ],
            )
            .await
            .map_err(|e| AlmanacError::Storage(format!("insert into {}: {e}", spec.table)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AlmanacError::Storage(e.to_string()))?;

        debug!(table = %spec.table, rows = records.len(), "table replaced");
        Ok(())
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s,
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
