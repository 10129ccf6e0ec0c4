//! SQLite store: one lazily-opened connection per `Store`, guarded by a mutex.

mod aggregates;
mod farm;
mod finance;
pub mod schema;

pub use finance::CUSTOM_MARGIN_KIND;

use crate::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, Params, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Default database file name
pub const DEFAULT_DB_FILE: &str = "agroledger.db";

/// Database handle
pub struct Store {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Create a handle for the database at `path`. Nothing is opened until the
    /// first operation needs the connection.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Store {
            path: path.as_ref().to_path_buf(),
            conn: Mutex::new(None),
        }
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the shared connection, opening it on first use.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = match guard.take() {
            Some(conn) => conn,
            None => connect(&self.path)?,
        };
        f(guard.insert(conn))
    }

    /// Drop the connection; the next operation reopens it.
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!(path = %self.path.display(), "closed database");
        }
    }

    /// Create every table and index that does not exist yet
    pub fn initialize(&self) -> Result<()> {
        self.with_conn(|conn| schema::create(conn))
    }

    /// Insert the demonstration data set when the checks table is empty.
    /// Returns whether anything was inserted.
    pub fn seed_if_empty(&self, today: NaiveDate) -> Result<bool> {
        self.with_conn(|conn| {
            let checks: i64 = conn.query_row("SELECT COUNT(*) FROM checks", [], |row| row.get(0))?;
            if checks > 0 {
                debug!(checks, "store already has data, skipping seed");
                return Ok(false);
            }

            let tx = conn.transaction()?;
            schema::seed(&tx, today)?;
            tx.commit()?;
            info!("seeded demonstration data");
            Ok(true)
        })
    }

    /// User tables in creation order
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY rowid",
            )?;
            let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
            names
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| e.into())
        })
    }

    // ==================== Settings ====================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| e.into())
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;
            Ok(())
        })
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
            Ok(rows > 0)
        })
    }
}

fn connect(path: &Path) -> Result<Connection> {
    debug!(path = %path.display(), "opening database");
    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

/// Map "no row changed" on a keyed write to `NotFound`
fn expect_row(rows: usize, entity: &'static str, id: i64) -> Result<()> {
    if rows == 0 {
        return Err(LedgerError::NotFound { entity, id });
    }
    Ok(())
}

/// Run a query and collect every mapped row
pub(crate) fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| e.into())
}

// ==================== Column Codecs ====================

/// Decimals leave the API as `Decimal` and are kept in REAL columns
pub(crate) fn decimal_to_sql(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

pub(crate) fn decimal_from_f64(value: f64, scale: u32) -> Option<Decimal> {
    Decimal::try_from(value).ok().map(|d| d.round_dp(scale).normalize())
}

pub(crate) fn money_col(row: &Row, column: &str) -> rusqlite::Result<Decimal> {
    decimal_col(row, column, 2)
}

pub(crate) fn decimal_col(row: &Row, column: &str, scale: u32) -> rusqlite::Result<Decimal> {
    let raw: Option<f64> = row.get(column)?;
    let raw = raw.unwrap_or_default();
    decimal_from_f64(raw, scale).ok_or_else(|| conversion_error(column, raw.to_string()))
}

pub(crate) fn timestamp_col(row: &Row, column: &str) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(column)?;
    parse_timestamp(&raw).ok_or_else(|| conversion_error(column, raw))
}

pub(crate) fn conversion_error(column: &str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Cannot parse {column}: {value}"),
        )),
    )
}

/// SQLite `CURRENT_TIMESTAMP` is `YYYY-MM-DD HH:MM:SS`; RFC 3339 is accepted too.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}
