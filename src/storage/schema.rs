//! Table layout, pragmas and the statements both adapters execute.
//!
//! One table per named store: `<name>_kvs (key TEXT PRIMARY KEY, value BLOB)`.
//! Keys that are valid UTF-8 are bound as TEXT, matching the column type, so
//! rows written as text by other tools are found by update and delete. Other
//! keys fall back to BLOB. Both read back as their raw bytes.

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File extension of the per-store database file.
pub const DB_EXTENSION: &str = "sqlite3";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A key/value row as stored: raw key bytes and compressed value bytes.
pub type Row = (Vec<u8>, Vec<u8>);

/// Check that `name` is usable as a table and file name.
pub fn validate_store_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("store name cannot be empty".into());
    }
    if name.len() > 128 {
        return Err(format!("store name too long: {} characters (max 128)", name.len()));
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!("store name {name:?} contains invalid character {c:?}"));
    }
    Ok(())
}

/// Table name for a store.
pub fn table_name(name: &str) -> String {
    format!("{name}_kvs")
}

/// Database file path for a store under `data_dir`.
pub fn db_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{name}.{DB_EXTENSION}"))
}

/// Pragmas applied to every store connection.
///
/// WAL lets hydration reads run next to the queued writer; `synchronous=FULL`
/// makes each commit durable.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

/// Create the store table if it does not exist.
pub fn initialize_schema(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, value BLOB);"
    ))
}

/// Insert a new row. Fails with a constraint violation if `key` exists.
pub fn insert_entry(conn: &Connection, table: &str, key: &[u8], value: &[u8]) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO {table} (key, value) VALUES (?1, ?2)"),
        params![key_param(key), value],
    )?;
    Ok(())
}

/// Overwrite the value of `key`. No-op if the row is absent.
pub fn update_entry(conn: &Connection, table: &str, key: &[u8], value: &[u8]) -> rusqlite::Result<()> {
    conn.execute(
        &format!("UPDATE {table} SET value = ?1 WHERE key = ?2"),
        params![value, key_param(key)],
    )?;
    Ok(())
}

/// Remove `key`. No-op if the row is absent.
pub fn delete_entry(conn: &Connection, table: &str, key: &[u8]) -> rusqlite::Result<()> {
    conn.execute(&format!("DELETE FROM {table} WHERE key = ?1"), params![key_param(key)])?;
    Ok(())
}

/// Remove every row, keeping the table.
pub fn clear_entries(conn: &Connection, table: &str) -> rusqlite::Result<()> {
    conn.execute(&format!("DELETE FROM {table}"), [])?;
    Ok(())
}

/// Read up to `limit` rows with rowid greater than `after`, in rowid order.
///
/// Returns the rows and the last rowid seen, for the next page.
pub fn read_page(
    conn: &Connection,
    table: &str,
    after: i64,
    limit: usize,
) -> rusqlite::Result<(Vec<Row>, Option<i64>)> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT rowid, key, value FROM {table} WHERE rowid > ?1 ORDER BY rowid ASC LIMIT ?2"
    ))?;
    let mut last = None;
    let rows = stmt
        .query_map(params![after, limit as i64], |row| {
            let rowid: i64 = row.get(0)?;
            let key = bytes_column(row.get_ref(1)?, 1)?;
            let value = bytes_column(row.get_ref(2)?, 2)?;
            Ok((rowid, key, value))
        })?
        .map(|r| {
            r.map(|(rowid, key, value)| {
                last = Some(rowid);
                (key, value)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((rows, last))
}

/// Number of rows in the store table.
pub fn count_entries(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
}

/// Bind a key as TEXT when it is valid UTF-8, as BLOB otherwise.
///
/// SQLite never considers a TEXT and a BLOB value equal, so the binding must
/// be the same for every statement touching a given key.
fn key_param(key: &[u8]) -> ToSqlOutput<'_> {
    match std::str::from_utf8(key) {
        Ok(_) => ToSqlOutput::Borrowed(ValueRef::Text(key)),
        Err(_) => ToSqlOutput::Borrowed(ValueRef::Blob(key)),
    }
}

fn bytes_column(value: ValueRef<'_>, index: usize) -> rusqlite::Result<Vec<u8>> {
    match value {
        ValueRef::Blob(b) => Ok(b.to_vec()),
        ValueRef::Text(t) => Ok(t.to_vec()),
        ValueRef::Null => Ok(Vec::new()),
        other => Err(rusqlite::Error::InvalidColumnType(
            index,
            "key/value".into(),
            other.data_type(),
        )),
    }
}
