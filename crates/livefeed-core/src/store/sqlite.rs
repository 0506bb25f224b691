//! `SQLite` record store.
//!
//! Runtime defaults match the other on-disk stores:
//! - `journal_mode = WAL` so readers are not blocked by the appending writer
//! - `busy_timeout = 5s` to ride out transient lock contention
//!
//! The schema is versioned through `PRAGMA user_version`; see [`migrate`].

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::path::Path;
use std::time::Duration;

use super::{ListQuery, NewRecord, RecordSink, RecordStore};
use crate::entry::{EntryId, RawRecord};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    record_type TEXT NOT NULL,
    status TEXT NOT NULL,
    timestamp INTEGER,
    content TEXT,
    replaces INTEGER,
    key_event INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_records_feed_time
    ON records (post_id, record_type, status, timestamp);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);
";

pub const MIGRATION_V2_SQL: &str = r"
ALTER TABLE records ADD COLUMN author TEXT;
";

const MIGRATIONS: &[(u32, &str)] = &[(1, MIGRATION_V1_SQL), (2, MIGRATION_V2_SQL)];

const RECORD_COLUMNS: &str =
    "id, post_id, record_type, status, timestamp, content, replaces, key_event, author";

/// Read `PRAGMA user_version` as a `u32`.
///
/// # Errors
///
/// Returns an error if querying `SQLite` fails or the value does not fit.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.execute(
            "UPDATE store_meta SET schema_version = ?1 WHERE id = 1",
            [i64::from(*version)],
        )?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn to_sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| anyhow!("id {id} exceeds the storable range"))
}

fn from_sql_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(error)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    let replaces: Option<i64> = row.get(6)?;
    let replaces = replaces
        .map(u64::try_from)
        .transpose()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(error)))?;

    Ok(RawRecord {
        id: from_sql_id(row, 0)?,
        post_id: from_sql_id(row, 1)?,
        record_type: row.get(2)?,
        status: row.get(3)?,
        timestamp: row.get(4)?,
        content: row.get(5)?,
        replaces,
        key_event: row.get::<_, i64>(7)? != 0,
        author: row.get(8)?,
    })
}

/// Record store backed by a `SQLite` database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, apply pragmas and migrate.
    ///
    /// # Errors
    ///
    /// Returns an error if opening, configuring or migrating fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("open feed database {}", path.display()))?;
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrate(&mut conn).context("apply store migrations")?;

        Ok(Self { conn })
    }

    /// In-memory store, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory database")?;
        migrate(&mut conn).context("apply store migrations")?;
        Ok(Self { conn })
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordStore for SqliteStore {
    fn list(&self, query: &ListQuery) -> Result<Vec<RawRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records \
             WHERE post_id = ?1 AND record_type = ?2 AND status = ?3 \
             {} LIMIT ?4",
            query.order.sql_clause()
        );
        // LIMIT -1 means "no limit" in SQLite.
        let limit = query
            .limit
            .map_or(Ok(-1), i64::try_from)
            .context("list limit out of range")?;

        let mut stmt = self.conn.prepare(&sql).context("prepare record listing")?;
        let rows = stmt
            .query_map(
                params![to_sql_id(query.post_id)?, query.record_type, query.status, limit],
                record_from_row,
            )
            .context("list records")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("read record rows")
    }

    fn get_by_id(&self, id: EntryId) -> Result<Option<RawRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1");
        self.conn
            .query_row(&sql, params![to_sql_id(id)?], record_from_row)
            .optional()
            .with_context(|| format!("get record {id}"))
    }
}

impl RecordSink for SqliteStore {
    fn insert(&self, record: NewRecord) -> Result<EntryId> {
        let replaces = record.replaces.map(to_sql_id).transpose()?;
        self.conn
            .execute(
                "INSERT INTO records \
                 (post_id, record_type, status, timestamp, content, replaces, key_event, author) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    to_sql_id(record.post_id)?,
                    record.record_type,
                    record.status,
                    record.timestamp,
                    record.content,
                    replaces,
                    i64::from(record.key_event),
                    record.author,
                ],
            )
            .context("insert record")?;

        u64::try_from(self.conn.last_insert_rowid()).context("negative rowid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortOrder;

    fn new_record(ts: i64, content: &str, replaces: Option<EntryId>) -> NewRecord {
        NewRecord {
            post_id: 3,
            record_type: "liveblog".into(),
            status: "liveblog".into(),
            timestamp: ts,
            content: content.into(),
            replaces,
            key_event: false,
            author: None,
        }
    }

    fn sqlite_object_exists(conn: &Connection, object_type: &str, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            params![object_type, name],
            |row| row.get(0),
        )
        .expect("query sqlite_master")
    }

    #[test]
    fn migrate_empty_db_to_latest() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(current_schema_version(&conn)?, LATEST_SCHEMA_VERSION);
        assert!(sqlite_object_exists(&conn, "table", "records"));
        assert!(sqlite_object_exists(&conn, "index", "idx_records_feed_time"));
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        let meta_rows: i64 =
            conn.query_row("SELECT COUNT(*) FROM store_meta", [], |row| row.get(0))?;
        assert_eq!(meta_rows, 1);
        Ok(())
    }

    #[test]
    fn migrate_upgrades_v1_rows() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        conn.execute_batch(MIGRATION_V1_SQL)?;
        conn.pragma_update(None, "user_version", 1_i64)?;
        conn.execute(
            "INSERT INTO records (post_id, record_type, status, timestamp, content) \
             VALUES (1, 'liveblog', 'liveblog', 10, 'old row')",
            [],
        )?;

        assert_eq!(migrate(&mut conn)?, LATEST_SCHEMA_VERSION);
        let author: Option<String> =
            conn.query_row("SELECT author FROM records WHERE id = 1", [], |row| row.get(0))?;
        assert_eq!(author, None);
        Ok(())
    }

    #[test]
    fn open_sets_wal_and_busy_timeout() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("feed.sqlite3");
        let store = SqliteStore::open(&path).expect("open store");

        let journal_mode: String = store
            .connection()
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = store
            .connection()
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());
    }

    #[test]
    fn insert_then_list_in_both_orders() {
        let store = SqliteStore::open_in_memory().expect("open");
        let a = store.insert(new_record(10, "a", None)).expect("insert a");
        let b = store.insert(new_record(20, "b", None)).expect("insert b");
        let c = store.insert(new_record(30, "b2", Some(b))).expect("insert c");

        let query = ListQuery::for_feed(3, "liveblog");
        let desc: Vec<_> = store.list(&query).expect("list").iter().map(|r| r.id).collect();
        assert_eq!(desc, vec![c, b, a]);

        let asc = store
            .list(&query.clone().order(SortOrder::Asc).limit(Some(2)))
            .expect("list asc");
        assert_eq!(asc.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a, b]);

        let update = store.get_by_id(c).expect("get").expect("present");
        assert_eq!(update.replaces, Some(b));
        assert_eq!(update.timestamp, Some(30));
        assert!(store.get_by_id(999).expect("get").is_none());
    }

    #[test]
    fn list_is_scoped_to_feed() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.insert(new_record(10, "a", None)).expect("insert");
        let other = ListQuery::for_feed(4, "liveblog");
        assert!(store.list(&other).expect("list").is_empty());
    }
}
