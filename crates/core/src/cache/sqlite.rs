//! SQLite-backed cache store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};

use super::{CacheEntry, CacheError, CacheStore, EntryQuery, EpisodeSet};
use crate::release::Quality;
use crate::show::ShowId;

const ENTRY_COLUMNS: &str = "source_id, name, season, episodes, show_namespace, show_id, url, \
                             fetched_at, quality, release_group, version";

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CacheError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            -- Normalized releases per source
            CREATE TABLE IF NOT EXISTS provider_cache (
                source_id TEXT NOT NULL,
                name TEXT NOT NULL,
                season INTEGER NOT NULL,
                episodes TEXT NOT NULL,
                show_namespace INTEGER NOT NULL,
                show_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                quality INTEGER NOT NULL,
                release_group TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL DEFAULT -1,
                UNIQUE(source_id, name, season, episodes, show_namespace, show_id,
                       quality, release_group, version)
            );

            CREATE INDEX IF NOT EXISTS idx_provider_cache_show
                ON provider_cache(source_id, show_namespace, show_id, season);

            -- Last refresh per source
            CREATE TABLE IF NOT EXISTS last_update (
                source_id TEXT PRIMARY KEY,
                time INTEGER NOT NULL
            );

            -- Last consumption (search) per source
            CREATE TABLE IF NOT EXISTS last_search (
                source_id TEXT PRIMARY KEY,
                time INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_time(&self, table: &str, source_id: &str) -> Result<Option<i64>, CacheError> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT time FROM {} WHERE source_id = ?", table),
            params![source_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CacheError::Database(e.to_string()))
    }

    fn write_time(&self, table: &str, source_id: &str, epoch: i64) -> Result<(), CacheError> {
        let conn = self.lock();
        conn.execute(
            &format!(
                "INSERT INTO {} (source_id, time) VALUES (?1, ?2)
                 ON CONFLICT(source_id) DO UPDATE SET time = excluded.time",
                table
            ),
            params![source_id, epoch],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(())
    }

    fn insert_all(tx: &Transaction<'_>, entries: &[CacheEntry]) -> Result<usize, CacheError> {
        let mut stmt = tx
            .prepare_cached(&format!(
                "INSERT OR IGNORE INTO provider_cache ({}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                ENTRY_COLUMNS
            ))
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let mut inserted = 0;
        for entry in entries {
            inserted += stmt
                .execute(params![
                    entry.source_id,
                    entry.name,
                    entry.season,
                    entry.episodes.to_column(),
                    entry.show_id.namespace,
                    entry.show_id.id as i64,
                    entry.url,
                    entry.fetched_at,
                    entry.quality.code(),
                    entry.release_group.as_deref().unwrap_or(""),
                    entry.version,
                ])
                .map_err(|e| CacheError::Database(e.to_string()))?;
        }
        Ok(inserted)
    }

    fn query_entries(
        conn: &Connection,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params_from_iter(values), Self::row_to_entry)
            .map_err(|e| CacheError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| CacheError::Database(e.to_string()))?);
        }
        Ok(entries)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CacheEntry> {
        let episodes: String = row.get(3)?;
        let show_id: i64 = row.get(5)?;
        let quality: u32 = row.get(8)?;
        let release_group: String = row.get(9)?;

        Ok(CacheEntry {
            source_id: row.get(0)?,
            name: row.get(1)?,
            season: row.get(2)?,
            episodes: EpisodeSet::from_column(&episodes),
            show_id: ShowId::new(row.get(4)?, show_id as u64),
            url: row.get(6)?,
            fetched_at: row.get(7)?,
            quality: Quality::from_code(quality).unwrap_or(Quality::Unknown),
            release_group: if release_group.is_empty() {
                None
            } else {
                Some(release_group)
            },
            version: row.get(10)?,
        })
    }
}

impl CacheStore for SqliteCacheStore {
    fn last_refresh(&self, source_id: &str) -> Result<Option<i64>, CacheError> {
        self.read_time("last_update", source_id)
    }

    fn set_last_refresh(&self, source_id: &str, epoch: i64) -> Result<(), CacheError> {
        self.write_time("last_update", source_id, epoch)
    }

    fn last_consumed(&self, source_id: &str) -> Result<Option<i64>, CacheError> {
        self.read_time("last_search", source_id)
    }

    fn set_last_consumed(&self, source_id: &str, epoch: i64) -> Result<(), CacheError> {
        self.write_time("last_search", source_id, epoch)
    }

    fn insert_entries(&self, entries: &[CacheEntry]) -> Result<usize, CacheError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        let inserted = Self::insert_all(&tx, entries)?;
        tx.commit()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(inserted)
    }

    fn replace_entries(
        &self,
        source_id: &str,
        entries: &[CacheEntry],
    ) -> Result<usize, CacheError> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        tx.execute(
            "DELETE FROM provider_cache WHERE source_id = ?",
            params![source_id],
        )
        .map_err(|e| CacheError::Database(e.to_string()))?;
        let inserted = Self::insert_all(&tx, entries)?;
        tx.commit()
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(inserted)
    }

    fn find_entries(&self, query: &EntryQuery) -> Result<Vec<CacheEntry>, CacheError> {
        if query.qualities.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; query.qualities.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM provider_cache
             WHERE source_id = ? AND show_namespace = ? AND show_id = ?
               AND season = ? AND episodes LIKE ? AND quality IN ({})
             ORDER BY fetched_at DESC, name",
            ENTRY_COLUMNS, placeholders
        );

        let mut values = vec![
            Value::Text(query.source_id.clone()),
            Value::Integer(i64::from(query.show_id.namespace)),
            Value::Integer(query.show_id.id as i64),
            Value::Integer(i64::from(query.season)),
            Value::Text(EpisodeSet::like_pattern(query.episode)),
        ];
        values.extend(
            query
                .qualities
                .iter()
                .map(|q| Value::Integer(i64::from(q.code()))),
        );

        let conn = self.lock();
        Self::query_entries(&conn, &sql, values)
    }

    fn list_propers(
        &self,
        source_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        let sql = format!(
            "SELECT {} FROM provider_cache
             WHERE source_id = ?
               AND (name LIKE '%.PROPER.%' OR name LIKE '%.REPACK.%' OR name LIKE '%.REAL.%')
               AND show_id != 0
               AND (? IS NULL OR fetched_at >= ?)
             ORDER BY fetched_at DESC, name",
            ENTRY_COLUMNS
        );
        let since = since.map(Value::Integer).unwrap_or(Value::Null);
        let values = vec![Value::Text(source_id.to_string()), since.clone(), since];

        let conn = self.lock();
        Self::query_entries(&conn, &sql, values)
    }

    fn count(&self, source_id: &str) -> Result<usize, CacheError> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM provider_cache WHERE source_id = ?",
                params![source_id],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}
