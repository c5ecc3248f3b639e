//! Persistent cache store backed by SQLite.
//!
//! One table keyed by `(symbol, field)` holds the normalized value (JSON
//! text), the fetch timestamp, and the ttl it was written with. The table
//! survives process restarts; hit/miss counters are process-local and reset
//! on restart.

use crate::error::CacheError;
use crate::types::{CacheEntry, FieldValue};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Counters and size reported by [`CacheStore::stats`]
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub total_entries: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Persistent (symbol, field) → value store with expiry.
///
/// A disabled store (see [`CacheStore::disabled`]) reports every lookup as
/// a miss and drops writes, which is how the tracker degrades when caching
/// is turned off or the database cannot be opened.
pub struct CacheStore {
    conn: Option<Mutex<Connection>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    /// Opens (or creates) the cache database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Opens a private in-memory store (tests)
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Some(Mutex::new(conn)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// A store that misses every lookup and drops every write
    pub fn disabled() -> Self {
        Self {
            conn: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// True if this store is backed by a database
    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    fn init_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS market_cache (
                symbol     TEXT NOT NULL,
                field      TEXT NOT NULL,
                value      TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                ttl_secs   INTEGER NOT NULL,
                PRIMARY KEY (symbol, field)
            );
            CREATE INDEX IF NOT EXISTS idx_market_cache_fetched_at
                ON market_cache (fetched_at);",
        )?;
        Ok(())
    }

    /// Looks up a fresh entry. Expired entries count as misses; the row
    /// itself is left for [`CacheStore::sweep`] (it may still back a
    /// stale-fallback read).
    pub fn get(&self, symbol: &str, field: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(conn) = &self.conn else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let entry = {
            let conn = conn.lock().unwrap();
            Self::select_entry(&conn, symbol, field)?
        };

        match entry {
            Some(entry) if !entry.is_expired(Utc::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(symbol, field, "cache hit");
                Ok(Some(entry))
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(symbol, field, "cache entry expired");
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Looks up an entry regardless of expiry. Used for the optional
    /// stale-fallback path; does not touch the hit/miss counters.
    pub fn get_ignoring_ttl(
        &self,
        symbol: &str,
        field: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let Some(conn) = &self.conn else {
            return Ok(None);
        };
        let conn = conn.lock().unwrap();
        Self::select_entry(&conn, symbol, field)
    }

    fn select_entry(
        conn: &Connection,
        symbol: &str,
        field: &str,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(String, i64, i64)> = conn
            .query_row(
                "SELECT value, fetched_at, ttl_secs FROM market_cache
                 WHERE symbol = ?1 AND field = ?2",
                params![symbol, field],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((value_json, fetched_at, ttl_secs)) = row else {
            return Ok(None);
        };

        let value: FieldValue = serde_json::from_str(&value_json)?;
        let fetched_at = timestamp_to_datetime(fetched_at);
        Ok(Some(CacheEntry {
            value,
            fetched_at,
            ttl: Duration::from_secs(ttl_secs.max(0) as u64),
        }))
    }

    /// Writes a value, overwriting any previous row for the key
    pub fn put(
        &self,
        symbol: &str,
        field: &str,
        value: &FieldValue,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.put_at(symbol, field, value, ttl, Utc::now())
    }

    /// Write with an explicit fetch timestamp. Production writes go through
    /// [`CacheStore::put`]; tests use this to backdate entries.
    pub(crate) fn put_at(
        &self,
        symbol: &str,
        field: &str,
        value: &FieldValue,
        ttl: Duration,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        let value_json = serde_json::to_string(value)?;
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO market_cache (symbol, field, value, fetched_at, ttl_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                symbol,
                field,
                value_json,
                fetched_at.timestamp(),
                ttl.as_secs() as i64
            ],
        )?;
        Ok(())
    }

    /// Removes the entry for one key, if present
    pub fn invalidate(&self, symbol: &str, field: &str) -> Result<(), CacheError> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        let conn = conn.lock().unwrap();
        conn.execute(
            "DELETE FROM market_cache WHERE symbol = ?1 AND field = ?2",
            params![symbol, field],
        )?;
        Ok(())
    }

    /// Deletes all expired rows. Pure space reclamation; returns how many
    /// rows were removed.
    pub fn sweep(&self) -> Result<usize, CacheError> {
        let Some(conn) = &self.conn else {
            return Ok(0);
        };
        let now = Utc::now().timestamp();
        let conn = conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM market_cache WHERE fetched_at + ttl_secs < ?1",
            params![now],
        )?;
        Ok(removed)
    }

    /// Current counters and table size
    pub fn stats(&self) -> CacheStats {
        let total_entries = match &self.conn {
            Some(conn) => {
                let conn = conn.lock().unwrap();
                conn.query_row("SELECT COUNT(*) FROM market_cache", [], |row| {
                    row.get::<_, i64>(0)
                })
                .unwrap_or(0) as u64
            }
            None => 0,
        };
        CacheStats {
            enabled: self.is_enabled(),
            total_entries,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
        }
    }
}

fn timestamp_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
