use crate::domain::entities::reading::{CacheEntry, SourceReading};
use crate::domain::error::DomainError;
use crate::domain::ports::cache_store::{CacheCount, CacheStore};
use crate::domain::ports::clock::Clock;
use crate::domain::values::source_kind::SourceKind;
use crate::infrastructure::sqlite::migrations::timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteCacheStore {
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn try_get(&self, kind: SourceKind, key: &str) -> Result<Option<SourceReading>, DomainError> {
        let conn = self.lock()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT reading, expires_ms FROM cache_entries WHERE kind = ?1 AND subject_key = ?2",
                params![kind.to_string(), key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        drop(conn);

        let Some((json, expires_ms)) = row else {
            return Ok(None);
        };
        let entry = CacheEntry {
            kind,
            subject_key: key.to_string(),
            reading: serde_json::from_str(&json)?,
            expires_at: DateTime::<Utc>::from_timestamp_millis(expires_ms)
                .ok_or_else(|| DomainError::Parse(format!("Bad expiry {expires_ms}")))?,
        };
        // Expired entries stay until purge_expired; a read never deletes.
        Ok(entry.is_fresh(self.clock.now()).then_some(entry.reading))
    }

    fn try_put(
        &self,
        kind: SourceKind,
        key: &str,
        reading: &SourceReading,
        freshness: Duration,
    ) -> Result<(), DomainError> {
        let entry = CacheEntry::new(key, reading.clone(), freshness);
        let json = serde_json::to_string(&entry.reading)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (kind, subject_key, reading, fetched_at, expires_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.to_string(),
                entry.subject_key,
                json,
                timestamp(entry.reading.fetched_at),
                entry.expires_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }
}

impl CacheStore for SqliteCacheStore {
    fn get(&self, kind: SourceKind, key: &str) -> Option<SourceReading> {
        match self.try_get(kind, key) {
            Ok(found) => found,
            Err(e) => {
                warn!(%kind, key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn put(&self, kind: SourceKind, key: &str, reading: &SourceReading, freshness: Duration) {
        match self.try_put(kind, key, reading, freshness) {
            Ok(()) => debug!(%kind, key, "cache entry stored"),
            Err(e) => warn!(%kind, key, error = %e, "cache write failed, entry dropped"),
        }
    }

    fn purge_expired(&self) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_ms < ?1",
            params![self.now_ms()],
        )?;
        Ok(removed)
    }

    fn counts(&self) -> Result<Vec<CacheCount>, DomainError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT kind,
                    SUM(CASE WHEN expires_ms >= ?1 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN expires_ms < ?1 THEN 1 ELSE 0 END)
             FROM cache_entries GROUP BY kind",
        )?;
        let rows: Vec<(String, usize, usize)> = stmt
            .query_map(params![self.now_ms()], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
            .collect::<Result<_, _>>()?;

        // Every kind is reported, including ones with no entries yet.
        let mut by_kind: BTreeMap<SourceKind, CacheCount> = SourceKind::ALL
            .into_iter()
            .map(|k| {
                (
                    k,
                    CacheCount {
                        kind: k.to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect();
        for (kind, live, expired) in rows {
            match kind.parse::<SourceKind>() {
                Ok(k) => {
                    if let Some(count) = by_kind.get_mut(&k) {
                        count.live = live;
                        count.expired = expired;
                    }
                }
                Err(_) => warn!(kind = %kind, "unknown kind in cache table"),
            }
        }
        Ok(by_kind.into_values().collect())
    }
}
