use crate::domain::entities::reading::SourceReading;
use crate::domain::error::DomainError;
use crate::domain::values::source_kind::SourceKind;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheCount {
    pub kind: String,
    pub live: usize,
    pub expired: usize,
}

/// Per-source reading cache keyed by (source kind, subject key).
///
/// `get` and `put` are total: backend failures are logged and surface as a
/// miss or a dropped write, never as an error to the caller.
pub trait CacheStore: Send + Sync {
    /// The cached reading, or `None` if there is no entry or it has expired.
    fn get(&self, kind: SourceKind, key: &str) -> Option<SourceReading>;

    /// Store `reading`, superseding any previous entry for the same key.
    /// The entry expires at `reading.fetched_at + freshness`.
    fn put(&self, kind: SourceKind, key: &str, reading: &SourceReading, freshness: Duration);

    /// Delete expired entries. Returns how many were removed.
    fn purge_expired(&self) -> Result<usize, DomainError>;

    fn counts(&self) -> Result<Vec<CacheCount>, DomainError>;
}
