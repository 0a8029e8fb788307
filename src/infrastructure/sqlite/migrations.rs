use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cache_entries (
            kind TEXT NOT NULL,
            subject_key TEXT NOT NULL,
            reading TEXT NOT NULL,
            fetched_at TEXT NOT NULL,
            expires_ms INTEGER NOT NULL,
            PRIMARY KEY (kind, subject_key)
        );

        CREATE TABLE IF NOT EXISTS analyses (
            id TEXT PRIMARY KEY,
            subject_key TEXT NOT NULL,
            expert_key TEXT,
            combined_score REAL NOT NULL,
            regime TEXT NOT NULL,
            signal TEXT NOT NULL,
            readings TEXT NOT NULL,
            weights_used TEXT NOT NULL,
            recommendation TEXT,
            warnings TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_ms);
        CREATE INDEX IF NOT EXISTS idx_analyses_subject ON analyses(subject_key, created_at);
        CREATE INDEX IF NOT EXISTS idx_analyses_created ON analyses(created_at);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, DomainError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| DomainError::Parse(format!("Bad timestamp '{raw}': {e}")))
}
