pub mod analysis_repo;
pub mod cache_store;
pub mod migrations;

use crate::domain::error::DomainError;
use rusqlite::Connection;

/// Open a connection with WAL enabled and the schema in place. Every store
/// gets its own connection; `:memory:` therefore means one private database
/// per store.
pub fn open_database(path: &str) -> Result<Connection, DomainError> {
    let conn = Connection::open(path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    if path != ":memory:" {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
    }
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
