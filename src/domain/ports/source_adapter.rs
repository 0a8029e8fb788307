use crate::domain::entities::reading::SourceReading;
use crate::domain::error::SourceFetchError;
use crate::domain::values::source_kind::SourceKind;
use async_trait::async_trait;

/// Fetches one kind of reading from an external system.
///
/// Implementations must be safe to call repeatedly and must not cache:
/// caching is layered on top by the orchestrator.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Human-readable name for logs (e.g. "yahoo_finance").
    fn name(&self) -> &str;

    /// Key the reading is cached under. Subject-independent sources override
    /// this so every subject shares one entry.
    fn cache_key(&self, subject_key: &str) -> String {
        subject_key.to_string()
    }

    async fn fetch(&self, subject_key: &str) -> Result<SourceReading, SourceFetchError>;
}
