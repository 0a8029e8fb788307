use crate::domain::entities::analysis::CombinedAnalysis;
use crate::domain::error::DomainError;
use crate::domain::ports::analysis_repository::{AnalysisRepository, AnalysisStats, HistoryFilter};
use crate::domain::ports::cache_store::{CacheCount, CacheStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub analyses: AnalysisStats,
    pub cache: Vec<CacheCount>,
}

pub struct HistoryUseCase {
    repo: Arc<dyn AnalysisRepository>,
    cache: Arc<dyn CacheStore>,
}

impl HistoryUseCase {
    pub fn new(repo: Arc<dyn AnalysisRepository>, cache: Arc<dyn CacheStore>) -> Self {
        Self { repo, cache }
    }

    /// Stored analyses, newest first, optionally for one subject.
    pub fn history(
        &self,
        subject_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<CombinedAnalysis>, DomainError> {
        self.repo.list(&HistoryFilter {
            subject_key: subject_key.map(|s| s.trim().to_uppercase()),
            limit: Some(limit.unwrap_or(DEFAULT_LIMIT)),
        })
    }

    /// Newest analyses across all subjects.
    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<CombinedAnalysis>, DomainError> {
        self.history(None, limit)
    }

    pub fn get(&self, id: &str) -> Result<CombinedAnalysis, DomainError> {
        self.repo
            .get_by_id(id)?
            .ok_or_else(|| DomainError::NotFound(format!("Analysis {id}")))
    }

    pub fn delete(&self, id: &str) -> Result<(), DomainError> {
        if self.repo.delete(id)? {
            info!(id, "analysis deleted");
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("Analysis {id}")))
        }
    }

    pub fn stats(&self) -> Result<EngineStats, DomainError> {
        Ok(EngineStats {
            analyses: self.repo.stats()?,
            cache: self.cache.counts()?,
        })
    }

    pub fn purge_cache(&self) -> Result<usize, DomainError> {
        let removed = self.cache.purge_expired()?;
        info!(removed, "expired cache entries purged");
        Ok(removed)
    }
}
