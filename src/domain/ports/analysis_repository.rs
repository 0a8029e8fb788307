use crate::domain::entities::analysis::CombinedAnalysis;
use crate::domain::error::DomainError;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub subject_key: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SubjectCount {
    pub subject_key: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct AnalysisStats {
    pub total_analyses: usize,
    pub unique_subjects: usize,
    pub top_subjects: Vec<SubjectCount>,
}

pub trait AnalysisRepository: Send + Sync {
    /// Persist the whole record in one write. Returns its id.
    fn save(&self, analysis: &CombinedAnalysis) -> Result<String, DomainError>;

    /// Newest analysis for (subject, expert) no older than `max_age`.
    fn load_recent(
        &self,
        subject_key: &str,
        expert_key: Option<&str>,
        max_age: Duration,
    ) -> Result<Option<CombinedAnalysis>, DomainError>;

    fn get_by_id(&self, id: &str) -> Result<Option<CombinedAnalysis>, DomainError>;
    fn list(&self, filter: &HistoryFilter) -> Result<Vec<CombinedAnalysis>, DomainError>;
    fn delete(&self, id: &str) -> Result<bool, DomainError>;
    fn stats(&self) -> Result<AnalysisStats, DomainError>;
}
