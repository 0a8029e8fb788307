use crate::domain::entities::analysis::AnalysisDraft;
use crate::domain::values::recommendation::StructuredRecommendation;

/// Pure boundary between scored data and model text.
pub trait PromptAdapter: Send + Sync {
    fn build_prompt(&self, draft: &AnalysisDraft<'_>) -> String;

    /// `None` when the reply has no recognizable recommendation.
    fn parse_response(&self, text: &str) -> Option<StructuredRecommendation>;
}
