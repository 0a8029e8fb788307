use crate::domain::entities::expert::ExpertProfile;
use crate::domain::entities::reading::SourceReadings;
use crate::domain::values::recommendation::StructuredRecommendation;
use crate::domain::values::regime::Regime;
use crate::domain::values::score::Score;
use crate::domain::values::signal::ScoreSignal;
use crate::domain::values::source_kind::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Machine-readable category of a recoverable problem during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    SourceFetchError,
    ModelCallError,
    ResponseUnparsed,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningCode::SourceFetchError => write!(f, "SOURCE_FETCH_ERROR"),
            WarningCode::ModelCallError => write!(f, "MODEL_CALL_ERROR"),
            WarningCode::ResponseUnparsed => write!(f, "RESPONSE_UNPARSED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWarning {
    pub code: WarningCode,
    pub source: Option<SourceKind>,
    pub message: String,
}

impl RunWarning {
    pub fn source(code: WarningCode, kind: SourceKind, message: impl Into<String>) -> Self {
        Self {
            code,
            source: Some(kind),
            message: message.into(),
        }
    }

    pub fn general(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            source: None,
            message: message.into(),
        }
    }
}

/// What the language model said. `structured` is `None` when the reply could
/// not be parsed; the raw text is kept either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendation {
    pub provider: String,
    pub model: String,
    pub raw_text: String,
    pub structured: Option<StructuredRecommendation>,
}

/// Scored but not yet recommended analysis; the input to prompt building.
#[derive(Debug, Clone)]
pub struct AnalysisDraft<'a> {
    pub subject_key: &'a str,
    pub expert: Option<&'a ExpertProfile>,
    pub readings: &'a SourceReadings,
    pub combined_score: Score,
    pub regime: Regime,
    pub signal: ScoreSignal,
    pub weights_used: &'a BTreeMap<SourceKind, f64>,
}

/// The persisted result of one orchestration run. Built once, never edited;
/// a re-run produces a newer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAnalysis {
    pub id: String,
    pub subject_key: String,
    pub expert_key: Option<String>,
    pub readings: SourceReadings,
    pub combined_score: Score,
    pub regime: Regime,
    pub signal: ScoreSignal,
    /// Renormalized weights actually applied, keyed by present source.
    pub weights_used: BTreeMap<SourceKind, f64>,
    pub recommendation: Option<ModelRecommendation>,
    pub warnings: Vec<RunWarning>,
    pub created_at: DateTime<Utc>,
}

impl CombinedAnalysis {
    pub fn from_draft(
        draft: &AnalysisDraft<'_>,
        recommendation: Option<ModelRecommendation>,
        warnings: Vec<RunWarning>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject_key: draft.subject_key.to_string(),
            expert_key: draft.expert.map(|e| e.id.clone()),
            readings: draft.readings.clone(),
            combined_score: draft.combined_score,
            regime: draft.regime,
            signal: draft.signal,
            weights_used: draft.weights_used.clone(),
            recommendation,
            warnings,
            created_at,
        }
    }

    pub fn missing_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|k| self.readings.get(*k).is_none())
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
