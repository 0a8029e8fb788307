//! JSON shapes printed by the binary.

use crate::application::analyze::{
    AnalysisFailure, AnalysisRun, ExpertOpinion, FailureReason, PanelRun, RunState, SourceOutcome,
};
use crate::domain::entities::analysis::{CombinedAnalysis, ModelRecommendation, RunWarning};
use crate::domain::values::recommendation::RecommendationLabel;
use crate::domain::values::regime::Regime;
use crate::domain::values::score::Score;
use crate::domain::values::signal::ScoreSignal;
use crate::domain::values::source_kind::SourceKind;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub id: &'a str,
    pub reused: bool,
    pub model_wait_ms: u128,
    pub sources: &'a [SourceOutcome],
    pub trace: &'a [RunState],
    pub analysis: &'a CombinedAnalysis,
}

impl<'a> From<&'a AnalysisRun> for RunReport<'a> {
    fn from(run: &'a AnalysisRun) -> Self {
        Self {
            id: &run.id,
            reused: run.reused,
            model_wait_ms: run.model_wait.as_millis(),
            sources: &run.sources,
            trace: &run.trace,
            analysis: &run.analysis,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub failed: bool,
    pub reason: FailureReason,
    pub state: RunState,
    pub message: &'a str,
    pub warnings: &'a [RunWarning],
    pub trace: &'a [RunState],
}

impl<'a> From<&'a AnalysisFailure> for FailureReport<'a> {
    fn from(failure: &'a AnalysisFailure) -> Self {
        Self {
            failed: true,
            reason: failure.reason,
            state: failure.state,
            message: &failure.message,
            warnings: &failure.warnings,
            trace: &failure.trace,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OpinionReport<'a> {
    pub expert_key: &'a str,
    pub analysis_id: &'a str,
    pub label: Option<RecommendationLabel>,
    pub model_wait_ms: u128,
    pub recommendation: Option<&'a ModelRecommendation>,
    pub warnings: &'a [RunWarning],
}

impl<'a> From<&'a ExpertOpinion> for OpinionReport<'a> {
    fn from(opinion: &'a ExpertOpinion) -> Self {
        Self {
            expert_key: &opinion.expert_key,
            analysis_id: &opinion.analysis_id,
            label: opinion.label(),
            model_wait_ms: opinion.model_wait.as_millis(),
            recommendation: opinion.recommendation.as_ref(),
            warnings: &opinion.warnings,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PanelReport<'a> {
    pub subject_key: &'a str,
    pub combined_score: Score,
    pub regime: Regime,
    pub signal: ScoreSignal,
    pub weights_used: &'a BTreeMap<SourceKind, f64>,
    pub sources: &'a [SourceOutcome],
    pub opinions: Vec<OpinionReport<'a>>,
    pub tally: &'a BTreeMap<RecommendationLabel, usize>,
    pub abstained: usize,
    pub consensus: Option<RecommendationLabel>,
}

impl<'a> From<&'a PanelRun> for PanelReport<'a> {
    fn from(panel: &'a PanelRun) -> Self {
        Self {
            subject_key: &panel.subject_key,
            combined_score: panel.combined_score,
            regime: panel.regime,
            signal: panel.signal,
            weights_used: &panel.weights_used,
            sources: &panel.sources,
            opinions: panel.opinions.iter().map(OpinionReport::from).collect(),
            tally: &panel.tally,
            abstained: panel.abstained,
            consensus: panel.consensus,
        }
    }
}
