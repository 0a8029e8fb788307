//! Analysis orchestration: cache-aware collection, scoring, a rate-limited
//! model call and persistence, for one subject per run. A panel run shares
//! one collection and score across several expert profiles.

use crate::application::combiner::{combine, Combination};
use crate::application::rate_limiter::RateLimiter;
use crate::config::FreshnessWindows;
use crate::domain::entities::analysis::{
    AnalysisDraft, CombinedAnalysis, ModelRecommendation, RunWarning, WarningCode,
};
use crate::domain::entities::expert::ExpertProfile;
use crate::domain::entities::reading::{SourceReading, SourceReadings};
use crate::domain::error::ModelCallError;
use crate::domain::ports::analysis_repository::AnalysisRepository;
use crate::domain::ports::cache_store::CacheStore;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::model_provider::ModelProvider;
use crate::domain::ports::prompt_adapter::PromptAdapter;
use crate::domain::ports::source_adapter::SourceAdapter;
use crate::domain::values::recommendation::RecommendationLabel;
use crate::domain::values::regime::{Regime, RegimeThresholds};
use crate::domain::values::score::Score;
use crate::domain::values::signal::ScoreSignal;
use crate::domain::values::source_kind::SourceKind;
use crate::domain::values::weights::SourceWeights;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of a single run. Forward-only; `Failed` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Collecting,
    Scoring,
    Recommending,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "PENDING"),
            RunState::Collecting => write!(f, "COLLECTING"),
            RunState::Scoring => write!(f, "SCORING"),
            RunState::Recommending => write!(f, "RECOMMENDING"),
            RunState::Persisting => write!(f, "PERSISTING"),
            RunState::Done => write!(f, "DONE"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientData,
    PersistenceError,
    InvalidRequest,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InsufficientData => write!(f, "insufficient data"),
            FailureReason::PersistenceError => write!(f, "persistence error"),
            FailureReason::InvalidRequest => write!(f, "invalid request"),
        }
    }
}

/// A run that produced no analysis. Carries the warnings gathered before the
/// failure so callers can see which sources broke.
#[derive(Debug, Clone, Error)]
#[error("Analysis failed ({reason}) during {state}: {message}")]
pub struct AnalysisFailure {
    pub reason: FailureReason,
    /// Last state reached before failing.
    pub state: RunState,
    pub message: String,
    pub warnings: Vec<RunWarning>,
    /// States visited, ending in `Failed`.
    pub trace: Vec<RunState>,
}

/// How each source's reading was obtained in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    CacheHit,
    Fetched,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub kind: SourceKind,
    pub cache_key: String,
    pub status: SourceStatus,
}

#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub id: String,
    pub analysis: CombinedAnalysis,
    /// True when a recent stored analysis was returned without running.
    pub reused: bool,
    /// Empty for a reused analysis.
    pub sources: Vec<SourceOutcome>,
    /// Time spent waiting for the model rate limit.
    pub model_wait: Duration,
    /// States visited, in order.
    pub trace: Vec<RunState>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub subject_key: String,
    pub expert_key: Option<String>,
    /// Skip reuse of a recent stored analysis. Per-source caches still apply.
    pub force: bool,
}

impl AnalysisRequest {
    pub fn new(subject_key: impl Into<String>) -> Self {
        Self {
            subject_key: subject_key.into(),
            ..Default::default()
        }
    }

    pub fn with_expert(mut self, expert_key: impl Into<String>) -> Self {
        self.expert_key = Some(expert_key.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Several expert profiles consulted on one subject.
#[derive(Debug, Clone, Default)]
pub struct PanelRequest {
    pub subject_key: String,
    pub expert_keys: Vec<String>,
}

impl PanelRequest {
    pub fn new<I, S>(subject_key: impl Into<String>, expert_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subject_key: subject_key.into(),
            expert_keys: expert_keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// One expert's answer within a panel. Each is also stored as its own analysis.
#[derive(Debug, Clone)]
pub struct ExpertOpinion {
    pub expert_key: String,
    pub analysis_id: String,
    pub recommendation: Option<ModelRecommendation>,
    /// Source warnings shared by the panel plus this expert's model warnings.
    pub warnings: Vec<RunWarning>,
    pub model_wait: Duration,
}

impl ExpertOpinion {
    pub fn label(&self) -> Option<RecommendationLabel> {
        self.recommendation
            .as_ref()
            .and_then(|r| r.structured.as_ref())
            .map(|s| s.label)
    }
}

#[derive(Debug, Clone)]
pub struct PanelRun {
    pub subject_key: String,
    pub combined_score: Score,
    pub regime: Regime,
    pub signal: ScoreSignal,
    pub weights_used: BTreeMap<SourceKind, f64>,
    pub sources: Vec<SourceOutcome>,
    /// In request order.
    pub opinions: Vec<ExpertOpinion>,
    /// Votes per recommendation label.
    pub tally: BTreeMap<RecommendationLabel, usize>,
    /// Experts whose call failed or whose reply had no label.
    pub abstained: usize,
    /// The label with the most votes, `None` on a tie or with no votes.
    pub consensus: Option<RecommendationLabel>,
    pub trace: Vec<RunState>,
}

/// One adapter per source kind.
#[derive(Clone)]
pub struct SourceAdapters {
    pub macro_: Arc<dyn SourceAdapter>,
    pub equity: Arc<dyn SourceAdapter>,
    pub sentiment: Arc<dyn SourceAdapter>,
}

impl SourceAdapters {
    pub fn get(&self, kind: SourceKind) -> &Arc<dyn SourceAdapter> {
        match kind {
            SourceKind::Macro => &self.macro_,
            SourceKind::Equity => &self.equity,
            SourceKind::Sentiment => &self.sentiment,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzeSettings {
    pub freshness: FreshnessWindows,
    pub analysis_freshness: Duration,
    pub weights: SourceWeights,
    pub thresholds: RegimeThresholds,
    pub model_timeout: Duration,
}

impl Default for AnalyzeSettings {
    fn default() -> Self {
        Self {
            freshness: FreshnessWindows::default(),
            analysis_freshness: Duration::from_secs(3600),
            weights: SourceWeights::default(),
            thresholds: RegimeThresholds::default(),
            model_timeout: Duration::from_secs(60),
        }
    }
}

struct Collected {
    outcome: SourceOutcome,
    reading: Option<SourceReading>,
    warning: Option<RunWarning>,
}

/// Records state transitions for one run.
struct Tracker {
    state: RunState,
    trace: Vec<RunState>,
    warnings: Vec<RunWarning>,
}

impl Tracker {
    fn new() -> Self {
        Self {
            state: RunState::Pending,
            trace: vec![RunState::Pending],
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
        self.trace.push(next);
    }

    fn fail(mut self, reason: FailureReason, message: impl Into<String>) -> AnalysisFailure {
        let message = message.into();
        warn!(state = %self.state, %reason, %message, "analysis failed");
        self.trace.push(RunState::Failed);
        AnalysisFailure {
            reason,
            state: self.state,
            message,
            warnings: self.warnings,
            trace: self.trace,
        }
    }
}

fn normalize_subject(raw: &str) -> Option<String> {
    let subject = raw.trim().to_uppercase();
    (!subject.is_empty()).then_some(subject)
}

fn draft_for<'a>(
    subject: &'a str,
    expert: Option<&'a ExpertProfile>,
    readings: &'a SourceReadings,
    combination: &'a Combination,
) -> AnalysisDraft<'a> {
    AnalysisDraft {
        subject_key: subject,
        expert,
        readings,
        combined_score: combination.score,
        regime: combination.regime,
        signal: ScoreSignal::from_score(combination.score.value()),
        weights_used: &combination.weights_used,
    }
}

/// Votes per label, abstentions, and the unique top label if there is one.
pub fn tally_votes(
    opinions: &[ExpertOpinion],
) -> (BTreeMap<RecommendationLabel, usize>, usize, Option<RecommendationLabel>) {
    let mut tally = BTreeMap::new();
    let mut abstained = 0;
    for opinion in opinions {
        match opinion.label() {
            Some(label) => *tally.entry(label).or_insert(0) += 1,
            None => abstained += 1,
        }
    }

    let top = tally.values().copied().max().unwrap_or(0);
    let consensus = {
        let mut leaders = tally.iter().filter(|(_, n)| **n == top).map(|(label, _)| *label);
        match (leaders.next(), leaders.next()) {
            (Some(label), None) => Some(label),
            _ => None,
        }
    };
    (tally, abstained, consensus)
}

pub struct AnalyzeUseCase {
    sources: SourceAdapters,
    cache: Arc<dyn CacheStore>,
    repo: Arc<dyn AnalysisRepository>,
    model: Arc<dyn ModelProvider>,
    prompt: Arc<dyn PromptAdapter>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    experts: Arc<HashMap<String, ExpertProfile>>,
    settings: AnalyzeSettings,
}

impl AnalyzeUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: SourceAdapters,
        cache: Arc<dyn CacheStore>,
        repo: Arc<dyn AnalysisRepository>,
        model: Arc<dyn ModelProvider>,
        prompt: Arc<dyn PromptAdapter>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        experts: Arc<HashMap<String, ExpertProfile>>,
        settings: AnalyzeSettings,
    ) -> Self {
        Self {
            sources,
            cache,
            repo,
            model,
            prompt,
            limiter,
            clock,
            experts,
            settings,
        }
    }

    pub async fn execute(&self, request: &AnalysisRequest) -> Result<AnalysisRun, AnalysisFailure> {
        let mut run = Tracker::new();

        let Some(subject) = normalize_subject(&request.subject_key) else {
            return Err(run.fail(FailureReason::InvalidRequest, "Subject key must not be empty"));
        };
        let expert = match request.expert_key.as_deref() {
            None => None,
            Some(key) => match self.experts.get(key) {
                Some(profile) => Some(profile),
                None => {
                    return Err(run.fail(
                        FailureReason::InvalidRequest,
                        format!("Unknown expert profile: {key}"),
                    ))
                }
            },
        };

        if !request.force {
            if let Some(analysis) = self.recent(&subject, request.expert_key.as_deref()) {
                info!(subject = %subject, id = %analysis.id, "reusing recent analysis");
                run.advance(RunState::Done);
                return Ok(AnalysisRun {
                    id: analysis.id.clone(),
                    analysis,
                    reused: true,
                    sources: Vec::new(),
                    model_wait: Duration::ZERO,
                    trace: run.trace,
                });
            }
        }

        let (readings, sources) = self.gather(&subject, &mut run).await;

        run.advance(RunState::Scoring);
        let combination = match self.score(&subject, &readings) {
            Ok(c) => c,
            Err(message) => return Err(run.fail(FailureReason::InsufficientData, message)),
        };
        let draft = draft_for(&subject, expert, &readings, &combination);

        run.advance(RunState::Recommending);
        let (recommendation, model_wait) = self.recommend(&draft, &mut run.warnings).await;

        run.advance(RunState::Persisting);
        let analysis = CombinedAnalysis::from_draft(
            &draft,
            recommendation,
            run.warnings.clone(),
            self.clock.now(),
        );
        let id = match self.persist(&analysis).await {
            Ok(id) => id,
            Err(message) => return Err(run.fail(FailureReason::PersistenceError, message)),
        };

        run.advance(RunState::Done);
        info!(
            subject = %subject,
            id = %id,
            warnings = analysis.warnings.len(),
            "analysis stored"
        );
        Ok(AnalysisRun {
            id,
            analysis,
            reused: false,
            sources,
            model_wait,
            trace: run.trace,
        })
    }

    /// Consult several experts on one subject. Sources are collected and
    /// scored once; each expert gets its own rate-limited model call and its
    /// own stored analysis. Never reuses stored analyses.
    pub async fn panel(&self, request: &PanelRequest) -> Result<PanelRun, AnalysisFailure> {
        let mut run = Tracker::new();

        let Some(subject) = normalize_subject(&request.subject_key) else {
            return Err(run.fail(FailureReason::InvalidRequest, "Subject key must not be empty"));
        };
        let mut experts: Vec<&ExpertProfile> = Vec::new();
        for key in request.expert_keys.iter().map(|k| k.trim()) {
            match self.experts.get(key) {
                Some(profile) if experts.iter().any(|e| e.id == profile.id) => {}
                Some(profile) => experts.push(profile),
                None => {
                    return Err(run.fail(
                        FailureReason::InvalidRequest,
                        format!("Unknown expert profile: {key}"),
                    ))
                }
            }
        }
        if experts.is_empty() {
            return Err(run.fail(
                FailureReason::InvalidRequest,
                "A panel needs at least one expert profile",
            ));
        }

        let (readings, sources) = self.gather(&subject, &mut run).await;

        run.advance(RunState::Scoring);
        let combination = match self.score(&subject, &readings) {
            Ok(c) => c,
            Err(message) => return Err(run.fail(FailureReason::InsufficientData, message)),
        };

        run.advance(RunState::Recommending);
        let mut answers = Vec::with_capacity(experts.len());
        for expert in &experts {
            let draft = draft_for(&subject, Some(*expert), &readings, &combination);
            let mut warnings = run.warnings.clone();
            let (recommendation, wait) = self.recommend(&draft, &mut warnings).await;
            debug!(subject = %subject, expert = %expert.id, "panel answer received");
            answers.push((*expert, recommendation, warnings, wait));
        }

        run.advance(RunState::Persisting);
        let mut opinions = Vec::with_capacity(answers.len());
        for (expert, recommendation, warnings, model_wait) in answers {
            let draft = draft_for(&subject, Some(expert), &readings, &combination);
            let analysis = CombinedAnalysis::from_draft(
                &draft,
                recommendation,
                warnings,
                self.clock.now(),
            );
            let analysis_id = match self.persist(&analysis).await {
                Ok(id) => id,
                Err(message) => return Err(run.fail(FailureReason::PersistenceError, message)),
            };
            opinions.push(ExpertOpinion {
                expert_key: expert.id.clone(),
                analysis_id,
                recommendation: analysis.recommendation,
                warnings: analysis.warnings,
                model_wait,
            });
        }

        run.advance(RunState::Done);
        let (tally, abstained, consensus) = tally_votes(&opinions);
        info!(
            subject = %subject,
            experts = opinions.len(),
            abstained,
            consensus = ?consensus,
            "panel complete"
        );
        Ok(PanelRun {
            subject_key: subject,
            combined_score: combination.score,
            regime: combination.regime,
            signal: ScoreSignal::from_score(combination.score.value()),
            weights_used: combination.weights_used,
            sources,
            opinions,
            tally,
            abstained,
            consensus,
            trace: run.trace,
        })
    }

    /// Newest stored analysis worth reusing. Degraded records (a failed
    /// source or model call) are skipped so the next run can recover.
    fn recent(&self, subject: &str, expert_key: Option<&str>) -> Option<CombinedAnalysis> {
        let found = match self
            .repo
            .load_recent(subject, expert_key, self.settings.analysis_freshness)
        {
            Ok(found) => found?,
            Err(e) => {
                warn!(subject, error = %e, "recent analysis lookup failed, running fresh");
                return None;
            }
        };
        if found.is_degraded() {
            debug!(subject, id = %found.id, "recent analysis is degraded, running fresh");
            return None;
        }
        Some(found)
    }

    async fn gather(
        &self,
        subject: &str,
        run: &mut Tracker,
    ) -> (SourceReadings, Vec<SourceOutcome>) {
        run.advance(RunState::Collecting);
        let (m, e, s) = tokio::join!(
            self.collect(SourceKind::Macro, subject),
            self.collect(SourceKind::Equity, subject),
            self.collect(SourceKind::Sentiment, subject),
        );
        let mut readings = SourceReadings::default();
        let mut sources = Vec::with_capacity(3);
        for collected in [m, e, s] {
            readings.set(collected.outcome.kind, collected.reading);
            run.warnings.extend(collected.warning);
            sources.push(collected.outcome);
        }
        (readings, sources)
    }

    fn score(&self, subject: &str, readings: &SourceReadings) -> Result<Combination, String> {
        let combination = combine(readings, &self.settings.weights, &self.settings.thresholds)
            .map_err(|e| e.to_string())?;
        info!(
            subject,
            score = %combination.score,
            regime = %combination.regime,
            sources = combination.weights_used.len(),
            "combined score"
        );
        Ok(combination)
    }

    /// Single-statement write on a blocking task. It runs to completion even
    /// if the caller stops polling this future.
    async fn persist(&self, analysis: &CombinedAnalysis) -> Result<String, String> {
        let repo = self.repo.clone();
        let record = analysis.clone();
        match tokio::task::spawn_blocking(move || repo.save(&record)).await {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Save task aborted: {e}")),
        }
    }

    async fn collect(&self, kind: SourceKind, subject: &str) -> Collected {
        let adapter = self.sources.get(kind);
        let cache_key = adapter.cache_key(subject);
        let outcome = |status| SourceOutcome {
            kind,
            cache_key: cache_key.clone(),
            status,
        };

        if let Some(reading) = self.cache.get(kind, &cache_key) {
            debug!(%kind, key = %cache_key, "cache hit");
            return Collected {
                outcome: outcome(SourceStatus::CacheHit),
                reading: Some(reading),
                warning: None,
            };
        }
        debug!(%kind, key = %cache_key, adapter = adapter.name(), "cache miss, fetching");

        let error = match adapter.fetch(subject).await {
            Ok(reading) if reading.kind() == kind => {
                self.cache
                    .put(kind, &cache_key, &reading, self.settings.freshness.get(kind));
                return Collected {
                    outcome: outcome(SourceStatus::Fetched),
                    reading: Some(reading),
                    warning: None,
                };
            }
            Ok(reading) => format!(
                "{} returned a {} reading for a {kind} slot",
                adapter.name(),
                reading.kind()
            ),
            Err(e) => format!("{}: {e}", adapter.name()),
        };

        warn!(%kind, subject, error = %error, "source unavailable");
        Collected {
            outcome: outcome(SourceStatus::Failed),
            reading: None,
            warning: Some(RunWarning::source(WarningCode::SourceFetchError, kind, error)),
        }
    }

    async fn recommend(
        &self,
        draft: &AnalysisDraft<'_>,
        warnings: &mut Vec<RunWarning>,
    ) -> (Option<ModelRecommendation>, Duration) {
        let prompt = self.prompt.build_prompt(draft);
        let provider = self.model.name().to_string();
        let waited = self.limiter.await_turn(&provider).await;

        let timeout = self.settings.model_timeout;
        let outcome = match tokio::time::timeout(timeout, self.model.generate(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ModelCallError::Timeout(timeout)),
        };
        let text = match outcome {
            Ok(text) => text,
            Err(e) => {
                warn!(provider = %provider, error = %e, "model call failed");
                warnings.push(RunWarning::general(WarningCode::ModelCallError, e.to_string()));
                return (None, waited);
            }
        };

        let structured = self.prompt.parse_response(&text);
        if structured.is_none() {
            warn!(provider = %provider, "model reply had no recognizable recommendation");
            warnings.push(RunWarning::general(
                WarningCode::ResponseUnparsed,
                "Model reply had no recognizable recommendation; raw text kept",
            ));
        }
        (
            Some(ModelRecommendation {
                provider,
                model: self.model.model().to_string(),
                raw_text: text,
                structured,
            }),
            waited,
        )
    }
}
