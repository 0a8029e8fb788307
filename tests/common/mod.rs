//! Shared test helpers: scripted adapters, a scripted model and an
//! in-memory engine driven by a manual clock.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use confluence::application::analyze::{AnalyzeSettings, AnalyzeUseCase, SourceAdapters};
use confluence::application::rate_limiter::RateLimiter;
use confluence::domain::entities::analysis::CombinedAnalysis;
use confluence::domain::entities::expert::ExpertProfile;
use confluence::domain::entities::reading::{
    EquityPayload, MacroPayload, SentimentPayload, SourcePayload, SourceReading,
};
use confluence::domain::error::{DomainError, ModelCallError, SourceFetchError};
use confluence::domain::ports::analysis_repository::{
    AnalysisRepository, AnalysisStats, HistoryFilter,
};
use confluence::domain::ports::clock::Clock;
use confluence::domain::ports::model_provider::ModelProvider;
use confluence::domain::ports::source_adapter::SourceAdapter;
use confluence::domain::values::score::Score;
use confluence::domain::values::source_kind::SourceKind;
use confluence::infrastructure::clock::ManualClock;
use confluence::infrastructure::prompt::StructuredPromptAdapter;
use confluence::infrastructure::sqlite::analysis_repo::SqliteAnalysisRepo;
use confluence::infrastructure::sqlite::cache_store::SqliteCacheStore;
use confluence::infrastructure::sqlite::open_database;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const MODEL_INTERVAL: Duration = Duration::from_secs(20);

pub const GOOD_REPLY: &str = "RECOMMENDATION: BUY\nRISK: MEDIUM\nJUSTIFICATION: Liquidity and momentum agree.\nBULL: +15%\nBASE: +5%\nBEAR: -10%";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 14, 30, 0).unwrap()
}

pub fn payload_for(kind: SourceKind, subject: &str) -> SourcePayload {
    match kind {
        SourceKind::Macro => SourcePayload::Macro(MacroPayload {
            vix: Some(17.5),
            yield_curve: Some(0.35),
            nfci: Some(-0.4),
            interpretation: "calm".into(),
        }),
        SourceKind::Equity => SourcePayload::Equity(EquityPayload {
            symbol: subject.into(),
            price: 180.0,
            change_pct: Some(1.2),
            ..Default::default()
        }),
        SourceKind::Sentiment => SourcePayload::Sentiment(SentimentPayload {
            snippet_count: 4,
            authors: vec!["macro_mike".into()],
            samples: vec![],
        }),
    }
}

/// Source adapter returning a fixed score, or failing while `score` is `None`.
pub struct ScriptedSource {
    kind: SourceKind,
    score: Mutex<Option<f64>>,
    shared_key: Option<String>,
    freshness: Duration,
    clock: Arc<ManualClock>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind, score: Option<f64>, clock: Arc<ManualClock>) -> Self {
        Self {
            kind,
            score: Mutex::new(score),
            shared_key: None,
            freshness: Duration::from_secs(900),
            clock,
            calls: AtomicUsize::new(0),
        }
    }

    /// Cache under one key for every subject, like the macro adapter.
    pub fn shared(mut self, key: &str) -> Self {
        self.shared_key = Some(key.into());
        self
    }

    pub fn set_score(&self, score: Option<f64>) {
        *self.score.lock().unwrap() = score;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn cache_key(&self, subject_key: &str) -> String {
        self.shared_key
            .clone()
            .unwrap_or_else(|| subject_key.to_string())
    }

    async fn fetch(&self, subject_key: &str) -> Result<SourceReading, SourceFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = *self.score.lock().unwrap();
        match score {
            Some(s) => Ok(SourceReading::new(
                subject_key,
                Score::new(s).unwrap(),
                payload_for(self.kind, subject_key),
                self.clock.now(),
                self.freshness,
            )),
            None => Err(SourceFetchError::Network(format!(
                "{} upstream unreachable",
                self.kind
            ))),
        }
    }
}

#[derive(Clone)]
pub enum ModelScript {
    Reply(String),
    Fail,
    /// Sleeps (real time) before replying; used to trip the timeout.
    Hang(Duration),
}

pub struct ScriptedModel {
    name: String,
    script: Mutex<ModelScript>,
    clock: Arc<ManualClock>,
    calls: Mutex<Vec<DateTime<Utc>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(name: &str, script: ModelScript, clock: Arc<ManualClock>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            clock,
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_script(&self, script: ModelScript) {
        *self.script.lock().unwrap() = script;
    }

    /// Virtual time of each call.
    pub fn call_times(&self) -> Vec<DateTime<Utc>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelCallError> {
        self.calls.lock().unwrap().push(self.clock.now());
        self.prompts.lock().unwrap().push(prompt.to_string());
        let script = self.script.lock().unwrap().clone();
        match script {
            ModelScript::Reply(text) => Ok(text),
            ModelScript::Fail => Err(ModelCallError::Provider("quota exhausted".into())),
            ModelScript::Hang(d) => {
                tokio::time::sleep(d).await;
                Ok(GOOD_REPLY.into())
            }
        }
    }
}

/// Repository whose writes always fail.
pub struct FailingRepo;

impl AnalysisRepository for FailingRepo {
    fn save(&self, _analysis: &CombinedAnalysis) -> Result<String, DomainError> {
        Err(DomainError::Database("disk I/O error".into()))
    }

    fn load_recent(
        &self,
        _subject_key: &str,
        _expert_key: Option<&str>,
        _max_age: Duration,
    ) -> Result<Option<CombinedAnalysis>, DomainError> {
        Ok(None)
    }

    fn get_by_id(&self, _id: &str) -> Result<Option<CombinedAnalysis>, DomainError> {
        Ok(None)
    }

    fn list(&self, _filter: &HistoryFilter) -> Result<Vec<CombinedAnalysis>, DomainError> {
        Ok(vec![])
    }

    fn delete(&self, _id: &str) -> Result<bool, DomainError> {
        Ok(false)
    }

    fn stats(&self) -> Result<AnalysisStats, DomainError> {
        Ok(AnalysisStats::default())
    }
}

/// Repository whose `save` parks until `release` is called. `entered` fires
/// when a save starts and `saved` once the row is written.
pub struct GatedRepo {
    inner: SqliteAnalysisRepo,
    pub entered: Notify,
    pub saved: Notify,
    release_tx: Mutex<mpsc::Sender<()>>,
    release_rx: Mutex<mpsc::Receiver<()>>,
}

impl GatedRepo {
    pub fn new() -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            inner: SqliteAnalysisRepo::new(
                open_database(":memory:").unwrap(),
                Arc::new(ManualClock::new(start_time())),
            ),
            entered: Notify::new(),
            saved: Notify::new(),
            release_tx: Mutex::new(release_tx),
            release_rx: Mutex::new(release_rx),
        }
    }

    pub fn release(&self) {
        self.release_tx.lock().unwrap().send(()).unwrap();
    }
}

impl AnalysisRepository for GatedRepo {
    fn save(&self, analysis: &CombinedAnalysis) -> Result<String, DomainError> {
        self.entered.notify_one();
        self.release_rx.lock().unwrap().recv().unwrap();
        let id = self.inner.save(analysis);
        self.saved.notify_one();
        id
    }

    fn load_recent(
        &self,
        subject_key: &str,
        expert_key: Option<&str>,
        max_age: Duration,
    ) -> Result<Option<CombinedAnalysis>, DomainError> {
        self.inner.load_recent(subject_key, expert_key, max_age)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<CombinedAnalysis>, DomainError> {
        self.inner.get_by_id(id)
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<CombinedAnalysis>, DomainError> {
        self.inner.list(filter)
    }

    fn delete(&self, id: &str) -> Result<bool, DomainError> {
        self.inner.delete(id)
    }

    fn stats(&self) -> Result<AnalysisStats, DomainError> {
        self.inner.stats()
    }
}

pub fn dalio() -> ExpertProfile {
    serde_json::from_str(
        r#"{"id":"dalio","name":"Ray Dalio","role":"macro investor",
            "system_prompt":"Diversify across economic environments.",
            "mental_models":[{"concept":"Debt cycle","logic":"Credit expansions end in deleveraging"}]}"#,
    )
    .unwrap()
}

pub fn howell() -> ExpertProfile {
    serde_json::from_str(
        r#"{"id":"howell","name":"Michael Howell","role":"liquidity analyst",
            "system_prompt":"Liquidity leads asset prices.",
            "mental_models":[{"concept":"Global liquidity","logic":"Follow central bank balance sheets"}]}"#,
    )
    .unwrap()
}

/// An orchestrator over in-memory SQLite with scripted collaborators.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub macro_source: Arc<ScriptedSource>,
    pub equity_source: Arc<ScriptedSource>,
    pub sentiment_source: Arc<ScriptedSource>,
    pub model: Arc<ScriptedModel>,
    pub cache: Arc<SqliteCacheStore>,
    pub repo: Arc<dyn AnalysisRepository>,
    pub engine: Arc<AnalyzeUseCase>,
}

pub struct HarnessBuilder {
    scores: [Option<f64>; 3],
    script: ModelScript,
    repo: Option<Arc<dyn AnalysisRepository>>,
    settings: AnalyzeSettings,
}

impl HarnessBuilder {
    pub fn scores(mut self, macro_: Option<f64>, equity: Option<f64>, sentiment: Option<f64>) -> Self {
        self.scores = [macro_, equity, sentiment];
        self
    }

    pub fn model(mut self, script: ModelScript) -> Self {
        self.script = script;
        self
    }

    pub fn repo(mut self, repo: Arc<dyn AnalysisRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn model_timeout(mut self, timeout: Duration) -> Self {
        self.settings.model_timeout = timeout;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(start_time()));
        let [m, e, s] = self.scores;
        let macro_source =
            Arc::new(ScriptedSource::new(SourceKind::Macro, m, clock.clone()).shared("GLOBAL"));
        let equity_source = Arc::new(ScriptedSource::new(SourceKind::Equity, e, clock.clone()));
        let sentiment_source =
            Arc::new(ScriptedSource::new(SourceKind::Sentiment, s, clock.clone()));
        let model = Arc::new(ScriptedModel::new("gemini", self.script, clock.clone()));

        let cache = Arc::new(SqliteCacheStore::new(
            open_database(":memory:").unwrap(),
            clock.clone(),
        ));
        let repo: Arc<dyn AnalysisRepository> = self.repo.unwrap_or_else(|| {
            Arc::new(SqliteAnalysisRepo::new(
                open_database(":memory:").unwrap(),
                clock.clone(),
            ))
        });
        let limiter = Arc::new(RateLimiter::new(clock.clone()).with_interval("gemini", MODEL_INTERVAL));
        let experts = HashMap::from([
            ("howell".to_string(), howell()),
            ("dalio".to_string(), dalio()),
        ]);

        let engine = Arc::new(AnalyzeUseCase::new(
            SourceAdapters {
                macro_: macro_source.clone(),
                equity: equity_source.clone(),
                sentiment: sentiment_source.clone(),
            },
            cache.clone(),
            repo.clone(),
            model.clone(),
            Arc::new(StructuredPromptAdapter::new()),
            limiter,
            clock.clone(),
            Arc::new(experts),
            self.settings,
        ));

        Harness {
            clock,
            macro_source,
            equity_source,
            sentiment_source,
            model,
            cache,
            repo,
            engine,
        }
    }
}

impl Harness {
    /// Scenario-A scores (45 / 62 / 58) with a well-formed model reply.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            scores: [Some(45.0), Some(62.0), Some(58.0)],
            script: ModelScript::Reply(GOOD_REPLY.into()),
            repo: None,
            settings: AnalyzeSettings::default(),
        }
    }

    pub fn new() -> Harness {
        Self::builder().build()
    }

    pub fn fetch_counts(&self) -> [usize; 3] {
        [
            self.macro_source.calls(),
            self.equity_source.calls(),
            self.sentiment_source.calls(),
        ]
    }
}
