pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::analyze::{
    AnalysisFailure, AnalysisRequest, AnalysisRun, AnalyzeSettings, AnalyzeUseCase, PanelRequest,
    PanelRun, SourceAdapters,
};
use crate::application::history::{EngineStats, HistoryUseCase};
use crate::application::rate_limiter::RateLimiter;
use crate::config::EngineConfig;
use crate::domain::entities::analysis::CombinedAnalysis;
use crate::domain::entities::expert::ExpertProfile;
use crate::domain::error::DomainError;
use crate::domain::ports::analysis_repository::AnalysisRepository;
use crate::domain::ports::cache_store::CacheStore;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::model_provider::ModelProvider;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::experts::load_profiles;
use crate::infrastructure::models::disabled::DisabledProvider;
use crate::infrastructure::models::gemini::GeminiProvider;
use crate::infrastructure::prompt::StructuredPromptAdapter;
use crate::infrastructure::sources::fred::FredMacroSource;
use crate::infrastructure::sources::sentiment_snapshot::SnapshotSentimentSource;
use crate::infrastructure::sources::yahoo::YahooEquitySource;
use crate::infrastructure::sqlite::analysis_repo::SqliteAnalysisRepo;
use crate::infrastructure::sqlite::cache_store::SqliteCacheStore;
use crate::infrastructure::sqlite::open_database;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct Confluence {
    analyze_uc: AnalyzeUseCase,
    history_uc: HistoryUseCase,
}

impl Confluence {
    /// Production wiring: FRED, Yahoo and the sentiment snapshot as sources,
    /// the configured model provider, profiles from disk, wall-clock time.
    pub fn new(config: &EngineConfig) -> Result<Self, DomainError> {
        let sources = SourceAdapters {
            macro_: Arc::new(FredMacroSource::new(
                config.fred_api_key.clone(),
                config.freshness.macro_,
            )),
            equity: Arc::new(YahooEquitySource::new(config.freshness.equity)),
            sentiment: Arc::new(SnapshotSentimentSource::new(
                config.sentiment_snapshot.clone(),
                config.freshness.sentiment,
            )),
        };

        let model: Arc<dyn ModelProvider> = match config.model.provider.as_str() {
            "gemini" => Arc::new(GeminiProvider::new(
                config.model.api_key.clone(),
                Some(config.model.model.clone()),
            )),
            "disabled" | "none" => Arc::new(DisabledProvider),
            other => {
                return Err(DomainError::Config(format!(
                    "Unknown model provider: {other} (expected gemini or disabled)"
                )))
            }
        };

        let experts = load_profiles(&config.profiles_dir)?;
        Self::with_adapters(config, sources, model, experts, Arc::new(SystemClock))
    }

    pub fn with_adapters(
        config: &EngineConfig,
        sources: SourceAdapters,
        model: Arc<dyn ModelProvider>,
        experts: HashMap<String, ExpertProfile>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        let cache: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::new(
            open_database(&config.db_path)?,
            clock.clone(),
        ));
        let repo: Arc<dyn AnalysisRepository> = Arc::new(SqliteAnalysisRepo::new(
            open_database(&config.db_path)?,
            clock.clone(),
        ));
        let mut limiter = RateLimiter::new(clock.clone());
        if model.rate_limited() {
            limiter = limiter.with_interval(model.name(), config.model.min_interval);
        }
        info!(
            db = %config.db_path,
            provider = model.name(),
            experts = experts.len(),
            "engine ready"
        );

        let settings = AnalyzeSettings {
            freshness: config.freshness,
            analysis_freshness: config.analysis_freshness,
            weights: config.weights,
            thresholds: config.thresholds,
            model_timeout: config.model.timeout,
        };

        Ok(Self {
            analyze_uc: AnalyzeUseCase::new(
                sources,
                cache.clone(),
                repo.clone(),
                model,
                Arc::new(StructuredPromptAdapter::new()),
                Arc::new(limiter),
                clock,
                Arc::new(experts),
                settings,
            ),
            history_uc: HistoryUseCase::new(repo, cache),
        })
    }

    // Delegating methods
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisRun, AnalysisFailure> {
        self.analyze_uc.execute(request).await
    }

    pub async fn panel(&self, request: &PanelRequest) -> Result<PanelRun, AnalysisFailure> {
        self.analyze_uc.panel(request).await
    }

    pub fn history(
        &self,
        subject_key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CombinedAnalysis>, DomainError> {
        self.history_uc.history(Some(subject_key), limit)
    }

    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<CombinedAnalysis>, DomainError> {
        self.history_uc.recent(limit)
    }

    pub fn get(&self, id: &str) -> Result<CombinedAnalysis, DomainError> {
        self.history_uc.get(id)
    }

    pub fn delete(&self, id: &str) -> Result<(), DomainError> {
        self.history_uc.delete(id)
    }

    pub fn stats(&self) -> Result<EngineStats, DomainError> {
        self.history_uc.stats()
    }

    pub fn purge_cache(&self) -> Result<usize, DomainError> {
        self.history_uc.purge_cache()
    }
}
