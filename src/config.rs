//! Engine configuration, read from `CONFLUENCE_*` environment variables.
//!
//! Every tunable has a default matching the production deployment; a value
//! that is present but unparsable is an error rather than a silent default.

use crate::domain::error::DomainError;
use crate::domain::values::regime::RegimeThresholds;
use crate::domain::values::source_kind::SourceKind;
use crate::domain::values::weights::SourceWeights;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How long a cached reading of each kind stays valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreshnessWindows {
    pub macro_: Duration,
    pub equity: Duration,
    pub sentiment: Duration,
}

impl FreshnessWindows {
    pub fn get(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::Macro => self.macro_,
            SourceKind::Equity => self.equity,
            SourceKind::Sentiment => self.sentiment,
        }
    }
}

impl Default for FreshnessWindows {
    fn default() -> Self {
        Self {
            macro_: Duration::from_secs(3600),
            equity: Duration::from_secs(900),
            sentiment: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// "gemini" or "disabled".
    pub provider: String,
    pub model: String,
    pub api_key: String,
    /// Minimum spacing between two calls to the provider.
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-1.5-flash".into(),
            api_key: String::new(),
            min_interval: Duration::from_secs(20),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub db_path: String,
    pub freshness: FreshnessWindows,
    /// A full analysis younger than this is returned instead of re-running.
    pub analysis_freshness: Duration,
    pub weights: SourceWeights,
    pub thresholds: RegimeThresholds,
    pub model: ModelSettings,
    pub fred_api_key: String,
    pub sentiment_snapshot: PathBuf,
    pub profiles_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: "./confluence.db".into(),
            freshness: FreshnessWindows::default(),
            analysis_freshness: Duration::from_secs(3600),
            weights: SourceWeights::default(),
            thresholds: RegimeThresholds::default(),
            model: ModelSettings::default(),
            fred_api_key: String::new(),
            sentiment_snapshot: PathBuf::from("./data/sentiment.json"),
            profiles_dir: PathBuf::from("./data/profiles"),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration, DomainError> {
            parse_or(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        let config = Self {
            db_path: lookup("CONFLUENCE_DB").unwrap_or(d.db_path),
            freshness: FreshnessWindows {
                macro_: secs("CONFLUENCE_FRESH_MACRO_SECS", d.freshness.macro_)?,
                equity: secs("CONFLUENCE_FRESH_EQUITY_SECS", d.freshness.equity)?,
                sentiment: secs("CONFLUENCE_FRESH_SENTIMENT_SECS", d.freshness.sentiment)?,
            },
            analysis_freshness: secs("CONFLUENCE_ANALYSIS_FRESH_SECS", d.analysis_freshness)?,
            weights: SourceWeights {
                macro_: parse_or(&lookup, "CONFLUENCE_WEIGHT_MACRO", d.weights.macro_)?,
                equity: parse_or(&lookup, "CONFLUENCE_WEIGHT_EQUITY", d.weights.equity)?,
                sentiment: parse_or(&lookup, "CONFLUENCE_WEIGHT_SENTIMENT", d.weights.sentiment)?,
            },
            thresholds: RegimeThresholds {
                risk_on: parse_or(&lookup, "CONFLUENCE_REGIME_RISK_ON", d.thresholds.risk_on)?,
                risk_off: parse_or(&lookup, "CONFLUENCE_REGIME_RISK_OFF", d.thresholds.risk_off)?,
                crisis: parse_or(&lookup, "CONFLUENCE_REGIME_CRISIS", d.thresholds.crisis)?,
            },
            model: ModelSettings {
                provider: lookup("CONFLUENCE_MODEL_PROVIDER").unwrap_or(d.model.provider),
                model: lookup("CONFLUENCE_MODEL_NAME").unwrap_or(d.model.model),
                api_key: lookup("GOOGLE_API_KEY").unwrap_or_default(),
                min_interval: secs("CONFLUENCE_MODEL_MIN_INTERVAL_SECS", d.model.min_interval)?,
                timeout: secs("CONFLUENCE_MODEL_TIMEOUT_SECS", d.model.timeout)?,
            },
            fred_api_key: lookup("FRED_API_KEY").unwrap_or_default(),
            sentiment_snapshot: lookup("CONFLUENCE_SENTIMENT_SNAPSHOT")
                .map(PathBuf::from)
                .unwrap_or(d.sentiment_snapshot),
            profiles_dir: lookup("CONFLUENCE_PROFILES_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.profiles_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.weights.validate().map_err(DomainError::Config)?;
        self.thresholds.validate().map_err(DomainError::Config)?;
        for kind in SourceKind::ALL {
            if self.freshness.get(kind).is_zero() {
                return Err(DomainError::Config(format!(
                    "Freshness window for {kind} must be greater than zero"
                )));
            }
        }
        if self.model.timeout.is_zero() {
            return Err(DomainError::Config("Model timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, DomainError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DomainError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
