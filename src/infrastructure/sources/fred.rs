use crate::domain::entities::reading::{MacroPayload, SourcePayload, SourceReading};
use crate::domain::error::SourceFetchError;
use crate::domain::ports::source_adapter::SourceAdapter;
use crate::domain::values::score::Score;
use crate::domain::values::source_kind::SourceKind;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::warn;

/// Cache key shared by every subject: macro conditions are market-wide.
pub const GLOBAL_KEY: &str = "GLOBAL";

const VIX: &str = "VIXCLS";
const YIELD_CURVE: &str = "T10Y2Y";
const NFCI: &str = "NFCI";

/// Macro liquidity indicators from the FRED observations API.
pub struct FredMacroSource {
    client: reqwest::Client,
    api_key: String,
    freshness: Duration,
}

impl FredMacroSource {
    pub fn new(api_key: String, freshness: Duration) -> Self {
        Self {
            client: super::http_client(),
            api_key,
            freshness,
        }
    }

    /// Latest numeric observation for a series. FRED marks gaps with ".".
    async fn latest(&self, series_id: &str) -> Result<Option<f64>, SourceFetchError> {
        let resp = self
            .client
            .get("https://api.stlouisfed.org/fred/series/observations")
            .query(&[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", "10"),
            ])
            .send()
            .await
            .map_err(|e| SourceFetchError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceFetchError::Network(format!(
                "FRED API returned {} for {series_id}",
                resp.status()
            )));
        }

        let data: ObservationsResponse = resp
            .json()
            .await
            .map_err(|e| SourceFetchError::Parse(e.to_string()))?;
        Ok(data.latest_value())
    }
}

#[derive(Debug, serde::Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, serde::Deserialize)]
struct Observation {
    value: String,
}

impl ObservationsResponse {
    fn latest_value(&self) -> Option<f64> {
        self.observations
            .iter()
            .find_map(|o| o.value.parse::<f64>().ok())
    }
}

/// Stress-threshold scoring: calm volatility, a positive curve and loose
/// financial conditions push the score up.
pub fn macro_score(payload: &MacroPayload) -> Score {
    let vix = match payload.vix {
        Some(v) if v < 15.0 => 40.0,
        Some(v) if v < 20.0 => 25.0,
        Some(v) if v <= 30.0 => -10.0,
        Some(v) if v <= 40.0 => -40.0,
        Some(_) => -60.0,
        None => 0.0,
    };
    let curve = match payload.yield_curve {
        Some(c) if c > 0.5 => 30.0,
        Some(c) if c >= 0.0 => 10.0,
        Some(_) => -30.0,
        None => 0.0,
    };
    let conditions = match payload.nfci {
        Some(n) if n < 0.0 => 30.0,
        Some(n) if n < 0.5 => -10.0,
        Some(_) => -40.0,
        None => 0.0,
    };
    Score::clamped(vix + curve + conditions)
}

pub fn interpret(payload: &MacroPayload) -> String {
    let mut parts = Vec::new();
    if let Some(v) = payload.vix {
        parts.push(match v {
            v if v < 20.0 => format!("VIX {v:.1} (calm)"),
            v if v <= 30.0 => format!("VIX {v:.1} (elevated)"),
            v => format!("VIX {v:.1} (panic)"),
        });
    }
    if let Some(c) = payload.yield_curve {
        let shape = if c < 0.0 { "inverted" } else { "normal" };
        parts.push(format!("10Y-2Y {c:+.2} ({shape})"));
    }
    if let Some(n) = payload.nfci {
        let state = if n < 0.0 { "loose" } else { "tight" };
        parts.push(format!("NFCI {n:+.2} ({state})"));
    }
    parts.join(", ")
}

#[async_trait]
impl SourceAdapter for FredMacroSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Macro
    }

    fn name(&self) -> &str {
        "fred"
    }

    fn cache_key(&self, _subject_key: &str) -> String {
        GLOBAL_KEY.to_string()
    }

    async fn fetch(&self, _subject_key: &str) -> Result<SourceReading, SourceFetchError> {
        if self.api_key.is_empty() {
            return Err(SourceFetchError::Config("FRED_API_KEY is not set".into()));
        }

        let (vix, curve, nfci) = tokio::join!(
            self.latest(VIX),
            self.latest(YIELD_CURVE),
            self.latest(NFCI)
        );
        // One missing series degrades the reading; all three missing fails it.
        let mut series = [(VIX, vix), (YIELD_CURVE, curve), (NFCI, nfci)]
            .into_iter()
            .map(|(id, r)| match r {
                Ok(v) => v,
                Err(e) => {
                    warn!(series = id, error = %e, "FRED series unavailable");
                    None
                }
            });
        let mut payload = MacroPayload {
            vix: series.next().flatten(),
            yield_curve: series.next().flatten(),
            nfci: series.next().flatten(),
            interpretation: String::new(),
        };
        if payload.vix.is_none() && payload.yield_curve.is_none() && payload.nfci.is_none() {
            return Err(SourceFetchError::NoData("No FRED series returned a value".into()));
        }
        payload.interpretation = interpret(&payload);

        Ok(SourceReading::new(
            GLOBAL_KEY,
            macro_score(&payload),
            SourcePayload::Macro(payload),
            Utc::now(),
            self.freshness,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(vix: f64, curve: f64, nfci: f64) -> MacroPayload {
        MacroPayload {
            vix: Some(vix),
            yield_curve: Some(curve),
            nfci: Some(nfci),
            interpretation: String::new(),
        }
    }

    #[test]
    fn test_cache_key_is_global() {
        let source = FredMacroSource::new(String::new(), Duration::from_secs(3600));
        assert_eq!(source.cache_key("AAPL"), GLOBAL_KEY);
        assert_eq!(source.cache_key("MSFT"), GLOBAL_KEY);
    }

    #[test]
    fn test_calm_market_scores_high() {
        assert_eq!(macro_score(&payload(13.0, 0.8, -0.5)).value(), 100.0);
    }

    #[test]
    fn test_panic_market_scores_low() {
        assert_eq!(macro_score(&payload(45.0, -0.4, 0.8)).value(), -100.0);
    }

    #[test]
    fn test_missing_series_are_neutral() {
        let p = MacroPayload {
            vix: Some(18.0),
            ..Default::default()
        };
        assert_eq!(macro_score(&p).value(), 25.0);
    }

    #[test]
    fn test_latest_value_skips_gaps() {
        let data: ObservationsResponse = serde_json::from_str(
            r#"{"observations":[{"date":"2025-01-03","value":"."},{"date":"2025-01-02","value":"17.9"}]}"#,
        )
        .unwrap();
        assert_eq!(data.latest_value(), Some(17.9));
    }

    #[test]
    fn test_interpretation() {
        let text = interpret(&payload(32.0, -0.25, 0.1));
        assert!(text.contains("panic"));
        assert!(text.contains("inverted"));
        assert!(text.contains("tight"));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let source = FredMacroSource::new(String::new(), Duration::from_secs(3600));
        let err = source.fetch("AAPL").await.unwrap_err();
        assert!(matches!(err, SourceFetchError::Config(_)));
    }
}
