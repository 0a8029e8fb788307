use crate::domain::entities::reading::{EquityPayload, SourcePayload, SourceReading, Trend};
use crate::domain::error::SourceFetchError;
use crate::domain::ports::source_adapter::SourceAdapter;
use crate::domain::values::score::Score;
use crate::domain::values::source_kind::SourceKind;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use std::time::Duration;

const CHART_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const RSI_PERIOD: usize = 14;
const MA_PERIOD: usize = 50;

/// Equity quotes and three months of daily closes from the Yahoo Finance v8
/// chart API (no auth required).
pub struct YahooEquitySource {
    client: reqwest::Client,
    freshness: Duration,
}

impl YahooEquitySource {
    pub fn new(freshness: Duration) -> Self {
        Self {
            client: super::http_client(),
            freshness,
        }
    }
}

/// Chart URL with the subject as one escaped path segment.
fn chart_url(subject_key: &str) -> Result<Url, SourceFetchError> {
    let mut url = Url::parse(CHART_BASE).map_err(|e| SourceFetchError::Config(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| SourceFetchError::Config(format!("Cannot extend {CHART_BASE}")))?
        .push(subject_key);
    url.query_pairs_mut()
        .append_pair("range", "3mo")
        .append_pair("interval", "1d");
    Ok(url)
}

#[derive(Debug, serde::Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, serde::Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct ChartData {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

/// Daily bars; Yahoo leaves nulls for halted or missing days.
#[derive(Debug, Default, serde::Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
    #[serde(default)]
    fifty_two_week_high: Option<f64>,
    #[serde(default)]
    fifty_two_week_low: Option<f64>,
}

impl ChartData {
    fn into_payload(self) -> Result<EquityPayload, SourceFetchError> {
        let series = self
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .unwrap_or_default();
        let closes: Vec<f64> = series.close.into_iter().flatten().collect();
        let volumes: Vec<u64> = series.volume.into_iter().flatten().collect();
        let meta = self.meta;

        let price = meta
            .regular_market_price
            .or_else(|| closes.last().copied())
            .ok_or_else(|| SourceFetchError::NoData(format!("No price for {}", meta.symbol)))?;
        // chartPreviousClose is the close before the range, so prefer the bars.
        let previous_close = match closes.len() {
            0 | 1 => meta.chart_previous_close,
            n => Some(closes[n - 2]),
        };
        let change_pct = previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| (price - prev) / prev * 100.0);
        let avg_volume = (!volumes.is_empty())
            .then(|| volumes.iter().sum::<u64>() / volumes.len() as u64);

        Ok(EquityPayload {
            name: meta.short_name.or(meta.long_name),
            price,
            previous_close,
            change_pct,
            fifty_two_week_high: meta.fifty_two_week_high,
            fifty_two_week_low: meta.fifty_two_week_low,
            volume: meta.regular_market_volume,
            avg_volume,
            rsi_14: rsi(&closes, RSI_PERIOD),
            trend: trend(&closes, price),
            symbol: meta.symbol,
        })
    }
}

/// RSI over the last `period` close-to-close changes, using simple means of
/// gains and losses. `None` without `period + 1` closes or on a flat series.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
    let (gain, loss) = (gains / period as f64, losses / period as f64);
    match (gain > 0.0, loss > 0.0) {
        (false, false) => None,
        (_, false) => Some(100.0),
        _ => Some(100.0 - 100.0 / (1.0 + gain / loss)),
    }
}

/// Price against the 50-day simple moving average.
pub fn trend(closes: &[f64], price: f64) -> Option<Trend> {
    if closes.len() < MA_PERIOD {
        return None;
    }
    let ma = closes[closes.len() - MA_PERIOD..].iter().sum::<f64>() / MA_PERIOD as f64;
    Some(if price > ma * 1.02 {
        Trend::Up
    } else if price < ma * 0.98 {
        Trend::Down
    } else {
        Trend::Sideways
    })
}

/// Four parts, clamped to [-100, 100]:
///
/// - momentum: 10 points per percent of day change, capped at ±30
/// - range: position in the 52-week range, -30 at the low to +30 at the high
/// - trend: ±20 against the 50-day average
/// - RSI: up to -20 when overbought above 70, up to +20 when oversold below 30
pub fn equity_score(payload: &EquityPayload) -> Score {
    let momentum = payload
        .change_pct
        .map(|pct| (pct * 10.0).clamp(-30.0, 30.0))
        .unwrap_or(0.0);

    let range = match (payload.fifty_two_week_high, payload.fifty_two_week_low) {
        (Some(high), Some(low)) if high > low => {
            let position = ((payload.price - low) / (high - low)).clamp(0.0, 1.0);
            (position - 0.5) * 60.0
        }
        _ => 0.0,
    };

    let trend = match payload.trend {
        Some(Trend::Up) => 20.0,
        Some(Trend::Down) => -20.0,
        Some(Trend::Sideways) | None => 0.0,
    };

    let rsi = match payload.rsi_14 {
        Some(r) if r > 70.0 => -(r - 70.0) / 30.0 * 20.0,
        Some(r) if r < 30.0 => (30.0 - r) / 30.0 * 20.0,
        _ => 0.0,
    };

    Score::clamped(momentum + range + trend + rsi)
}

#[async_trait]
impl SourceAdapter for YahooEquitySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Equity
    }

    fn name(&self) -> &str {
        "yahoo_finance"
    }

    async fn fetch(&self, subject_key: &str) -> Result<SourceReading, SourceFetchError> {
        let url = chart_url(subject_key)?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceFetchError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceFetchError::Network(format!(
                "Yahoo API returned {} for {subject_key}",
                resp.status()
            )));
        }

        let data: ChartResponse = resp
            .json()
            .await
            .map_err(|e| SourceFetchError::Parse(e.to_string()))?;

        if let Some(err) = data.chart.error {
            return Err(SourceFetchError::Parse(format!("Yahoo error: {err}")));
        }

        let payload = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| SourceFetchError::NoData(format!("Empty chart results for {subject_key}")))?
            .into_payload()?;
        Ok(SourceReading::new(
            subject_key,
            equity_score(&payload),
            SourcePayload::Equity(payload),
            Utc::now(),
            self.freshness,
        ))
    }
}
