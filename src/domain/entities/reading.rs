use crate::domain::values::duration_secs;
use crate::domain::values::score::Score;
use crate::domain::values::source_kind::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Macro liquidity snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroPayload {
    /// CBOE volatility index.
    pub vix: Option<f64>,
    /// 10Y-2Y treasury spread, in percentage points.
    pub yield_curve: Option<f64>,
    /// Chicago Fed national financial conditions index.
    pub nfci: Option<f64>,
    pub interpretation: String,
}

/// Price against its 50-day moving average, with a ±2% band counted as sideways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Sideways => write!(f, "sideways"),
        }
    }
}

/// Equity quote, range and daily technicals for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquityPayload {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub change_pct: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub volume: Option<u64>,
    /// Mean daily volume over the fetched range.
    #[serde(default)]
    pub avg_volume: Option<u64>,
    /// 14-day RSI on simple averages; needs 15 closes.
    #[serde(default)]
    pub rsi_14: Option<f64>,
    /// `None` with fewer than 50 closes.
    #[serde(default)]
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnippet {
    pub author: String,
    pub text: String,
    pub score: f64,
}

/// Aggregated expert sentiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentPayload {
    pub snippet_count: usize,
    pub authors: Vec<String>,
    /// A handful of representative snippets, not the full set.
    pub samples: Vec<SentimentSnippet>,
}

/// Source-specific normalized data. The variant determines the reading's source kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourcePayload {
    Macro(MacroPayload),
    Equity(EquityPayload),
    Sentiment(SentimentPayload),
}

impl SourcePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourcePayload::Macro(_) => SourceKind::Macro,
            SourcePayload::Equity(_) => SourceKind::Equity,
            SourcePayload::Sentiment(_) => SourceKind::Sentiment,
        }
    }
}

/// One normalized observation from a source adapter. Never mutated once built;
/// a refresh produces a new reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReading {
    pub subject_key: String,
    pub score: Score,
    pub payload: SourcePayload,
    pub fetched_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub freshness: Duration,
}

impl SourceReading {
    pub fn new(
        subject_key: impl Into<String>,
        score: Score,
        payload: SourcePayload,
        fetched_at: DateTime<Utc>,
        freshness: Duration,
    ) -> Self {
        Self {
            subject_key: subject_key.into(),
            score,
            payload,
            fetched_at,
            freshness,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.payload.kind()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        expiry(self.fetched_at, self.freshness)
    }
}

/// `start + window`, saturating instead of overflowing.
pub fn expiry(start: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A cached reading with its own expiry. Superseded on refresh, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub kind: SourceKind,
    pub subject_key: String,
    pub reading: SourceReading,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(subject_key: impl Into<String>, reading: SourceReading, freshness: Duration) -> Self {
        Self {
            kind: reading.kind(),
            subject_key: subject_key.into(),
            expires_at: expiry(reading.fetched_at, freshness),
            reading,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// The three per-source slots of an analysis; `None` means the source was absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReadings {
    #[serde(rename = "macro")]
    pub macro_: Option<SourceReading>,
    pub equity: Option<SourceReading>,
    pub sentiment: Option<SourceReading>,
}

impl SourceReadings {
    pub fn get(&self, kind: SourceKind) -> Option<&SourceReading> {
        match kind {
            SourceKind::Macro => self.macro_.as_ref(),
            SourceKind::Equity => self.equity.as_ref(),
            SourceKind::Sentiment => self.sentiment.as_ref(),
        }
    }

    pub fn set(&mut self, kind: SourceKind, reading: Option<SourceReading>) {
        match kind {
            SourceKind::Macro => self.macro_ = reading,
            SourceKind::Equity => self.equity = reading,
            SourceKind::Sentiment => self.sentiment = reading,
        }
    }

    pub fn present(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|k| self.get(*k).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn equity_reading(at: DateTime<Utc>) -> SourceReading {
        SourceReading::new(
            "AAPL",
            Score::new(62.0).unwrap(),
            SourcePayload::Equity(EquityPayload {
                symbol: "AAPL".into(),
                price: 180.0,
                ..Default::default()
            }),
            at,
            Duration::from_secs(900),
        )
    }

    #[test]
    fn test_kind_follows_payload() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 15, 0, 0).unwrap();
        assert_eq!(equity_reading(at).kind(), SourceKind::Equity);
    }

    #[test]
    fn test_cache_entry_expiry_boundary() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 15, 0, 0).unwrap();
        let entry = CacheEntry::new("AAPL", equity_reading(at), Duration::from_secs(900));
        assert_eq!(entry.expires_at, at + chrono::Duration::seconds(900));
        assert!(entry.is_fresh(at + chrono::Duration::seconds(900)));
        assert!(!entry.is_fresh(at + chrono::Duration::seconds(901)));
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 15, 0, 0).unwrap();
        let json = serde_json::to_value(equity_reading(at)).unwrap();
        assert_eq!(json["payload"]["kind"], "equity");
        assert_eq!(json["freshness"], 900);
        let back: SourceReading = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), SourceKind::Equity);
    }

    #[test]
    fn test_readings_present() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 15, 0, 0).unwrap();
        let mut readings = SourceReadings::default();
        assert!(readings.is_empty());
        readings.set(SourceKind::Equity, Some(equity_reading(at)));
        assert_eq!(readings.present(), vec![SourceKind::Equity]);
    }
}
