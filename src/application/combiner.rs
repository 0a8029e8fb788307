//! Score Combiner: weighted fusion of per-source scores.
//!
//! Pure and deterministic. Missing sources are handled by renormalizing the
//! configured weights over the sources that are present, so an outage costs
//! precision but never blocks an analysis.

use crate::domain::entities::reading::SourceReadings;
use crate::domain::error::CombineError;
use crate::domain::values::regime::{Regime, RegimeThresholds};
use crate::domain::values::score::Score;
use crate::domain::values::source_kind::SourceKind;
use crate::domain::values::weights::SourceWeights;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    pub score: Score,
    pub regime: Regime,
    /// Renormalized weight applied to each present source.
    pub weights_used: BTreeMap<SourceKind, f64>,
}

pub fn combine(
    readings: &SourceReadings,
    weights: &SourceWeights,
    thresholds: &RegimeThresholds,
) -> Result<Combination, CombineError> {
    let present = readings.present();
    if present.is_empty() {
        return Err(CombineError::InsufficientData);
    }

    let total: f64 = present.iter().map(|k| weights.get(*k)).sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(CombineError::InsufficientData);
    }

    let mut weights_used = BTreeMap::new();
    let mut combined = 0.0;
    for kind in present {
        let w = weights.get(kind) / total;
        if let Some(reading) = readings.get(kind) {
            combined += w * reading.score.value();
        }
        weights_used.insert(kind, w);
    }

    // Renormalized weights sum to 1, so this only absorbs float error at ±100.
    let score = Score::clamped(combined);
    Ok(Combination {
        score,
        regime: thresholds.classify(score.value()),
        weights_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::reading::{
        EquityPayload, MacroPayload, SentimentPayload, SourcePayload, SourceReading,
    };
    use chrono::Utc;
    use std::time::Duration;

    fn reading(kind: SourceKind, score: f64) -> SourceReading {
        let payload = match kind {
            SourceKind::Macro => SourcePayload::Macro(MacroPayload::default()),
            SourceKind::Equity => SourcePayload::Equity(EquityPayload::default()),
            SourceKind::Sentiment => SourcePayload::Sentiment(SentimentPayload::default()),
        };
        SourceReading::new(
            "AAPL",
            Score::new(score).unwrap(),
            payload,
            Utc::now(),
            Duration::from_secs(60),
        )
    }

    fn readings(m: Option<f64>, e: Option<f64>, s: Option<f64>) -> SourceReadings {
        SourceReadings {
            macro_: m.map(|v| reading(SourceKind::Macro, v)),
            equity: e.map(|v| reading(SourceKind::Equity, v)),
            sentiment: s.map(|v| reading(SourceKind::Sentiment, v)),
        }
    }

    #[test]
    fn test_all_sources_present() {
        let c = combine(
            &readings(Some(45.0), Some(62.0), Some(58.0)),
            &SourceWeights::default(),
            &RegimeThresholds::default(),
        )
        .unwrap();
        // 45*0.40 + 62*0.35 + 58*0.25
        assert!((c.score.value() - 54.2).abs() < 1e-9);
        assert_eq!(c.regime, Regime::RiskOn);
        assert_eq!(c.weights_used.len(), 3);
    }

    #[test]
    fn test_missing_macro_renormalizes() {
        let c = combine(
            &readings(None, Some(62.0), Some(58.0)),
            &SourceWeights::default(),
            &RegimeThresholds::default(),
        )
        .unwrap();
        let we = c.weights_used[&SourceKind::Equity];
        let ws = c.weights_used[&SourceKind::Sentiment];
        assert!((we - 0.35 / 0.60).abs() < 1e-12);
        assert!((ws - 0.25 / 0.60).abs() < 1e-12);
        let expected = (62.0 * 0.35 + 58.0 * 0.25) / 0.60;
        assert!((c.score.value() - expected).abs() < 1e-9);
        assert!((c.score.value() - 60.33).abs() < 0.01);
        assert!(!c.weights_used.contains_key(&SourceKind::Macro));
    }

    #[test]
    fn test_empty_is_insufficient() {
        let err = combine(
            &SourceReadings::default(),
            &SourceWeights::default(),
            &RegimeThresholds::default(),
        )
        .unwrap_err();
        assert_eq!(err, CombineError::InsufficientData);
    }

    #[test]
    fn test_zero_weight_only_source_is_insufficient() {
        let weights = SourceWeights::new(0.0, 0.5, 0.5).unwrap();
        let err = combine(
            &readings(Some(80.0), None, None),
            &weights,
            &RegimeThresholds::default(),
        )
        .unwrap_err();
        assert_eq!(err, CombineError::InsufficientData);
    }

    #[test]
    fn test_single_source_passes_through() {
        let c = combine(
            &readings(None, None, Some(-72.5)),
            &SourceWeights::default(),
            &RegimeThresholds::default(),
        )
        .unwrap();
        assert!((c.score.value() + 72.5).abs() < 1e-9);
        assert_eq!(c.regime, Regime::Crisis);
    }

    #[test]
    fn test_score_stays_in_range_for_all_subsets_and_weights() {
        let extremes = [-100.0, -37.5, 0.0, 64.0, 100.0];
        let steps = [0.0, 0.1, 0.25, 0.4, 0.5, 0.75, 1.0];
        let thresholds = RegimeThresholds::default();
        for wm in steps {
            for we in steps {
                let ws = 1.0 - wm - we;
                if ws < -1e-9 {
                    continue;
                }
                let weights = SourceWeights {
                    macro_: wm,
                    equity: we,
                    sentiment: ws.max(0.0),
                };
                for mask in 1..8u8 {
                    for &v in &extremes {
                        let r = readings(
                            (mask & 1 != 0).then_some(v),
                            (mask & 2 != 0).then_some(-v),
                            (mask & 4 != 0).then_some(v / 2.0),
                        );
                        match combine(&r, &weights, &thresholds) {
                            Ok(c) => {
                                let s = c.score.value();
                                assert!((-100.0..=100.0).contains(&s), "score {s} out of range");
                                let sum: f64 = c.weights_used.values().sum();
                                assert!((sum - 1.0).abs() < 1e-9);
                            }
                            Err(CombineError::InsufficientData) => {
                                let present_weight: f64 = r
                                    .present()
                                    .iter()
                                    .map(|k| weights.get(*k))
                                    .sum();
                                assert!(present_weight <= 0.0);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let r = readings(Some(12.0), Some(-40.0), None);
        let a = combine(&r, &SourceWeights::default(), &RegimeThresholds::default()).unwrap();
        let b = combine(&r, &SourceWeights::default(), &RegimeThresholds::default()).unwrap();
        assert_eq!(a, b);
    }
}
