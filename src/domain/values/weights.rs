use crate::domain::values::source_kind::SourceKind;
use serde::{Deserialize, Serialize};

const SUM_TOLERANCE: f64 = 1e-6;

/// Per-source combiner weights. Must be non-negative and sum to 1.0
/// before the combiner renormalizes them over the sources present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    #[serde(rename = "macro")]
    pub macro_: f64,
    pub equity: f64,
    pub sentiment: f64,
}

impl SourceWeights {
    pub fn new(macro_: f64, equity: f64, sentiment: f64) -> Result<Self, String> {
        let weights = Self {
            macro_,
            equity,
            sentiment,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn get(&self, kind: SourceKind) -> f64 {
        match kind {
            SourceKind::Macro => self.macro_,
            SourceKind::Equity => self.equity,
            SourceKind::Sentiment => self.sentiment,
        }
    }

    pub fn total(&self) -> f64 {
        self.macro_ + self.equity + self.sentiment
    }

    pub fn validate(&self) -> Result<(), String> {
        for kind in SourceKind::ALL {
            let w = self.get(kind);
            if !w.is_finite() || w < 0.0 {
                return Err(format!("Weight for {kind} must be a non-negative number, got {w}"));
            }
        }
        let total = self.total();
        if (total - 1.0).abs() > SUM_TOLERANCE {
            return Err(format!("Source weights must sum to 1.0, got {total}"));
        }
        Ok(())
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            macro_: 0.40,
            equity: 0.35,
            sentiment: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SourceWeights::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_sum() {
        let err = SourceWeights::new(0.5, 0.5, 0.5).unwrap_err();
        assert!(err.contains("sum to 1.0"));
    }

    #[test]
    fn test_rejects_negative() {
        assert!(SourceWeights::new(1.2, -0.2, 0.0).is_err());
    }

    #[test]
    fn test_get_by_kind() {
        let w = SourceWeights::default();
        assert_eq!(w.get(SourceKind::Macro), 0.40);
        assert_eq!(w.get(SourceKind::Equity), 0.35);
        assert_eq!(w.get(SourceKind::Sentiment), 0.25);
    }
}
