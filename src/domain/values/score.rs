use serde::{Deserialize, Serialize};
use std::fmt;

pub const SCORE_MIN: f64 = -100.0;
pub const SCORE_MAX: f64 = 100.0;

/// A per-source or combined score, always finite and inside [-100, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("Score must be a finite number, got {value}"));
        }
        if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
            return Err(format!(
                "Score must be between {SCORE_MIN} and {SCORE_MAX}, got {value}"
            ));
        }
        Ok(Score(value))
    }

    /// Clamp a raw heuristic value into range. NaN collapses to 0.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Score(0.0);
        }
        Score(value.clamp(SCORE_MIN, SCORE_MAX))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.1}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_bounds() {
        assert_eq!(Score::new(-100.0).unwrap().value(), -100.0);
        assert_eq!(Score::new(100.0).unwrap().value(), 100.0);
        assert_eq!(Score::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn test_rejects_out_of_range_and_nan() {
        assert!(Score::new(100.01).is_err());
        assert!(Score::new(-150.0).is_err());
        assert!(Score::new(f64::NAN).is_err());
        assert!(Score::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_clamped() {
        assert_eq!(Score::clamped(250.0).value(), 100.0);
        assert_eq!(Score::clamped(-250.0).value(), -100.0);
        assert_eq!(Score::clamped(f64::NAN).value(), 0.0);
        assert_eq!(Score::clamped(42.5).value(), 42.5);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Score = serde_json::from_str("54.2").unwrap();
        assert_eq!(ok.value(), 54.2);
        assert!(serde_json::from_str::<Score>("101").is_err());
    }
}
