use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric rating band for the combined score, shown next to the model's own label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreSignal {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl ScoreSignal {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ScoreSignal::StrongBuy
        } else if score >= 30.0 {
            ScoreSignal::Buy
        } else if score > -30.0 {
            ScoreSignal::Hold
        } else if score > -70.0 {
            ScoreSignal::Sell
        } else {
            ScoreSignal::StrongSell
        }
    }
}

impl fmt::Display for ScoreSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreSignal::StrongSell => write!(f, "STRONG_SELL"),
            ScoreSignal::Sell => write!(f, "SELL"),
            ScoreSignal::Hold => write!(f, "HOLD"),
            ScoreSignal::Buy => write!(f, "BUY"),
            ScoreSignal::StrongBuy => write!(f, "STRONG_BUY"),
        }
    }
}
