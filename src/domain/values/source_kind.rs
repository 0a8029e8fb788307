use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three independent data categories fused into a combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Macro liquidity indicators (FRED). Slow-moving, shared across subjects.
    Macro,
    /// Equity fundamentals and technicals for the subject.
    Equity,
    /// Social-sentiment snippets from tracked experts.
    Sentiment,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Macro, SourceKind::Equity, SourceKind::Sentiment];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Macro => write!(f, "macro"),
            SourceKind::Equity => write!(f, "equity"),
            SourceKind::Sentiment => write!(f, "sentiment"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macro" | "fred" => Ok(SourceKind::Macro),
            "equity" | "stock" => Ok(SourceKind::Equity),
            "sentiment" | "twitter" | "social" => Ok(SourceKind::Sentiment),
            _ => Err(format!(
                "Unknown source kind: '{s}'. Use 'macro', 'equity' or 'sentiment'"
            )),
        }
    }
}
