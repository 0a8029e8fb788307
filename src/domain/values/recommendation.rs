use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationLabel {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl fmt::Display for RecommendationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationLabel::StrongBuy => write!(f, "STRONG_BUY"),
            RecommendationLabel::Buy => write!(f, "BUY"),
            RecommendationLabel::Hold => write!(f, "HOLD"),
            RecommendationLabel::Sell => write!(f, "SELL"),
            RecommendationLabel::StrongSell => write!(f, "STRONG_SELL"),
        }
    }
}

impl FromStr for RecommendationLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_uppercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "STRONG_BUY" => Ok(RecommendationLabel::StrongBuy),
            "BUY" => Ok(RecommendationLabel::Buy),
            "HOLD" => Ok(RecommendationLabel::Hold),
            "SELL" => Ok(RecommendationLabel::Sell),
            "STRONG_SELL" => Ok(RecommendationLabel::StrongSell),
            _ => Err(format!("Unknown recommendation: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" | "MODERATE" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            _ => Err(format!("Unknown risk level: {s}")),
        }
    }
}

/// Expected percentage moves under each scenario, when the model gave them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceScenarios {
    pub bull_pct: Option<f64>,
    pub base_pct: Option<f64>,
    pub bear_pct: Option<f64>,
}

impl PriceScenarios {
    pub fn is_empty(&self) -> bool {
        self.bull_pct.is_none() && self.base_pct.is_none() && self.bear_pct.is_none()
    }
}

/// Parsed form of a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecommendation {
    pub label: RecommendationLabel,
    pub justification: String,
    pub risk: Option<RiskLevel>,
    pub scenarios: Option<PriceScenarios>,
}
