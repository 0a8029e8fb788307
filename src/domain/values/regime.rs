use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse market label derived from the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Crisis,
    RiskOff,
    Neutral,
    RiskOn,
}

impl Regime {
    /// Position on the bearish→bullish axis; higher is more bullish.
    pub fn rank(&self) -> u8 {
        match self {
            Regime::Crisis => 0,
            Regime::RiskOff => 1,
            Regime::Neutral => 2,
            Regime::RiskOn => 3,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Crisis => write!(f, "CRISIS"),
            Regime::RiskOff => write!(f, "RISK_OFF"),
            Regime::Neutral => write!(f, "NEUTRAL"),
            Regime::RiskOn => write!(f, "RISK_ON"),
        }
    }
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "CRISIS" => Ok(Regime::Crisis),
            "RISK_OFF" => Ok(Regime::RiskOff),
            "NEUTRAL" => Ok(Regime::Neutral),
            "RISK_ON" => Ok(Regime::RiskOn),
            _ => Err(format!("Unknown regime: {s}")),
        }
    }
}

/// Bucketing boundaries. Must satisfy `crisis < risk_off < risk_on`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Scores at or above this are RISK_ON.
    pub risk_on: f64,
    /// Scores at or below this are RISK_OFF.
    pub risk_off: f64,
    /// Scores at or below this are CRISIS (takes precedence over RISK_OFF).
    pub crisis: f64,
}

impl RegimeThresholds {
    pub fn new(risk_on: f64, risk_off: f64, crisis: f64) -> Result<Self, String> {
        let t = Self {
            risk_on,
            risk_off,
            crisis,
        };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<(), String> {
        if ![self.risk_on, self.risk_off, self.crisis].iter().all(|v| v.is_finite()) {
            return Err("Regime thresholds must be finite".into());
        }
        if !(self.crisis < self.risk_off && self.risk_off < self.risk_on) {
            return Err(format!(
                "Regime thresholds must satisfy crisis < risk_off < risk_on, got {} / {} / {}",
                self.crisis, self.risk_off, self.risk_on
            ));
        }
        Ok(())
    }

    pub fn classify(&self, score: f64) -> Regime {
        if score <= self.crisis {
            Regime::Crisis
        } else if score <= self.risk_off {
            Regime::RiskOff
        } else if score >= self.risk_on {
            Regime::RiskOn
        } else {
            Regime::Neutral
        }
    }
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            risk_on: 30.0,
            risk_off: -30.0,
            crisis: -60.0,
        }
    }
}
