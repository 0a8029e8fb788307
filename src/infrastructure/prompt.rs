use crate::domain::entities::analysis::AnalysisDraft;
use crate::domain::entities::reading::{SourcePayload, SourceReading};
use crate::domain::ports::prompt_adapter::PromptAdapter;
use crate::domain::values::recommendation::{
    PriceScenarios, RecommendationLabel, RiskLevel, StructuredRecommendation,
};
use crate::domain::values::source_kind::SourceKind;
use std::fmt::Write;

/// Compound labels come first so "STRONG SELL" is never read as "SELL".
const LABELS: [(&str, RecommendationLabel); 5] = [
    ("STRONG BUY", RecommendationLabel::StrongBuy),
    ("STRONG SELL", RecommendationLabel::StrongSell),
    ("BUY", RecommendationLabel::Buy),
    ("SELL", RecommendationLabel::Sell),
    ("HOLD", RecommendationLabel::Hold),
];

/// Sectioned prompt asking for a line-oriented reply, and the matching parser.
#[derive(Debug, Default, Clone)]
pub struct StructuredPromptAdapter;

impl StructuredPromptAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn section(out: &mut String, kind: SourceKind, reading: Option<&SourceReading>) {
    let title = match kind {
        SourceKind::Macro => "MACRO LIQUIDITY",
        SourceKind::Equity => "EQUITY",
        SourceKind::Sentiment => "EXPERT SENTIMENT",
    };
    let _ = writeln!(out, "## {title}");
    let Some(reading) = reading else {
        let _ = writeln!(out, "- No data available (source unavailable)\n");
        return;
    };
    let _ = writeln!(out, "- Score: {} / 100", reading.score);
    match &reading.payload {
        SourcePayload::Macro(m) => {
            if let Some(v) = m.vix {
                let _ = writeln!(out, "- VIX: {v:.1}");
            }
            if let Some(c) = m.yield_curve {
                let _ = writeln!(out, "- Yield curve (10Y-2Y): {c:+.2}");
            }
            if let Some(n) = m.nfci {
                let _ = writeln!(out, "- Financial conditions (NFCI): {n:+.2}");
            }
            if !m.interpretation.is_empty() {
                let _ = writeln!(out, "- Reading: {}", m.interpretation);
            }
        }
        SourcePayload::Equity(e) => {
            let name = e.name.as_deref().unwrap_or(&e.symbol);
            let _ = writeln!(out, "- {name} ({}) at ${:.2}", e.symbol, e.price);
            if let Some(pct) = e.change_pct {
                let _ = writeln!(out, "- Day change: {pct:+.2}%");
            }
            if let (Some(high), Some(low)) = (e.fifty_two_week_high, e.fifty_two_week_low) {
                let _ = writeln!(out, "- 52w range: ${low:.2} - ${high:.2}");
            }
            if let Some(vol) = e.volume {
                let _ = writeln!(out, "- Volume: {vol}");
            }
            if let Some(avg) = e.avg_volume {
                let _ = writeln!(out, "- Average volume: {avg}");
            }
            if let Some(rsi) = e.rsi_14 {
                let _ = writeln!(out, "- RSI(14): {rsi:.1}");
            }
            if let Some(trend) = e.trend {
                let _ = writeln!(out, "- Trend vs 50-day average: {trend}");
            }
        }
        SourcePayload::Sentiment(s) => {
            let _ = writeln!(
                out,
                "- {} snippets from {} authors",
                s.snippet_count,
                s.authors.len()
            );
            for sample in &s.samples {
                let _ = writeln!(out, "  - @{} ({:+.0}): {}", sample.author, sample.score, sample.text);
            }
        }
    }
    out.push('\n');
}

/// Label in `text`, matched on whole words.
fn find_label(text: &str) -> Option<RecommendationLabel> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase())
        .collect();
    LABELS.iter().find_map(|(phrase, label)| {
        let needle: Vec<&str> = phrase.split(' ').collect();
        words
            .windows(needle.len())
            .any(|w| w.iter().zip(&needle).all(|(a, b)| a.as_str() == *b))
            .then_some(*label)
    })
}

/// First signed number in `text`, e.g. "+15%" -> 15.0.
fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit() || c == '-' || c == '+')?;
    let rest = &text[start..];
    let end = rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Value after `KEY:` on a line, if the line starts with that key.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let trimmed = line.trim_start_matches(|c: char| c == '*' || c == '#' || c.is_whitespace());
    let (head, rest) = trimmed.split_once(':')?;
    head.trim_end_matches('*')
        .trim()
        .eq_ignore_ascii_case(key)
        .then(|| rest.trim_matches(|c: char| c == '*' || c.is_whitespace()))
}

impl PromptAdapter for StructuredPromptAdapter {
    fn build_prompt(&self, draft: &AnalysisDraft<'_>) -> String {
        let mut out = String::new();

        if let Some(expert) = draft.expert {
            let _ = writeln!(out, "You are {}, {}.", expert.name, expert.role);
            if !expert.system_prompt.is_empty() {
                let _ = writeln!(out, "{}", expert.system_prompt);
            }
            if !expert.mental_models.is_empty() {
                let _ = writeln!(out, "\nYour mental models:");
                for m in &expert.mental_models {
                    let _ = writeln!(out, "- {}: {}", m.concept, m.logic);
                }
            }
            if !expert.decision_logic.is_empty() {
                let _ = writeln!(out, "\nYour decision rules:");
                for r in &expert.decision_logic {
                    let _ = writeln!(out, "- If {} then {} ({})", r.condition, r.action, r.reasoning);
                }
            }
            out.push('\n');
        } else {
            let _ = writeln!(out, "You are a disciplined investment analyst.\n");
        }

        let _ = writeln!(out, "# ANALYSIS: {}\n", draft.subject_key);
        for kind in SourceKind::ALL {
            section(&mut out, kind, draft.readings.get(kind));
        }

        let _ = writeln!(out, "## COMBINED");
        let _ = writeln!(out, "- Combined score: {} / 100", draft.combined_score);
        let _ = writeln!(out, "- Market regime: {}", draft.regime);
        let _ = writeln!(out, "- Score signal: {}", draft.signal);
        let weights: Vec<String> = draft
            .weights_used
            .iter()
            .map(|(k, w)| format!("{k} {:.0}%", w * 100.0))
            .collect();
        let _ = writeln!(out, "- Weights: {}\n", weights.join(", "));

        let _ = writeln!(out, "## TASK");
        let _ = writeln!(
            out,
            "Give a recommendation for {} using exactly these lines:",
            draft.subject_key
        );
        out.push_str(
            "RECOMMENDATION: <STRONG BUY | BUY | HOLD | SELL | STRONG SELL>\n\
             RISK: <LOW | MEDIUM | HIGH>\n\
             JUSTIFICATION: <two or three sentences>\n\
             BULL: <expected % move if things go well>\n\
             BASE: <expected % move in the base case>\n\
             BEAR: <expected % move in the worst case>\n",
        );
        out
    }

    fn parse_response(&self, text: &str) -> Option<StructuredRecommendation> {
        let mut label = None;
        let mut risk = None;
        let mut justification = None;
        let mut scenarios = PriceScenarios::default();

        for line in text.lines() {
            if let Some(v) = field(line, "RECOMMENDATION") {
                label = label.or_else(|| find_label(v));
            } else if let Some(v) = field(line, "RISK") {
                risk = risk.or_else(|| {
                    v.split_whitespace()
                        .next()
                        .and_then(|w| w.parse::<RiskLevel>().ok())
                });
            } else if let Some(v) = field(line, "JUSTIFICATION") {
                justification = justification.or_else(|| Some(v.to_string()));
            } else if let Some(v) = field(line, "BULL") {
                scenarios.bull_pct = scenarios.bull_pct.or_else(|| first_number(v));
            } else if let Some(v) = field(line, "BASE") {
                scenarios.base_pct = scenarios.base_pct.or_else(|| first_number(v));
            } else if let Some(v) = field(line, "BEAR") {
                scenarios.bear_pct = scenarios.bear_pct.or_else(|| first_number(v));
            }
        }

        // Free-form replies: fall back to the first label anywhere in the text.
        let label = label.or_else(|| find_label(text))?;
        Some(StructuredRecommendation {
            label,
            justification: justification
                .filter(|j| !j.is_empty())
                .unwrap_or_else(|| text.trim().to_string()),
            risk,
            scenarios: (!scenarios.is_empty()).then_some(scenarios),
        })
    }
}
