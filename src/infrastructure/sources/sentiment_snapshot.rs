use crate::domain::entities::reading::{
    SentimentPayload, SentimentSnippet, SourcePayload, SourceReading,
};
use crate::domain::error::SourceFetchError;
use crate::domain::ports::source_adapter::SourceAdapter;
use crate::domain::values::score::Score;
use crate::domain::values::source_kind::SourceKind;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const MAX_SAMPLES: usize = 3;

/// Pre-scored expert snippets read from a JSON snapshot file.
///
/// Snippets are scored upstream on the [-100, 100] scale. A snippet tagged
/// with a subject only counts for that subject; untagged snippets count for
/// every subject.
pub struct SnapshotSentimentSource {
    path: PathBuf,
    freshness: Duration,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    snippets: Vec<SnapshotSnippet>,
}

#[derive(Debug, Deserialize)]
struct SnapshotSnippet {
    author: String,
    text: String,
    score: f64,
    #[serde(default)]
    subject: Option<String>,
}

impl SnapshotSentimentSource {
    pub fn new(path: impl Into<PathBuf>, freshness: Duration) -> Self {
        Self {
            path: path.into(),
            freshness,
        }
    }
}

fn aggregate(snapshot: Snapshot, subject_key: &str) -> Result<(Score, SentimentPayload), SourceFetchError> {
    let mut matching: Vec<SnapshotSnippet> = snapshot
        .snippets
        .into_iter()
        .filter(|s| s.score.is_finite())
        .filter(|s| {
            s.subject
                .as_deref()
                .map_or(true, |subj| subj.eq_ignore_ascii_case(subject_key))
        })
        .collect();
    if matching.is_empty() {
        return Err(SourceFetchError::NoData(format!(
            "No sentiment snippets for {subject_key}"
        )));
    }

    let mean = matching.iter().map(|s| s.score).sum::<f64>() / matching.len() as f64;

    let mut authors: Vec<String> = matching.iter().map(|s| s.author.clone()).collect();
    authors.sort();
    authors.dedup();

    // Strongest opinions first.
    matching.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));
    let snippet_count = matching.len();
    let samples = matching
        .into_iter()
        .take(MAX_SAMPLES)
        .map(|s| SentimentSnippet {
            author: s.author,
            text: s.text,
            score: s.score,
        })
        .collect();

    Ok((
        Score::clamped(mean),
        SentimentPayload {
            snippet_count,
            authors,
            samples,
        },
    ))
}

#[async_trait]
impl SourceAdapter for SnapshotSentimentSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Sentiment
    }

    fn name(&self) -> &str {
        "sentiment_snapshot"
    }

    async fn fetch(&self, subject_key: &str) -> Result<SourceReading, SourceFetchError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceFetchError::Config(format!("Cannot read {}: {e}", self.path.display()))
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|e| SourceFetchError::Parse(e.to_string()))?;
        let (score, payload) = aggregate(snapshot, subject_key)?;

        Ok(SourceReading::new(
            subject_key,
            score,
            SourcePayload::Sentiment(payload),
            Utc::now(),
            self.freshness,
        ))
    }
}
