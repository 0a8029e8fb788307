use crate::domain::entities::analysis::CombinedAnalysis;
use crate::domain::error::DomainError;
use crate::domain::ports::analysis_repository::*;
use crate::domain::ports::clock::Clock;
use crate::domain::values::score::Score;
use crate::infrastructure::sqlite::migrations::{parse_timestamp, timestamp};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

const SELECT_COLS: &str = "id, subject_key, expert_key, combined_score, regime, signal, readings, weights_used, recommendation, warnings, created_at";

pub struct SqliteAnalysisRepo {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

/// Raw column values, decoded outside the rusqlite row callback so JSON and
/// enum errors surface as `DomainError::Parse`.
struct AnalysisRow {
    id: String,
    subject_key: String,
    expert_key: Option<String>,
    combined_score: f64,
    regime: String,
    signal: String,
    readings: String,
    weights_used: String,
    recommendation: Option<String>,
    warnings: String,
    created_at: String,
}

impl AnalysisRow {
    fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            subject_key: row.get(1)?,
            expert_key: row.get(2)?,
            combined_score: row.get(3)?,
            regime: row.get(4)?,
            signal: row.get(5)?,
            readings: row.get(6)?,
            weights_used: row.get(7)?,
            recommendation: row.get(8)?,
            warnings: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn decode(self) -> Result<CombinedAnalysis, DomainError> {
        Ok(CombinedAnalysis {
            combined_score: Score::new(self.combined_score).map_err(DomainError::Parse)?,
            regime: self.regime.parse().map_err(DomainError::Parse)?,
            signal: serde_json::from_value(serde_json::Value::String(self.signal))?,
            readings: serde_json::from_str(&self.readings)?,
            weights_used: serde_json::from_str(&self.weights_used)?,
            recommendation: self
                .recommendation
                .map(|r| serde_json::from_str(&r))
                .transpose()?,
            warnings: serde_json::from_str(&self.warnings)?,
            created_at: parse_timestamp(&self.created_at)?,
            id: self.id,
            subject_key: self.subject_key,
            expert_key: self.expert_key,
        })
    }
}

impl SqliteAnalysisRepo {
    pub fn new(conn: Connection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    /// Decode rows, skipping (and logging) any that no longer parse.
    fn decode_all(rows: Vec<AnalysisRow>) -> Vec<CombinedAnalysis> {
        rows.into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                match row.decode() {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(id = %id, error = %e, "skipping unreadable analysis row");
                        None
                    }
                }
            })
            .collect()
    }
}

impl AnalysisRepository for SqliteAnalysisRepo {
    fn save(&self, analysis: &CombinedAnalysis) -> Result<String, DomainError> {
        let readings = serde_json::to_string(&analysis.readings)?;
        let weights = serde_json::to_string(&analysis.weights_used)?;
        let recommendation = analysis
            .recommendation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let warnings = serde_json::to_string(&analysis.warnings)?;

        let conn = self.lock()?;
        conn.execute(
            &format!("INSERT INTO analyses ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                analysis.id,
                analysis.subject_key,
                analysis.expert_key,
                analysis.combined_score.value(),
                analysis.regime.to_string(),
                analysis.signal.to_string(),
                readings,
                weights,
                recommendation,
                warnings,
                timestamp(analysis.created_at),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to save analysis: {e}")))?;
        Ok(analysis.id.clone())
    }

    fn load_recent(
        &self,
        subject_key: &str,
        expert_key: Option<&str>,
        max_age: Duration,
    ) -> Result<Option<CombinedAnalysis>, DomainError> {
        let age = chrono::Duration::from_std(max_age)
            .map_err(|e| DomainError::InvalidInput(format!("max_age out of range: {e}")))?;
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(age)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLS} FROM analyses
                     WHERE subject_key = ?1 AND expert_key IS ?2 AND created_at >= ?3
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![subject_key, expert_key, timestamp(cutoff)],
                AnalysisRow::from_row,
            )
            .optional()?;
        drop(conn);
        row.map(AnalysisRow::decode).transpose()
    }

    fn get_by_id(&self, id: &str) -> Result<Option<CombinedAnalysis>, DomainError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLS} FROM analyses WHERE id = ?1"),
                params![id],
                AnalysisRow::from_row,
            )
            .optional()?;
        drop(conn);
        row.map(AnalysisRow::decode).transpose()
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<CombinedAnalysis>, DomainError> {
        let conn = self.lock()?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM analyses WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(subject) = &filter.subject_key {
            sql.push_str(&format!(" AND subject_key = ?{}", param_values.len() + 1));
            param_values.push(Box::new(subject.clone()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<AnalysisRow> = stmt
            .query_map(params_refs.as_slice(), AnalysisRow::from_row)?
            .collect::<Result<_, _>>()?;
        Ok(Self::decode_all(rows))
    }

    fn delete(&self, id: &str) -> Result<bool, DomainError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM analyses WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn stats(&self) -> Result<AnalysisStats, DomainError> {
        let conn = self.lock()?;
        let total_analyses: usize =
            conn.query_row("SELECT COUNT(*) FROM analyses", [], |r| r.get(0))?;
        let unique_subjects: usize = conn.query_row(
            "SELECT COUNT(DISTINCT subject_key) FROM analyses",
            [],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT subject_key, COUNT(*) AS n FROM analyses
             GROUP BY subject_key ORDER BY n DESC, subject_key ASC LIMIT 5",
        )?;
        let top_subjects = stmt
            .query_map([], |row| {
                Ok(SubjectCount {
                    subject_key: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AnalysisStats {
            total_analyses,
            unique_subjects,
            top_subjects,
        })
    }
}
