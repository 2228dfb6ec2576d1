//! Raw leaf scores and the computed-score cache
//!
//! Raw scores are range-checked on write. Computed rows are only ever written
//! through the orchestrator's transaction; the upsert leaves `computed_at`
//! untouched when the value is unchanged so an idempotent recompute stores
//! byte-identical rows.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CapaianError, Result};
use crate::model::{AssessmentKind, ComputedScore, EntityKind, RawScore};

impl super::Database {
    /// Record one student's score for an assessment in a term.
    ///
    /// Values outside 0-100 are rejected, never clamped. The assessment must
    /// exist; scores cannot dangle.
    pub fn record_raw_score(
        &self,
        student_id: &str,
        kind: AssessmentKind,
        assessment_id: &str,
        term: &str,
        value: f64,
    ) -> Result<()> {
        if !(0.0..=100.0).contains(&value) || !value.is_finite() {
            return Err(CapaianError::ScoreOutOfRange(value));
        }

        let table = match kind {
            AssessmentKind::Technique => "assessment_techniques",
            AssessmentKind::SubOutcome => "sub_outcomes",
        };
        if !self.exists(table, assessment_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "assessment",
                id: assessment_id.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO raw_scores (student_id, assessment_kind, assessment_id, term, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(student_id, assessment_kind, assessment_id, term)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![
                student_id,
                kind.as_str(),
                assessment_id,
                term,
                value,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn raw_score(
        &self,
        student_id: &str,
        kind: AssessmentKind,
        assessment_id: &str,
        term: &str,
    ) -> Result<Option<RawScore>> {
        let row = self
            .conn
            .query_row(
                "SELECT value, updated_at FROM raw_scores
                 WHERE student_id = ?1 AND assessment_kind = ?2 AND assessment_id = ?3 AND term = ?4",
                params![student_id, kind.as_str(), assessment_id, term],
                |row| {
                    Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?))
                },
            )
            .optional()?;

        Ok(row.map(|(value, updated_at)| RawScore {
            student_id: student_id.to_string(),
            assessment_kind: kind,
            assessment_id: assessment_id.to_string(),
            term: term.to_string(),
            value,
            updated_at,
        }))
    }

    pub fn computed_score(
        &self,
        entity_kind: EntityKind,
        entity_id: &str,
        student_id: &str,
        term: &str,
    ) -> Result<Option<ComputedScore>> {
        read_computed(&self.conn, entity_kind, entity_id, student_id, term)
    }
}

/// Read one computed row over any connection (shared with the orchestrator's
/// transaction).
pub(crate) fn read_computed(
    conn: &Connection,
    entity_kind: EntityKind,
    entity_id: &str,
    student_id: &str,
    term: &str,
) -> Result<Option<ComputedScore>> {
    let row = conn
        .query_row(
            "SELECT value, computed_at FROM computed_scores
             WHERE entity_kind = ?1 AND entity_id = ?2 AND student_id = ?3 AND term = ?4",
            params![entity_kind.as_str(), entity_id, student_id, term],
            |row| Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    Ok(row.map(|(value, computed_at)| ComputedScore {
        entity_kind,
        entity_id: entity_id.to_string(),
        student_id: student_id.to_string(),
        term: term.to_string(),
        value,
        computed_at,
    }))
}

/// Upsert one computed row; an unchanged value keeps its original
/// `computed_at` so repeat recomputes store byte-identical rows.
pub(crate) fn upsert_computed(
    conn: &Connection,
    entity_kind: EntityKind,
    entity_id: &str,
    student_id: &str,
    term: &str,
    value: f64,
    computed_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO computed_scores (entity_kind, entity_id, student_id, term, value, computed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(entity_kind, entity_id, student_id, term)
         DO UPDATE SET value = excluded.value, computed_at = excluded.computed_at
         WHERE computed_scores.value IS NOT excluded.value",
        params![
            entity_kind.as_str(),
            entity_id,
            student_id,
            term,
            value,
            computed_at,
        ],
    )?;
    Ok(())
}

/// Drop a cached row whose inputs no longer produce a value.
pub(crate) fn delete_computed(
    conn: &Connection,
    entity_kind: EntityKind,
    entity_id: &str,
    student_id: &str,
    term: &str,
) -> Result<()> {
    conn.execute(
        "DELETE FROM computed_scores
         WHERE entity_kind = ?1 AND entity_id = ?2 AND student_id = ?3 AND term = ?4",
        params![entity_kind.as_str(), entity_id, student_id, term],
    )?;
    Ok(())
}
