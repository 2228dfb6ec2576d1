//! Weight Validator
//!
//! Guards the 100% weight-sum invariant for every sibling group before a
//! weighted record is committed. The check is a pure read plus comparison
//! over the caller's connection, so a write operation can run it inside its
//! own transaction and two concurrent edits of the same sibling set cannot
//! both slip under the limit.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{CapaianError, Result};

/// The sibling groups whose weights may never sum above 100%
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiblingSet {
    /// All assessment techniques under one course outcome
    Techniques { course_outcome_id: String },
    /// All sub-outcomes under one course outcome (independent of techniques)
    SubOutcomes { course_outcome_id: String },
    /// All mappings from one course's outcomes into one program outcome
    CourseContribution {
        course_id: String,
        program_outcome_id: String,
    },
    /// All program-outcome mappings into one graduate profile
    ProfileContribution { graduate_profile_id: String },
}

impl SiblingSet {
    /// Sum the current weights of the set, excluding the record being replaced
    fn current_total(&self, conn: &Connection, excluding: Option<&str>) -> Result<f64> {
        let total: Option<f64> = match self {
            SiblingSet::Techniques { course_outcome_id } => conn
                .query_row(
                    "SELECT SUM(weight) FROM assessment_techniques
                     WHERE course_outcome_id = ?1 AND (?2 IS NULL OR id != ?2)",
                    rusqlite::params![course_outcome_id, excluding],
                    |row| row.get(0),
                )
                .optional()?
                .flatten(),
            SiblingSet::SubOutcomes { course_outcome_id } => conn
                .query_row(
                    "SELECT SUM(weight) FROM sub_outcomes
                     WHERE course_outcome_id = ?1 AND (?2 IS NULL OR id != ?2)",
                    rusqlite::params![course_outcome_id, excluding],
                    |row| row.get(0),
                )
                .optional()?
                .flatten(),
            SiblingSet::CourseContribution {
                course_id,
                program_outcome_id,
            } => conn
                .query_row(
                    "SELECT SUM(m.weight)
                     FROM course_outcome_mappings m
                     JOIN course_outcomes co ON co.id = m.course_outcome_id
                     WHERE co.course_id = ?1
                       AND m.program_outcome_id = ?2
                       AND (?3 IS NULL OR m.course_outcome_id != ?3)",
                    rusqlite::params![course_id, program_outcome_id, excluding],
                    |row| row.get(0),
                )
                .optional()?
                .flatten(),
            SiblingSet::ProfileContribution {
                graduate_profile_id,
            } => conn
                .query_row(
                    "SELECT SUM(weight) FROM profile_mappings
                     WHERE graduate_profile_id = ?1
                       AND (?2 IS NULL OR program_outcome_id != ?2)",
                    rusqlite::params![graduate_profile_id, excluding],
                    |row| row.get(0),
                )
                .optional()?
                .flatten(),
        };

        Ok(total.unwrap_or(0.0))
    }
}

/// Check that `proposed` can join the sibling set without the total passing 100.
///
/// `excluding` names the record being replaced on an edit so its old weight
/// does not count against the new one. Equality with 100 passes; strictly
/// greater fails with [`CapaianError::WeightOverflow`] carrying the current
/// total. The proposed weight itself must be within 0-100; out-of-range
/// values are rejected, never clamped.
pub fn validate_weight(
    conn: &Connection,
    set: &SiblingSet,
    proposed: f64,
    excluding: Option<&str>,
) -> Result<()> {
    if !(0.0..=100.0).contains(&proposed) || !proposed.is_finite() {
        return Err(CapaianError::WeightOutOfRange(proposed));
    }

    let current_total = set.current_total(conn, excluding)?;

    if current_total + proposed > 100.0 {
        return Err(CapaianError::WeightOverflow {
            current_total,
            proposed,
        });
    }

    Ok(())
}
