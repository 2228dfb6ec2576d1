//! Store audit queries backing the `check` command
//!
//! These catch problems the write path cannot: invariant breaks introduced
//! out of band, scores left dangling by deleted assessments, and cache rows
//! older than the leaf data feeding them.

use serde::Serialize;

use crate::config::WeightPolicy;
use crate::error::Result;

/// A sibling weight set in violation (or, under the strict policy, not yet
/// totalling 100)
#[derive(Debug, Clone, Serialize)]
pub struct WeightFinding {
    /// Which table the set lives in
    pub group: &'static str,
    /// Identifier of the parent grouping the siblings
    pub parent_id: String,
    pub total: f64,
}

/// A computed row older than the newest raw score below it
#[derive(Debug, Clone, Serialize)]
pub struct StaleFinding {
    pub entity_kind: String,
    pub entity_id: String,
    pub student_id: String,
    pub term: String,
    pub computed_at: String,
    pub newest_input: String,
}

/// Full audit report
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Sibling sets summing above 100
    pub overweight: Vec<WeightFinding>,
    /// Raw scores referencing assessments that no longer exist
    pub dangling_scores: Vec<(String, String)>,
    /// Computed rows predating their newest input
    pub stale: Vec<StaleFinding>,
    /// Strict policy only: sets not totalling exactly 100
    pub not_gradable: Vec<WeightFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.overweight.is_empty() && self.dangling_scores.is_empty() && self.stale.is_empty()
    }
}

impl crate::db::Database {
    /// Audit the whole store against the weight invariants and cache
    /// freshness.
    pub fn audit(&self, policy: WeightPolicy) -> Result<AuditReport> {
        let mut overweight = Vec::new();
        let mut not_gradable = Vec::new();

        let groups: [(&'static str, &str); 4] = [
            (
                "assessment-techniques",
                "SELECT course_outcome_id, SUM(weight) FROM assessment_techniques
                 GROUP BY course_outcome_id",
            ),
            (
                "sub-outcomes",
                "SELECT course_outcome_id, SUM(weight) FROM sub_outcomes
                 GROUP BY course_outcome_id",
            ),
            (
                "course-contributions",
                "SELECT co.course_id || ' -> ' || m.program_outcome_id, SUM(m.weight)
                 FROM course_outcome_mappings m
                 JOIN course_outcomes co ON co.id = m.course_outcome_id
                 GROUP BY co.course_id, m.program_outcome_id",
            ),
            (
                "profile-contributions",
                "SELECT graduate_profile_id, SUM(weight) FROM profile_mappings
                 GROUP BY graduate_profile_id",
            ),
        ];

        for (group, sql) in groups {
            let mut stmt = self.conn.prepare(sql)?;
            let sums = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for (parent_id, total) in sums {
                if total > 100.0 {
                    overweight.push(WeightFinding {
                        group,
                        parent_id,
                        total,
                    });
                } else if policy == WeightPolicy::Strict && total != 100.0 {
                    not_gradable.push(WeightFinding {
                        group,
                        parent_id,
                        total,
                    });
                }
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT rs.assessment_id, rs.student_id
             FROM raw_scores rs
             WHERE (rs.assessment_kind = 'technique'
                    AND NOT EXISTS (SELECT 1 FROM assessment_techniques t WHERE t.id = rs.assessment_id))
                OR (rs.assessment_kind = 'sub-outcome'
                    AND NOT EXISTS (SELECT 1 FROM sub_outcomes s WHERE s.id = rs.assessment_id))",
        )?;
        let dangling_scores = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Course-outcome rows older than the newest raw score feeding them.
        // RFC 3339 timestamps in UTC compare correctly as text.
        let mut stmt = self.conn.prepare(
            "SELECT cs.entity_kind, cs.entity_id, cs.student_id, cs.term, cs.computed_at,
                    MAX(rs.updated_at)
             FROM computed_scores cs
             JOIN assessment_techniques t ON t.course_outcome_id = cs.entity_id
             JOIN raw_scores rs
                 ON rs.assessment_kind = 'technique'
                AND rs.assessment_id = t.id
                AND rs.student_id = cs.student_id
                AND rs.term = cs.term
             WHERE cs.entity_kind = 'course-outcome'
             GROUP BY cs.entity_kind, cs.entity_id, cs.student_id, cs.term
             HAVING MAX(rs.updated_at) > cs.computed_at",
        )?;
        let stale = stmt
            .query_map([], |row| {
                Ok(StaleFinding {
                    entity_kind: row.get(0)?,
                    entity_id: row.get(1)?,
                    student_id: row.get(2)?,
                    term: row.get(3)?,
                    computed_at: row.get(4)?,
                    newest_input: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(AuditReport {
            overweight,
            dangling_scores,
            stale,
            not_gradable,
        })
    }
}
