//! Attainment Query Service
//!
//! Read-side access to committed rolled-up values. Never triggers a
//! recompute; a node in scope without a committed row is reported as
//! not-yet-assessed rather than defaulting to zero.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::model::EntityKind;

/// Attainment status of one node for one student
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Attainment {
    /// A committed computed value
    Assessed { value: f64, computed_at: String },
    /// No committed value exists; explicitly not zero
    NotYetAssessed,
}

/// One row of a query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttainmentRow {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub entity_name: String,
    pub student_id: String,
    /// Term the value was computed for; the latest one when the query did
    /// not filter by term
    pub term: Option<String>,
    #[serde(flatten)]
    pub attainment: Attainment,
}

/// Filters for an attainment query
#[derive(Debug, Clone, Default)]
pub struct AttainmentFilter {
    /// Restrict to one academic term (otherwise: latest value per node)
    pub term: Option<String>,
    /// Restrict to one hierarchy level (otherwise: all three)
    pub level: Option<EntityKind>,
}

impl Database {
    /// Attainment of every node in one student's hierarchy.
    ///
    /// The scope is derived from the student's enrollments: the outcomes of
    /// the courses they took, the program outcomes those feed, and the
    /// profiles above them.
    pub fn attainment_for_student(
        &self,
        student_id: &str,
        filter: &AttainmentFilter,
    ) -> Result<Vec<AttainmentRow>> {
        let mut rows = Vec::new();

        if level_selected(filter, EntityKind::CourseOutcome) {
            rows.extend(self.query_level(
                "SELECT DISTINCT co.id, co.name
                 FROM course_outcomes co
                 JOIN enrollments e ON e.course_id = co.course_id
                 WHERE e.student_id = ?1
                 ORDER BY co.id",
                EntityKind::CourseOutcome,
                student_id,
                filter,
            )?);
        }
        if level_selected(filter, EntityKind::ProgramOutcome) {
            rows.extend(self.query_level(
                "SELECT DISTINCT po.id, po.name
                 FROM program_outcomes po
                 JOIN course_outcome_mappings m ON m.program_outcome_id = po.id
                 JOIN course_outcomes co ON co.id = m.course_outcome_id
                 JOIN enrollments e ON e.course_id = co.course_id
                 WHERE e.student_id = ?1
                 ORDER BY po.id",
                EntityKind::ProgramOutcome,
                student_id,
                filter,
            )?);
        }
        if level_selected(filter, EntityKind::GraduateProfile) {
            rows.extend(self.query_level(
                "SELECT DISTINCT gp.id, gp.name
                 FROM graduate_profiles gp
                 JOIN profile_mappings pm ON pm.graduate_profile_id = gp.id
                 JOIN course_outcome_mappings m ON m.program_outcome_id = pm.program_outcome_id
                 JOIN course_outcomes co ON co.id = m.course_outcome_id
                 JOIN enrollments e ON e.course_id = co.course_id
                 WHERE e.student_id = ?1
                 ORDER BY gp.id",
                EntityKind::GraduateProfile,
                student_id,
                filter,
            )?);
        }

        Ok(rows)
    }

    /// Cohort view: course-outcome attainment of every student enrolled in a
    /// course.
    pub fn attainment_for_course(
        &self,
        course_id: &str,
        filter: &AttainmentFilter,
    ) -> Result<Vec<AttainmentRow>> {
        let students = crate::resolve::students_enrolled_in(&self.conn, course_id)?;
        let outcome_filter = AttainmentFilter {
            term: filter.term.clone(),
            level: Some(EntityKind::CourseOutcome),
        };

        let mut rows = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for (student_id, _term) in students {
            if !seen.insert(student_id.clone()) {
                continue;
            }
            for row in self.attainment_for_student(&student_id, &outcome_filter)? {
                // keep only this course's outcomes
                let belongs: bool = self.conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM course_outcomes
                      WHERE id = ?1 AND course_id = ?2)",
                    params![row.entity_id, course_id],
                    |r| r.get(0),
                )?;
                if belongs {
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    /// Cohort view: attainment of every student enrolled in any course of a
    /// program.
    pub fn attainment_for_program(
        &self,
        program_id: &str,
        filter: &AttainmentFilter,
    ) -> Result<Vec<AttainmentRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT e.student_id
             FROM enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE c.program_id = ?1
             ORDER BY e.student_id",
        )?;
        let students = stmt
            .query_map([program_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for student_id in students {
            rows.extend(self.attainment_for_student(&student_id, filter)?);
        }
        Ok(rows)
    }

    /// Attainment rows for one level of one student's hierarchy
    fn query_level(
        &self,
        scope_sql: &str,
        kind: EntityKind,
        student_id: &str,
        filter: &AttainmentFilter,
    ) -> Result<Vec<AttainmentRow>> {
        let mut stmt = self.conn.prepare(scope_sql)?;
        let nodes = stmt
            .query_map([student_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for (entity_id, entity_name) in nodes {
            let found = latest_computed(
                &self.conn,
                kind,
                &entity_id,
                student_id,
                filter.term.as_deref(),
            )?;
            let (term, attainment) = match found {
                Some((term, value, computed_at)) => {
                    (Some(term), Attainment::Assessed { value, computed_at })
                }
                None => (filter.term.clone(), Attainment::NotYetAssessed),
            };
            rows.push(AttainmentRow {
                entity_kind: kind,
                entity_id,
                entity_name,
                student_id: student_id.to_string(),
                term,
                attainment,
            });
        }
        Ok(rows)
    }
}

fn level_selected(filter: &AttainmentFilter, kind: EntityKind) -> bool {
    filter.level.map_or(true, |l| l == kind)
}

/// Latest committed value for a node, optionally capped at a term
fn latest_computed(
    conn: &Connection,
    kind: EntityKind,
    entity_id: &str,
    student_id: &str,
    term: Option<&str>,
) -> Result<Option<(String, f64, String)>> {
    use rusqlite::OptionalExtension;

    let row = conn
        .query_row(
            "SELECT term, value, computed_at FROM computed_scores
             WHERE entity_kind = ?1 AND entity_id = ?2 AND student_id = ?3
               AND (?4 IS NULL OR term = ?4)
             ORDER BY term DESC
             LIMIT 1",
            params![kind.as_str(), entity_id, student_id, term],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssessmentKind;
    use crate::recompute::{recompute_student_course, CancelFlag};

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.put_program("TI", "Informatika").unwrap();
        db.put_course("IF101", "TI", "2024-1", "Algoritma", 3).unwrap();
        db.put_course_outcome("CPMK-1", "IF101", "Dasar algoritma")
            .unwrap();
        db.put_technique("UTS", "CPMK-1", "Ujian Tengah", 100.0, None)
            .unwrap();
        db.put_program_outcome("CPL-1", "TI", "Komputasi").unwrap();
        db.map_course_outcome("CPMK-1", "CPL-1", 100.0).unwrap();
        db.enroll("2311001", "IF101", "2024-1").unwrap();
        db
    }

    #[test]
    fn test_unassessed_is_flagged_not_zero() {
        let db = seeded_db();
        let rows = db
            .attainment_for_student("2311001", &AttainmentFilter::default())
            .unwrap();

        assert_eq!(rows.len(), 2); // CPMK-1 and CPL-1, no profile mapped
        for row in rows {
            assert_eq!(row.attainment, Attainment::NotYetAssessed);
        }
    }

    #[test]
    fn test_assessed_value_served_with_timestamp() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 88.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        let rows = db
            .attainment_for_student(
                "2311001",
                &AttainmentFilter {
                    level: Some(EntityKind::CourseOutcome),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        match &rows[0].attainment {
            Attainment::Assessed { value, computed_at } => {
                assert_eq!(*value, 88.0);
                assert!(!computed_at.is_empty());
            }
            other => panic!("expected assessed, got {:?}", other),
        }
    }

    #[test]
    fn test_term_filter_misses_other_terms() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 88.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        let rows = db
            .attainment_for_student(
                "2311001",
                &AttainmentFilter {
                    term: Some("2025-1".to_string()),
                    level: Some(EntityKind::CourseOutcome),
                },
            )
            .unwrap();
        assert_eq!(rows[0].attainment, Attainment::NotYetAssessed);
    }

    #[test]
    fn test_query_never_recomputes() {
        let db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 88.0)
            .unwrap();

        // raw score present but no recompute ran: still not-yet-assessed
        let rows = db
            .attainment_for_student(
                "2311001",
                &AttainmentFilter {
                    level: Some(EntityKind::CourseOutcome),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rows[0].attainment, Attainment::NotYetAssessed);
    }

    #[test]
    fn test_course_cohort_view() {
        let mut db = seeded_db();
        db.enroll("2311002", "IF101", "2024-1").unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 88.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        let rows = db
            .attainment_for_course("IF101", &AttainmentFilter::default())
            .unwrap();
        assert_eq!(rows.len(), 2);

        let assessed = rows
            .iter()
            .find(|r| r.student_id == "2311001")
            .unwrap();
        assert!(matches!(assessed.attainment, Attainment::Assessed { .. }));
        let pending = rows
            .iter()
            .find(|r| r.student_id == "2311002")
            .unwrap();
        assert_eq!(pending.attainment, Attainment::NotYetAssessed);
    }

    #[test]
    fn test_program_cohort_view_filters_level() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 88.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        let rows = db
            .attainment_for_program(
                "TI",
                &AttainmentFilter {
                    level: Some(EntityKind::ProgramOutcome),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "CPL-1");
        assert!(matches!(rows[0].attainment, Attainment::Assessed { .. }));
    }
}
