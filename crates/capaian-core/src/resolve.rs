//! Score Resolver
//!
//! Gathers the child weights and values a rollup level needs, bottom-up.
//! Missing values surface as `None`, never zero; the hierarchy is walked
//! through adjacency queries keyed by stable identifiers rather than
//! in-memory references, so independent student/course passes stay
//! independent.
//!
//! All functions take a plain connection so the orchestrator can run them
//! inside its transaction and read its own freshly staged lower-level rows.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::rollup::{AssessmentInput, CourseInput, OutcomeInput};

/// Inputs for a course-outcome score: the outcome's assessment techniques
/// joined with the student's raw scores for the term.
///
/// A course outcome broken down into sub-outcomes instead of techniques is
/// resolved from those; techniques take precedence when both exist. An empty
/// result means the outcome has no child records at all.
pub fn resolve_course_outcome(
    conn: &Connection,
    student_id: &str,
    course_outcome_id: &str,
    term: &str,
) -> Result<Vec<AssessmentInput>> {
    let techniques = assessment_inputs(
        conn,
        "SELECT t.id, t.weight, rs.value
         FROM assessment_techniques t
         LEFT JOIN raw_scores rs
             ON rs.assessment_kind = 'technique'
            AND rs.assessment_id = t.id
            AND rs.student_id = ?1
            AND rs.term = ?3
         WHERE t.course_outcome_id = ?2
         ORDER BY t.id",
        student_id,
        course_outcome_id,
        term,
    )?;
    if !techniques.is_empty() {
        return Ok(techniques);
    }

    assessment_inputs(
        conn,
        "SELECT s.id, s.weight, rs.value
         FROM sub_outcomes s
         LEFT JOIN raw_scores rs
             ON rs.assessment_kind = 'sub-outcome'
            AND rs.assessment_id = s.id
            AND rs.student_id = ?1
            AND rs.term = ?3
         WHERE s.course_outcome_id = ?2
         ORDER BY s.id",
        student_id,
        course_outcome_id,
        term,
    )
}

fn assessment_inputs(
    conn: &Connection,
    sql: &str,
    student_id: &str,
    course_outcome_id: &str,
    term: &str,
) -> Result<Vec<AssessmentInput>> {
    let mut stmt = conn.prepare(sql)?;
    let inputs = stmt
        .query_map(params![student_id, course_outcome_id, term], |row| {
            Ok(AssessmentInput {
                assessment_id: row.get(0)?,
                weight: row.get(1)?,
                value: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(inputs)
}

/// Inputs for a program-outcome attainment: every mapping into the outcome
/// whose course the student has taken in a term up to `term`.
///
/// The score is the latest committed course-outcome value for that mapping
/// (a retake in a later term supersedes the earlier attempt); `None` when the
/// student has no computed value yet.
pub fn resolve_program_outcome(
    conn: &Connection,
    student_id: &str,
    program_outcome_id: &str,
    term: &str,
) -> Result<Vec<CourseInput>> {
    let mut stmt = conn.prepare(
        "SELECT co.course_id, co.id, c.credit_hours, m.weight,
                (SELECT cs.value FROM computed_scores cs
                  WHERE cs.entity_kind = 'course-outcome'
                    AND cs.entity_id = co.id
                    AND cs.student_id = ?1
                    AND cs.term <= ?3
                  ORDER BY cs.term DESC
                  LIMIT 1) AS score
         FROM course_outcome_mappings m
         JOIN course_outcomes co ON co.id = m.course_outcome_id
         JOIN courses c ON c.id = co.course_id
         WHERE m.program_outcome_id = ?2
           AND EXISTS (SELECT 1 FROM enrollments e
                        WHERE e.student_id = ?1
                          AND e.course_id = co.course_id
                          AND e.term <= ?3)
         ORDER BY co.course_id, co.id",
    )?;

    let inputs = stmt
        .query_map(params![student_id, program_outcome_id, term], |row| {
            Ok(CourseInput {
                course_id: row.get(0)?,
                course_outcome_id: row.get(1)?,
                credit_hours: row.get(2)?,
                weight: row.get(3)?,
                score: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(inputs)
}

/// Inputs for a graduate-profile attainment: the profile's program-outcome
/// mappings joined with the student's attainment as of `term`.
pub fn resolve_graduate_profile(
    conn: &Connection,
    student_id: &str,
    graduate_profile_id: &str,
    term: &str,
) -> Result<Vec<OutcomeInput>> {
    let mut stmt = conn.prepare(
        "SELECT pm.program_outcome_id, pm.weight,
                (SELECT cs.value FROM computed_scores cs
                  WHERE cs.entity_kind = 'program-outcome'
                    AND cs.entity_id = pm.program_outcome_id
                    AND cs.student_id = ?1
                    AND cs.term <= ?3
                  ORDER BY cs.term DESC
                  LIMIT 1) AS attainment
         FROM profile_mappings pm
         WHERE pm.graduate_profile_id = ?2
         ORDER BY pm.program_outcome_id",
    )?;

    let inputs = stmt
        .query_map(params![student_id, graduate_profile_id, term], |row| {
            Ok(OutcomeInput {
                program_outcome_id: row.get(0)?,
                weight: row.get(1)?,
                attainment: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(inputs)
}

/// Course outcomes belonging to one course
pub fn course_outcomes_of(conn: &Connection, course_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM course_outcomes WHERE course_id = ?1 ORDER BY id")?;
    let ids = stmt
        .query_map([course_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Program outcomes reachable from any of the given course outcomes
pub fn outcomes_fed_by(conn: &Connection, course_outcome_ids: &[String]) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT DISTINCT program_outcome_id FROM course_outcome_mappings
         WHERE course_outcome_id = ?1",
    )?;
    for co in course_outcome_ids {
        let targets = stmt
            .query_map([co], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for t in targets {
            if !ids.contains(&t) {
                ids.push(t);
            }
        }
    }
    ids.sort();
    Ok(ids)
}

/// Graduate profiles reachable from any of the given program outcomes
pub fn profiles_fed_by(conn: &Connection, program_outcome_ids: &[String]) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT DISTINCT graduate_profile_id FROM profile_mappings
         WHERE program_outcome_id = ?1",
    )?;
    for po in program_outcome_ids {
        let targets = stmt
            .query_map([po], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for t in targets {
            if !ids.contains(&t) {
                ids.push(t);
            }
        }
    }
    ids.sort();
    Ok(ids)
}

/// The student's enrollments, newest term last
pub fn enrollments_of(conn: &Connection, student_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT course_id, term FROM enrollments
         WHERE student_id = ?1 ORDER BY term, course_id",
    )?;
    let rows = stmt
        .query_map([student_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Students enrolled in a course for its term
pub fn students_enrolled_in(conn: &Connection, course_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, term FROM enrollments
         WHERE course_id = ?1 ORDER BY student_id, term",
    )?;
    let rows = stmt
        .query_map([course_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
