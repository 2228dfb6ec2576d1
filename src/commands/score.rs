//! `capaian score` command - record a raw score and recompute
//!
//! This is the leaf-write path: the score commits first, then the affected
//! (student, course) hierarchy is recomputed unless --no-recompute was given.

use capaian_core::error::{CapaianError, Result};
use capaian_core::model::AssessmentKind;
use capaian_core::recompute::{recompute_student_course, CancelFlag};
use capaian_core::store::Store;

use crate::cli::Cli;

#[allow(clippy::too_many_arguments)]
pub fn execute(
    cli: &Cli,
    store: &mut Store,
    cancel: &CancelFlag,
    student: &str,
    assessment: &str,
    kind: AssessmentKind,
    term: &str,
    value: f64,
    no_recompute: bool,
) -> Result<()> {
    store
        .db()
        .record_raw_score(student, kind, assessment, term, value)?;

    if no_recompute {
        tracing::debug!(student, assessment, "score recorded without recompute");
        return Ok(());
    }

    // The score's course is derived from the assessment's outcome
    let table = match kind {
        AssessmentKind::Technique => "assessment_techniques",
        AssessmentKind::SubOutcome => "sub_outcomes",
    };
    let course_id: String = store
        .db()
        .conn()
        .query_row(
            &format!(
                "SELECT co.course_id FROM {} a
                 JOIN course_outcomes co ON co.id = a.course_outcome_id
                 WHERE a.id = ?1",
                table
            ),
            [assessment],
            |row| row.get(0),
        )
        .map_err(|_| CapaianError::UnknownEntity {
            kind: "assessment",
            id: assessment.to_string(),
        })?;

    let report = recompute_student_course(store.db_mut(), student, &course_id, term, cancel)?;

    super::recompute::render_report(cli, &report)
}
