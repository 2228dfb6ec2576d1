//! Recompute Orchestrator
//!
//! Drives one transactional pass over every node a leaf change can reach,
//! strictly bottom-up: all affected course outcomes first, then program
//! outcomes, then graduate profiles, because each level resolves against the
//! previous level's freshly staged rows.
//!
//! One request is one store transaction. A fingerprint of every lower-level
//! row read during resolution is re-checked before the writes land; any
//! difference aborts the request with `ConcurrentModification` for the caller
//! to retry. Cancellation is honored at every phase boundary until
//! persistence begins; after that the transaction runs to commit or rolls
//! back whole.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::scores::{delete_computed, read_computed, upsert_computed};
use crate::db::Database;
use crate::error::{CapaianError, Result};
use crate::model::{ComputedScore, EntityKind};
use crate::resolve;
use crate::rollup::{self, SkipReason};

/// Phases of one recompute request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecomputePhase {
    Pending,
    ResolvingInputs,
    Computing,
    Persisting,
    Committed,
    Aborted,
}

/// What to recompute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeScope {
    /// One (student, course) pair after a leaf score write
    StudentCourse {
        student_id: String,
        course_id: String,
        term: String,
    },
    /// Every enrollment of one student
    Student { student_id: String },
    /// Every student enrolled in one course
    Course { course_id: String },
}

/// Cooperative cancellation flag shared with the caller (e.g. a ctrl-c handler)
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A node the pass visited but wrote nothing for
#[derive(Debug, Clone, Serialize)]
pub struct SkippedNode {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub student_id: String,
    pub term: String,
    pub reason: SkipReason,
}

/// Result of one committed recompute request
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeReport {
    /// Request id for log correlation
    pub request_id: String,
    pub phase: RecomputePhase,
    pub written: Vec<ComputedScore>,
    pub skipped: Vec<SkippedNode>,
}

/// Fingerprint of the computed rows a pass depends on, keyed by
/// (kind, entity, student, term) with the stored value and timestamp.
type Snapshot = Vec<(String, String, String, String, f64, String)>;

/// Snapshot every computed row of the given students below the graduate
/// profile level. Coarser than strictly necessary, which only makes the
/// conflict check more conservative.
fn snapshot_inputs(conn: &Connection, student_ids: &BTreeSet<String>) -> Result<Snapshot> {
    let mut snapshot = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT entity_kind, entity_id, student_id, term, value, computed_at
         FROM computed_scores
         WHERE student_id = ?1 AND entity_kind != 'graduate-profile'
         ORDER BY entity_kind, entity_id, term",
    )?;
    for student in student_ids {
        let rows = stmt
            .query_map([student], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        snapshot.extend(rows);
    }
    Ok(snapshot)
}

/// Re-read the snapshot and abort on any difference.
///
/// Rows this pass wrote or cleared itself are excluded; only rows it merely
/// read are compared against the snapshot taken at the start.
fn verify_snapshot(
    conn: &Connection,
    student_ids: &BTreeSet<String>,
    before: &Snapshot,
    staged: &[ComputedScore],
    cleared: &[SkippedNode],
) -> Result<()> {
    let now = snapshot_inputs(conn, student_ids)?;

    let is_staged = |kind: &str, id: &str, student: &str, term: &str| {
        staged.iter().any(|c| {
            c.entity_kind.as_str() == kind
                && c.entity_id == id
                && c.student_id == student
                && c.term == term
        }) || cleared.iter().any(|c| {
            c.entity_kind.as_str() == kind
                && c.entity_id == id
                && c.student_id == student
                && c.term == term
        })
    };

    let before_filtered: Vec<_> = before
        .iter()
        .filter(|(kind, id, student, term, _, _)| !is_staged(kind, id, student, term))
        .collect();
    let now_filtered: Vec<_> = now
        .iter()
        .filter(|(kind, id, student, term, _, _)| !is_staged(kind, id, student, term))
        .collect();

    if before_filtered != now_filtered {
        let entity = now_filtered
            .iter()
            .zip(before_filtered.iter())
            .find(|(a, b)| a != b)
            .map(|(a, _)| format!("{} {}", a.0, a.1))
            .unwrap_or_else(|| "computed inputs".to_string());
        return Err(CapaianError::ConcurrentModification { entity });
    }
    Ok(())
}

/// Everything a pass needs to know about the nodes it will touch
struct Plan {
    /// (student, course outcome, term) cells at the course-outcome level
    course_cells: Vec<(String, String, String)>,
    /// (student, term) pairs at which aggregates are recomputed
    aggregate_cells: Vec<(String, String)>,
    students: BTreeSet<String>,
}

fn plan_for_scope(conn: &Connection, scope: &RecomputeScope) -> Result<Plan> {
    let mut course_cells = Vec::new();
    let mut aggregate_cells = Vec::new();
    let mut students = BTreeSet::new();

    match scope {
        RecomputeScope::StudentCourse {
            student_id,
            course_id,
            term,
        } => {
            let outcomes = resolve::course_outcomes_of(conn, course_id)?;
            if outcomes.is_empty() {
                return Err(CapaianError::MissingDependency {
                    kind: "course",
                    id: course_id.clone(),
                });
            }
            for co in outcomes {
                course_cells.push((student_id.clone(), co, term.clone()));
            }
            aggregate_cells.push((student_id.clone(), term.clone()));
            students.insert(student_id.clone());
        }
        RecomputeScope::Student { student_id } => {
            let enrollments = resolve::enrollments_of(conn, student_id)?;
            if enrollments.is_empty() {
                return Err(CapaianError::MissingDependency {
                    kind: "student",
                    id: student_id.clone(),
                });
            }
            let mut terms = BTreeSet::new();
            for (course_id, term) in enrollments {
                for co in resolve::course_outcomes_of(conn, &course_id)? {
                    course_cells.push((student_id.clone(), co, term.clone()));
                }
                terms.insert(term);
            }
            for term in terms {
                aggregate_cells.push((student_id.clone(), term));
            }
            students.insert(student_id.clone());
        }
        RecomputeScope::Course { course_id } => {
            let enrolled = resolve::students_enrolled_in(conn, course_id)?;
            if enrolled.is_empty() {
                return Err(CapaianError::MissingDependency {
                    kind: "course enrollment",
                    id: course_id.clone(),
                });
            }
            let outcomes = resolve::course_outcomes_of(conn, course_id)?;
            for (student_id, term) in enrolled {
                for co in &outcomes {
                    course_cells.push((student_id.clone(), co.clone(), term.clone()));
                }
                aggregate_cells.push((student_id.clone(), term.clone()));
                students.insert(student_id);
            }
        }
    }

    Ok(Plan {
        course_cells,
        aggregate_cells,
        students,
    })
}

/// Run one recompute request to completion.
///
/// Returns the committed report, or an error after full rollback. The
/// `cancel` flag is polled at phase boundaries; once persistence begins the
/// request is no longer cancellable.
pub fn recompute(
    db: &mut Database,
    scope: RecomputeScope,
    cancel: &CancelFlag,
) -> Result<RecomputeReport> {
    let start = Instant::now();
    let request_id = ulid::Ulid::new().to_string();
    let mut phase = RecomputePhase::Pending;

    tracing::debug!(request_id = %request_id, scope = ?scope, "recompute_start");

    let result = run_phases(db, &scope, cancel, &request_id, &mut phase);

    match &result {
        Ok(report) => {
            tracing::debug!(
                request_id = %request_id,
                written = report.written.len(),
                skipped = report.skipped.len(),
                elapsed = ?start.elapsed(),
                "recompute_committed"
            );
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                phase = ?phase,
                error = %e,
                "recompute_aborted"
            );
        }
    }

    result
}

/// Mutable staging state shared by the level passes
#[derive(Default)]
struct Staging {
    computed_at: String,
    staged: Vec<ComputedScore>,
    cleared: Vec<SkippedNode>,
    skipped: Vec<SkippedNode>,
}

impl Staging {
    /// Stage one node's result in the transaction. An undefined result drops
    /// any stale cached row right away so higher levels never read it.
    fn stage(
        &mut self,
        tx: &Connection,
        kind: EntityKind,
        entity_id: &str,
        student_id: &str,
        term: &str,
        value: Option<f64>,
    ) -> Result<()> {
        match value {
            Some(v) => {
                upsert_computed(tx, kind, entity_id, student_id, term, v, &self.computed_at)?;
                let row =
                    read_computed(tx, kind, entity_id, student_id, term)?.ok_or_else(|| {
                        CapaianError::Other(format!("staged row vanished: {} {}", kind, entity_id))
                    })?;
                self.staged.push(row);
            }
            None => {
                delete_computed(tx, kind, entity_id, student_id, term)?;
                self.cleared.push(skip_node(
                    kind,
                    entity_id,
                    student_id,
                    term,
                    SkipReason::NotYetAssessed,
                ));
            }
        }
        Ok(())
    }

    fn skip(&mut self, kind: EntityKind, entity_id: &str, student_id: &str, term: &str) {
        self.skipped.push(skip_node(
            kind,
            entity_id,
            student_id,
            term,
            SkipReason::MissingDependency,
        ));
    }
}

fn skip_node(
    kind: EntityKind,
    entity_id: &str,
    student_id: &str,
    term: &str,
    reason: SkipReason,
) -> SkippedNode {
    SkippedNode {
        entity_kind: kind,
        entity_id: entity_id.to_string(),
        student_id: student_id.to_string(),
        term: term.to_string(),
        reason,
    }
}

/// Level 1: course outcomes. Staged immediately so the aggregate levels read
/// fresh values through the same transaction.
fn stage_course_outcomes(tx: &Connection, plan: &Plan, out: &mut Staging) -> Result<()> {
    for (student_id, course_outcome_id, term) in &plan.course_cells {
        let inputs = resolve::resolve_course_outcome(tx, student_id, course_outcome_id, term)?;
        if inputs.is_empty() {
            out.skip(EntityKind::CourseOutcome, course_outcome_id, student_id, term);
            continue;
        }
        out.stage(
            tx,
            EntityKind::CourseOutcome,
            course_outcome_id,
            student_id,
            term,
            rollup::course_outcome_score(&inputs),
        )?;
    }
    Ok(())
}

/// Level 2: program outcomes, then level 3: graduate profiles, per affected
/// (student, term) pair.
fn stage_aggregates(tx: &Connection, plan: &Plan, out: &mut Staging) -> Result<()> {
    for (student_id, term) in &plan.aggregate_cells {
        let co_ids: Vec<String> = plan
            .course_cells
            .iter()
            .filter(|(s, _, t)| s == student_id && t == term)
            .map(|(_, co, _)| co.clone())
            .collect();
        let outcome_ids = resolve::outcomes_fed_by(tx, &co_ids)?;

        for po in &outcome_ids {
            let inputs = resolve::resolve_program_outcome(tx, student_id, po, term)?;
            if inputs.is_empty() {
                out.skip(EntityKind::ProgramOutcome, po, student_id, term);
                continue;
            }
            out.stage(
                tx,
                EntityKind::ProgramOutcome,
                po,
                student_id,
                term,
                rollup::program_outcome_attainment(&inputs),
            )?;
        }

        let profile_ids = resolve::profiles_fed_by(tx, &outcome_ids)?;
        for gp in &profile_ids {
            let inputs = resolve::resolve_graduate_profile(tx, student_id, gp, term)?;
            if inputs.is_empty() {
                out.skip(EntityKind::GraduateProfile, gp, student_id, term);
                continue;
            }
            out.stage(
                tx,
                EntityKind::GraduateProfile,
                gp,
                student_id,
                term,
                rollup::graduate_profile_attainment(&inputs),
            )?;
        }
    }
    Ok(())
}

fn check_cancel(phase: RecomputePhase, cancel: &CancelFlag) -> Result<()> {
    if cancel.is_cancelled() && phase != RecomputePhase::Persisting {
        Err(CapaianError::Cancelled)
    } else {
        Ok(())
    }
}

fn run_phases(
    db: &mut Database,
    scope: &RecomputeScope,
    cancel: &CancelFlag,
    request_id: &str,
    phase: &mut RecomputePhase,
) -> Result<RecomputeReport> {
    check_cancel(*phase, cancel)?;

    let tx = db
        .conn
        .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .map_err(map_busy)?;

    *phase = RecomputePhase::ResolvingInputs;
    let plan = plan_for_scope(&tx, scope)?;
    let snapshot = snapshot_inputs(&tx, &plan.students)?;
    check_cancel(*phase, cancel)?;

    *phase = RecomputePhase::Computing;
    let mut out = Staging {
        computed_at: Utc::now().to_rfc3339(),
        ..Default::default()
    };

    stage_course_outcomes(&tx, &plan, &mut out)?;
    stage_aggregates(&tx, &plan, &mut out)?;

    check_cancel(*phase, cancel)?;

    *phase = RecomputePhase::Persisting;

    // Optimistic re-check: the rows this pass merely read must not have moved
    // underneath it.
    verify_snapshot(&tx, &plan.students, &snapshot, &out.staged, &out.cleared)?;

    tx.commit().map_err(map_busy)?;

    *phase = RecomputePhase::Committed;
    let mut skipped = out.skipped;
    skipped.extend(out.cleared);

    Ok(RecomputeReport {
        request_id: request_id.to_string(),
        phase: *phase,
        written: out.staged,
        skipped,
    })
}

/// A writer colliding with another transaction surfaces as a retryable
/// conflict, matching the optimistic-concurrency contract.
fn map_busy(e: rusqlite::Error) -> CapaianError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) => CapaianError::ConcurrentModification {
            entity: "store transaction".to_string(),
        },
        _ => CapaianError::Store(e),
    }
}

/// Recompute one (student, course, term) cell after a leaf write.
pub fn recompute_student_course(
    db: &mut Database,
    student_id: &str,
    course_id: &str,
    term: &str,
    cancel: &CancelFlag,
) -> Result<RecomputeReport> {
    recompute(
        db,
        RecomputeScope::StudentCourse {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            term: term.to_string(),
        },
        cancel,
    )
}

/// Recompute a student's full hierarchy across all enrollments.
pub fn recompute_for_student(
    db: &mut Database,
    student_id: &str,
    cancel: &CancelFlag,
) -> Result<RecomputeReport> {
    recompute(
        db,
        RecomputeScope::Student {
            student_id: student_id.to_string(),
        },
        cancel,
    )
}

/// Recompute every enrolled student of a course in one request.
pub fn recompute_for_course(
    db: &mut Database,
    course_id: &str,
    cancel: &CancelFlag,
) -> Result<RecomputeReport> {
    recompute(
        db,
        RecomputeScope::Course {
            course_id: course_id.to_string(),
        },
        cancel,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssessmentKind;

    /// One program, one course with two techniques, one student.
    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.put_program("TI", "Informatika").unwrap();
        db.put_course("IF101", "TI", "2024-1", "Algoritma", 3).unwrap();
        db.put_course_outcome("CPMK-1", "IF101", "Dasar algoritma")
            .unwrap();
        db.put_technique("UTS", "CPMK-1", "Ujian Tengah", 60.0, None)
            .unwrap();
        db.put_technique("UAS", "CPMK-1", "Ujian Akhir", 40.0, None)
            .unwrap();
        db.put_program_outcome("CPL-1", "TI", "Komputasi").unwrap();
        db.put_graduate_profile("PL-1", "TI", "Problem solver").unwrap();
        db.map_course_outcome("CPMK-1", "CPL-1", 100.0).unwrap();
        db.map_profile("CPL-1", "PL-1", 100.0).unwrap();
        db.enroll("2311001", "IF101", "2024-1").unwrap();
        db
    }

    fn co_score(db: &Database) -> Option<f64> {
        db.computed_score(EntityKind::CourseOutcome, "CPMK-1", "2311001", "2024-1")
            .unwrap()
            .map(|c| c.value)
    }

    #[test]
    fn test_recompute_all_levels() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UAS", "2024-1", 90.0)
            .unwrap();

        let report =
            recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
                .unwrap();
        assert_eq!(report.phase, RecomputePhase::Committed);
        assert_eq!(report.written.len(), 3);

        // 0.6*80 + 0.4*90 = 84
        assert_eq!(co_score(&db), Some(84.0));
        let po = db
            .computed_score(EntityKind::ProgramOutcome, "CPL-1", "2311001", "2024-1")
            .unwrap()
            .unwrap();
        assert!((po.value - 84.0).abs() < 1e-9);
        let gp = db
            .computed_score(EntityKind::GraduateProfile, "PL-1", "2311001", "2024-1")
            .unwrap()
            .unwrap();
        assert!((gp.value - 84.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_score_excluded_not_zeroed() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();

        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        // 80, not 48: UAS is not yet assessed
        assert_eq!(co_score(&db), Some(80.0));
    }

    #[test]
    fn test_idempotent_rows_byte_identical() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UAS", "2024-1", 90.0)
            .unwrap();

        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();
        let first: Vec<_> = all_computed(&db);

        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();
        let second: Vec<_> = all_computed(&db);

        assert_eq!(first, second);
    }

    fn all_computed(db: &Database) -> Vec<(String, String, String, String, f64, String)> {
        let mut stmt = db
            .conn
            .prepare(
                "SELECT entity_kind, entity_id, student_id, term, value, computed_at
                 FROM computed_scores ORDER BY entity_kind, entity_id, student_id, term",
            )
            .unwrap();
        stmt.query_map([], |row| {
            Ok((
                row.get(0).unwrap(),
                row.get(1).unwrap(),
                row.get(2).unwrap(),
                row.get(3).unwrap(),
                row.get(4).unwrap(),
                row.get(5).unwrap(),
            ))
        })
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
    }

    #[test]
    fn test_reproducible_after_cache_wipe() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 72.5)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();
        let before = co_score(&db);

        db.conn.execute("DELETE FROM computed_scores", []).unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        assert_eq!(co_score(&db), before);
    }

    #[test]
    fn test_all_inputs_missing_clears_stale_row() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();
        assert!(co_score(&db).is_some());

        db.conn.execute("DELETE FROM raw_scores", []).unwrap();
        let report =
            recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
                .unwrap();

        assert!(co_score(&db).is_none());
        assert!(report
            .skipped
            .iter()
            .any(|s| s.reason == SkipReason::NotYetAssessed));
    }

    #[test]
    fn test_course_without_outcomes_is_missing_dependency() {
        let mut db = seeded_db();
        db.put_course("IF102", "TI", "2024-1", "Kosong", 2).unwrap();
        db.enroll("2311001", "IF102", "2024-1").unwrap();

        let err =
            recompute_student_course(&mut db, "2311001", "IF102", "2024-1", &CancelFlag::new())
                .unwrap_err();
        assert!(matches!(err, CapaianError::MissingDependency { .. }));
    }

    #[test]
    fn test_outcome_without_techniques_skipped_not_fatal() {
        let mut db = seeded_db();
        db.put_course_outcome("CPMK-2", "IF101", "Belum disiapkan")
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();

        let report =
            recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
                .unwrap();
        assert_eq!(report.phase, RecomputePhase::Committed);
        assert!(report.skipped.iter().any(|s| {
            s.entity_id == "CPMK-2" && s.reason == SkipReason::MissingDependency
        }));
        // the prepared outcome still computed
        assert_eq!(co_score(&db), Some(80.0));
    }

    #[test]
    fn test_cancel_before_start_aborts_cleanly() {
        let mut db = seeded_db();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &cancel)
            .unwrap_err();
        assert!(matches!(err, CapaianError::Cancelled));
        assert!(co_score(&db).is_none());
    }

    #[test]
    fn test_retake_uses_latest_attempt() {
        let mut db = seeded_db();
        // first attempt
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 50.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UAS", "2024-1", 50.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2024-1", &CancelFlag::new())
            .unwrap();

        // retake a year later
        db.enroll("2311001", "IF101", "2025-1").unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2025-1", 90.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UAS", "2025-1", 90.0)
            .unwrap();
        recompute_student_course(&mut db, "2311001", "IF101", "2025-1", &CancelFlag::new())
            .unwrap();

        let po = db
            .computed_score(EntityKind::ProgramOutcome, "CPL-1", "2311001", "2025-1")
            .unwrap()
            .unwrap();
        assert!((po.value - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_verification_detects_drift() {
        let db = seeded_db();
        let students: BTreeSet<String> = ["2311001".to_string()].into();

        crate::db::scores::upsert_computed(
            db.conn(),
            EntityKind::CourseOutcome,
            "CPMK-1",
            "2311001",
            "2024-1",
            70.0,
            "2024-06-01T00:00:00+00:00",
        )
        .unwrap();

        let snapshot = snapshot_inputs(db.conn(), &students).unwrap();
        assert_eq!(snapshot.len(), 1);

        // another writer changes the row after the snapshot was taken
        crate::db::scores::upsert_computed(
            db.conn(),
            EntityKind::CourseOutcome,
            "CPMK-1",
            "2311001",
            "2024-1",
            75.0,
            "2024-06-02T00:00:00+00:00",
        )
        .unwrap();

        let err = verify_snapshot(db.conn(), &students, &snapshot, &[], &[]).unwrap_err();
        assert!(matches!(err, CapaianError::ConcurrentModification { .. }));
    }

    #[test]
    fn test_snapshot_verification_ignores_own_writes() {
        let db = seeded_db();
        let students: BTreeSet<String> = ["2311001".to_string()].into();

        let snapshot = snapshot_inputs(db.conn(), &students).unwrap();

        crate::db::scores::upsert_computed(
            db.conn(),
            EntityKind::CourseOutcome,
            "CPMK-1",
            "2311001",
            "2024-1",
            70.0,
            "2024-06-01T00:00:00+00:00",
        )
        .unwrap();
        let staged = vec![ComputedScore {
            entity_kind: EntityKind::CourseOutcome,
            entity_id: "CPMK-1".to_string(),
            student_id: "2311001".to_string(),
            term: "2024-1".to_string(),
            value: 70.0,
            computed_at: "2024-06-01T00:00:00+00:00".to_string(),
        }];

        verify_snapshot(db.conn(), &students, &snapshot, &staged, &[]).unwrap();
    }

    #[test]
    fn test_bulk_course_scope_covers_cohort() {
        let mut db = seeded_db();
        db.enroll("2311002", "IF101", "2024-1").unwrap();
        for student in ["2311001", "2311002"] {
            db.record_raw_score(student, AssessmentKind::Technique, "UTS", "2024-1", 75.0)
                .unwrap();
        }

        let report = recompute_for_course(&mut db, "IF101", &CancelFlag::new()).unwrap();
        // per student: course outcome + program outcome + graduate profile
        assert_eq!(report.written.len(), 6);
    }

    #[test]
    fn test_bulk_student_scope_covers_all_terms() {
        let mut db = seeded_db();
        db.put_course("IF201", "TI", "2024-2", "Struktur Data", 4)
            .unwrap();
        db.put_course_outcome("CPMK-3", "IF201", "Pohon dan graf")
            .unwrap();
        db.put_technique("PROYEK", "CPMK-3", "Proyek Akhir", 100.0, None)
            .unwrap();
        db.map_course_outcome("CPMK-3", "CPL-1", 100.0).unwrap();
        db.enroll("2311001", "IF201", "2024-2").unwrap();

        db.record_raw_score("2311001", AssessmentKind::Technique, "UTS", "2024-1", 80.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "UAS", "2024-1", 80.0)
            .unwrap();
        db.record_raw_score("2311001", AssessmentKind::Technique, "PROYEK", "2024-2", 90.0)
            .unwrap();

        let report = recompute_for_student(&mut db, "2311001", &CancelFlag::new()).unwrap();
        assert_eq!(report.phase, RecomputePhase::Committed);

        // cumulative attainment at 2024-2 blends both courses:
        // (80*3*1.0 + 90*4*1.0) / (3 + 4) = 600/7
        let po = db
            .computed_score(EntityKind::ProgramOutcome, "CPL-1", "2311001", "2024-2")
            .unwrap()
            .unwrap();
        assert!((po.value - 600.0 / 7.0).abs() < 1e-9);

        // and the 2024-1 row only sees the first course
        let po_early = db
            .computed_score(EntityKind::ProgramOutcome, "CPL-1", "2311001", "2024-1")
            .unwrap()
            .unwrap();
        assert!((po_early.value - 80.0).abs() < 1e-9);
    }
}
