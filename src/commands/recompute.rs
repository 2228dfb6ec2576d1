//! `capaian recompute` command - explicit bulk recomputation

use capaian_core::error::{CapaianError, Result};
use capaian_core::format::OutputFormat;
use capaian_core::records::escape_quotes;
use capaian_core::recompute::{
    recompute_for_course, recompute_for_student, recompute_student_course, CancelFlag,
    RecomputeReport,
};
use capaian_core::store::Store;

use crate::cli::Cli;

pub fn execute(
    cli: &Cli,
    store: &mut Store,
    cancel: &CancelFlag,
    student: Option<&str>,
    course: Option<&str>,
    term: Option<&str>,
) -> Result<()> {
    let report = match (student, course) {
        (Some(student), Some(course)) => {
            let term = term.ok_or_else(|| {
                CapaianError::UsageError(
                    "--term is required when both --student and --course are given".to_string(),
                )
            })?;
            recompute_student_course(store.db_mut(), student, course, term, cancel)?
        }
        (Some(student), None) => recompute_for_student(store.db_mut(), student, cancel)?,
        (None, Some(course)) => recompute_for_course(store.db_mut(), course, cancel)?,
        (None, None) => {
            return Err(CapaianError::UsageError(
                "recompute needs --student and/or --course".to_string(),
            ))
        }
    };

    render_report(cli, &report)
}

pub fn render_report(cli: &Cli, report: &RecomputeReport) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Human => {
            if !cli.quiet {
                println!(
                    "Recompute {}: {} value(s) written, {} node(s) skipped",
                    report.request_id,
                    report.written.len(),
                    report.skipped.len()
                );
                for score in &report.written {
                    println!(
                        "  {} {} [{} {}] = {}",
                        score.entity_kind, score.entity_id, score.student_id, score.term,
                        score.value
                    );
                }
                for skip in &report.skipped {
                    println!(
                        "  {} {} [{} {}] skipped: {:?}",
                        skip.entity_kind, skip.entity_id, skip.student_id, skip.term, skip.reason
                    );
                }
            }
        }
        OutputFormat::Records => {
            println!(
                "H capaian=1 records=1 mode=recompute request={} written={} skipped={}",
                report.request_id,
                report.written.len(),
                report.skipped.len()
            );
            for score in &report.written {
                println!(
                    "S kind={} entity=\"{}\" student=\"{}\" term={} value={}",
                    score.entity_kind,
                    escape_quotes(&score.entity_id),
                    escape_quotes(&score.student_id),
                    score.term,
                    score.value
                );
            }
        }
    }
    Ok(())
}
