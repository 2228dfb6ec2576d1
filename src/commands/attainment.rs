//! `capaian attainment` command - read-side attainment report
//!
//! Serves the latest committed values only; never triggers a recompute.

use capaian_core::error::{CapaianError, Result};
use capaian_core::format::OutputFormat;
use capaian_core::model::EntityKind;
use capaian_core::query::{Attainment, AttainmentFilter, AttainmentRow};
use capaian_core::records::escape_quotes;
use capaian_core::store::Store;

use crate::cli::Cli;

pub fn execute(
    cli: &Cli,
    store: &Store,
    student: Option<&str>,
    course: Option<&str>,
    program: Option<&str>,
    term: Option<&str>,
    level: Option<EntityKind>,
) -> Result<()> {
    let filter = AttainmentFilter {
        term: term.map(str::to_string),
        level,
    };

    let rows = match (student, course, program) {
        (Some(student), None, None) => store.db().attainment_for_student(student, &filter)?,
        (None, Some(course), None) => store.db().attainment_for_course(course, &filter)?,
        (None, None, Some(program)) => store.db().attainment_for_program(program, &filter)?,
        _ => {
            return Err(CapaianError::UsageError(
                "attainment needs exactly one of --student, --course, --program".to_string(),
            ))
        }
    };

    render(cli, store, &rows)
}

fn render(cli: &Cli, store: &Store, rows: &[AttainmentRow]) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Human => {
            let decimals = usize::from(store.config().display_decimals);
            for row in rows {
                let value = match &row.attainment {
                    Attainment::Assessed { value, .. } => {
                        format!("{:.*}", decimals, value)
                    }
                    Attainment::NotYetAssessed => "not-yet-assessed".to_string(),
                };
                println!(
                    "{:<18} {:<12} {:<12} {:<8} {}",
                    row.entity_kind,
                    row.entity_id,
                    row.student_id,
                    row.term.as_deref().unwrap_or("-"),
                    value
                );
            }
            if rows.is_empty() && !cli.quiet {
                println!("no attainment records in scope");
            }
        }
        OutputFormat::Records => {
            println!("H capaian=1 records=1 mode=attainment count={}", rows.len());
            for row in rows {
                let value = match &row.attainment {
                    Attainment::Assessed { value, .. } => value.to_string(),
                    Attainment::NotYetAssessed => "not-yet-assessed".to_string(),
                };
                println!(
                    "A kind={} entity=\"{}\" name=\"{}\" student=\"{}\" term={} value={}",
                    row.entity_kind,
                    escape_quotes(&row.entity_id),
                    escape_quotes(&row.entity_name),
                    escape_quotes(&row.student_id),
                    row.term.as_deref().unwrap_or("-"),
                    value
                );
            }
        }
    }
    Ok(())
}
