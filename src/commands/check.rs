//! `capaian check` command - store audit
//!
//! Reports weight invariant breaks introduced out of band, dangling raw
//! scores, stale computed rows, and (under the strict policy) sibling sets
//! not yet totalling 100%.

use capaian_core::error::{CapaianError, Result};
use capaian_core::format::OutputFormat;
use capaian_core::store::Store;

use crate::cli::Cli;

pub fn execute(cli: &Cli, store: &Store) -> Result<()> {
    let report = store.db().audit(store.config().weight_policy)?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Human => {
            if report.is_clean() && report.not_gradable.is_empty() {
                if !cli.quiet {
                    println!("store is consistent");
                }
            } else {
                for f in &report.overweight {
                    println!("overweight: {} {} sums to {}", f.group, f.parent_id, f.total);
                }
                for (assessment, student) in &report.dangling_scores {
                    println!("dangling score: {} for student {}", assessment, student);
                }
                for s in &report.stale {
                    println!(
                        "stale: {} {} [{} {}] computed {} but input updated {}",
                        s.entity_kind, s.entity_id, s.student_id, s.term, s.computed_at,
                        s.newest_input
                    );
                }
                for f in &report.not_gradable {
                    println!(
                        "not gradable: {} {} totals {} (strict policy wants 100)",
                        f.group, f.parent_id, f.total
                    );
                }
            }
        }
        OutputFormat::Records => {
            println!(
                "H capaian=1 records=1 mode=check overweight={} dangling={} stale={} not_gradable={}",
                report.overweight.len(),
                report.dangling_scores.len(),
                report.stale.len(),
                report.not_gradable.len()
            );
        }
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(CapaianError::InvalidStore {
            reason: format!(
                "{} overweight set(s), {} dangling score(s), {} stale row(s)",
                report.overweight.len(),
                report.dangling_scores.len(),
                report.stale.len()
            ),
        })
    }
}
