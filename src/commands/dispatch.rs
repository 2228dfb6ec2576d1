//! Command dispatch logic for capaian

use std::path::{Path, PathBuf};
use std::time::Instant;

use capaian_core::error::Result;
use capaian_core::recompute::CancelFlag;
use capaian_core::store::Store;
use tracing::debug;

use crate::cli::{Cli, Commands};

pub fn run(cli: &Cli, cancel: &CancelFlag, start: Instant) -> Result<()> {
    let root = resolve_root(cli);

    debug!(elapsed = ?start.elapsed(), root = %root.display(), "resolve_root");

    if let Commands::Init = cli.command {
        return super::init::execute(cli, &root);
    }

    let mut store = open_store(cli, &root)?;
    debug!(elapsed = ?start.elapsed(), store = %store.root().display(), "open_store");

    match &cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Score {
            student,
            assessment,
            kind,
            term,
            value,
            no_recompute,
        } => super::score::execute(
            cli,
            &mut store,
            cancel,
            student,
            assessment,
            *kind,
            term,
            *value,
            *no_recompute,
        ),
        Commands::Recompute {
            student,
            course,
            term,
        } => super::recompute::execute(
            cli,
            &mut store,
            cancel,
            student.as_deref(),
            course.as_deref(),
            term.as_deref(),
        ),
        Commands::Attainment {
            student,
            course,
            program,
            term,
            level,
        } => super::attainment::execute(
            cli,
            &store,
            student.as_deref(),
            course.as_deref(),
            program.as_deref(),
            term.as_deref(),
            *level,
        ),
        Commands::Check => super::check::execute(cli, &store),
    }
}

fn resolve_root(cli: &Cli) -> PathBuf {
    cli.root
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn open_store(cli: &Cli, root: &Path) -> Result<Store> {
    match cli.store.as_ref() {
        Some(path) => {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            Store::open(&resolved)
        }
        None => Store::discover(root),
    }
}
