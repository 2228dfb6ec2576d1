//! CLI argument parsing for capaian
//!
//! Supports global flags: --root, --store, --format, --quiet, --verbose

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use capaian_core::error::Result;
use capaian_core::format::OutputFormat;
use capaian_core::model::{AssessmentKind, EntityKind};

/// Capaian - outcome attainment aggregation engine CLI
#[derive(Parser, Debug)]
#[command(name = "capaian")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory for resolving the store
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Explicit store root path
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_parser = parse_format)]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Report timing for major phases
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new capaian store
    Init,

    /// Record a raw assessment score and recompute the affected hierarchy
    Score {
        /// Student identifier
        #[arg(long)]
        student: String,

        /// Assessment identifier (technique or sub-outcome)
        #[arg(long)]
        assessment: String,

        /// Assessment kind
        #[arg(long, default_value = "technique", value_parser = parse_kind)]
        kind: AssessmentKind,

        /// Academic term (e.g. 2024-1)
        #[arg(long)]
        term: String,

        /// Score value (0-100)
        #[arg(long)]
        value: f64,

        /// Commit the score without triggering a recompute
        #[arg(long)]
        no_recompute: bool,
    },

    /// Recompute attainment for a student, a course, or one pair
    Recompute {
        /// Student identifier
        #[arg(long)]
        student: Option<String>,

        /// Course identifier
        #[arg(long)]
        course: Option<String>,

        /// Academic term; required when both --student and --course are given
        #[arg(long)]
        term: Option<String>,
    },

    /// Report attainment values
    Attainment {
        /// Student identifier
        #[arg(long)]
        student: Option<String>,

        /// Course identifier (cohort view)
        #[arg(long)]
        course: Option<String>,

        /// Program identifier (cohort view)
        #[arg(long)]
        program: Option<String>,

        /// Filter by academic term
        #[arg(long)]
        term: Option<String>,

        /// Filter by hierarchy level
        #[arg(long, value_parser = parse_level)]
        level: Option<EntityKind>,
    },

    /// Audit the store: weight invariants, dangling scores, stale caches
    Check,
}

pub fn parse_format(s: &str) -> Result<OutputFormat> {
    s.parse()
}

pub fn parse_level(s: &str) -> Result<EntityKind> {
    s.parse()
        .map_err(|_| capaian_core::error::CapaianError::UnknownLevel(s.to_string()))
}

pub fn parse_kind(s: &str) -> Result<AssessmentKind> {
    s.parse()
        .map_err(capaian_core::error::CapaianError::UsageError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(
            parse_level("program-outcome").unwrap(),
            EntityKind::ProgramOutcome
        );
        assert!(parse_level("bogus").is_err());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(
            parse_kind("sub-outcome").unwrap(),
            AssessmentKind::SubOutcome
        );
        assert!(parse_kind("quiz").is_err());
    }
}
