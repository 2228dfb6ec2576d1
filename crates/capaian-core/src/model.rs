//! Shared domain types for the attainment hierarchy
//!
//! Entity identifiers are caller-supplied text codes (student numbers,
//! course codes, `CPMK-…`, `CPL-…`); the engine never generates them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Level of a node in the attainment hierarchy that carries a computed score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Course-level learning outcome (CPMK)
    CourseOutcome,
    /// Program-level learning outcome (CPL)
    ProgramOutcome,
    /// Graduate profile attribute
    GraduateProfile,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::CourseOutcome => "course-outcome",
            EntityKind::ProgramOutcome => "program-outcome",
            EntityKind::GraduateProfile => "graduate-profile",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "course-outcome" => Ok(EntityKind::CourseOutcome),
            "program-outcome" => Ok(EntityKind::ProgramOutcome),
            "graduate-profile" => Ok(EntityKind::GraduateProfile),
            other => Err(format!(
                "unknown level '{}' (expected: course-outcome, program-outcome, graduate-profile)",
                other
            )),
        }
    }
}

/// Kind of leaf assessment a raw score attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssessmentKind {
    /// Graded activity (exam, assignment, project) under a course outcome
    Technique,
    /// Finer-grained sub-outcome breakdown under a course outcome
    SubOutcome,
}

impl AssessmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentKind::Technique => "technique",
            AssessmentKind::SubOutcome => "sub-outcome",
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technique" => Ok(AssessmentKind::Technique),
            "sub-outcome" => Ok(AssessmentKind::SubOutcome),
            other => Err(format!(
                "unknown assessment kind '{}' (expected: technique, sub-outcome)",
                other
            )),
        }
    }
}

/// One row of the computed-score cache
///
/// Always derivable from leaf data; the recompute orchestrator is the only
/// writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedScore {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub student_id: String,
    pub term: String,
    pub value: f64,
    pub computed_at: String,
}

/// A raw leaf score as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawScore {
    pub student_id: String,
    pub assessment_kind: AssessmentKind,
    pub assessment_id: String,
    pub term: String,
    pub value: f64,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_round_trip() {
        for kind in [
            EntityKind::CourseOutcome,
            EntityKind::ProgramOutcome,
            EntityKind::GraduateProfile,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_entity_kind_unknown() {
        assert!("course".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_assessment_kind_parse_case_insensitive() {
        assert_eq!(
            "Technique".parse::<AssessmentKind>().unwrap(),
            AssessmentKind::Technique
        );
        assert_eq!(
            "SUB-OUTCOME".parse::<AssessmentKind>().unwrap(),
            AssessmentKind::SubOutcome
        );
    }
}
