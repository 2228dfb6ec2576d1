//! Pure weighted-average rollup arithmetic
//!
//! All three aggregation levels reduce to the same shape: a set of inputs,
//! each carrying a weight basis and an optional value. Missing values mean
//! "not yet assessed" and are excluded from numerator and denominator alike;
//! treating them as zero would penalize students with incomplete records.
//!
//! Nothing here touches the store, and nothing here rounds. Rounding is a
//! presentation concern.

use serde::Serialize;

/// One assessment input to a course-outcome score
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentInput {
    pub assessment_id: String,
    /// Weight percentage (0-100) of this assessment within its course outcome
    pub weight: f64,
    /// The student's raw score, if recorded
    pub value: Option<f64>,
}

/// One course contribution to a program-outcome attainment
#[derive(Debug, Clone, PartialEq)]
pub struct CourseInput {
    pub course_id: String,
    pub course_outcome_id: String,
    pub credit_hours: u32,
    /// Contribution weight percentage (0-100) of the mapping
    pub weight: f64,
    /// The student's course-outcome score for this course, if computed
    pub score: Option<f64>,
}

/// One program-outcome contribution to a graduate-profile attainment
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeInput {
    pub program_outcome_id: String,
    /// Contribution weight percentage (0-100) of the mapping
    pub weight: f64,
    /// The student's program-outcome attainment, if computed
    pub attainment: Option<f64>,
}

/// Generic weighted average over (basis, value) pairs, skipping missing values.
///
/// Returns `None` when no input has a value, or when the present inputs carry
/// zero total basis (a zero-weight set has nothing to average).
fn weighted_average<I>(inputs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, Option<f64>)>,
{
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (basis, value) in inputs {
        if let Some(v) = value {
            numerator += basis * v;
            denominator += basis;
        }
    }

    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Course-outcome score from assessment inputs.
///
/// `score = sum(w_i/100 * v_i) / sum(w_i/100)` over non-missing inputs.
pub fn course_outcome_score(inputs: &[AssessmentInput]) -> Option<f64> {
    weighted_average(inputs.iter().map(|i| (i.weight / 100.0, i.value)))
}

/// Program-outcome attainment across all of a student's course contributions.
///
/// Each present contribution adds `score * credit_hours * weight/100` against
/// a basis of `credit_hours * weight/100`.
pub fn program_outcome_attainment(inputs: &[CourseInput]) -> Option<f64> {
    weighted_average(
        inputs
            .iter()
            .map(|i| (f64::from(i.credit_hours) * i.weight / 100.0, i.score)),
    )
}

/// Graduate-profile attainment from program-outcome contributions.
pub fn graduate_profile_attainment(inputs: &[OutcomeInput]) -> Option<f64> {
    weighted_average(inputs.iter().map(|i| (i.weight / 100.0, i.attainment)))
}

/// Why a node ended up without a computed score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The node has no child records at all (nothing could ever be computed)
    MissingDependency,
    /// Child records exist but none of them has a value yet
    NotYetAssessed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(id: &str, weight: f64, value: Option<f64>) -> AssessmentInput {
        AssessmentInput {
            assessment_id: id.to_string(),
            weight,
            value,
        }
    }

    #[test]
    fn test_course_outcome_full_inputs() {
        let inputs = vec![
            assessment("uts", 40.0, Some(80.0)),
            assessment("uas", 40.0, Some(90.0)),
            assessment("tugas", 20.0, Some(100.0)),
        ];
        let score = course_outcome_score(&inputs).unwrap();
        assert!((score - 88.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_input_excluded_from_both_sides() {
        // {A: 60%, B: 40%}, only A scored at 80 -> 80, not 48
        let inputs = vec![
            assessment("a", 60.0, Some(80.0)),
            assessment("b", 40.0, None),
        ];
        assert_eq!(course_outcome_score(&inputs), Some(80.0));
    }

    #[test]
    fn test_all_missing_is_undefined() {
        let inputs = vec![assessment("a", 60.0, None), assessment("b", 40.0, None)];
        assert_eq!(course_outcome_score(&inputs), None);
    }

    #[test]
    fn test_empty_inputs_undefined() {
        assert_eq!(course_outcome_score(&[]), None);
    }

    #[test]
    fn test_zero_weight_basis_undefined() {
        let inputs = vec![assessment("a", 0.0, Some(75.0))];
        assert_eq!(course_outcome_score(&inputs), None);
    }

    #[test]
    fn test_partial_weight_coverage_normalizes() {
        // Weights sum to 70; the average is taken over the covered basis.
        let inputs = vec![
            assessment("a", 50.0, Some(60.0)),
            assessment("b", 20.0, Some(95.0)),
        ];
        let score = course_outcome_score(&inputs).unwrap();
        let expected = (0.5 * 60.0 + 0.2 * 95.0) / 0.7;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_program_outcome_worked_example() {
        // Course X: 3 credits, weight 50%, score 90
        // Course Y: 2 credits, weight 100%, score 70
        // attainment = (90*3*0.5 + 70*2*1.0) / (3*0.5 + 2*1.0) = 275/3.5
        let inputs = vec![
            CourseInput {
                course_id: "X".into(),
                course_outcome_id: "X-1".into(),
                credit_hours: 3,
                weight: 50.0,
                score: Some(90.0),
            },
            CourseInput {
                course_id: "Y".into(),
                course_outcome_id: "Y-1".into(),
                credit_hours: 2,
                weight: 100.0,
                score: Some(70.0),
            },
        ];
        let attainment = program_outcome_attainment(&inputs).unwrap();
        assert!((attainment - 275.0 / 3.5).abs() < 1e-9);
        assert!((attainment - 78.571_428_571).abs() < 1e-6);
    }

    #[test]
    fn test_program_outcome_missing_course_score_excluded() {
        let inputs = vec![
            CourseInput {
                course_id: "X".into(),
                course_outcome_id: "X-1".into(),
                credit_hours: 3,
                weight: 50.0,
                score: Some(90.0),
            },
            CourseInput {
                course_id: "Y".into(),
                course_outcome_id: "Y-1".into(),
                credit_hours: 2,
                weight: 100.0,
                score: None,
            },
        ];
        assert_eq!(program_outcome_attainment(&inputs), Some(90.0));
    }

    #[test]
    fn test_program_outcome_no_contributions() {
        assert_eq!(program_outcome_attainment(&[]), None);
    }

    #[test]
    fn test_graduate_profile_average() {
        let inputs = vec![
            OutcomeInput {
                program_outcome_id: "CPL-1".into(),
                weight: 60.0,
                attainment: Some(80.0),
            },
            OutcomeInput {
                program_outcome_id: "CPL-2".into(),
                weight: 40.0,
                attainment: Some(70.0),
            },
        ];
        let value = graduate_profile_attainment(&inputs).unwrap();
        assert!((value - 76.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_mid_computation_rounding() {
        // A chain of thirds stays unrounded through the rollup.
        let inputs = vec![
            assessment("a", 33.0, Some(100.0 / 3.0)),
            assessment("b", 67.0, Some(200.0 / 3.0)),
        ];
        let score = course_outcome_score(&inputs).unwrap();
        let expected = (0.33 * (100.0 / 3.0) + 0.67 * (200.0 / 3.0)) / (0.33 + 0.67);
        assert!((score - expected).abs() < 1e-12);
    }
}
