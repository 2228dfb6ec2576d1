//! SQLite database schema for capaian

use rusqlite::{Connection, Result};

const SCHEMA_SQL: &str = r#"
-- Academic structure
CREATE TABLE IF NOT EXISTS programs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id),
    term TEXT NOT NULL,
    name TEXT NOT NULL,
    credit_hours INTEGER NOT NULL CHECK (credit_hours > 0)
);
CREATE INDEX IF NOT EXISTS idx_courses_program ON courses(program_id);

CREATE TABLE IF NOT EXISTS graduate_profiles (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS program_outcomes (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS course_outcomes (
    id TEXT PRIMARY KEY,
    course_id TEXT NOT NULL REFERENCES courses(id),
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_course_outcomes_course ON course_outcomes(course_id);

-- Weighted leaves under a course outcome
CREATE TABLE IF NOT EXISTS assessment_techniques (
    id TEXT PRIMARY KEY,
    course_outcome_id TEXT NOT NULL REFERENCES course_outcomes(id),
    name TEXT NOT NULL,
    weight REAL NOT NULL CHECK (weight >= 0 AND weight <= 100),
    rubric_ref TEXT
);
CREATE INDEX IF NOT EXISTS idx_techniques_outcome ON assessment_techniques(course_outcome_id);

CREATE TABLE IF NOT EXISTS sub_outcomes (
    id TEXT PRIMARY KEY,
    course_outcome_id TEXT NOT NULL REFERENCES course_outcomes(id),
    name TEXT NOT NULL,
    weight REAL NOT NULL CHECK (weight >= 0 AND weight <= 100)
);
CREATE INDEX IF NOT EXISTS idx_sub_outcomes_outcome ON sub_outcomes(course_outcome_id);

-- Outcome mappings with contribution weights (the DAG edges)
CREATE TABLE IF NOT EXISTS course_outcome_mappings (
    course_outcome_id TEXT NOT NULL REFERENCES course_outcomes(id),
    program_outcome_id TEXT NOT NULL REFERENCES program_outcomes(id),
    weight REAL NOT NULL CHECK (weight >= 0 AND weight <= 100),
    PRIMARY KEY (course_outcome_id, program_outcome_id)
);
CREATE INDEX IF NOT EXISTS idx_co_mappings_target ON course_outcome_mappings(program_outcome_id);

CREATE TABLE IF NOT EXISTS profile_mappings (
    program_outcome_id TEXT NOT NULL REFERENCES program_outcomes(id),
    graduate_profile_id TEXT NOT NULL REFERENCES graduate_profiles(id),
    weight REAL NOT NULL CHECK (weight >= 0 AND weight <= 100),
    PRIMARY KEY (program_outcome_id, graduate_profile_id)
);
CREATE INDEX IF NOT EXISTS idx_profile_mappings_target ON profile_mappings(graduate_profile_id);

-- Enrollment (who took what, when)
CREATE TABLE IF NOT EXISTS enrollments (
    student_id TEXT NOT NULL,
    course_id TEXT NOT NULL REFERENCES courses(id),
    term TEXT NOT NULL,
    PRIMARY KEY (student_id, course_id, term)
);
CREATE INDEX IF NOT EXISTS idx_enrollments_course ON enrollments(course_id, term);

-- Raw leaf scores
CREATE TABLE IF NOT EXISTS raw_scores (
    student_id TEXT NOT NULL,
    assessment_kind TEXT NOT NULL,
    assessment_id TEXT NOT NULL,
    term TEXT NOT NULL,
    value REAL NOT NULL CHECK (value >= 0 AND value <= 100),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (student_id, assessment_kind, assessment_id, term)
);
CREATE INDEX IF NOT EXISTS idx_raw_scores_assessment ON raw_scores(assessment_kind, assessment_id, term);

-- Computed-score cache; written exclusively by the recompute orchestrator
CREATE TABLE IF NOT EXISTS computed_scores (
    entity_kind TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    student_id TEXT NOT NULL,
    term TEXT NOT NULL,
    value REAL NOT NULL,
    computed_at TEXT NOT NULL,
    PRIMARY KEY (entity_kind, entity_id, student_id, term)
);
CREATE INDEX IF NOT EXISTS idx_computed_student ON computed_scores(student_id, term);
"#;

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
