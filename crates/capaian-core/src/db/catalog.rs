//! Catalog writes: academic structure, weighted records, mappings, enrollment
//!
//! Every weighted write runs the Weight Validator inside the same transaction
//! that commits the record, so concurrent edits of one sibling set cannot
//! both slip under the 100% limit.

use rusqlite::params;

use crate::error::{CapaianError, Result};
use crate::validate::{validate_weight, SiblingSet};

impl super::Database {
    pub fn put_program(&self, id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO programs (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![id, name],
        )?;
        Ok(())
    }

    pub fn put_course(
        &self,
        id: &str,
        program_id: &str,
        term: &str,
        name: &str,
        credit_hours: i64,
    ) -> Result<()> {
        if credit_hours <= 0 {
            return Err(CapaianError::CreditOutOfRange(credit_hours));
        }
        if !self.exists("programs", program_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "program",
                id: program_id.to_string(),
            });
        }
        self.conn.execute(
            "INSERT INTO courses (id, program_id, term, name, credit_hours)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 program_id = excluded.program_id,
                 term = excluded.term,
                 name = excluded.name,
                 credit_hours = excluded.credit_hours",
            params![id, program_id, term, name, credit_hours],
        )?;
        Ok(())
    }

    pub fn put_graduate_profile(&self, id: &str, program_id: &str, name: &str) -> Result<()> {
        if !self.exists("programs", program_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "program",
                id: program_id.to_string(),
            });
        }
        self.conn.execute(
            "INSERT INTO graduate_profiles (id, program_id, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, name = excluded.name",
            params![id, program_id, name],
        )?;
        Ok(())
    }

    pub fn put_program_outcome(&self, id: &str, program_id: &str, name: &str) -> Result<()> {
        if !self.exists("programs", program_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "program",
                id: program_id.to_string(),
            });
        }
        self.conn.execute(
            "INSERT INTO program_outcomes (id, program_id, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET program_id = excluded.program_id, name = excluded.name",
            params![id, program_id, name],
        )?;
        Ok(())
    }

    pub fn put_course_outcome(&self, id: &str, course_id: &str, name: &str) -> Result<()> {
        if !self.exists("courses", course_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "course",
                id: course_id.to_string(),
            });
        }
        self.conn.execute(
            "INSERT INTO course_outcomes (id, course_id, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET course_id = excluded.course_id, name = excluded.name",
            params![id, course_id, name],
        )?;
        Ok(())
    }

    /// Create or update an assessment technique, enforcing the sibling
    /// weight-sum invariant in the write transaction.
    pub fn put_technique(
        &self,
        id: &str,
        course_outcome_id: &str,
        name: &str,
        weight: f64,
        rubric_ref: Option<&str>,
    ) -> Result<()> {
        if !self.exists("course_outcomes", course_outcome_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "course outcome",
                id: course_outcome_id.to_string(),
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        validate_weight(
            &tx,
            &SiblingSet::Techniques {
                course_outcome_id: course_outcome_id.to_string(),
            },
            weight,
            Some(id),
        )?;
        tx.execute(
            "INSERT INTO assessment_techniques (id, course_outcome_id, name, weight, rubric_ref)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 course_outcome_id = excluded.course_outcome_id,
                 name = excluded.name,
                 weight = excluded.weight,
                 rubric_ref = excluded.rubric_ref",
            params![id, course_outcome_id, name, weight, rubric_ref],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a technique; refused while raw scores still reference it.
    pub fn delete_technique(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        let in_use: i64 = tx.query_row(
            "SELECT COUNT(*) FROM raw_scores
             WHERE assessment_kind = 'technique' AND assessment_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(CapaianError::TechniqueInUse { id: id.to_string() });
        }

        let deleted = tx.execute("DELETE FROM assessment_techniques WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(CapaianError::UnknownEntity {
                kind: "assessment technique",
                id: id.to_string(),
            });
        }
        tx.commit()?;
        Ok(())
    }

    pub fn put_sub_outcome(
        &self,
        id: &str,
        course_outcome_id: &str,
        name: &str,
        weight: f64,
    ) -> Result<()> {
        if !self.exists("course_outcomes", course_outcome_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "course outcome",
                id: course_outcome_id.to_string(),
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        validate_weight(
            &tx,
            &SiblingSet::SubOutcomes {
                course_outcome_id: course_outcome_id.to_string(),
            },
            weight,
            Some(id),
        )?;
        tx.execute(
            "INSERT INTO sub_outcomes (id, course_outcome_id, name, weight)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 course_outcome_id = excluded.course_outcome_id,
                 name = excluded.name,
                 weight = excluded.weight",
            params![id, course_outcome_id, name, weight],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Map a course outcome into a program outcome with a contribution weight.
    ///
    /// The sibling budget is the course's total incoming weight for that
    /// program outcome, so the validator needs the course the outcome
    /// belongs to.
    pub fn map_course_outcome(
        &self,
        course_outcome_id: &str,
        program_outcome_id: &str,
        weight: f64,
    ) -> Result<()> {
        if !self.exists("program_outcomes", program_outcome_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "program outcome",
                id: program_outcome_id.to_string(),
            });
        }

        let tx = self.conn.unchecked_transaction()?;

        let course_id: String = tx
            .query_row(
                "SELECT course_id FROM course_outcomes WHERE id = ?1",
                [course_outcome_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CapaianError::UnknownEntity {
                    kind: "course outcome",
                    id: course_outcome_id.to_string(),
                },
                other => CapaianError::Store(other),
            })?;

        validate_weight(
            &tx,
            &SiblingSet::CourseContribution {
                course_id,
                program_outcome_id: program_outcome_id.to_string(),
            },
            weight,
            Some(course_outcome_id),
        )?;
        tx.execute(
            "INSERT INTO course_outcome_mappings (course_outcome_id, program_outcome_id, weight)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(course_outcome_id, program_outcome_id)
             DO UPDATE SET weight = excluded.weight",
            params![course_outcome_id, program_outcome_id, weight],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Map a program outcome into a graduate profile attribute.
    pub fn map_profile(
        &self,
        program_outcome_id: &str,
        graduate_profile_id: &str,
        weight: f64,
    ) -> Result<()> {
        if !self.exists("program_outcomes", program_outcome_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "program outcome",
                id: program_outcome_id.to_string(),
            });
        }
        if !self.exists("graduate_profiles", graduate_profile_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "graduate profile",
                id: graduate_profile_id.to_string(),
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        validate_weight(
            &tx,
            &SiblingSet::ProfileContribution {
                graduate_profile_id: graduate_profile_id.to_string(),
            },
            weight,
            Some(program_outcome_id),
        )?;
        tx.execute(
            "INSERT INTO profile_mappings (program_outcome_id, graduate_profile_id, weight)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(program_outcome_id, graduate_profile_id)
             DO UPDATE SET weight = excluded.weight",
            params![program_outcome_id, graduate_profile_id, weight],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn enroll(&self, student_id: &str, course_id: &str, term: &str) -> Result<()> {
        if !self.exists("courses", course_id)? {
            return Err(CapaianError::UnknownEntity {
                kind: "course",
                id: course_id.to_string(),
            });
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO enrollments (student_id, course_id, term) VALUES (?1, ?2, ?3)",
            params![student_id, course_id, term],
        )?;
        Ok(())
    }
}
