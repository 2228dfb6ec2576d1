use assert_cmd::{cargo::cargo_bin_cmd, Command};
use std::path::Path;

pub fn capaian() -> Command {
    cargo_bin_cmd!("capaian")
}

/// Initialize a store under `root` and seed one program with a small
/// hierarchy: IF101 (3 credits, two techniques at 60/40) feeding CPL-1,
/// which feeds the PL-1 profile, with one enrolled student.
#[allow(dead_code)]
pub fn init_seeded_store(root: &Path) {
    capaian().arg("--root").arg(root).arg("init").assert().success();

    let db = rusqlite::Connection::open(root.join(".capaian/capaian.db")).unwrap();
    db.execute_batch(
        "INSERT INTO programs (id, name) VALUES ('TI', 'Teknik Informatika');
         INSERT INTO courses (id, program_id, term, name, credit_hours)
             VALUES ('IF101', 'TI', '2024-1', 'Algoritma', 3);
         INSERT INTO graduate_profiles (id, program_id, name)
             VALUES ('PL-1', 'TI', 'Problem solver');
         INSERT INTO program_outcomes (id, program_id, name)
             VALUES ('CPL-1', 'TI', 'Penguasaan komputasi');
         INSERT INTO course_outcomes (id, course_id, name)
             VALUES ('CPMK-1', 'IF101', 'Dasar algoritma');
         INSERT INTO assessment_techniques (id, course_outcome_id, name, weight)
             VALUES ('UTS', 'CPMK-1', 'Ujian Tengah Semester', 60.0);
         INSERT INTO assessment_techniques (id, course_outcome_id, name, weight)
             VALUES ('UAS', 'CPMK-1', 'Ujian Akhir Semester', 40.0);
         INSERT INTO course_outcome_mappings (course_outcome_id, program_outcome_id, weight)
             VALUES ('CPMK-1', 'CPL-1', 100.0);
         INSERT INTO profile_mappings (program_outcome_id, graduate_profile_id, weight)
             VALUES ('CPL-1', 'PL-1', 100.0);
         INSERT INTO enrollments (student_id, course_id, term)
             VALUES ('2311001', 'IF101', '2024-1');",
    )
    .unwrap();
}
