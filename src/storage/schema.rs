//! Database schema definitions
//!
//! This module contains the SQL schema for the harvested record table.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per normalized major/detail record
CREATE TABLE IF NOT EXISTS major (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    school_name TEXT NOT NULL DEFAULT '',
    major_name TEXT NOT NULL DEFAULT '',
    province TEXT NOT NULL DEFAULT '',
    major_code TEXT NOT NULL DEFAULT '',
    degree_type TEXT NOT NULL DEFAULT '',
    exam_type TEXT NOT NULL DEFAULT '',
    department TEXT NOT NULL DEFAULT '',
    study_mode TEXT NOT NULL DEFAULT '',
    research_direction TEXT NOT NULL DEFAULT '',
    veteran_program TEXT NOT NULL DEFAULT '',
    shaogu_program TEXT NOT NULL DEFAULT '',
    advisor TEXT NOT NULL DEFAULT '',
    planned_enrollment TEXT NOT NULL DEFAULT '',
    exam_subject1 TEXT NOT NULL DEFAULT '',
    exam_subject2 TEXT NOT NULL DEFAULT '',
    exam_subject3 TEXT NOT NULL DEFAULT '',
    exam_subject4 TEXT NOT NULL DEFAULT '',
    inserted_at TEXT NOT NULL,
    UNIQUE(school_name, major_code, department, research_direction, study_mode,
           exam_subject1, exam_subject2, exam_subject3, exam_subject4)
);

CREATE INDEX IF NOT EXISTS idx_major_province ON major(province);
CREATE INDEX IF NOT EXISTS idx_major_school ON major(school_name);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
