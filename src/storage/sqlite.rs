//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordSink trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageResult};
use crate::storage::{Record, ResumePoint};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and applies the schema
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Returns every stored record in insertion order
    pub fn all_records(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT school_name, major_name, province, major_code, degree_type, exam_type,
             department, study_mode, research_direction, veteran_program, shaogu_program,
             advisor, planned_enrollment, exam_subject1, exam_subject2, exam_subject3,
             exam_subject4
             FROM major ORDER BY id",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(Record {
                    school_name: row.get(0)?,
                    major_name: row.get(1)?,
                    province: row.get(2)?,
                    major_code: row.get(3)?,
                    degree_type: row.get(4)?,
                    exam_type: row.get(5)?,
                    department: row.get(6)?,
                    study_mode: row.get(7)?,
                    research_direction: row.get(8)?,
                    veteran_program: row.get(9)?,
                    shaogu_program: row.get(10)?,
                    advisor: row.get(11)?,
                    planned_enrollment: row.get(12)?,
                    exam_subject1: row.get(13)?,
                    exam_subject2: row.get(14)?,
                    exam_subject3: row.get(15)?,
                    exam_subject4: row.get(16)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

impl RecordSink for SqliteStorage {
    fn upsert_record(&mut self, record: &Record) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO major (school_name, major_name, province, major_code,
             degree_type, exam_type, department, study_mode, research_direction,
             veteran_program, shaogu_program, advisor, planned_enrollment, exam_subject1,
             exam_subject2, exam_subject3, exam_subject4, inserted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                record.school_name,
                record.major_name,
                record.province,
                record.major_code,
                record.degree_type,
                record.exam_type,
                record.department,
                record.study_mode,
                record.research_direction,
                record.veteran_program,
                record.shaogu_program,
                record.advisor,
                record.planned_enrollment,
                record.exam_subject1,
                record.exam_subject2,
                record.exam_subject3,
                record.exam_subject4,
                now,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn last_record(&self) -> StorageResult<Option<ResumePoint>> {
        let point = self
            .conn
            .query_row(
                "SELECT province, school_name, major_code FROM major ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(ResumePoint {
                        province: row.get(0)?,
                        school_name: row.get(1)?,
                        major_code: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(point)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM major", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_schools(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT school_name) FROM major",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_by_province(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT province, COUNT(*) FROM major GROUP BY province ORDER BY province",
        )?;

        let counts = stmt
            .query_map([], |row| {
                let province: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((province, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }
}
