//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Idempotent record upserts keyed by the natural key
//! - The "most recent record" query used to resume a traversal

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RecordSink, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// A normalized major/detail row
///
/// Missing portal values are stored as empty strings so the natural key stays total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub school_name: String,
    pub major_name: String,
    pub province: String,
    pub major_code: String,
    pub degree_type: String,
    pub exam_type: String,
    pub department: String,
    pub study_mode: String,
    pub research_direction: String,
    pub veteran_program: String,
    pub shaogu_program: String,
    pub advisor: String,
    pub planned_enrollment: String,
    pub exam_subject1: String,
    pub exam_subject2: String,
    pub exam_subject3: String,
    pub exam_subject4: String,
}

/// Where the last stored record sits in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub province: String,
    pub school_name: String,
    pub major_code: String,
}
