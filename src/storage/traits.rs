//! Storage traits and error types
//!
//! This module defines the trait interface for record sinks and
//! associated error types.

use crate::storage::{Record, ResumePoint};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for relational sinks receiving harvested records
///
/// Upserts must be idempotent under the natural key: a duplicate insert is
/// silently ignored, never reported as an error.
pub trait RecordSink {
    /// Inserts a record unless one with the same natural key exists
    ///
    /// # Returns
    ///
    /// `true` when a new row was written, `false` when it was a duplicate
    fn upsert_record(&mut self, record: &Record) -> StorageResult<bool>;

    /// Returns the position of the most recently stored record
    fn last_record(&self) -> StorageResult<Option<ResumePoint>>;

    /// Counts all stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Counts distinct schools with at least one record
    fn count_schools(&self) -> StorageResult<u64>;

    /// Record counts per province, ordered by province name
    fn count_by_province(&self) -> StorageResult<Vec<(String, u64)>>;
}
