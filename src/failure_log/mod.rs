//! Durable record of abandoned requests
//!
//! This module handles:
//! - Failure entries, their request types and natural keys
//! - Writing and reading the JSON-lines and legacy text formats
//! - Replaying logged failures and pruning the ones that now succeed

mod entry;
mod file;
mod format;
mod reconcile;

pub use entry::{FailureKind, FailureLogEntry, NaturalKey, RequestType};
pub use file::{FailureLog, FailureRecorder};
pub use format::{inspect_line, to_json_line, to_legacy_line, LineKind, EXHAUSTED_REASON};
pub use reconcile::{reconcile, ReconcileReport};
