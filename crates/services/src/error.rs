//! Shared error types for the services crate.

use thiserror::Error;

use bridge_core::model::{ActivityId, CourseId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("unknown activity {0}")]
    UnknownActivity(ActivityId),
    #[error("unknown course {0}")]
    UnknownCourse(CourseId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by a `GradeSink`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradeSinkError {
    #[error("grade sink rejected the update with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while opening a bridge session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("unknown activity {0}")]
    UnknownActivity(ActivityId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping bridge services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
