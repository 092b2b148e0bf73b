use thiserror::Error;

use crate::model::{ActivityError, CourseError, StateBlobError};
use crate::origin::OriginError;
use crate::protocol::ProtocolViolation;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Activity(#[from] ActivityError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    StateBlob(#[from] StateBlobError),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}
