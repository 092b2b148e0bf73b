//! The cross-frame message protocol spoken between the hosting page and an
//! embedded activity, plus the backend write it turns score reports into.

mod backend;
mod frame;

use thiserror::Error;

pub use backend::{
    CourseProgressView, ModuleProgressView, ProgressUpdateRequest, ProgressUpdateResponse,
};
pub use frame::{FrameMessage, InboundFrame, MessageId, OutboundMessage, ScoreReport};

pub const GET_STATE: &str = "SPLICE.getState";
pub const GET_STATE_RESPONSE: &str = "SPLICE.getState.response";
pub const REPORT_SCORE_AND_STATE: &str = "SPLICE.reportScoreAndState";
pub const FRAME_RESIZE: &str = "lti.frameResize";

/// A message that does not follow the protocol. Always dropped, never
/// answered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolViolation {
    #[error("message payload is not a JSON object")]
    NotAnObject,

    #[error("message has no string subject")]
    MissingSubject,

    #[error("unrecognized subject {0:?}")]
    UnknownSubject(String),

    #[error("state request has no message_id")]
    MissingMessageId,
}

/// Routing decision for an inbound message, made on the subject alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    StateRequest,
    /// Our own `getState.response` echoed back through a shared window.
    StateResponseAck,
    ScoreReport,
    ResizeNotification,
    Unknown,
}

impl MessageKind {
    /// Exact, case-sensitive match on the subject.
    #[must_use]
    pub fn classify(subject: &str) -> Self {
        match subject {
            GET_STATE => Self::StateRequest,
            GET_STATE_RESPONSE => Self::StateResponseAck,
            REPORT_SCORE_AND_STATE => Self::ScoreReport,
            FRAME_RESIZE => Self::ResizeNotification,
            _ => Self::Unknown,
        }
    }
}
