#![forbid(unsafe_code)]

pub mod app_services;
pub mod bridge;
pub mod error;
pub mod grade_sink;
pub mod progress_service;

pub use bridge_core::Clock;

pub use app_services::BridgeServices;
pub use bridge::{
    BridgeController, BridgeOutcome, BridgeSession, Disposition, ScoreWrite, SessionOutcome,
};
pub use error::{BridgeError, BridgeServicesError, GradeSinkError, ProgressServiceError};
pub use grade_sink::{GradeSink, GradeUpdate, HttpGradeSink, HttpGradeSinkConfig, TracingGradeSink};
pub use progress_service::{CourseReport, ProgressService};
