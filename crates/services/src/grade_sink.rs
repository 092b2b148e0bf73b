use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use bridge_core::model::{ActivityId, CourseProgress, EnrolleeId};

use crate::error::GradeSinkError;

/// A rolled-up course grade, pushed after every successful progress write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeUpdate {
    pub enrollee_id: EnrolleeId,
    /// The activity whose report triggered the update.
    pub activity_id: ActivityId,
    #[serde(flatten)]
    pub course: CourseProgress,
}

/// Destination for course grades (for example an LMS passback relay).
#[async_trait]
pub trait GradeSink: Send + Sync {
    /// # Errors
    ///
    /// Returns `GradeSinkError` if the update could not be delivered.
    async fn publish(&self, update: &GradeUpdate) -> Result<(), GradeSinkError>;
}

/// Default sink: records the grade as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingGradeSink;

#[async_trait]
impl GradeSink for TracingGradeSink {
    async fn publish(&self, update: &GradeUpdate) -> Result<(), GradeSinkError> {
        info!(
            enrollee = %update.enrollee_id,
            course = %update.course.course_id,
            overall_score = update.course.overall_score,
            overall_progress = update.course.overall_progress,
            modules_completed = update.course.modules_completed,
            "course grade updated"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct HttpGradeSinkConfig {
    pub endpoint: String,
    pub token: Option<String>,
}

impl HttpGradeSinkConfig {
    /// Reads `BRIDGE_GRADE_SINK_URL` and the optional `BRIDGE_GRADE_SINK_TOKEN`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("BRIDGE_GRADE_SINK_URL").ok()?;
        if endpoint.trim().is_empty() {
            return None;
        }
        let token = std::env::var("BRIDGE_GRADE_SINK_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self { endpoint, token })
    }
}

/// Posts each update as JSON to a configured endpoint.
#[derive(Clone)]
pub struct HttpGradeSink {
    client: Client,
    config: HttpGradeSinkConfig,
}

impl HttpGradeSink {
    #[must_use]
    pub fn new(config: HttpGradeSinkConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl GradeSink for HttpGradeSink {
    async fn publish(&self, update: &GradeUpdate) -> Result<(), GradeSinkError> {
        let mut request = self.client.post(&self.config.endpoint).json(update);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(GradeSinkError::HttpStatus(response.status()));
        }
        Ok(())
    }
}
