use std::sync::Arc;

use tracing::{debug, warn};

use bridge_core::model::{Activity, EnrolleeId};
use bridge_core::protocol::{InboundFrame, MessageKind, OutboundMessage, ProgressUpdateResponse};

use super::controller::{BridgeController, Disposition};
use crate::progress_service::ProgressService;

/// Result of relaying one message through a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    /// Message to post back into the frame, if any.
    pub reply: Option<OutboundMessage>,
    /// Stored progress after a successful write.
    pub update: Option<ProgressUpdateResponse>,
    pub disposition: Disposition,
}

/// One mounted frame: an enrollee working on one activity.
///
/// Feeds the controller the stored state it needs and performs the writes it
/// asks for. Persistence failures are logged and swallowed; the content is
/// free to resend its report.
#[derive(Clone)]
pub struct BridgeSession {
    enrollee: EnrolleeId,
    activity: Activity,
    controller: Arc<BridgeController>,
    progress: Arc<ProgressService>,
}

impl BridgeSession {
    #[must_use]
    pub fn new(
        enrollee: EnrolleeId,
        activity: Activity,
        controller: Arc<BridgeController>,
        progress: Arc<ProgressService>,
    ) -> Self {
        Self {
            enrollee,
            activity,
            controller,
            progress,
        }
    }

    #[must_use]
    pub fn enrollee(&self) -> EnrolleeId {
        self.enrollee
    }

    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub async fn handle(&self, frame: &InboundFrame) -> SessionOutcome {
        // Rejected origins never reach storage; the controller logs them.
        let wants_state = frame.kind() == MessageKind::StateRequest
            && self
                .controller
                .policy()
                .validate(&frame.origin, &self.activity)
                .is_ok();

        let stored = if wants_state {
            match self
                .progress
                .load_state(self.enrollee, self.activity.id())
                .await
            {
                Ok(state) => state,
                Err(err) => {
                    warn!(
                        enrollee = %self.enrollee,
                        activity = %self.activity.id(),
                        error = %err,
                        "state load failed, not answering"
                    );
                    return SessionOutcome {
                        reply: None,
                        update: None,
                        disposition: Disposition::NoStoredState,
                    };
                }
            }
        } else {
            None
        };

        let outcome = self
            .controller
            .handle(frame, &self.activity, stored.as_ref());

        let update = match &outcome.write {
            Some(write) => match self
                .progress
                .record_report(
                    self.enrollee,
                    &self.activity,
                    &write.result,
                    write.state.as_ref(),
                )
                .await
            {
                Ok(response) => {
                    debug!(
                        enrollee = %self.enrollee,
                        activity = %self.activity.id(),
                        overall_score = response.course_progress.overall_score,
                        "report persisted"
                    );
                    Some(response)
                }
                Err(err) => {
                    warn!(
                        enrollee = %self.enrollee,
                        activity = %self.activity.id(),
                        error = %err,
                        "persisting report failed"
                    );
                    None
                }
            },
            None => None,
        };

        SessionOutcome {
            reply: outcome.reply,
            update,
            disposition: outcome.disposition,
        }
    }
}
