use tracing::{debug, warn};

use bridge_core::model::{Activity, StateBlob};
use bridge_core::normalizer::{CanonicalResult, normalize_report};
use bridge_core::origin::{OriginPolicy, OriginRejection};
use bridge_core::protocol::{
    FrameMessage, InboundFrame, MessageKind, OutboundMessage, ProtocolViolation,
};

/// What the controller decided about one inbound message.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Disposition {
    /// State request answered with the stored blob.
    Replied,
    /// State request with nothing stored; silence means "fresh start".
    NoStoredState,
    /// Score report turned into a backend write.
    Persist,
    /// Recognized but needs nothing from the core (resize, our own echo).
    Ignored(MessageKind),
    RejectedOrigin(OriginRejection),
    Violation(ProtocolViolation),
}

/// A normalized report waiting to be persisted.
///
/// Flags were derived from the raw score, before any rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWrite {
    pub result: CanonicalResult,
    pub state: Option<StateBlob>,
}

/// Reply-or-none and write-or-none for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOutcome {
    pub reply: Option<OutboundMessage>,
    pub write: Option<ScoreWrite>,
    pub disposition: Disposition,
}

impl BridgeOutcome {
    fn silent(disposition: Disposition) -> Self {
        Self {
            reply: None,
            write: None,
            disposition,
        }
    }

    fn reply(message: OutboundMessage) -> Self {
        Self {
            reply: Some(message),
            write: None,
            disposition: Disposition::Replied,
        }
    }

    fn write(write: ScoreWrite) -> Self {
        Self {
            reply: None,
            write: Some(write),
            disposition: Disposition::Persist,
        }
    }

    /// True when the message produced neither a reply nor a write.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.reply.is_none() && self.write.is_none()
    }
}

/// Reactive bridge state machine.
///
/// Holds no per-frame state: every call maps (stored state, inbound message)
/// to an outcome, and the only lasting state is the persisted progress.
#[derive(Debug, Clone, Default)]
pub struct BridgeController {
    policy: OriginPolicy,
}

impl BridgeController {
    #[must_use]
    pub fn new(policy: OriginPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }

    /// Handle one inbound message for `activity`.
    ///
    /// `stored` is the last saved blob for the pair; it is only consulted for
    /// state requests.
    #[must_use]
    pub fn handle(
        &self,
        frame: &InboundFrame,
        activity: &Activity,
        stored: Option<&StateBlob>,
    ) -> BridgeOutcome {
        if let Err(rejection) = self.policy.validate(&frame.origin, activity) {
            warn!(
                activity = %activity.id(),
                origin = %frame.origin,
                reason = %rejection,
                "dropping message from untrusted origin"
            );
            return BridgeOutcome::silent(Disposition::RejectedOrigin(rejection));
        }

        let message = match FrameMessage::parse(&frame.data) {
            Ok(message) => message,
            Err(violation) => {
                warn!(activity = %activity.id(), %violation, "dropping protocol violation");
                return BridgeOutcome::silent(Disposition::Violation(violation));
            }
        };

        match message {
            FrameMessage::GetState { message_id } => match stored {
                Some(state) => {
                    debug!(activity = %activity.id(), "answering state request");
                    BridgeOutcome::reply(OutboundMessage::state_response(
                        message_id,
                        state.clone(),
                    ))
                }
                None => {
                    debug!(activity = %activity.id(), "no stored state, staying silent");
                    BridgeOutcome::silent(Disposition::NoStoredState)
                }
            },
            FrameMessage::ReportScoreAndState(report) => {
                let normalized = normalize_report(
                    &report.score,
                    report.score_text.as_deref(),
                    activity.success_threshold(),
                );
                for warning in &normalized.warnings {
                    warn!(activity = %activity.id(), %warning, "malformed score report");
                }
                BridgeOutcome::write(ScoreWrite {
                    result: normalized.result,
                    state: report.state,
                })
            }
            FrameMessage::FrameResize => {
                BridgeOutcome::silent(Disposition::Ignored(MessageKind::ResizeNotification))
            }
            FrameMessage::StateResponseAck => {
                debug!(activity = %activity.id(), "ignoring echoed state response");
                BridgeOutcome::silent(Disposition::Ignored(MessageKind::StateResponseAck))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::model::{ActivityId, CourseId, ModuleId, SuccessThreshold};
    use bridge_core::origin::Origin;
    use serde_json::json;
    use serde_json::value::to_raw_value;

    const CONTENT: &str = "https://content.example.org";

    fn activity() -> Activity {
        Activity::new(
            ActivityId::new(7),
            ModuleId::new(1),
            CourseId::new(1),
            SuccessThreshold::default(),
            vec![Origin::parse(CONTENT).unwrap()],
        )
    }

    fn inbound(origin: &str, data: serde_json::Value) -> InboundFrame {
        InboundFrame::new(origin, to_raw_value(&data).unwrap())
    }

    fn controller() -> BridgeController {
        BridgeController::new(OriginPolicy::new())
    }

    #[test]
    fn answers_state_request_with_stored_blob() {
        let blob = StateBlob::from_raw(r#"{"page":3}"#).unwrap();
        let frame = inbound(
            CONTENT,
            json!({"subject": "SPLICE.getState", "message_id": 12}),
        );

        let outcome = controller().handle(&frame, &activity(), Some(&blob));
        let reply = outcome.reply.expect("reply");
        assert_eq!(reply.subject, "SPLICE.getState.response");
        assert_eq!(reply.message_id.as_value(), &json!(12));
        assert_eq!(reply.state, blob);
        assert!(outcome.write.is_none());
    }

    #[test]
    fn state_request_without_state_is_silent() {
        let frame = inbound(
            CONTENT,
            json!({"subject": "SPLICE.getState", "message_id": "a"}),
        );
        let outcome = controller().handle(&frame, &activity(), None);
        assert!(outcome.is_silent());
        assert_eq!(outcome.disposition, Disposition::NoStoredState);
    }

    #[test]
    fn report_becomes_backend_write() {
        let frame = inbound(
            CONTENT,
            json!({
                "subject": "SPLICE.reportScoreAndState",
                "score": 0.6,
                "state": {"scoreText": "3/5", "answers": [1, 0, 1]}
            }),
        );
        let outcome = controller().handle(&frame, &activity(), None);
        let write = outcome.write.expect("write");

        assert!(outcome.reply.is_none());
        assert_eq!(write.result.score, 60.0);
        assert_eq!(write.result.progress_percent, 60.0);
        assert!(!write.result.completed);
        assert!(!write.result.success);
        let state: serde_json::Value =
            serde_json::from_str(write.state.expect("state").as_str()).unwrap();
        assert_eq!(state["answers"], json!([1, 0, 1]));
    }

    #[test]
    fn unstructured_score_text_still_applies_score() {
        let frame = inbound(
            CONTENT,
            json!({
                "subject": "SPLICE.reportScoreAndState",
                "score": 0.9,
                "state": {"scoreText": "oops"}
            }),
        );
        let write = controller()
            .handle(&frame, &activity(), None)
            .write
            .expect("write");
        assert_eq!(write.result.progress_percent, 0.0);
        assert_eq!(write.result.score, 90.0);
        assert!(write.result.success);
    }

    #[test]
    fn untrusted_origin_is_dropped_before_parsing() {
        let blob = StateBlob::from_raw("{}").unwrap();
        let frame = inbound(
            "https://evil.example.com",
            json!({"subject": "SPLICE.getState", "message_id": 1}),
        );
        let outcome = controller().handle(&frame, &activity(), Some(&blob));
        assert!(outcome.is_silent());
        assert!(matches!(
            outcome.disposition,
            Disposition::RejectedOrigin(OriginRejection::NotAllowed { .. })
        ));
    }

    #[test]
    fn distrusted_origin_is_dropped_even_if_listed() {
        let policy = OriginPolicy::new().with(Origin::parse(CONTENT).unwrap(), false);
        let frame = inbound(
            CONTENT,
            json!({"subject": "SPLICE.reportScoreAndState", "score": 1.0}),
        );
        let outcome = BridgeController::new(policy).handle(&frame, &activity(), None);
        assert!(outcome.is_silent());
    }

    #[test]
    fn unknown_subjects_and_resize_are_silent() {
        let unknown = inbound(CONTENT, json!({"subject": "SPLICE.somethingElse"}));
        let outcome = controller().handle(&unknown, &activity(), None);
        assert!(outcome.is_silent());
        assert!(matches!(
            outcome.disposition,
            Disposition::Violation(ProtocolViolation::UnknownSubject(_))
        ));

        let resize = inbound(CONTENT, json!({"subject": "lti.frameResize", "height": 400}));
        let outcome = controller().handle(&resize, &activity(), None);
        assert_eq!(
            outcome.disposition,
            Disposition::Ignored(MessageKind::ResizeNotification)
        );
    }

    #[test]
    fn request_without_message_id_is_a_violation() {
        let frame = inbound(CONTENT, json!({"subject": "SPLICE.getState"}));
        let blob = StateBlob::from_raw("{}").unwrap();
        let outcome = controller().handle(&frame, &activity(), Some(&blob));
        assert_eq!(
            outcome.disposition,
            Disposition::Violation(ProtocolViolation::MissingMessageId)
        );
        assert!(outcome.reply.is_none());
    }

    #[test]
    fn near_unity_score_is_not_complete() {
        let frame = inbound(
            CONTENT,
            json!({
                "subject": "SPLICE.reportScoreAndState",
                "score": 0.99999,
                "state": {"scoreText": "4/5"}
            }),
        );
        let write = controller()
            .handle(&frame, &activity(), None)
            .write
            .expect("write");
        assert_eq!(write.result.score, 100.0);
        assert!(!write.result.completed);

        let frame = inbound(
            CONTENT,
            json!({"subject": "SPLICE.reportScoreAndState", "score": 0.69999}),
        );
        let write = controller()
            .handle(&frame, &activity(), None)
            .write
            .expect("write");
        assert_eq!(write.result.score, 70.0);
        assert!(!write.result.success);
    }

    #[test]
    fn reported_state_is_written_unchanged() {
        let frame = InboundFrame::from_json(
            CONTENT,
            r#"{"subject":"SPLICE.reportScoreAndState","score":0.5,"state":{"zeta":1,"alpha":2.50,"scoreText":"1/2"}}"#,
        )
        .unwrap();
        let write = controller()
            .handle(&frame, &activity(), None)
            .write
            .expect("write");
        assert_eq!(
            write.state.expect("state").as_str(),
            r#"{"zeta":1,"alpha":2.50,"scoreText":"1/2"}"#
        );
    }
}
