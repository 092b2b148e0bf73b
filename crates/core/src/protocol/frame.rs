use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use super::{GET_STATE_RESPONSE, MessageKind, ProtocolViolation};
use crate::model::StateBlob;
use crate::normalizer::ReportedScore;

/// One `postMessage` event as delivered to the host: the origin the browser
/// attached and the untouched payload.
///
/// The payload stays raw so a reported state blob keeps its exact bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    pub origin: String,
    pub data: Box<RawValue>,
}

impl InboundFrame {
    #[must_use]
    pub fn new(origin: impl Into<String>, data: Box<RawValue>) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }

    /// Build a frame from payload text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if `data` is not a JSON document.
    pub fn from_json(origin: impl Into<String>, data: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(origin, RawValue::from_string(data.to_owned())?))
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        serde_json::from_str::<Value>(self.data.get())
            .ok()
            .as_ref()
            .and_then(|data| data.get("subject"))
            .and_then(Value::as_str)
            .map_or(MessageKind::Unknown, MessageKind::classify)
    }
}

/// Correlation id chosen by the content; echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Value);

impl MessageId {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Payload of `SPLICE.reportScoreAndState`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub score: ReportedScore,
    /// `state.scoreText`, when the content supplied one.
    pub score_text: Option<String>,
    /// The whole `state` object, saved as-is.
    pub state: Option<StateBlob>,
}

/// A parsed, recognized frame message.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameMessage {
    GetState { message_id: MessageId },
    ReportScoreAndState(ScoreReport),
    StateResponseAck,
    FrameResize,
}

impl FrameMessage {
    /// Parse a frame payload.
    ///
    /// Score reports never fail on their score or state fields; those problems
    /// are left for the normalizer to correct.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for non-objects, missing or unknown
    /// subjects, and state requests without a `message_id`.
    pub fn parse(data: &RawValue) -> Result<Self, ProtocolViolation> {
        let value: Value =
            serde_json::from_str(data.get()).map_err(|_| ProtocolViolation::NotAnObject)?;
        let object = value.as_object().ok_or(ProtocolViolation::NotAnObject)?;
        let subject = object
            .get("subject")
            .and_then(Value::as_str)
            .ok_or(ProtocolViolation::MissingSubject)?;

        match MessageKind::classify(subject) {
            MessageKind::StateRequest => {
                let message_id = object
                    .get("message_id")
                    .filter(|id| !id.is_null())
                    .cloned()
                    .ok_or(ProtocolViolation::MissingMessageId)?;
                Ok(Self::GetState {
                    message_id: MessageId(message_id),
                })
            }
            MessageKind::ScoreReport => Ok(Self::ReportScoreAndState(parse_report(object, data))),
            MessageKind::StateResponseAck => Ok(Self::StateResponseAck),
            MessageKind::ResizeNotification => Ok(Self::FrameResize),
            MessageKind::Unknown => Err(ProtocolViolation::UnknownSubject(subject.to_owned())),
        }
    }
}

/// The report's `state` member exactly as it was written.
#[derive(Deserialize)]
struct RawReportState<'a> {
    #[serde(borrow, default)]
    state: Option<&'a RawValue>,
}

fn parse_report(object: &serde_json::Map<String, Value>, data: &RawValue) -> ScoreReport {
    let score = match object.get("score") {
        None | Some(Value::Null) => ReportedScore::Missing,
        Some(Value::Number(n)) => n
            .as_f64()
            .map_or_else(|| ReportedScore::Other(n.to_string()), ReportedScore::Number),
        Some(Value::String(s)) => ReportedScore::Other(s.clone()),
        Some(other) => ReportedScore::Other(other.to_string()),
    };

    let state = object.get("state").filter(|s| !s.is_null());
    let score_text = state
        .and_then(|s| s.get("scoreText"))
        .and_then(Value::as_str)
        .map(str::to_owned);

    let raw_state = serde_json::from_str::<RawReportState<'_>>(data.get())
        .ok()
        .and_then(|raw| raw.state)
        .and_then(|raw| StateBlob::from_raw(raw.get()).ok());

    ScoreReport {
        score,
        score_text,
        // Duplicate `state` keys defeat the raw pass; fall back to the parsed value.
        state: raw_state.or_else(|| state.map(StateBlob::from_value)),
    }
}

/// A message posted back into the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub subject: &'static str,
    pub message_id: MessageId,
    pub state: StateBlob,
}

impl OutboundMessage {
    #[must_use]
    pub fn state_response(message_id: MessageId, state: StateBlob) -> Self {
        Self {
            subject: GET_STATE_RESPONSE,
            message_id,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serde_json::value::to_raw_value;

    fn raw(data: Value) -> Box<RawValue> {
        to_raw_value(&data).unwrap()
    }

    fn parse(data: Value) -> Result<FrameMessage, ProtocolViolation> {
        FrameMessage::parse(&raw(data))
    }

    #[test]
    fn parses_state_request() {
        let msg = parse(json!({"subject": "SPLICE.getState", "message_id": "m-1"}))
            .unwrap();
        assert_eq!(
            msg,
            FrameMessage::GetState {
                message_id: MessageId::new(json!("m-1"))
            }
        );
    }

    #[test]
    fn state_request_without_id_is_a_violation() {
        let err = parse(json!({"subject": "SPLICE.getState"})).unwrap_err();
        assert_eq!(err, ProtocolViolation::MissingMessageId);

        let err = parse(json!({"subject": "SPLICE.getState", "message_id": null}))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::MissingMessageId);
    }

    #[test]
    fn parses_report_with_score_text() {
        let msg = parse(json!({
            "subject": "SPLICE.reportScoreAndState",
            "score": 0.6,
            "state": {"scoreText": "3/5", "answers": [1, 2, 3]}
        }))
        .unwrap();

        let FrameMessage::ReportScoreAndState(report) = msg else {
            panic!("expected report");
        };
        assert_eq!(report.score, ReportedScore::Number(0.6));
        assert_eq!(report.score_text.as_deref(), Some("3/5"));
        let state: Value = serde_json::from_str(report.state.unwrap().as_str()).unwrap();
        assert_eq!(state["answers"], json!([1, 2, 3]));
    }

    #[test]
    fn report_tolerates_odd_fields() {
        let msg = parse(json!({
            "subject": "SPLICE.reportScoreAndState",
            "score": "high",
            "state": {"scoreText": 7}
        }))
        .unwrap();
        let FrameMessage::ReportScoreAndState(report) = msg else {
            panic!("expected report");
        };
        assert_eq!(report.score, ReportedScore::Other("high".into()));
        assert_eq!(report.score_text, None);

        let msg = parse(json!({"subject": "SPLICE.reportScoreAndState"})).unwrap();
        let FrameMessage::ReportScoreAndState(report) = msg else {
            panic!("expected report");
        };
        assert_eq!(report.score, ReportedScore::Missing);
        assert_eq!(report.state, None);
    }

    #[test]
    fn unknown_and_malformed_messages_are_violations() {
        assert_eq!(
            parse(json!({"subject": "SPLICE.doSomething"})).unwrap_err(),
            ProtocolViolation::UnknownSubject("SPLICE.doSomething".into())
        );
        assert_eq!(
            parse(json!({"message_id": 1})).unwrap_err(),
            ProtocolViolation::MissingSubject
        );
        assert_eq!(
            parse(json!("SPLICE.getState")).unwrap_err(),
            ProtocolViolation::NotAnObject
        );
    }

    #[test]
    fn resize_and_echo_are_recognized() {
        assert_eq!(
            parse(json!({"subject": "lti.frameResize", "height": 600})).unwrap(),
            FrameMessage::FrameResize
        );
        assert_eq!(
            parse(json!({"subject": "SPLICE.getState.response"})).unwrap(),
            FrameMessage::StateResponseAck
        );
    }

    #[test]
    fn outbound_response_embeds_state_verbatim() {
        let state = StateBlob::from_raw(r#"{"z":1,"a":2}"#).unwrap();
        let reply = OutboundMessage::state_response(MessageId::new(json!(7)), state);
        let encoded = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            encoded,
            r#"{"subject":"SPLICE.getState.response","message_id":7,"state":{"z":1,"a":2}}"#
        );
    }

    #[test]
    fn inbound_frame_reports_kind() {
        let frame = InboundFrame::new(
            "https://quiz.org",
            raw(json!({"subject": "SPLICE.getState"})),
        );
        assert_eq!(frame.kind(), MessageKind::StateRequest);
        let frame = InboundFrame::from_json("https://quiz.org", "42").unwrap();
        assert_eq!(frame.kind(), MessageKind::Unknown);
    }

    #[test]
    fn report_state_keeps_its_exact_bytes() {
        let data = RawValue::from_string(
            r#"{"subject":"SPLICE.reportScoreAndState","score":0.5,"state":{"zeta":1, "alpha":2.50,"scoreText":"1/2"}}"#
                .to_owned(),
        )
        .unwrap();
        let FrameMessage::ReportScoreAndState(report) = FrameMessage::parse(&data).unwrap() else {
            panic!("expected report");
        };
        assert_eq!(report.score_text.as_deref(), Some("1/2"));
        assert_eq!(
            report.state.unwrap().as_str(),
            r#"{"zeta":1, "alpha":2.50,"scoreText":"1/2"}"#
        );
    }

    #[test]
    fn null_state_is_absent() {
        let msg = parse(json!({"subject": "SPLICE.reportScoreAndState", "score": 1, "state": null}))
            .unwrap();
        let FrameMessage::ReportScoreAndState(report) = msg else {
            panic!("expected report");
        };
        assert_eq!(report.state, None);
    }
}
