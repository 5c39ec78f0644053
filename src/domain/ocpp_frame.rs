use serde_json::{Value, json};
use thiserror::Error;

const CALL: u64 = 2;
const CALL_RESULT: u64 = 3;
const CALL_ERROR: u64 = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        message_id: String,
        payload: Value,
    },
    CallError {
        message_id: String,
        code: CallErrorCode,
        description: String,
        details: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    FormationViolation,
    PropertyConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame is not valid JSON")]
    InvalidJson,
    #[error("frame must be a JSON array")]
    InvalidFrameType,
    #[error("unknown message type: {0}")]
    UnknownMessageType(Value),
    #[error("missing or invalid field: {0}")]
    InvalidField(&'static str),
}

impl CallErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotImplemented => "NotImplemented",
            Self::NotSupported => "NotSupported",
            Self::InternalError => "InternalError",
            Self::ProtocolError => "ProtocolError",
            Self::FormationViolation => "FormationViolation",
            Self::PropertyConstraintViolation => "PropertyConstraintViolation",
            Self::TypeConstraintViolation => "TypeConstraintViolation",
            Self::GenericError => "GenericError",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "NotImplemented" => Self::NotImplemented,
            "NotSupported" => Self::NotSupported,
            "InternalError" => Self::InternalError,
            "ProtocolError" => Self::ProtocolError,
            "FormationViolation" => Self::FormationViolation,
            "PropertyConstraintViolation" => Self::PropertyConstraintViolation,
            "TypeConstraintViolation" => Self::TypeConstraintViolation,
            _ => Self::GenericError,
        }
    }
}

impl Frame {
    pub fn call(message_id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self::Call {
            message_id: message_id.into(),
            action: action.into(),
            payload,
        }
    }

    pub fn call_result(message_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            message_id: message_id.into(),
            payload,
        }
    }

    pub fn call_error(
        message_id: impl Into<String>,
        code: CallErrorCode,
        description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            message_id: message_id.into(),
            code,
            description: description.into(),
            details: json!({}),
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            Self::Call { message_id, .. }
            | Self::CallResult { message_id, .. }
            | Self::CallError { message_id, .. } => message_id,
        }
    }

    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(|_| FrameError::InvalidJson)?;
        let items = value.as_array().ok_or(FrameError::InvalidFrameType)?;

        let message_type = items
            .first()
            .ok_or(FrameError::InvalidField("messageTypeId"))?;
        let message_id = string_at(items, 1, "messageId")?;

        match message_type.as_u64() {
            Some(CALL) => Ok(Self::Call {
                message_id,
                action: string_at(items, 2, "action")?,
                payload: object_at(items, 3, "payload")?,
            }),
            Some(CALL_RESULT) => Ok(Self::CallResult {
                message_id,
                payload: items
                    .get(2)
                    .cloned()
                    .ok_or(FrameError::InvalidField("payload"))?,
            }),
            Some(CALL_ERROR) => Ok(Self::CallError {
                message_id,
                code: CallErrorCode::parse(&string_at(items, 2, "errorCode")?),
                description: items
                    .get(3)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                details: items.get(4).cloned().unwrap_or_else(|| json!({})),
            }),
            _ => Err(FrameError::UnknownMessageType(message_type.clone())),
        }
    }

    pub fn to_text(&self) -> String {
        let value = match self {
            Self::Call {
                message_id,
                action,
                payload,
            } => json!([CALL, message_id, action, payload]),
            Self::CallResult {
                message_id,
                payload,
            } => json!([CALL_RESULT, message_id, payload]),
            Self::CallError {
                message_id,
                code,
                description,
                details,
            } => json!([CALL_ERROR, message_id, code.as_str(), description, details]),
        };

        value.to_string()
    }
}

pub fn salvage_message_id(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    let items = value.as_array()?;

    // only a Call may be answered with a CallError
    if items.first()?.as_u64() != Some(CALL) {
        return None;
    }

    items.get(1)?.as_str().map(ToString::to_string)
}

fn string_at(items: &[Value], index: usize, field: &'static str) -> Result<String, FrameError> {
    items
        .get(index)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(FrameError::InvalidField(field))
}

fn object_at(items: &[Value], index: usize, field: &'static str) -> Result<Value, FrameError> {
    items
        .get(index)
        .filter(|value| value.is_object())
        .cloned()
        .ok_or(FrameError::InvalidField(field))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{CallErrorCode, Frame, FrameError, salvage_message_id};

    #[test]
    fn parses_boot_notification_call() {
        let frame = Frame::parse(
            r#"[2,"19223201","BootNotification",{"chargePointVendor":"VendorX","chargePointModel":"SingleSocketCharger"}]"#,
        )
        .expect("frame should parse");

        assert_eq!(
            frame,
            Frame::call(
                "19223201",
                "BootNotification",
                json!({"chargePointVendor":"VendorX","chargePointModel":"SingleSocketCharger"}),
            )
        );
    }

    #[test]
    fn parses_call_error_with_unknown_code_as_generic() {
        let frame = Frame::parse(r#"[4,"abc","SomethingOdd","boom",{}]"#)
            .expect("frame should parse");

        match frame {
            Frame::CallError {
                code, description, ..
            } => {
                assert_eq!(code, CallErrorCode::GenericError);
                assert_eq!(description, "boom");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn renders_call_result_as_ocpp_array() {
        let text = Frame::call_result("42", json!({"currentTime":"2026-01-01T00:00:00Z"})).to_text();
        let value: Value = serde_json::from_str(&text).expect("rendered frame should be json");

        assert_eq!(value, json!([3, "42", {"currentTime":"2026-01-01T00:00:00Z"}]));
    }

    #[test]
    fn renders_call_error_with_empty_details() {
        let text = Frame::call_error("7", CallErrorCode::NotImplemented, "no handler").to_text();
        let value: Value = serde_json::from_str(&text).expect("rendered frame should be json");

        assert_eq!(value, json!([4, "7", "NotImplemented", "no handler", {}]));
    }

    #[test]
    fn rejects_non_array_and_unknown_type() {
        assert_eq!(Frame::parse("not json"), Err(FrameError::InvalidJson));
        assert_eq!(
            Frame::parse(r#"{"id":1}"#),
            Err(FrameError::InvalidFrameType)
        );
        assert_eq!(
            Frame::parse(r#"[9,"1"]"#),
            Err(FrameError::UnknownMessageType(json!(9)))
        );
    }

    #[test]
    fn rejects_call_with_non_object_payload() {
        assert_eq!(
            Frame::parse(r#"[2,"1","Heartbeat","oops"]"#),
            Err(FrameError::InvalidField("payload"))
        );
    }

    #[test]
    fn salvages_message_id_from_broken_call() {
        assert_eq!(
            salvage_message_id(r#"[2,"m-1","Heartbeat"]"#),
            Some("m-1".to_string())
        );
        assert_eq!(salvage_message_id(r#"[2]"#), None);
        assert_eq!(salvage_message_id("garbage"), None);
    }

    #[test]
    fn does_not_salvage_id_from_non_call_frames() {
        assert_eq!(salvage_message_id(r#"[3,"r-1"]"#), None);
        assert_eq!(salvage_message_id(r#"[4,"e-1"]"#), None);
        assert_eq!(salvage_message_id(r#"[9,"x-1",{}]"#), None);
    }
}
