use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

pub const PROTOCOL_VERSION: &str = "1.0.0";
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseEnvelope {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            message_type: "response",
            id: id.into(),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, err: RpcError) -> Self {
        Self {
            message_type: "response",
            id: id.into(),
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code: err.code.as_str(),
                message: err.message,
                retryable: err.retryable,
            }),
        }
    }
}

/// Engine event emitted while a request is being handled.
/// Always written before that request's response.
#[derive(Debug, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub id: String,
    pub event: Value,
}

impl EventEnvelope {
    pub fn new(id: impl Into<String>, event: Value) -> Self {
        Self {
            message_type: "event",
            id: id.into(),
            event,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone)]
pub struct RpcError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.retryable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    InvalidParams,
    MethodNotFound,
    PayloadTooLarge,
    UnknownExercise,
    SessionNotRunning,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UnknownExercise => "UNKNOWN_EXERCISE",
            Self::SessionNotRunning => "SESSION_NOT_RUNNING",
        }
    }

    /// A failed request leaves the session untouched; resending it fails again.
    pub fn retryable(self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    RuntimeHello,
    ExercisesList,
    SessionStart,
    SessionFrame,
    SessionStatus,
    SessionStop,
    RuntimeShutdown,
}

impl RpcMethod {
    pub fn supported() -> &'static [&'static str] {
        &[
            "runtime.hello",
            "exercises.list",
            "session.start",
            "session.frame",
            "session.status",
            "session.stop",
            "runtime.shutdown",
        ]
    }
}

impl FromStr for RpcMethod {
    type Err = RpcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "runtime.hello" => Ok(Self::RuntimeHello),
            "exercises.list" => Ok(Self::ExercisesList),
            "session.start" => Ok(Self::SessionStart),
            "session.frame" => Ok(Self::SessionFrame),
            "session.status" => Ok(Self::SessionStatus),
            "session.stop" => Ok(Self::SessionStop),
            "runtime.shutdown" => Ok(Self::RuntimeShutdown),
            _ => Err(RpcError::new(
                ErrorCode::MethodNotFound,
                format!("Unknown method '{value}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, RpcMethod};
    use std::str::FromStr;

    #[test]
    fn parses_every_supported_method() {
        for method in RpcMethod::supported() {
            assert!(
                RpcMethod::from_str(method).is_ok(),
                "failed to parse {method}"
            );
        }
    }

    #[test]
    fn rejects_unknown_method() {
        let err = RpcMethod::from_str("session.pause").unwrap_err();
        assert_eq!(err.code, ErrorCode::MethodNotFound);
    }

    #[test]
    fn no_error_is_retryable() {
        for code in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidParams,
            ErrorCode::MethodNotFound,
            ErrorCode::PayloadTooLarge,
            ErrorCode::UnknownExercise,
            ErrorCode::SessionNotRunning,
        ] {
            assert!(!code.retryable(), "{} should not be retryable", code.as_str());
        }
    }
}
