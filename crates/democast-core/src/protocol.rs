//! Wire protocol between the host orchestrator and the recording daemon.
//!
//! Each TCP connection carries exactly one request line and one response
//! line, both UTF-8 JSON objects terminated by `\n`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Default port the daemon listens on.
pub const DEFAULT_PORT: u16 = 9999;

/// Default destination for a recording when the request names none.
pub const DEFAULT_OUTPUT: &str = "/tmp/recording.webm";

/// Default pause (seconds) before and after the scenario body runs.
pub const DEFAULT_DELAY_SECS: f64 = 1.0;

/// Commands the daemon can execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Liveness check.
    Ping,
    /// Record the screen while a scenario plays.
    Record(RecordRequest),
    /// List the scenarios the daemon can load.
    ListScenarios,
}

/// Parameters of a `record` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRequest {
    pub scenario: String,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_delay")]
    pub pre_delay: f64,
    #[serde(default = "default_delay")]
    pub post_delay: f64,
    /// Extra screencast options (string, bool and int32 values are kept).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_delay() -> f64 {
    DEFAULT_DELAY_SECS
}

impl RecordRequest {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            output: default_output(),
            pre_delay: DEFAULT_DELAY_SECS,
            post_delay: DEFAULT_DELAY_SECS,
            options: None,
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        for (name, value) in [("pre_delay", self.pre_delay), ("post_delay", self.post_delay)] {
            // Also rejects NaN and values too large for a Duration
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ApiError::invalid_request(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Command {
    /// Parse one request line.
    ///
    /// The `action` field is inspected before the typed decode so that an
    /// unrecognised action is reported by name rather than as a serde error.
    pub fn parse(line: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(line.trim_end())
            .map_err(|e| ApiError::invalid_request(format!("Invalid JSON: {}", e)))?;

        let action = match value.get("action") {
            Some(Value::String(action)) => action.clone(),
            Some(other) => return Err(ApiError::unknown_action(&other.to_string())),
            None if value.is_object() => {
                return Err(ApiError::invalid_request("Missing 'action' field"));
            }
            None => return Err(ApiError::invalid_request("Request must be a JSON object")),
        };

        match action.as_str() {
            "ping" | "record" | "list_scenarios" => {
                let command: Command = serde_json::from_value(value).map_err(|e| {
                    ApiError::invalid_request(format!("Invalid {} command: {}", action, e))
                })?;
                if let Command::Record(request) = &command {
                    request.validate()?;
                }
                Ok(command)
            }
            other => Err(ApiError::unknown_action(other)),
        }
    }

    /// Action name as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Record(_) => "record",
            Command::ListScenarios => "list_scenarios",
        }
    }
}

/// Outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// A response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<String>>,
}

impl Response {
    fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
            output: None,
            scenarios: None,
        }
    }

    pub fn pong() -> Self {
        Self {
            message: Some("pong".to_string()),
            ..Self::ok()
        }
    }

    pub fn scenarios(names: Vec<String>) -> Self {
        Self {
            scenarios: Some(names),
            ..Self::ok()
        }
    }

    pub fn recorded(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::ok()
        }
    }

    pub fn error(error: &ApiError) -> Self {
        Self {
            status: Status::Error,
            message: Some(error.message.clone()),
            output: None,
            scenarios: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_ping() {
        assert_eq!(Command::parse("{\"action\":\"ping\"}\n").unwrap(), Command::Ping);
    }

    #[test]
    fn test_parse_record_applies_defaults() {
        let command = Command::parse(r#"{"action":"record","scenario":"basic_usage"}"#).unwrap();
        let Command::Record(request) = command else {
            panic!("expected record command");
        };
        assert_eq!(request.scenario, "basic_usage");
        assert_eq!(request.output, PathBuf::from("/tmp/recording.webm"));
        assert_eq!(request.pre_delay, 1.0);
        assert_eq!(request.post_delay, 1.0);
        assert!(request.options.is_none());
    }

    #[test]
    fn test_parse_record_accepts_integer_delays() {
        let command = Command::parse(
            r#"{"action":"record","scenario":"noop","pre_delay":0,"post_delay":2.5}"#,
        )
        .unwrap();
        let Command::Record(request) = command else {
            panic!("expected record command");
        };
        assert_eq!(request.pre_delay, 0.0);
        assert_eq!(request.post_delay, 2.5);
    }

    #[test]
    fn test_parse_record_rejects_negative_delay() {
        let err = Command::parse(r#"{"action":"record","scenario":"x","pre_delay":-1}"#)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("pre_delay"));
    }

    #[test]
    fn test_parse_record_rejects_unrepresentable_delay() {
        let err = Command::parse(r#"{"action":"record","scenario":"x","post_delay":1e20}"#)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("post_delay"));
    }

    #[test]
    fn test_parse_record_requires_scenario() {
        let err = Command::parse(r#"{"action":"record"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("scenario"));
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = Command::parse(r#"{"action":"dance"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAction);
        assert_eq!(err.message, "Unknown action: dance");
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = Command::parse("{not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.starts_with("Invalid JSON"));
    }

    #[test]
    fn test_parse_missing_action() {
        let err = Command::parse(r#"{"scenario":"x"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);

        let err = Command::parse("[1, 2]").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_pong_wire_format() {
        let json = serde_json::to_string(&Response::pong()).unwrap();
        assert_eq!(json, r#"{"status":"ok","message":"pong"}"#);
    }

    #[test]
    fn test_error_wire_format_only_carries_message() {
        let json = serde_json::to_string(&Response::error(&ApiError::scenario_not_found("x")))
            .unwrap();
        assert_eq!(json, r#"{"status":"error","message":"Scenario not found: x"}"#);
    }

    #[test]
    fn test_scenarios_and_recorded_wire_format() {
        let json =
            serde_json::to_string(&Response::scenarios(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(json, r#"{"status":"ok","scenarios":["a","b"]}"#);

        let json = serde_json::to_string(&Response::recorded("/tmp/out.webm")).unwrap();
        assert_eq!(json, r#"{"status":"ok","output":"/tmp/out.webm"}"#);
    }

    #[test]
    fn test_client_serialization_is_parseable() {
        let mut request = RecordRequest::new("basic_usage");
        request.pre_delay = 0.5;
        let line = serde_json::to_string(&Command::Record(request.clone())).unwrap();
        assert!(line.contains("\"action\":\"record\""));
        assert_eq!(Command::parse(&line).unwrap(), Command::Record(request));
    }
}
