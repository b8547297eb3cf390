//! Structured error types with operator-facing hints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for daemon failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    UnknownAction,
    ScenarioNotFound,
    ScenarioLoadFailed,
    ScenarioContract,
    ScenarioFailed,
    RecordingState,
    RecordingFailed,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::UnknownAction => "UNKNOWN_ACTION",
            ErrorCode::ScenarioNotFound => "SCENARIO_NOT_FOUND",
            ErrorCode::ScenarioLoadFailed => "SCENARIO_LOAD_FAILED",
            ErrorCode::ScenarioContract => "SCENARIO_CONTRACT",
            ErrorCode::ScenarioFailed => "SCENARIO_FAILED",
            ErrorCode::RecordingState => "RECORDING_STATE",
            ErrorCode::RecordingFailed => "RECORDING_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(code)
    }
}

/// An error with a machine-readable code and a human-readable hint.
///
/// Only `message` is sent to clients; the code and suggestion end up in the
/// daemon log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Malformed request bytes (bad JSON, bad UTF-8, oversized).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest,
            message: message.into(),
            suggestion: Some(
                "Send one JSON object terminated by a newline, e.g. {\"action\":\"ping\"}".into(),
            ),
        }
    }

    pub fn unknown_action(action: &str) -> Self {
        Self {
            code: ErrorCode::UnknownAction,
            message: format!("Unknown action: {}", action),
            suggestion: Some("Supported actions are ping, record and list_scenarios".into()),
        }
    }

    pub fn scenario_not_found(name: &str) -> Self {
        Self {
            code: ErrorCode::ScenarioNotFound,
            message: format!("Scenario not found: {}", name),
            suggestion: Some(
                "Run 'democast list' to see the scenarios the daemon can load".into(),
            ),
        }
    }

    pub fn scenario_load_failed(name: &str, reason: &str) -> Self {
        Self {
            code: ErrorCode::ScenarioLoadFailed,
            message: format!("Cannot load scenario {}: {}", name, reason),
            suggestion: Some("Check that the scenario file is valid JSON with known steps".into()),
        }
    }

    pub fn scenario_contract(name: &str) -> Self {
        Self {
            code: ErrorCode::ScenarioContract,
            message: format!("Scenario {} must have a 'run' entry", name),
            suggestion: Some("Add a top-level \"run\": [...] list of steps".into()),
        }
    }

    /// The scenario body raised while the recording was running.
    pub fn scenario_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ScenarioFailed,
            message: message.into(),
            suggestion: Some(
                "The recording was stopped; fix the scenario step and record again".into(),
            ),
        }
    }

    pub fn already_recording() -> Self {
        Self {
            code: ErrorCode::RecordingState,
            message: "Recording already in progress".to_string(),
            suggestion: Some("Wait for the current record command to finish".into()),
        }
    }

    pub fn not_recording() -> Self {
        Self {
            code: ErrorCode::RecordingState,
            message: "No recording in progress".to_string(),
            suggestion: Some("Start a recording before stopping it".into()),
        }
    }

    pub fn recording_failed(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::RecordingFailed,
            message: message.into(),
            suggestion: Some(
                "Make sure the daemon runs inside the desktop session with access to the session bus"
                    .into(),
            ),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}
