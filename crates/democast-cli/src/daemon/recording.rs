//! Recording session state machine.
//!
//! The daemon owns exactly one [`RecordingSession`]. It is either `Idle` or
//! `Recording`; the state check and the transition happen under one lock, so
//! of two concurrent `start` calls exactly one can win.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use democast_core::error::ApiError;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Typed screencast option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Bool(bool),
    Int32(i32),
}

/// Options passed to the screencast service.
pub type ScreencastOptions = BTreeMap<String, OptionValue>;

/// Keep string, bool and int32 entries; drop everything else.
pub fn options_from_json(map: &Map<String, Value>) -> ScreencastOptions {
    let mut options = ScreencastOptions::new();
    for (key, value) in map {
        let converted = match value {
            Value::String(s) => Some(OptionValue::Str(s.clone())),
            Value::Bool(b) => Some(OptionValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(OptionValue::Int32),
            _ => None,
        };
        match converted {
            Some(v) => {
                options.insert(key.clone(), v);
            }
            None => debug!("Dropping screencast option '{}' with unsupported value {}", key, value),
        }
    }
    options
}

/// Errors talking to the platform recording service.
#[derive(Debug, Error)]
pub enum ScreencastError {
    #[error("session bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("screencast service unavailable: {0}")]
    Unavailable(String),
}

/// Reply to a start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReply {
    pub success: bool,
    /// File the service chose to write.
    pub path: String,
}

/// The platform screen-recording service.
pub trait ScreencastService: Send + Sync {
    fn start(&self, output: &Path, options: &ScreencastOptions)
        -> Result<StartReply, ScreencastError>;

    /// Returns the service's success flag.
    fn stop(&self) -> Result<bool, ScreencastError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordingState {
    Idle,
    Recording { output: PathBuf },
}

/// Process-wide recording session.
pub struct RecordingSession {
    service: Box<dyn ScreencastService>,
    state: Mutex<RecordingState>,
}

impl RecordingSession {
    pub fn new(service: Box<dyn ScreencastService>) -> Self {
        Self {
            service,
            state: Mutex::new(RecordingState::Idle),
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(*self.lock(), RecordingState::Recording { .. })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Idle -> Recording`. Fails without side effects when already recording.
    ///
    /// The lock is held across the service call so a concurrent caller sees
    /// either `Idle` before we start or `Recording` after.
    pub fn start(&self, output: &Path, options: &ScreencastOptions) -> Result<(), ApiError> {
        let mut state = self.lock();
        if let RecordingState::Recording { output: current } = &*state {
            debug!("Rejecting start, already recording to {:?}", current);
            return Err(ApiError::already_recording());
        }

        match self.service.start(output, options) {
            Ok(reply) if reply.success => {
                info!("Recording started: {}", reply.path);
                *state = RecordingState::Recording {
                    output: output.to_path_buf(),
                };
                Ok(())
            }
            Ok(_) => {
                warn!("Screencast service refused to start recording to {:?}", output);
                Err(ApiError::recording_failed("Failed to start recording"))
            }
            Err(e) => {
                warn!("Screencast start error: {}", e);
                Err(ApiError::recording_failed(format!(
                    "Failed to start recording: {}",
                    e
                )))
            }
        }
    }

    /// `Recording -> Idle`. On failure the session stays `Recording`.
    pub fn stop(&self) -> Result<(), ApiError> {
        let mut state = self.lock();
        let RecordingState::Recording { output } = &*state else {
            return Err(ApiError::not_recording());
        };

        match self.service.stop() {
            Ok(true) => {
                info!("Recording stopped: {:?}", output);
                *state = RecordingState::Idle;
                Ok(())
            }
            Ok(false) => {
                warn!("Screencast service refused to stop recording");
                Err(ApiError::recording_failed("Failed to stop recording"))
            }
            Err(e) => {
                warn!("Screencast stop error: {}", e);
                Err(ApiError::recording_failed(format!(
                    "Failed to stop recording: {}",
                    e
                )))
            }
        }
    }

    /// Start a recording that is stopped when the guard finishes or drops.
    pub fn begin(&self, output: &Path, options: &ScreencastOptions) -> Result<ActiveRecording<'_>, ApiError> {
        self.start(output, options)?;
        Ok(ActiveRecording {
            session: self,
            finished: false,
        })
    }
}

/// A started recording whose stop is guaranteed to be attempted once.
///
/// Call [`ActiveRecording::finish`] to stop and observe the result; if the
/// guard is dropped instead (early return, panic in the scenario), the stop
/// is attempted from `Drop`.
pub struct ActiveRecording<'a> {
    session: &'a RecordingSession,
    finished: bool,
}

impl ActiveRecording<'_> {
    pub fn finish(mut self) -> Result<(), ApiError> {
        self.finished = true;
        self.session.stop()
    }
}

impl Drop for ActiveRecording<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.session.stop() {
                warn!("Failed to stop recording during cleanup: {}", e);
            }
        }
    }
}
