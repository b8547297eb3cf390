//! Synthetic mouse and keyboard input.
//!
//! Pointer motion prefers a uinput virtual mouse emitting relative events;
//! when it cannot be created the engine falls back, for the rest of the
//! process, to an external tool addressed by absolute coordinates. Keyboard
//! input and explicit drag press/release always go through the tool.

pub mod backend;
pub mod engine;
pub mod locator;
pub mod tool;
pub mod uinput;

use thiserror::Error;

pub use engine::InputEngine;
pub use locator::{CommandLocator, ElementLocator, ElementQuery, UnavailableLocator};

/// Failures of individual input operations.
#[derive(Debug, Error)]
pub enum InputError {
    /// The relative-motion virtual device could not be created.
    #[error("virtual mouse unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("virtual mouse write failed: {0}")]
    Device(#[from] std::io::Error),

    #[error("failed to run {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}{}", stderr_suffix(.stderr))]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("element lookup failed: {0}")]
    ElementLookup(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failed_includes_stderr() {
        let err = InputError::ToolFailed {
            command: "xdotool click 1".into(),
            status: "exit status: 1".into(),
            stderr: "Can't open display\n".into(),
        };
        assert_eq!(
            err.to_string(),
            "xdotool click 1 exited with exit status: 1: Can't open display"
        );
    }

    #[test]
    fn test_tool_failed_without_stderr() {
        let err = InputError::ToolFailed {
            command: "ydotool key super".into(),
            status: "exit status: 2".into(),
            stderr: "  ".into(),
        };
        assert_eq!(err.to_string(), "ydotool key super exited with exit status: 2");
    }
}
