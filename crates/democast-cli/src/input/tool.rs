//! Running the external pointer/keyboard tool.

use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use democast_core::input::{parse_location, MouseButton, PointerTool, ToolCommand};
use democast_core::motion::Point;
use tracing::debug;

use super::InputError;

/// Gap between the two clicks of a double click.
pub const DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(50);

/// Executes tool invocations and returns their stdout.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<String, InputError>;
}

/// Runs tools as child processes and waits for them.
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<String, InputError> {
        debug!("Running {}", command);
        let output = Command::new(command.program)
            .args(&command.args)
            .output()
            .map_err(|source| InputError::ToolSpawn {
                program: command.program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(InputError::ToolFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// The tool selected for this session together with its runner.
#[derive(Clone)]
pub struct ToolBackend {
    tool: PointerTool,
    runner: Arc<dyn ToolRunner>,
}

impl ToolBackend {
    pub fn new(tool: PointerTool, runner: Arc<dyn ToolRunner>) -> Self {
        Self { tool, runner }
    }

    pub fn tool(&self) -> PointerTool {
        self.tool
    }

    fn run(&self, command: ToolCommand) -> Result<(), InputError> {
        self.runner.run(&command).map(|_| ())
    }

    pub fn move_to(&self, position: Point) -> Result<(), InputError> {
        self.run(self.tool.move_to(position))
    }

    pub fn click(&self, button: MouseButton) -> Result<(), InputError> {
        self.run(self.tool.click(button))
    }

    /// Double click, as one invocation where the tool supports it.
    pub fn double_click(&self, button: MouseButton) -> Result<(), InputError> {
        let interval_ms = DOUBLE_CLICK_INTERVAL.as_millis() as u64;
        match self.tool.double_click(button, interval_ms) {
            Some(command) => self.run(command),
            None => {
                self.click(button)?;
                thread::sleep(DOUBLE_CLICK_INTERVAL);
                self.click(button)
            }
        }
    }

    pub fn button_down(&self, button: MouseButton) -> Result<(), InputError> {
        self.run(self.tool.button_down(button))
    }

    pub fn button_up(&self, button: MouseButton) -> Result<(), InputError> {
        self.run(self.tool.button_up(button))
    }

    pub fn type_text(&self, text: &str, delay: Duration) -> Result<(), InputError> {
        self.run(self.tool.type_text(text, delay.as_millis() as u64))
    }

    pub fn key(&self, combo: &str) -> Result<(), InputError> {
        self.run(self.tool.key(combo))
    }

    /// Live pointer location, if the tool can report it.
    pub fn location(&self) -> Option<Point> {
        let query = self.tool.location_query()?;
        match self.runner.run(&query) {
            Ok(stdout) => parse_location(&stdout),
            Err(e) => {
                debug!("Pointer location query failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every invocation and answers with canned output.
    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
        pub location: Option<String>,
    }

    impl RecordingRunner {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, command: &ToolCommand) -> Result<String, InputError> {
            self.calls.lock().unwrap().push(command.to_string());
            if self.fail {
                return Err(InputError::ToolFailed {
                    command: command.to_string(),
                    status: "exit status: 1".into(),
                    stderr: String::new(),
                });
            }
            if command.args.first().map(String::as_str) == Some("getmouselocation") {
                return Ok(self.location.clone().unwrap_or_default());
            }
            Ok(String::new())
        }
    }
}
