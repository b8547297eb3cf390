//! Scenarios: named scripts that drive the desktop while it is recorded.
//!
//! A [`ScenarioSource`] resolves names to runnable [`Scenario`]s. The daemon
//! uses [`ScenarioDirectory`], which reads `<name>.json` scripts from disk on
//! every load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use democast_core::error::ApiError;
use democast_core::input::MouseButton;
use democast_core::motion::{Point, DEFAULT_DURATION_SECS, DEFAULT_STEPS};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::paths::is_valid_scenario_name;
use crate::input::engine::DEFAULT_TYPE_DELAY;
use crate::input::{ElementLocator, ElementQuery, InputEngine};

/// Pause between reaching an element and clicking it.
const ELEMENT_CLICK_PAUSE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario not found: {name}")]
    NotFound { name: String },

    #[error("Cannot load scenario {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Scenario {name} must have a 'run' entry")]
    Contract { name: String },

    #[error("Cannot list scenarios in {}: {source}", dir.display())]
    List {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ScenarioError> for ApiError {
    fn from(err: ScenarioError) -> Self {
        match &err {
            ScenarioError::NotFound { name } => ApiError::scenario_not_found(name),
            ScenarioError::Load { name, reason } => ApiError::scenario_load_failed(name, reason),
            ScenarioError::Contract { name } => ApiError::scenario_contract(name),
            ScenarioError::List { .. } => ApiError::internal(err.to_string()),
        }
    }
}

/// What a running scenario can drive.
pub struct ScenarioContext<'a> {
    pub input: &'a InputEngine,
    pub locator: &'a dyn ElementLocator,
}

/// A runnable scenario. The body's error is reported to the client.
pub trait Scenario: Send + Sync {
    fn run(&self, ctx: &ScenarioContext<'_>) -> anyhow::Result<()>;
}

/// Resolves scenario names.
pub trait ScenarioSource: Send + Sync {
    fn load(&self, name: &str) -> Result<Box<dyn Scenario>, ScenarioError>;

    /// Available names, sorted, without `_`-prefixed helpers.
    fn list(&self) -> Result<Vec<String>, ScenarioError>;
}

fn is_listed(name: &str) -> bool {
    !name.starts_with('_')
}

/// Scenario scripts stored as `<name>.json` in one directory.
///
/// Nothing is cached: edits on disk are picked up by the next load.
pub struct ScenarioDirectory {
    dir: PathBuf,
}

impl ScenarioDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScenarioSource for ScenarioDirectory {
    fn load(&self, name: &str) -> Result<Box<dyn Scenario>, ScenarioError> {
        let not_found = || ScenarioError::NotFound {
            name: name.to_string(),
        };
        if !is_valid_scenario_name(name) {
            warn!("Rejecting unsafe scenario name {:?}", name);
            return Err(not_found());
        }

        let path = self.dir.join(format!("{}.json", name));
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(ScenarioError::Load {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        debug!("Loaded scenario {} from {}", name, path.display());
        let script = ScriptScenario::parse(name, &text)?;
        Ok(Box::new(script))
    }

    fn list(&self) -> Result<Vec<String>, ScenarioError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Scenarios directory {} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ScenarioError::List {
                    dir: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .filter(|name| is_valid_scenario_name(name) && is_listed(name))
            .collect();
        names.sort();
        Ok(names)
    }
}

fn default_steps() -> u32 {
    DEFAULT_STEPS
}

fn default_duration() -> f64 {
    DEFAULT_DURATION_SECS
}

fn default_type_delay() -> f64 {
    DEFAULT_TYPE_DELAY.as_secs_f64()
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Move {
        x: i32,
        y: i32,
        #[serde(default = "default_steps")]
        steps: u32,
        #[serde(default = "default_duration")]
        duration: f64,
    },
    MoveToElement {
        app: String,
        name: String,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        offset_x: i32,
        #[serde(default)]
        offset_y: i32,
    },
    ClickElement {
        app: String,
        name: String,
        #[serde(default)]
        role: Option<String>,
    },
    Click {
        #[serde(default)]
        button: MouseButton,
    },
    RightClick,
    DoubleClick,
    ButtonDown {
        #[serde(default)]
        button: MouseButton,
    },
    ButtonUp {
        #[serde(default)]
        button: MouseButton,
    },
    Type {
        text: String,
        #[serde(default = "default_type_delay")]
        delay: f64,
    },
    Key {
        keys: Vec<String>,
    },
    Sleep {
        seconds: f64,
    },
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}

impl Step {
    /// Reject durations that cannot be slept.
    fn check(&self) -> Result<(), String> {
        let (field, value) = match self {
            Step::Move { duration, .. } => ("duration", *duration),
            Step::Type { delay, .. } => ("delay", *delay),
            Step::Sleep { seconds } => ("seconds", *seconds),
            _ => return Ok(()),
        };
        match seconds(value) {
            Some(_) => Ok(()),
            None => Err(format!("{} must be a non-negative number, got {}", field, value)),
        }
    }

    fn run(&self, ctx: &ScenarioContext<'_>) -> anyhow::Result<()> {
        // Pointer and keyboard failures are best-effort: they are logged and
        // the scenario carries on. Element lookups are not.
        let outcome = match self {
            Step::Move {
                x,
                y,
                steps,
                duration,
            } => ctx.input.move_to(
                Point::new(*x, *y),
                *steps,
                seconds(*duration).unwrap_or_default(),
            ),
            Step::MoveToElement {
                app,
                name,
                role,
                offset_x,
                offset_y,
            } => {
                let bounds = ctx.locate(app, name, role)?;
                ctx.input.move_to_element(&bounds, *offset_x, *offset_y)
            }
            Step::ClickElement { app, name, role } => {
                let bounds = ctx.locate(app, name, role)?;
                if let Err(e) = ctx.input.move_to_element(&bounds, 0, 0) {
                    warn!("Ignoring failed move to '{}': {}", name, e);
                }
                thread::sleep(ELEMENT_CLICK_PAUSE);
                ctx.input.click(MouseButton::Primary)
            }
            Step::Click { button } => ctx.input.click(*button),
            Step::RightClick => ctx.input.right_click(),
            Step::DoubleClick => ctx.input.double_click(),
            Step::ButtonDown { button } => ctx.input.button_down(*button),
            Step::ButtonUp { button } => ctx.input.button_up(*button),
            Step::Type { text, delay } => {
                ctx.input.type_text(text, seconds(*delay).unwrap_or_default())
            }
            Step::Key { keys } => ctx.input.key_press(keys.as_slice()),
            Step::Sleep { seconds: secs } => {
                thread::sleep(seconds(*secs).unwrap_or_default());
                Ok(())
            }
        };

        if let Err(e) = outcome {
            warn!("Ignoring failed {:?}: {}", self, e);
        }
        Ok(())
    }
}

impl ScenarioContext<'_> {
    fn locate(
        &self,
        app: &str,
        name: &str,
        role: &Option<String>,
    ) -> anyhow::Result<democast_core::motion::ElementBounds> {
        let query = ElementQuery {
            app: app.to_string(),
            name: name.to_string(),
            role: role.clone(),
        };
        self.locator
            .locate(&query)
            .with_context(|| format!("Element '{}' in {} not available", name, app))
    }
}

/// A parsed scenario script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptScenario {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

impl ScriptScenario {
    /// Parse a script document.
    ///
    /// Invalid JSON or steps are load errors; a document without a `run`
    /// array breaks the scenario contract.
    pub fn parse(name: &str, text: &str) -> Result<Self, ScenarioError> {
        let load_error = |reason: String| ScenarioError::Load {
            name: name.to_string(),
            reason,
        };
        let contract_error = || ScenarioError::Contract {
            name: name.to_string(),
        };

        let document: Value = serde_json::from_str(text).map_err(|e| load_error(e.to_string()))?;
        let Value::Object(mut fields) = document else {
            return Err(contract_error());
        };

        let run = match fields.remove("run") {
            Some(run @ Value::Array(_)) => run,
            _ => return Err(contract_error()),
        };
        let description = match fields.remove("description") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(load_error(format!(
                    "description must be a string, got {}",
                    other
                )))
            }
        };

        let steps: Vec<Step> =
            serde_json::from_value(run).map_err(|e| load_error(format!("invalid step: {}", e)))?;
        for (index, step) in steps.iter().enumerate() {
            step.check()
                .map_err(|reason| load_error(format!("step {}: {}", index + 1, reason)))?;
        }

        Ok(Self {
            name: name.to_string(),
            description,
            steps,
        })
    }
}

impl Scenario for ScriptScenario {
    fn run(&self, ctx: &ScenarioContext<'_>) -> anyhow::Result<()> {
        info!("Running scenario {} ({} steps)", self.name, self.steps.len());
        if let Some(description) = &self.description {
            debug!("{}: {}", self.name, description);
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.run(ctx)
                .with_context(|| format!("{} step {} failed", self.name, index + 1))?;
        }
        Ok(())
    }
}
