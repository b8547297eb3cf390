//! Resolving named UI elements to screen bounds.
//!
//! The accessibility tree is walked by an external introspection helper.
//! The helper is invoked as `<program> <app> <name> [role]` and must print a
//! JSON object `{"x":..,"y":..,"width":..,"height":..}` on stdout.

use std::path::PathBuf;
use std::process::Command;

use democast_core::motion::ElementBounds;
use serde::Deserialize;
use tracing::debug;

use super::InputError;

/// Which element to look up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElementQuery {
    pub app: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Resolves elements to their bounding boxes.
pub trait ElementLocator: Send + Sync {
    fn locate(&self, query: &ElementQuery) -> Result<ElementBounds, InputError>;
}

/// Locator used when no introspection helper is configured.
pub struct UnavailableLocator;

impl ElementLocator for UnavailableLocator {
    fn locate(&self, query: &ElementQuery) -> Result<ElementBounds, InputError> {
        Err(InputError::ElementLookup(format!(
            "cannot find '{}' in {}: no element locator configured (use --element-locator)",
            query.name, query.app
        )))
    }
}

/// Locator that shells out to an introspection helper.
pub struct CommandLocator {
    program: PathBuf,
}

impl CommandLocator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ElementLocator for CommandLocator {
    fn locate(&self, query: &ElementQuery) -> Result<ElementBounds, InputError> {
        let mut command = Command::new(&self.program);
        command.arg(&query.app).arg(&query.name);
        if let Some(role) = &query.role {
            command.arg(role);
        }

        debug!("Locating '{}' in {} via {:?}", query.name, query.app, self.program);
        let output = command.output().map_err(|source| InputError::ToolSpawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(InputError::ElementLookup(format!(
                "'{}' not found in {}: {}",
                query.name,
                query.app,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            InputError::ElementLookup(format!("locator printed invalid bounds: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> ElementQuery {
        ElementQuery {
            app: "nautilus".into(),
            name: "Home".into(),
            role: None,
        }
    }

    #[test]
    fn test_unavailable_locator_fails() {
        let err = UnavailableLocator.locate(&query()).unwrap_err();
        assert!(matches!(err, InputError::ElementLookup(_)));
        assert!(err.to_string().contains("Home"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_locator_parses_bounds() {
        let dir = std::env::temp_dir().join(format!("democast-locator-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let script = dir.join("locate.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"x\": 10, \"y\": 20, \"width\": 100, \"height\": 40}'\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let bounds = CommandLocator::new(&script).locate(&query()).unwrap();
        assert_eq!(bounds.x, 10.0);
        assert_eq!(bounds.height, 40.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_command_locator_missing_program() {
        let err = CommandLocator::new("/nonexistent/democast-locator")
            .locate(&query())
            .unwrap_err();
        assert!(matches!(err, InputError::ToolSpawn { .. }));
    }
}
