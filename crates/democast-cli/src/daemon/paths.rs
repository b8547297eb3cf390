//! Scenario directory resolution.
//!
//! Priority:
//! 1. `--scenarios-dir` flag
//! 2. `DEMOCAST_SCENARIOS_DIR` (explicit override)
//! 3. `<data dir>/democast/scenarios` when it exists
//! 4. `./scenarios`

use std::env;
use std::path::PathBuf;

pub const SCENARIOS_DIR_VAR: &str = "DEMOCAST_SCENARIOS_DIR";
pub const ELEMENT_LOCATOR_VAR: &str = "DEMOCAST_ELEMENT_LOCATOR";

/// Get the scenarios directory with priority fallback.
pub fn scenarios_dir(flag: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = flag {
        return dir;
    }

    // Ignore empty
    if let Ok(dir) = env::var(SCENARIOS_DIR_VAR) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(data) = dirs::data_dir() {
        let dir = data.join("democast").join("scenarios");
        if dir.is_dir() {
            return dir;
        }
    }

    PathBuf::from("scenarios")
}

/// Element locator command from the flag or `DEMOCAST_ELEMENT_LOCATOR`.
pub fn element_locator(flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| {
        env::var(ELEMENT_LOCATOR_VAR)
            .ok()
            .filter(|cmd| !cmd.is_empty())
            .map(PathBuf::from)
    })
}

/// Whether a scenario name is safe to turn into a file name.
///
/// Names must be non-empty, use only alphanumerics, hyphens and underscores,
/// and not start with a hyphen.
pub fn is_valid_scenario_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
