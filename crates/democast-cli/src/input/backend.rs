//! Pointer backend selection.

use std::sync::OnceLock;

use tracing::{info, warn};

use super::uinput::RelativeDevice;
use super::InputError;

/// Fallible constructor for the relative-motion device.
pub type DeviceProbe = Box<dyn Fn() -> Result<Box<dyn RelativeDevice>, InputError> + Send + Sync>;

/// The mechanism used for pointer motion and clicks.
pub enum PointerBackend {
    /// Relative events through a virtual device.
    KernelRelative(Box<dyn RelativeDevice>),
    /// Absolute positioning through the external tool.
    ToolAbsolute,
}

impl PointerBackend {
    pub fn name(&self) -> &'static str {
        match self {
            PointerBackend::KernelRelative(_) => "kernel-relative",
            PointerBackend::ToolAbsolute => "tool-absolute",
        }
    }

    pub fn device(&self) -> Option<&dyn RelativeDevice> {
        match self {
            PointerBackend::KernelRelative(device) => Some(device.as_ref()),
            PointerBackend::ToolAbsolute => None,
        }
    }
}

/// Probes for the virtual device once and caches the outcome.
///
/// A failed probe selects the tool backend for the rest of the process and
/// is never retried.
pub struct BackendSelector {
    probe: DeviceProbe,
    selected: OnceLock<PointerBackend>,
}

impl BackendSelector {
    pub fn new(probe: DeviceProbe) -> Self {
        Self {
            probe,
            selected: OnceLock::new(),
        }
    }

    /// The active backend, probing on first use.
    pub fn get(&self) -> &PointerBackend {
        self.selected.get_or_init(|| match (self.probe)() {
            Ok(device) => {
                info!("Pointer backend: kernel-relative");
                PointerBackend::KernelRelative(device)
            }
            Err(e) => {
                warn!("Pointer backend: tool-absolute ({})", e);
                PointerBackend::ToolAbsolute
            }
        })
    }
}
