//! Input engine driving the desktop on behalf of scenarios.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use democast_core::input::{key_combo, MouseButton, SessionKind};
use democast_core::motion::{ElementBounds, MotionPath, Point, DEFAULT_DURATION_SECS, DEFAULT_STEPS};
use tracing::{debug, warn};

use super::backend::{BackendSelector, DeviceProbe, PointerBackend};
use super::tool::{SystemRunner, ToolBackend, DOUBLE_CLICK_INTERVAL};
use super::uinput;
use super::InputError;

/// Default per-character delay when typing.
pub const DEFAULT_TYPE_DELAY: Duration = Duration::from_millis(50);

/// Shared, process-wide input engine.
///
/// Every operation is best-effort: failures are logged and returned, and
/// callers decide whether to ignore them.
pub struct InputEngine {
    tool: ToolBackend,
    pointer: BackendSelector,
    last_position: Mutex<Point>,
}

impl InputEngine {
    /// Engine for the given session using the real tool and uinput device.
    pub fn new(session: SessionKind) -> Self {
        Self::with_parts(
            ToolBackend::new(session.tool(), Arc::new(SystemRunner)),
            Box::new(uinput::probe),
        )
    }

    pub fn with_parts(tool: ToolBackend, probe: DeviceProbe) -> Self {
        Self {
            tool,
            pointer: BackendSelector::new(probe),
            last_position: Mutex::new(Point::default()),
        }
    }

    /// Name of the pointer backend, selecting it if needed.
    pub fn backend_name(&self) -> &'static str {
        self.pointer.get().name()
    }

    pub fn last_position(&self) -> Point {
        *self.last_position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_last_position(&self, position: Point) {
        *self.last_position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    /// Live pointer location where the tool can report it, else the last
    /// position this engine moved to.
    fn current_position(&self) -> Point {
        self.tool
            .location()
            .unwrap_or_else(|| self.last_position())
    }

    /// Move with the default step count and duration.
    pub fn move_default(&self, to: Point) -> Result<(), InputError> {
        self.move_to(to, DEFAULT_STEPS, Duration::from_secs_f64(DEFAULT_DURATION_SECS))
    }

    /// Glide the pointer to `to` along an ease-in-out path.
    ///
    /// The last known position becomes `to` afterwards even if some steps
    /// failed or rounding left the real cursor elsewhere. Returns the first
    /// failure, after the whole path has been attempted.
    pub fn move_to(&self, to: Point, steps: u32, duration: Duration) -> Result<(), InputError> {
        let from = self.current_position();
        let path = MotionPath::new(from, to, steps);
        let interval = path.interval(duration);
        let backend = self.pointer.get();
        let mut first_error = None;

        debug!(
            "Moving ({}, {}) -> ({}, {}) in {} steps via {}",
            from.x,
            from.y,
            to.x,
            to.y,
            steps,
            backend.name()
        );

        if path.steps() == 0 {
            let result = match backend.device() {
                Some(device) => device
                    .move_by(to.x - from.x, to.y - from.y)
                    .or_else(|e| self.fall_back_move(e, to)),
                None => self.tool.move_to(to),
            };
            keep_first(&mut first_error, result);
        } else {
            for step in path {
                let result = match backend {
                    PointerBackend::KernelRelative(device) => device
                        .move_by(step.dx, step.dy)
                        .or_else(|e| self.fall_back_move(e, step.position)),
                    PointerBackend::ToolAbsolute => self.tool.move_to(step.position),
                };
                keep_first(&mut first_error, result);
                thread::sleep(interval);
            }
        }

        self.set_last_position(to);
        first_error.map_or(Ok(()), Err)
    }

    fn fall_back_move(&self, error: InputError, position: Point) -> Result<(), InputError> {
        warn!("Relative move failed, using {}: {}", self.tool.tool().program(), error);
        self.tool.move_to(position)
    }

    /// Move to the center of an element, shifted by an offset.
    pub fn move_to_element(
        &self,
        bounds: &ElementBounds,
        offset_x: i32,
        offset_y: i32,
    ) -> Result<(), InputError> {
        self.move_default(bounds.center_with_offset(offset_x, offset_y))
    }

    /// Click through the virtual device, falling back to the tool.
    pub fn click(&self, button: MouseButton) -> Result<(), InputError> {
        if let Some(device) = self.pointer.get().device() {
            match device.click(button) {
                Ok(()) => return Ok(()),
                Err(e) => warn!(
                    "Virtual mouse click failed, using {}: {}",
                    self.tool.tool().program(),
                    e
                ),
            }
        }
        self.tool.click(button)
    }

    pub fn right_click(&self) -> Result<(), InputError> {
        self.click(MouseButton::Secondary)
    }

    pub fn double_click(&self) -> Result<(), InputError> {
        if self.pointer.get().device().is_some() {
            self.click(MouseButton::Primary)?;
            thread::sleep(DOUBLE_CLICK_INTERVAL);
            return self.click(MouseButton::Primary);
        }
        self.tool.double_click(MouseButton::Primary)
    }

    /// Press a button for a drag. Always uses the tool.
    pub fn button_down(&self, button: MouseButton) -> Result<(), InputError> {
        self.tool.button_down(button)
    }

    /// Release a button after a drag. Always uses the tool.
    pub fn button_up(&self, button: MouseButton) -> Result<(), InputError> {
        self.tool.button_up(button)
    }

    pub fn type_text(&self, text: &str, delay: Duration) -> Result<(), InputError> {
        self.tool.type_text(text, delay)
    }

    /// Press a key or a combo such as `["ctrl", "c"]`.
    pub fn key_press<S: AsRef<str>>(&self, keys: &[S]) -> Result<(), InputError> {
        self.tool.key(&key_combo(keys))
    }
}

fn keep_first(slot: &mut Option<InputError>, result: Result<(), InputError>) {
    if let Err(e) = result {
        warn!("Pointer step failed: {}", e);
        slot.get_or_insert(e);
    }
}

#[cfg(test)]
mod tests {
    use democast_core::input::PointerTool;

    use super::*;
    use crate::input::tool::testing::RecordingRunner;
    use crate::input::uinput::testing::{DeviceEvent, FakeDevice};
    use crate::input::uinput::RelativeDevice;

    fn kernel_engine(
        tool: PointerTool,
        device: Arc<FakeDevice>,
        runner: Arc<RecordingRunner>,
    ) -> InputEngine {
        InputEngine::with_parts(
            ToolBackend::new(tool, runner),
            Box::new(move || Ok(Box::new(device.clone()) as Box<dyn RelativeDevice>)),
        )
    }

    fn tool_engine(tool: PointerTool, runner: Arc<RecordingRunner>) -> InputEngine {
        InputEngine::with_parts(
            ToolBackend::new(tool, runner),
            Box::new(|| Err(InputError::DeviceUnavailable("no /dev/uinput".into()))),
        )
    }

    fn moves(device: &FakeDevice) -> (i32, i32, usize) {
        device
            .events()
            .iter()
            .fold((0, 0, 0), |(x, y, n), event| match event {
                DeviceEvent::Move(dx, dy) => (x + dx, y + dy, n + 1),
                _ => (x, y, n),
            })
    }

    #[test]
    fn test_relative_move_reaches_target_exactly() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Ydotool, device.clone(), runner);

        engine.move_to(Point::new(960, 540), 20, Duration::ZERO).unwrap();
        assert_eq!(moves(&device), (960, 540, 21));

        engine.move_to(Point::new(0, 400), 7, Duration::ZERO).unwrap();
        let (x, y, _) = moves(&device);
        assert_eq!((x, y), (0, 400));
        assert_eq!(engine.last_position(), Point::new(0, 400));
    }

    #[test]
    fn test_zero_steps_jumps_directly() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Ydotool, device.clone(), runner);

        engine.move_to(Point::new(300, 200), 0, Duration::ZERO).unwrap();
        assert_eq!(device.events(), vec![DeviceEvent::Move(300, 200)]);
        assert_eq!(engine.last_position(), Point::new(300, 200));
    }

    #[test]
    fn test_tool_move_uses_absolute_positions() {
        let runner = Arc::new(RecordingRunner::default());
        let engine = tool_engine(PointerTool::Ydotool, runner.clone());

        engine.move_to(Point::new(100, 50), 4, Duration::ZERO).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0], "ydotool mousemove --absolute -x 0 -y 0");
        assert_eq!(calls[4], "ydotool mousemove --absolute -x 100 -y 50");
        assert_eq!(engine.backend_name(), "tool-absolute");
    }

    #[test]
    fn test_x11_move_starts_from_live_location() {
        let runner = Arc::new(RecordingRunner {
            location: Some("X=500\nY=500\n".into()),
            ..RecordingRunner::default()
        });
        let engine = tool_engine(PointerTool::Xdotool, runner.clone());

        engine.move_to(Point::new(600, 500), 2, Duration::ZERO).unwrap();
        let calls = runner.calls();
        assert_eq!(calls[0], "xdotool getmouselocation --shell");
        assert_eq!(calls[1], "xdotool mousemove 500 500");
        assert_eq!(calls.last().unwrap(), "xdotool mousemove 600 500");
    }

    #[test]
    fn test_failed_tool_move_still_updates_position() {
        let runner = Arc::new(RecordingRunner::failing());
        let engine = tool_engine(PointerTool::Ydotool, runner.clone());

        let result = engine.move_to(Point::new(10, 10), 3, Duration::ZERO);
        assert!(result.is_err());
        // every step was still attempted
        assert_eq!(runner.calls().len(), 4);
        assert_eq!(engine.last_position(), Point::new(10, 10));
    }

    #[test]
    fn test_failed_relative_move_falls_back_to_tool() {
        let device = Arc::new(FakeDevice {
            fail: true,
            ..FakeDevice::default()
        });
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Ydotool, device, runner.clone());

        engine.move_to(Point::new(40, 0), 2, Duration::ZERO).unwrap();
        assert_eq!(runner.calls().len(), 3);
        assert_eq!(runner.calls()[2], "ydotool mousemove --absolute -x 40 -y 0");
    }

    #[test]
    fn test_click_prefers_virtual_device() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Xdotool, device.clone(), runner.clone());

        engine.right_click().unwrap();
        assert_eq!(
            device.events(),
            vec![
                DeviceEvent::Press(MouseButton::Secondary),
                DeviceEvent::Release(MouseButton::Secondary)
            ]
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_click_falls_back_when_device_fails() {
        let device = Arc::new(FakeDevice {
            fail: true,
            ..FakeDevice::default()
        });
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Ydotool, device, runner.clone());

        engine.click(MouseButton::Primary).unwrap();
        assert_eq!(runner.calls(), vec!["ydotool click 0xC0"]);
    }

    #[test]
    fn test_drag_buttons_always_use_tool() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Xdotool, device.clone(), runner.clone());

        engine.button_down(MouseButton::Primary).unwrap();
        engine.button_up(MouseButton::Primary).unwrap();
        assert_eq!(runner.calls(), vec!["xdotool mousedown 1", "xdotool mouseup 1"]);
        assert!(device.events().is_empty());
    }

    #[test]
    fn test_keyboard_goes_through_tool() {
        let runner = Arc::new(RecordingRunner::default());
        let engine = tool_engine(PointerTool::Xdotool, runner.clone());

        engine.key_press(&["ctrl", "alt", "t"]).unwrap();
        engine
            .type_text("terminal", Duration::from_millis(80))
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec!["xdotool key ctrl+alt+t", "xdotool type --delay 80 terminal"]
        );
    }

    #[test]
    fn test_double_click_with_device_clicks_twice() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Xdotool, device.clone(), runner);

        engine.double_click().unwrap();
        let presses = device
            .events()
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Press(MouseButton::Primary)))
            .count();
        assert_eq!(presses, 2);
    }

    #[test]
    fn test_move_to_element_targets_center() {
        let device = Arc::new(FakeDevice::default());
        let runner = Arc::new(RecordingRunner::default());
        let engine = kernel_engine(PointerTool::Ydotool, device, runner);

        let bounds = ElementBounds {
            x: 200.0,
            y: 100.0,
            width: 80.0,
            height: 30.0,
        };
        engine.move_to_element(&bounds, 5, 0).unwrap();
        assert_eq!(engine.last_position(), Point::new(245, 115));
    }
}
