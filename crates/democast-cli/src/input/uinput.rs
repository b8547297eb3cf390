//! Virtual relative-motion mouse backed by `/dev/uinput`.
//!
//! The compositor reads input through libinput, which sees uinput devices
//! like real hardware, so relative motion from here moves the cursor even
//! where absolute tool positioning does not.

use std::time::Duration;

use democast_core::input::MouseButton;

use super::InputError;

/// How long a button stays pressed during a click.
pub const CLICK_HOLD: Duration = Duration::from_millis(50);

/// Name the virtual device registers under.
pub const DEVICE_NAME: &str = "democast-virtual-mouse";

/// A device that emits relative pointer motion and button events.
pub trait RelativeDevice: Send + Sync {
    fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError>;

    fn press(&self, button: MouseButton) -> Result<(), InputError>;

    fn release(&self, button: MouseButton) -> Result<(), InputError>;

    fn click(&self, button: MouseButton) -> Result<(), InputError> {
        self.press(button)?;
        std::thread::sleep(CLICK_HOLD);
        self.release(button)
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::sync::{Mutex, PoisonError};

    use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
    use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
    use tracing::info;

    use super::*;

    /// uinput virtual mouse with left/middle/right buttons and REL_X/REL_Y.
    pub struct UinputMouse {
        device: Mutex<VirtualDevice>,
    }

    impl UinputMouse {
        pub fn create() -> Result<Self, InputError> {
            let mut keys = AttributeSet::<Key>::new();
            keys.insert(Key::BTN_LEFT);
            keys.insert(Key::BTN_RIGHT);
            keys.insert(Key::BTN_MIDDLE);

            let mut axes = AttributeSet::<RelativeAxisType>::new();
            axes.insert(RelativeAxisType::REL_X);
            axes.insert(RelativeAxisType::REL_Y);

            let device = VirtualDeviceBuilder::new()
                .and_then(|builder| builder.name(DEVICE_NAME).with_keys(&keys))
                .and_then(|builder| builder.with_relative_axes(&axes))
                .and_then(|builder| builder.build())
                .map_err(|e| InputError::DeviceUnavailable(e.to_string()))?;

            info!("Created uinput device '{}'", DEVICE_NAME);
            Ok(Self {
                device: Mutex::new(device),
            })
        }

        fn emit(&self, events: &[InputEvent]) -> Result<(), InputError> {
            let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
            device.emit(events)?;
            Ok(())
        }

        fn key_code(button: MouseButton) -> Key {
            match button {
                MouseButton::Primary => Key::BTN_LEFT,
                MouseButton::Middle => Key::BTN_MIDDLE,
                MouseButton::Secondary => Key::BTN_RIGHT,
            }
        }
    }

    impl RelativeDevice for UinputMouse {
        fn move_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
            let mut events = Vec::with_capacity(2);
            if dx != 0 {
                events.push(InputEvent::new(
                    EventType::RELATIVE,
                    RelativeAxisType::REL_X.0,
                    dx,
                ));
            }
            if dy != 0 {
                events.push(InputEvent::new(
                    EventType::RELATIVE,
                    RelativeAxisType::REL_Y.0,
                    dy,
                ));
            }
            // emit() appends SYN_REPORT, so an empty step still syncs
            self.emit(&events)
        }

        fn press(&self, button: MouseButton) -> Result<(), InputError> {
            self.emit(&[InputEvent::new(
                EventType::KEY,
                Self::key_code(button).code(),
                1,
            )])
        }

        fn release(&self, button: MouseButton) -> Result<(), InputError> {
            self.emit(&[InputEvent::new(
                EventType::KEY,
                Self::key_code(button).code(),
                0,
            )])
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux::UinputMouse;

/// Try to create the platform virtual mouse.
pub fn probe() -> Result<Box<dyn RelativeDevice>, InputError> {
    #[cfg(target_os = "linux")]
    {
        let mouse = UinputMouse::create()?;
        Ok(Box::new(mouse))
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(InputError::DeviceUnavailable(
            "uinput is only available on Linux".to_string(),
        ))
    }
}
