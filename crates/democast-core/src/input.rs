//! Pointer and keyboard tool invocations.
//!
//! Two external command-line tools drive input when no virtual device is
//! available: `xdotool` on legacy X11 sessions and `ydotool` on compositor
//! (Wayland) sessions. This module only builds their argument lists; running
//! them is the daemon's job.
//!
//! `ydotool` arguments follow the v1 command line (the `ydotoold` based
//! releases): `mousemove --absolute -x X -y Y`, hex button codes for `click`
//! and `--key-delay` for `type`. Older releases use other syntax.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::motion::Point;

/// Windowing system variant of the desktop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    X11,
    Wayland,
}

impl SessionKind {
    /// Classify an `XDG_SESSION_TYPE` value. Anything but `wayland` is X11.
    pub fn from_session_type(value: Option<&str>) -> Self {
        match value {
            Some(kind) if kind.eq_ignore_ascii_case("wayland") => SessionKind::Wayland,
            _ => SessionKind::X11,
        }
    }

    pub fn tool(self) -> PointerTool {
        match self {
            SessionKind::X11 => PointerTool::Xdotool,
            SessionKind::Wayland => PointerTool::Ydotool,
        }
    }
}

/// Mouse button, numbered the X11 way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MouseButton {
    #[default]
    Primary,
    Middle,
    Secondary,
}

impl MouseButton {
    pub fn number(self) -> u8 {
        match self {
            MouseButton::Primary => 1,
            MouseButton::Middle => 2,
            MouseButton::Secondary => 3,
        }
    }

    /// ydotool button code: left 0x00, right 0x01, middle 0x02.
    fn ydotool_code(self) -> u8 {
        match self {
            MouseButton::Primary => 0x00,
            MouseButton::Secondary => 0x01,
            MouseButton::Middle => 0x02,
        }
    }
}

impl TryFrom<u8> for MouseButton {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MouseButton::Primary),
            2 => Ok(MouseButton::Middle),
            3 => Ok(MouseButton::Secondary),
            other => Err(format!("invalid mouse button {} (expected 1, 2 or 3)", other)),
        }
    }
}

impl From<MouseButton> for u8 {
    fn from(button: MouseButton) -> Self {
        button.number()
    }
}

/// What a ydotool button token does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonAction {
    Press,
    Release,
    Click,
}

impl ButtonAction {
    fn flags(self) -> u8 {
        match self {
            ButtonAction::Press => 0x40,
            ButtonAction::Release => 0x80,
            ButtonAction::Click => 0xC0,
        }
    }
}

/// A fully-formed external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl ToolCommand {
    fn new<I, S>(program: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Join key names into a combo such as `ctrl+c`.
pub fn key_combo<S: AsRef<str>>(keys: &[S]) -> String {
    keys.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("+")
}

/// External pointer/keyboard control utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTool {
    Xdotool,
    Ydotool,
}

impl PointerTool {
    pub fn program(self) -> &'static str {
        match self {
            PointerTool::Xdotool => "xdotool",
            PointerTool::Ydotool => "ydotool",
        }
    }

    /// Token identifying `button` in a click/press/release call.
    pub fn button_token(self, button: MouseButton) -> String {
        self.button_token_for(button, ButtonAction::Click)
    }

    fn button_token_for(self, button: MouseButton, action: ButtonAction) -> String {
        match self {
            PointerTool::Xdotool => button.number().to_string(),
            PointerTool::Ydotool => format!("0x{:02X}", button.ydotool_code() | action.flags()),
        }
    }

    /// Move the pointer to an absolute position.
    pub fn move_to(self, position: Point) -> ToolCommand {
        let (x, y) = (position.x.to_string(), position.y.to_string());
        match self {
            PointerTool::Xdotool => ToolCommand::new(self.program(), ["mousemove".into(), x, y]),
            PointerTool::Ydotool => ToolCommand::new(
                self.program(),
                [
                    "mousemove".into(),
                    "--absolute".into(),
                    "-x".into(),
                    x,
                    "-y".into(),
                    y,
                ],
            ),
        }
    }

    pub fn click(self, button: MouseButton) -> ToolCommand {
        ToolCommand::new(
            self.program(),
            ["click".to_string(), self.button_token_for(button, ButtonAction::Click)],
        )
    }

    /// A single invocation that double-clicks, when the tool supports one.
    pub fn double_click(self, button: MouseButton, interval_ms: u64) -> Option<ToolCommand> {
        match self {
            PointerTool::Xdotool => Some(ToolCommand::new(
                self.program(),
                [
                    "click".to_string(),
                    "--repeat".to_string(),
                    "2".to_string(),
                    "--delay".to_string(),
                    interval_ms.to_string(),
                    button.number().to_string(),
                ],
            )),
            PointerTool::Ydotool => None,
        }
    }

    pub fn button_down(self, button: MouseButton) -> ToolCommand {
        match self {
            PointerTool::Xdotool => ToolCommand::new(
                self.program(),
                ["mousedown".to_string(), button.number().to_string()],
            ),
            PointerTool::Ydotool => ToolCommand::new(
                self.program(),
                ["click".to_string(), self.button_token_for(button, ButtonAction::Press)],
            ),
        }
    }

    pub fn button_up(self, button: MouseButton) -> ToolCommand {
        match self {
            PointerTool::Xdotool => ToolCommand::new(
                self.program(),
                ["mouseup".to_string(), button.number().to_string()],
            ),
            PointerTool::Ydotool => ToolCommand::new(
                self.program(),
                ["click".to_string(), self.button_token_for(button, ButtonAction::Release)],
            ),
        }
    }

    /// Type literal text with a per-character delay.
    pub fn type_text(self, text: &str, delay_ms: u64) -> ToolCommand {
        let flag = match self {
            PointerTool::Xdotool => "--delay",
            PointerTool::Ydotool => "--key-delay",
        };
        ToolCommand::new(
            self.program(),
            ["type".to_string(), flag.to_string(), delay_ms.to_string(), text.to_string()],
        )
    }

    pub fn key(self, combo: &str) -> ToolCommand {
        ToolCommand::new(self.program(), ["key", combo])
    }

    /// Query the live pointer location. Only X11 can report it.
    pub fn location_query(self) -> Option<ToolCommand> {
        match self {
            PointerTool::Xdotool => {
                Some(ToolCommand::new(self.program(), ["getmouselocation", "--shell"]))
            }
            PointerTool::Ydotool => None,
        }
    }
}

/// Parse `xdotool getmouselocation --shell` output (`X=..`, `Y=..` lines).
pub fn parse_location(output: &str) -> Option<Point> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        match line.trim().split_once('=') {
            Some(("X", value)) => x = value.trim().parse().ok(),
            Some(("Y", value)) => y = value.trim().parse().ok(),
            _ => {}
        }
    }
    Some(Point::new(x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_kind_detection() {
        assert_eq!(SessionKind::from_session_type(Some("wayland")), SessionKind::Wayland);
        assert_eq!(SessionKind::from_session_type(Some("Wayland")), SessionKind::Wayland);
        assert_eq!(SessionKind::from_session_type(Some("x11")), SessionKind::X11);
        assert_eq!(SessionKind::from_session_type(Some("tty")), SessionKind::X11);
        assert_eq!(SessionKind::from_session_type(None), SessionKind::X11);
    }

    #[test]
    fn test_button_tokens() {
        let x = PointerTool::Xdotool;
        assert_eq!(x.button_token(MouseButton::Primary), "1");
        assert_eq!(x.button_token(MouseButton::Middle), "2");
        assert_eq!(x.button_token(MouseButton::Secondary), "3");

        let y = PointerTool::Ydotool;
        assert_eq!(y.button_token(MouseButton::Primary), "0xC0");
        assert_eq!(y.button_token(MouseButton::Secondary), "0xC1");
        assert_eq!(y.button_token(MouseButton::Middle), "0xC2");
    }

    #[test]
    fn test_button_from_number() {
        assert_eq!(MouseButton::try_from(1).unwrap(), MouseButton::Primary);
        assert_eq!(MouseButton::try_from(3).unwrap(), MouseButton::Secondary);
        assert!(MouseButton::try_from(4).is_err());

        let button: MouseButton = serde_json::from_str("2").unwrap();
        assert_eq!(button, MouseButton::Middle);
        assert!(serde_json::from_str::<MouseButton>("9").is_err());
    }

    #[test]
    fn test_move_commands() {
        let to = Point::new(400, 50);
        assert_eq!(
            PointerTool::Xdotool.move_to(to).to_string(),
            "xdotool mousemove 400 50"
        );
        assert_eq!(
            PointerTool::Ydotool.move_to(to).to_string(),
            "ydotool mousemove --absolute -x 400 -y 50"
        );
    }

    #[test]
    fn test_drag_commands() {
        assert_eq!(
            PointerTool::Xdotool.button_down(MouseButton::Primary).to_string(),
            "xdotool mousedown 1"
        );
        assert_eq!(
            PointerTool::Xdotool.button_up(MouseButton::Secondary).to_string(),
            "xdotool mouseup 3"
        );
        assert_eq!(
            PointerTool::Ydotool.button_down(MouseButton::Primary).to_string(),
            "ydotool click 0x40"
        );
        assert_eq!(
            PointerTool::Ydotool.button_up(MouseButton::Primary).to_string(),
            "ydotool click 0x80"
        );
    }

    #[test]
    fn test_double_click() {
        assert_eq!(
            PointerTool::Xdotool
                .double_click(MouseButton::Primary, 50)
                .unwrap()
                .to_string(),
            "xdotool click --repeat 2 --delay 50 1"
        );
        assert!(PointerTool::Ydotool
            .double_click(MouseButton::Primary, 50)
            .is_none());
    }

    #[test]
    fn test_keyboard_commands() {
        assert_eq!(key_combo(&["ctrl", "c"]), "ctrl+c");
        assert_eq!(key_combo(&["Return"]), "Return");
        assert_eq!(
            PointerTool::Xdotool.key("ctrl+c").args,
            vec!["key".to_string(), "ctrl+c".to_string()]
        );
        let typed = PointerTool::Xdotool.type_text("hello world", 80);
        assert_eq!(typed.args, vec!["type", "--delay", "80", "hello world"]);
        let typed = PointerTool::Ydotool.type_text("hi", 50);
        assert_eq!(typed.args, vec!["type", "--key-delay", "50", "hi"]);
    }

    #[test]
    fn test_parse_location() {
        let output = "X=812\nY=377\nSCREEN=0\nWINDOW=65011722\n";
        assert_eq!(parse_location(output), Some(Point::new(812, 377)));
        assert_eq!(parse_location("SCREEN=0\n"), None);
        assert_eq!(parse_location("X=abc\nY=1"), None);
        assert!(PointerTool::Ydotool.location_query().is_none());
    }
}
