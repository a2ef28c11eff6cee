//! Input payloads forwarded to the remote browser.
//!
//! The same JSON shape travels inside a `recording_input` push message
//! and as the body of the HTTP input fallback.
//!
//! ```json
//! {"type":"pointer","action":"click","x":450.0,"y":350.0,"button":"left"}
//! {"type":"wheel","x":450.0,"y":350.0,"delta_x":0.0,"delta_y":120.0}
//! {"type":"type","text":"a"}
//! {"type":"key","key":"Enter","modifiers":["Control","Shift"]}
//! ```

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

// ── Modifiers ────────────────────────────────────────────────────

bitflags! {
    /// Keyboard modifier state at the time of an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const ALT = 0x01;
        const CONTROL = 0x02;
        const META = 0x04;
        const SHIFT = 0x08;
    }
}

impl Modifiers {
    /// Wire names in the order the remote expects them.
    pub fn names(self) -> Vec<String> {
        [
            (Self::ALT, "Alt"),
            (Self::CONTROL, "Control"),
            (Self::META, "Meta"),
            (Self::SHIFT, "Shift"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name.to_string())
        .collect()
    }

    /// Whether any modifier that turns a character into a shortcut is held.
    pub fn is_shortcut(self) -> bool {
        self.intersects(Self::ALT | Self::CONTROL | Self::META)
    }

    /// Parse a `+`-separated list such as `ctrl+shift`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut mods = Self::empty();
        for part in spec.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            mods |= match part.to_ascii_lowercase().as_str() {
                "alt" | "option" => Self::ALT,
                "ctrl" | "control" => Self::CONTROL,
                "meta" | "cmd" | "super" => Self::META,
                "shift" => Self::SHIFT,
                _ => return None,
            };
        }
        Some(mods)
    }
}

// ── Pointer ──────────────────────────────────────────────────────

/// Kind of pointer event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PointerAction {
    Move,
    Down,
    Up,
    Click,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

// ── InputPayload ─────────────────────────────────────────────────

/// One input event, already mapped into viewport coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPayload {
    Pointer {
        action: PointerAction,
        x: f64,
        y: f64,
        button: MouseButton,
    },
    Wheel {
        x: f64,
        y: f64,
        delta_x: f64,
        delta_y: f64,
    },
    /// Insert literal text at the focused element.
    Type { text: String },
    /// Press a named key with an explicit modifier list.
    Key { key: String, modifiers: Vec<String> },
}

impl InputPayload {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputPayload::Pointer { .. } => "pointer",
            InputPayload::Wheel { .. } => "wheel",
            InputPayload::Type { .. } => "type",
            InputPayload::Key { .. } => "key",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modifier_names_are_ordered() {
        let m = Modifiers::SHIFT | Modifiers::ALT | Modifiers::META;
        assert_eq!(m.names(), vec!["Alt", "Meta", "Shift"]);
        assert!(Modifiers::empty().names().is_empty());
    }

    #[test]
    fn shift_alone_is_not_a_shortcut() {
        assert!(!Modifiers::SHIFT.is_shortcut());
        assert!((Modifiers::SHIFT | Modifiers::CONTROL).is_shortcut());
    }

    #[test]
    fn parse_modifier_spec() {
        assert_eq!(
            Modifiers::parse("ctrl+Shift"),
            Some(Modifiers::CONTROL | Modifiers::SHIFT)
        );
        assert_eq!(Modifiers::parse(""), Some(Modifiers::empty()));
        assert_eq!(Modifiers::parse("hyper"), None);
    }

    #[test]
    fn pointer_wire_shape() {
        let p = InputPayload::Pointer {
            action: PointerAction::Click,
            x: 450.0,
            y: 350.0,
            button: MouseButton::Left,
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({"type": "pointer", "action": "click", "x": 450.0, "y": 350.0, "button": "left"})
        );
    }

    #[test]
    fn key_wire_shape() {
        let k = InputPayload::Key {
            key: "Enter".into(),
            modifiers: (Modifiers::CONTROL | Modifiers::SHIFT).names(),
        };
        assert_eq!(
            serde_json::to_value(&k).unwrap(),
            json!({"type": "key", "key": "Enter", "modifiers": ["Control", "Shift"]})
        );
        assert_eq!(k.kind(), "key");
    }

    #[test]
    fn type_and_wheel_parse() {
        let t: InputPayload = serde_json::from_str(r#"{"type":"type","text":"a"}"#).unwrap();
        assert_eq!(t, InputPayload::Type { text: "a".into() });

        let w: InputPayload =
            serde_json::from_str(r#"{"type":"wheel","x":1,"y":2,"delta_x":0,"delta_y":-120}"#)
                .unwrap();
        assert!(matches!(w, InputPayload::Wheel { delta_y, .. } if delta_y == -120.0));
    }
}
