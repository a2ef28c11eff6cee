//! Local input → remote input payloads.
//!
//! Translates pointer, wheel and keyboard events in document
//! coordinates into [`InputPayload`]s in the remote viewport's space,
//! then delivers them over whichever transport is active.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::coords::CoordinateMapper;
use crate::error::MirrorError;
use crate::geometry::{Point, Rect, Size, Viewport};
use crate::network::http::LiveApi;
use crate::network::push::PushChannel;
use crate::protocol::input::{InputPayload, Modifiers, MouseButton, PointerAction};
use crate::protocol::push::ClientMessage;
use crate::state::{SessionContext, StreamEvent};

// ── InputEvent ───────────────────────────────────────────────────

/// An input event as captured locally, in document coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
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
    /// A key press. `key` is either one printable character or a key
    /// name such as `Enter`.
    Key { key: String, modifiers: Modifiers },
    /// Literal text, e.g. from a paste.
    Text(String),
}

/// Which transport carried an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRoute {
    Push,
    Http,
}

// ── InputForwarder ───────────────────────────────────────────────

/// Maps and throttles local input.
#[derive(Debug)]
pub struct InputForwarder {
    mapper: Mutex<CoordinateMapper>,
    container: Mutex<Rect>,
    move_throttle: Duration,
    last_move: Mutex<Option<Instant>>,
}

impl InputForwarder {
    pub fn new(viewport: Option<Viewport>, container: Rect, move_throttle: Duration) -> Self {
        Self {
            mapper: Mutex::new(CoordinateMapper::new(viewport)),
            container: Mutex::new(container),
            move_throttle,
            last_move: Mutex::new(None),
        }
    }

    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        self.mapper.lock().set_viewport(viewport);
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.mapper.lock().viewport()
    }

    /// Update the on-screen rectangle the frame is drawn into.
    pub fn set_container(&self, container: Rect) {
        *self.container.lock() = container;
    }

    pub fn container(&self) -> Rect {
        *self.container.lock()
    }

    /// Forget throttle state (new session).
    pub fn reset(&self) {
        *self.last_move.lock() = None;
    }

    /// Turn a local event into a payload.
    ///
    /// Returns `None` when the event is dropped: no frame has been
    /// rendered yet, a pointer move fell inside the throttle window, or
    /// there is nothing to send.
    pub fn translate(&self, event: InputEvent, frame: Option<Size>, now: Instant) -> Option<InputPayload> {
        let Some(frame) = frame else {
            trace!("no frame rendered yet; input dropped");
            return None;
        };

        match event {
            InputEvent::Pointer { action, x, y, button } => {
                if action == PointerAction::Move && !self.admit_move(now) {
                    return None;
                }
                let p = self.map(x, y, frame);
                Some(InputPayload::Pointer {
                    action,
                    x: p.x,
                    y: p.y,
                    button,
                })
            }
            InputEvent::Wheel { x, y, delta_x, delta_y } => {
                let p = self.map(x, y, frame);
                Some(InputPayload::Wheel {
                    x: p.x,
                    y: p.y,
                    delta_x,
                    delta_y,
                })
            }
            InputEvent::Key { key, modifiers } => key_payload(key, modifiers),
            InputEvent::Text(text) if text.is_empty() => None,
            InputEvent::Text(text) => Some(InputPayload::Type { text }),
        }
    }

    fn admit_move(&self, now: Instant) -> bool {
        let mut last = self.last_move.lock();
        match *last {
            Some(prev) if now.saturating_duration_since(prev) < self.move_throttle => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    fn map(&self, x: f64, y: f64, frame: Size) -> Point {
        let container = *self.container.lock();
        self.mapper.lock().map(Point::new(x, y), &container, frame).0
    }
}

/// Single printable characters become text insertion unless a shortcut
/// modifier is held; everything else is a named key press.
fn key_payload(key: String, modifiers: Modifiers) -> Option<InputPayload> {
    let mut chars = key.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        (None, _) => return None,
        _ => None,
    };
    match single {
        Some(c) if !c.is_control() && !modifiers.is_shortcut() => Some(InputPayload::Type { text: key }),
        _ => Some(InputPayload::Key {
            key,
            modifiers: modifiers.names(),
        }),
    }
}

// ── Delivery ─────────────────────────────────────────────────────

/// Send `input` for the session in `ctx`.
///
/// The push channel is used while a subscription is active and the
/// channel is up; a failed push send falls back to HTTP. An HTTP failure
/// is reported once as [`StreamEvent::InputError`] and not retried.
pub async fn deliver(
    ctx: &SessionContext,
    push: Option<&dyn PushChannel>,
    api: &dyn LiveApi,
    input: InputPayload,
) -> Result<InputRoute, MirrorError> {
    if let Some(push) = push.filter(|p| ctx.is_subscribed() && p.is_connected()) {
        let msg = ClientMessage::RecordingInput {
            session_id: ctx.id().to_string(),
            input: input.clone(),
        };
        match push.send(&msg) {
            Ok(()) => return Ok(InputRoute::Push),
            Err(e) => debug!(session = %ctx.id(), "push input failed, using http: {e}"),
        }
    }

    let sent = tokio::select! {
        _ = ctx.cancel_token().cancelled() => return Err(MirrorError::Cancelled),
        r = api.send_input(ctx.id(), &input) => r,
    };
    match sent {
        Ok(()) => Ok(InputRoute::Http),
        Err(e) => {
            warn!(session = %ctx.id(), kind = input.kind(), "input delivery failed: {e}");
            ctx.emit(StreamEvent::InputError(e.to_string()));
            Err(e)
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Option<Size> = Some(Size::new(900, 700));

    fn forwarder() -> InputForwarder {
        InputForwarder::new(
            Some(Viewport::new(900, 700)),
            Rect::new(0.0, 0.0, 1200.0, 700.0),
            Duration::from_millis(100),
        )
    }

    fn pointer(action: PointerAction, x: f64, y: f64) -> InputEvent {
        InputEvent::Pointer {
            action,
            x,
            y,
            button: MouseButton::Left,
        }
    }

    #[test]
    fn click_is_mapped() {
        let f = forwarder();
        let out = f.translate(pointer(PointerAction::Click, 600.0, 350.0), FRAME, Instant::now());
        assert_eq!(
            out,
            Some(InputPayload::Pointer {
                action: PointerAction::Click,
                x: 450.0,
                y: 350.0,
                button: MouseButton::Left,
            })
        );
    }

    #[test]
    fn dropped_before_first_frame() {
        let f = forwarder();
        let now = Instant::now();
        assert_eq!(f.translate(pointer(PointerAction::Click, 1.0, 1.0), None, now), None);
        assert_eq!(f.translate(InputEvent::Text("a".into()), None, now), None);
    }

    #[test]
    fn moves_are_throttled_clicks_are_not() {
        let f = forwarder();
        let t0 = Instant::now();
        assert!(f.translate(pointer(PointerAction::Move, 1.0, 1.0), FRAME, t0).is_some());
        assert!(f.translate(pointer(PointerAction::Move, 2.0, 2.0), FRAME, t0 + Duration::from_millis(50)).is_none());
        assert!(f.translate(pointer(PointerAction::Down, 2.0, 2.0), FRAME, t0 + Duration::from_millis(60)).is_some());
        assert!(f.translate(pointer(PointerAction::Up, 2.0, 2.0), FRAME, t0 + Duration::from_millis(61)).is_some());
        assert!(f.translate(pointer(PointerAction::Move, 3.0, 3.0), FRAME, t0 + Duration::from_millis(100)).is_some());

        f.reset();
        assert!(f.translate(pointer(PointerAction::Move, 3.0, 3.0), FRAME, t0 + Duration::from_millis(101)).is_some());
    }

    #[test]
    fn wheel_is_never_throttled() {
        let f = forwarder();
        let t0 = Instant::now();
        for _ in 0..3 {
            let out = f.translate(
                InputEvent::Wheel {
                    x: 600.0,
                    y: 350.0,
                    delta_x: 0.0,
                    delta_y: 120.0,
                },
                FRAME,
                t0,
            );
            assert!(matches!(out, Some(InputPayload::Wheel { x, .. }) if x == 450.0));
        }
    }

    #[test]
    fn keyboard_mapping() {
        let f = forwarder();
        let now = Instant::now();
        let key = |k: &str, m: Modifiers| f.translate(InputEvent::Key { key: k.into(), modifiers: m }, FRAME, now);

        assert_eq!(key("a", Modifiers::empty()), Some(InputPayload::Type { text: "a".into() }));
        assert_eq!(key("A", Modifiers::SHIFT), Some(InputPayload::Type { text: "A".into() }));
        assert_eq!(
            key("Enter", Modifiers::CONTROL | Modifiers::SHIFT),
            Some(InputPayload::Key {
                key: "Enter".into(),
                modifiers: vec!["Control".into(), "Shift".into()],
            })
        );
        assert_eq!(
            key("c", Modifiers::META),
            Some(InputPayload::Key {
                key: "c".into(),
                modifiers: vec!["Meta".into()],
            })
        );
        assert_eq!(key("", Modifiers::empty()), None);
    }

    #[test]
    fn viewport_change_applies() {
        let f = forwarder();
        f.set_viewport(Some(Viewport::new(450, 350)));
        f.set_container(Rect::new(100.0, 0.0, 1200.0, 700.0));
        let out = f.translate(pointer(PointerAction::Click, 700.0, 350.0), FRAME, Instant::now());
        assert!(matches!(out, Some(InputPayload::Pointer { x, y, .. }) if x == 225.0 && y == 175.0));
    }
}
