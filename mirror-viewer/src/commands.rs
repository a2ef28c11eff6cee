//! Line-oriented input script.
//!
//! Each stdin line is one command. Coordinates are document
//! coordinates, in the same space as the configured container.
//!
//! ```text
//! click 600 350          down 10 10          up 10 10
//! move 200 100           wheel 600 350 0 120
//! key Enter ctrl+shift   type hello world
//! hide | show            session <id>        viewport 900 700
//! container 0 0 1200 700 snapshot | stats    quit
//! ```

use std::str::FromStr;

use mirror_core::{InputEvent, Modifiers, MouseButton, PointerAction, Rect, Viewport};

/// A parsed viewer command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Input(InputEvent),
    Hide,
    Show,
    Session(String),
    Viewport(Viewport),
    Container(Rect),
    Snapshot,
    Stats,
    Quit,
}

impl Command {
    /// Whether this command forwards pointer or wheel input.
    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            Command::Input(InputEvent::Pointer { .. } | InputEvent::Wheel { .. })
        )
    }

    /// Whether this command forwards keyboard input.
    pub fn is_keyboard(&self) -> bool {
        matches!(self, Command::Input(InputEvent::Key { .. } | InputEvent::Text(_)))
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let pointer = |action| -> Result<Command, String> {
            let [x, y] = numbers::<2>(&args)?;
            Ok(Command::Input(InputEvent::Pointer {
                action,
                x,
                y,
                button: MouseButton::Left,
            }))
        };

        match verb.to_ascii_lowercase().as_str() {
            "click" => pointer(PointerAction::Click),
            "down" => pointer(PointerAction::Down),
            "up" => pointer(PointerAction::Up),
            "move" => pointer(PointerAction::Move),
            "wheel" => {
                let [x, y, delta_x, delta_y] = numbers::<4>(&args)?;
                Ok(Command::Input(InputEvent::Wheel { x, y, delta_x, delta_y }))
            }
            "key" => {
                let key = args.first().ok_or("usage: key NAME [mods]")?;
                let modifiers = match args.get(1) {
                    Some(spec) => Modifiers::parse(spec).ok_or_else(|| format!("bad modifiers: {spec}"))?,
                    None => Modifiers::empty(),
                };
                Ok(Command::Input(InputEvent::Key {
                    key: key.to_string(),
                    modifiers,
                }))
            }
            "type" if !rest.is_empty() => Ok(Command::Input(InputEvent::Text(rest.to_string()))),
            "type" => Err("usage: type TEXT".into()),
            "hide" => Ok(Command::Hide),
            "show" => Ok(Command::Show),
            "session" => match args.as_slice() {
                [id] => Ok(Command::Session(id.to_string())),
                _ => Err("usage: session ID".into()),
            },
            "viewport" => {
                let [w, h] = numbers::<2>(&args)?;
                if w < 0.0 || h < 0.0 {
                    return Err("viewport must be non-negative".into());
                }
                Ok(Command::Viewport(Viewport::new(w as u32, h as u32)))
            }
            "container" => {
                let [l, t, w, h] = numbers::<4>(&args)?;
                Ok(Command::Container(Rect::new(l, t, w, h)))
            }
            "snapshot" => Ok(Command::Snapshot),
            "stats" => Ok(Command::Stats),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Parse exactly `N` numeric arguments.
fn numbers<const N: usize>(args: &[&str]) -> Result<[f64; N], String> {
    if args.len() != N {
        return Err(format!("expected {N} numbers, got {}", args.len()));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.parse().map_err(|_| format!("not a number: {arg}"))?;
    }
    Ok(out)
}
