//! Typed notifications and keyboard input.
//!
//! The editor never calls listeners directly. It queues [`Event`]s in an
//! outbox that the [`Context`](super::Context) drains after each call and
//! hands to its [`Emitter`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Init,
    /// Serialized content after the change
    Change(String),
    /// Serialized content before the command runs
    BeforeCommand(String),
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    MouseDown,
    MouseUp,
    Focus,
    Blur,
    Scroll,
    Paste,
    Copy,
    Enter,
    Disable(bool),
    Destroy,
    ImageUploadError(String),
    /// Outer markup of the removed media node
    MediaDelete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    Change,
    BeforeCommand,
    KeyDown,
    KeyUp,
    MouseDown,
    MouseUp,
    Focus,
    Blur,
    Scroll,
    Paste,
    Copy,
    Enter,
    Disable,
    Destroy,
    ImageUploadError,
    MediaDelete,
}

impl EventKind {
    pub fn namespace(self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Change => "change",
            EventKind::BeforeCommand => "before.command",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::Scroll => "scroll",
            EventKind::Paste => "paste",
            EventKind::Copy => "copy",
            EventKind::Enter => "enter",
            EventKind::Disable => "disable",
            EventKind::Destroy => "destroy",
            EventKind::ImageUploadError => "image.upload.error",
            EventKind::MediaDelete => "media.delete",
        }
    }

    /// `"before.command"` → `"onBeforeCommand"`.
    pub fn callback_name(self) -> String {
        let mut name = String::from("on");
        for segment in self.namespace().split('.') {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                name.extend(first.to_uppercase());
                name.push_str(chars.as_str());
            }
        }
        name
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init => EventKind::Init,
            Event::Change(_) => EventKind::Change,
            Event::BeforeCommand(_) => EventKind::BeforeCommand,
            Event::KeyDown(_) => EventKind::KeyDown,
            Event::KeyUp(_) => EventKind::KeyUp,
            Event::MouseDown => EventKind::MouseDown,
            Event::MouseUp => EventKind::MouseUp,
            Event::Focus => EventKind::Focus,
            Event::Blur => EventKind::Blur,
            Event::Scroll => EventKind::Scroll,
            Event::Paste => EventKind::Paste,
            Event::Copy => EventKind::Copy,
            Event::Enter => EventKind::Enter,
            Event::Disable(_) => EventKind::Disable,
            Event::Destroy => EventKind::Destroy,
            Event::ImageUploadError(_) => EventKind::ImageUploadError,
            Event::MediaDelete(_) => EventKind::MediaDelete,
        }
    }
}

pub type Handler = Box<dyn FnMut(&Event)>;

/// Subscription registry. Each event first goes to the user callback named
/// after it (see [`EventKind::callback_name`]), then to every subscriber of
/// its kind in subscription order.
#[derive(Default)]
pub struct Emitter {
    subscribers: Vec<(EventKind, Handler)>,
    callbacks: HashMap<String, Handler>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, handler: impl FnMut(&Event) + 'static) {
        self.subscribers.push((kind, Box::new(handler)));
    }

    /// Register the conventional callback, e.g. `"onChange"`.
    pub fn set_callback(&mut self, name: impl Into<String>, handler: impl FnMut(&Event) + 'static) {
        self.callbacks.insert(name.into(), Box::new(handler));
    }

    pub fn emit(&mut self, event: &Event) {
        let kind = event.kind();
        trace!("emit {}", kind.namespace());
        if let Some(callback) = self.callbacks.get_mut(&kind.callback_name()) {
            callback(event);
        }
        for (subscribed, handler) in &mut self.subscribers {
            if *subscribed == kind {
                handler(event);
            }
        }
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.subscribers.len())
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============ Keyboard input ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Backspace,
    Tab,
    Enter,
    Escape,
    Space,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Delete,
    Char(char),
}

impl Key {
    /// Name used in key map bindings (`"NUM7"`, `"B"`, `"LEFTBRACKET"`).
    pub fn name(self) -> Option<String> {
        let name = match self {
            Key::Backspace => "BACKSPACE",
            Key::Tab => "TAB",
            Key::Enter => "ENTER",
            Key::Escape => "ESCAPE",
            Key::Space => "SPACE",
            Key::PageUp => "PAGEUP",
            Key::PageDown => "PAGEDOWN",
            Key::End => "END",
            Key::Home => "HOME",
            Key::Left => "LEFT",
            Key::Up => "UP",
            Key::Right => "RIGHT",
            Key::Down => "DOWN",
            Key::Delete => "DELETE",
            Key::Char(c) if c.is_ascii_digit() => return Some(format!("NUM{c}")),
            Key::Char(c) if c.is_ascii_alphabetic() => return Some(c.to_ascii_uppercase().to_string()),
            Key::Char('/') => "SLASH",
            Key::Char('\\') => "BACKSLASH",
            Key::Char('[') => "LEFTBRACKET",
            Key::Char(']') => "RIGHTBRACKET",
            Key::Char(_) => return None,
        };
        Some(name.to_string())
    }

    pub fn is_move(self) -> bool {
        matches!(self, Key::Left | Key::Up | Key::Right | Key::Down)
    }

    pub fn is_navigation(self) -> bool {
        matches!(self, Key::Home | Key::End | Key::PageUp | Key::PageDown)
    }

    /// Keys that change content on their own.
    pub fn is_edit(self) -> bool {
        matches!(
            self,
            Key::Backspace | Key::Tab | Key::Enter | Key::Space | Key::Delete
        )
    }

    pub fn is_remove(self) -> bool {
        matches!(self, Key::Backspace | Key::Delete)
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.to_ascii_uppercase().as_str() {
            "BACKSPACE" => Key::Backspace,
            "TAB" => Key::Tab,
            "ENTER" => Key::Enter,
            "ESCAPE" | "ESC" => Key::Escape,
            "SPACE" => Key::Space,
            "PAGEUP" => Key::PageUp,
            "PAGEDOWN" => Key::PageDown,
            "END" => Key::End,
            "HOME" => Key::Home,
            "LEFT" => Key::Left,
            "UP" => Key::Up,
            "RIGHT" => Key::Right,
            "DOWN" => Key::Down,
            "DELETE" => Key::Delete,
            "SLASH" => Key::Char('/'),
            "BACKSLASH" => Key::Char('\\'),
            "LEFTBRACKET" => Key::Char('['),
            "RIGHTBRACKET" => Key::Char(']'),
            upper => match upper.strip_prefix("NUM") {
                Some(digit) if digit.len() == 1 => Key::Char(digit.chars().next().unwrap_or('0')),
                _ => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Key::Char(c),
                        _ => return Err(format!("unknown key `{s}`")),
                    }
                }
            },
        };
        Ok(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    /// Set when an earlier listener already handled the key
    pub default_prevented: bool,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
            alt: false,
            default_prevented: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }
}

/// Parses chords such as `"CTRL+SHIFT+NUM7"`.
impl FromStr for KeyEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key_part = parts.pop().filter(|p| !p.is_empty()).ok_or("missing key")?;
        let mut event = KeyEvent::new(key_part.parse()?);
        for modifier in parts {
            event = match modifier.to_ascii_uppercase().as_str() {
                "CTRL" => event.ctrl(),
                "CMD" | "META" => event.meta(),
                "SHIFT" => event.shift(),
                "ALT" => event.alt(),
                other => return Err(format!("unknown modifier `{other}`")),
            };
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[rstest]
    #[case(EventKind::BeforeCommand, "onBeforeCommand")]
    #[case(EventKind::Change, "onChange")]
    #[case(EventKind::KeyDown, "onKeydown")]
    #[case(EventKind::ImageUploadError, "onImageUploadError")]
    fn test_callback_name(#[case] kind: EventKind, #[case] expected: &str) {
        assert_eq!(kind.callback_name(), expected);
    }

    #[test]
    fn test_emitter_runs_callback_then_subscribers() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();

        let log = Rc::clone(&seen);
        emitter.on(EventKind::Change, move |_| log.borrow_mut().push("subscriber"));
        let log = Rc::clone(&seen);
        emitter.set_callback("onChange", move |_| log.borrow_mut().push("callback"));
        let log = Rc::clone(&seen);
        emitter.on(EventKind::Blur, move |_| log.borrow_mut().push("blur"));

        emitter.emit(&Event::Change("<p>x</p>".into()));

        assert_eq!(*seen.borrow(), vec!["callback", "subscriber"]);
    }

    #[rstest]
    #[case(Key::Char('7'), Some("NUM7"))]
    #[case(Key::Char('b'), Some("B"))]
    #[case(Key::Char('['), Some("LEFTBRACKET"))]
    #[case(Key::Enter, Some("ENTER"))]
    #[case(Key::Char('é'), None)]
    fn test_key_names(#[case] key: Key, #[case] expected: Option<&str>) {
        assert_eq!(key.name().as_deref(), expected);
    }

    #[test]
    fn test_parse_chord() {
        let event: KeyEvent = "CTRL+SHIFT+NUM7".parse().expect("Should parse chord");

        assert_eq!(event, KeyEvent::new(Key::Char('7')).ctrl().shift());
        assert!("CTRL+".parse::<KeyEvent>().is_err());
        assert!("HYPER+B".parse::<KeyEvent>().is_err());
    }
}
