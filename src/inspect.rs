//! Class hints and titles of client windows.

use std::fmt;

use tracing::debug;
use x11rb::{
    atom_manager,
    connection::Connection,
    protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window},
};

atom_manager! {
    pub Atoms: AtomsCookie {
        UTF8_STRING,
        COMPOUND_TEXT,
        _NET_WM_NAME,
    }
}

/// A property value as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub type_: Atom,
    pub format: u8,
    pub value: Vec<u8>,
}

pub trait PropertySource {
    /// Reads `property` of `window` in full. Missing properties and failed
    /// requests both yield `None`.
    fn property(&self, window: Window, property: Atom) -> Option<RawProperty>;
}

impl<C: Connection> PropertySource for C {
    fn property(&self, window: Window, property: Atom) -> Option<RawProperty> {
        let reply = match self.get_property(false, window, property, AtomEnum::ANY, 0, u32::MAX) {
            Ok(cookie) => cookie.reply(),
            Err(err) => {
                debug!(window, property, "property request failed: {}", err);
                return None;
            }
        };
        match reply {
            Ok(reply) if reply.type_ == x11rb::NONE => None,
            Ok(reply) => Some(RawProperty {
                type_: reply.type_,
                format: reply.format,
                value: reply.value,
            }),
            Err(err) => {
                debug!(window, property, "property request failed: {}", err);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub title: String,
    pub handle: Window,
}

impl fmt::Display for WindowDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(class), Some(instance)) = (&self.class, &self.instance) {
            writeln!(f, "class=\"{}\"", class)?;
            writeln!(f, "instance=\"{}\"", instance)?;
        }
        writeln!(f, "id={}", self.handle)?;
        write!(f, "title=\"{}\"", self.title)
    }
}

pub struct WindowInspector<'a, P: ?Sized> {
    source: &'a P,
    atoms: Atoms,
}

impl<'a, P: PropertySource + ?Sized> WindowInspector<'a, P> {
    pub fn new(source: &'a P, atoms: Atoms) -> Self {
        Self { source, atoms }
    }

    /// Collects class hints and title of `handle`. Missing data is left empty.
    pub fn describe(&self, handle: Window) -> WindowDescriptor {
        let (instance, class) = match self.class_hint(handle) {
            Some((instance, class)) => (Some(instance), Some(class)),
            None => (None, None),
        };
        WindowDescriptor {
            class,
            instance,
            title: self.title(handle),
            handle,
        }
    }

    /// `WM_CLASS` holds the instance name followed by the class name.
    fn class_hint(&self, window: Window) -> Option<(String, String)> {
        let prop = self.source.property(window, AtomEnum::WM_CLASS.into())?;
        if prop.format != 8 || prop.type_ != u32::from(AtomEnum::STRING) {
            return None;
        }
        let mut parts = prop.value.split(|b| *b == 0);
        let instance = latin1(parts.next().unwrap_or_default());
        let class = latin1(parts.next().unwrap_or_default());
        Some((instance, class))
    }

    /// First entry of the `WM_NAME` text list, falling back to `_NET_WM_NAME`.
    pub fn title(&self, window: Window) -> String {
        [AtomEnum::WM_NAME.into(), self.atoms._NET_WM_NAME]
            .into_iter()
            .filter_map(|property| self.source.property(window, property))
            .filter_map(|prop| self.decode_text(&prop))
            .find(|title| !title.is_empty())
            .unwrap_or_default()
    }

    fn decode_text(&self, prop: &RawProperty) -> Option<String> {
        if prop.format != 8 {
            return None;
        }
        let first = prop.value.split(|b| *b == 0).next()?;
        if prop.type_ == self.atoms.UTF8_STRING {
            Some(String::from_utf8_lossy(first).into_owned())
        } else if prop.type_ == u32::from(AtomEnum::STRING) {
            Some(latin1(first))
        } else if prop.type_ == self.atoms.COMPOUND_TEXT {
            compound_text_latin1(first)
        } else {
            debug!(type_ = prop.type_, "unsupported text encoding");
            None
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Decodes compound text that stays in its initial ASCII/Latin-1 state.
/// Text containing escape sequences or control characters other than tab and
/// newline is rejected.
fn compound_text_latin1(bytes: &[u8]) -> Option<String> {
    let plain = bytes
        .iter()
        .all(|&b| matches!(b, b'\t' | b'\n' | 0x20..=0x7e | 0xa0..=0xff));
    if !plain {
        debug!("compound text with charset switches");
        return None;
    }
    Some(latin1(bytes))
}
