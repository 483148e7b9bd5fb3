//! Screen geometry, pointer position and input focus.

use std::fmt;

use tracing::debug;
use x11rb::{
    connection::Connection,
    protocol::xproto::{ConnectionExt, InputFocus, Screen, Window},
};

use crate::error::Result;

/// A position in root window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={}\nY={}", self.x, self.y)
    }
}

/// Static geometry of a screen, read once from the connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width_px: u16,
    pub height_px: u16,
    pub width_mm: u16,
    pub height_mm: u16,
}

impl DisplayMetrics {
    pub fn from_screen(screen: &Screen) -> Self {
        Self {
            width_px: screen.width_in_pixels,
            height_px: screen.height_in_pixels,
            width_mm: screen.width_in_millimeters,
            height_mm: screen.height_in_millimeters,
        }
    }
}

impl fmt::Display for DisplayMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "px={}x{}\nmm={}x{}",
            self.width_px, self.height_px, self.width_mm, self.height_mm
        )
    }
}

pub fn pointer_position<C: Connection>(conn: &C, root: Window) -> Result<Point> {
    let reply = conn.query_pointer(root)?.reply()?;
    Ok(Point {
        x: reply.root_x,
        y: reply.root_y,
    })
}

/// Moves the pointer to `(x, y)` relative to the origin of `root`.
pub fn warp_pointer<C: Connection>(conn: &C, root: Window, x: i16, y: i16) -> Result<()> {
    debug!(x, y, "warping pointer");
    conn.warp_pointer(x11rb::NONE, root, 0, 0, 0, 0, x, y)?
        .check()?;
    Ok(())
}

/// The window holding input focus. `None` and `PointerRoot` focus map to `root`.
pub fn focused_window<C: Connection>(conn: &C, root: Window) -> Result<Window> {
    let focus = conn.get_input_focus()?.reply()?.focus;
    Ok(focus_or_root(focus, root))
}

fn focus_or_root(focus: Window, root: Window) -> Window {
    if focus == x11rb::NONE || focus == u32::from(InputFocus::POINTER_ROOT) {
        root
    } else {
        focus
    }
}
