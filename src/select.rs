//! Interactive window selection.
//!
//! The pointer is grabbed synchronously over the root window with a crosshair
//! cursor. Each queued pointer event is replayed with `AllowEvents` before
//! blocking on the next button event, so every press and release arrives in
//! order. The first press fixes the target; selection finishes once every
//! button pressed during the gesture has been released again.

use tracing::{debug, trace, warn};
use x11rb::{
    connection::Connection,
    errors::ReplyOrIdError,
    protocol::{
        xproto::{Allow, ConnectionExt, Cursor, EventMask, GrabMode, GrabStatus, Window},
        Event,
    },
    CURRENT_TIME,
};

use crate::error::{GrabError, Result};

/// Glyph index of the crosshair in the standard `cursor` font.
const XC_CROSSHAIR: u16 = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Press { button: u8, child: Window },
    Release { button: u8 },
}

/// The server-side operations selection needs.
pub trait SelectionBackend {
    /// Takes an exclusive synchronous grab of the pointer over `root`.
    fn acquire_pointer_grab(&self, root: Window) -> Result<()>;

    fn release_pointer_grab(&self);

    /// Replays the frozen pointer and blocks until the next button event on `root`.
    fn next_button_event(&self, root: Window) -> Result<ButtonEvent>;

    /// The child of `window` currently under the pointer, or `None` if the
    /// query failed.
    fn pointer_child(&self, window: Window) -> Option<Window>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectState {
    AwaitingPress,
    AwaitingRelease { target: Window, pending: u32 },
    Released(Window),
}

impl SelectState {
    /// Advances the gesture by one event. `resolve` maps the sub-window of the
    /// first press to the selected window and is not called again afterwards.
    pub fn step(self, event: ButtonEvent, resolve: impl FnOnce(Window) -> Window) -> Self {
        match (self, event) {
            (SelectState::AwaitingPress, ButtonEvent::Press { child, .. }) => {
                SelectState::AwaitingRelease {
                    target: resolve(child),
                    pending: 1,
                }
            }
            (SelectState::AwaitingPress, ButtonEvent::Release { .. }) => SelectState::AwaitingPress,
            (SelectState::AwaitingRelease { target, pending }, ButtonEvent::Press { .. }) => {
                SelectState::AwaitingRelease {
                    target,
                    pending: pending + 1,
                }
            }
            (SelectState::AwaitingRelease { target, pending }, ButtonEvent::Release { .. }) => {
                match pending.saturating_sub(1) {
                    0 => SelectState::Released(target),
                    pending => SelectState::AwaitingRelease { target, pending },
                }
            }
            (released @ SelectState::Released(_), _) => released,
        }
    }
}

/// Ungrabs the pointer when dropped.
struct PointerGrab<'a, B: SelectionBackend + ?Sized> {
    backend: &'a B,
}

impl<B: SelectionBackend + ?Sized> Drop for PointerGrab<'_, B> {
    fn drop(&mut self) {
        self.backend.release_pointer_grab();
    }
}

/// Blocks until the user clicks a window and returns it.
///
/// The returned window is never `NONE`: a press with no sub-window, or one
/// whose pointer query fails, selects `root`.
pub fn select<B: SelectionBackend + ?Sized>(backend: &B, root: Window) -> Result<Window> {
    backend.acquire_pointer_grab(root)?;
    let _grab = PointerGrab { backend };

    let mut state = SelectState::AwaitingPress;
    loop {
        let event = backend.next_button_event(root)?;
        trace!(?event, ?state, "selection event");
        state = state.step(event, |child| resolve_target(backend, root, child));
        if let SelectState::Released(target) = state {
            debug!(window = target, "window selected");
            return Ok(target);
        }
    }
}

fn resolve_target<B: SelectionBackend + ?Sized>(
    backend: &B,
    root: Window,
    child: Window,
) -> Window {
    if child == x11rb::NONE {
        return root;
    }
    match backend.pointer_child(child) {
        None => root,
        Some(x11rb::NONE) => child,
        Some(descendant) => descendant,
    }
}

fn crosshair_cursor<C: Connection>(
    conn: &C,
) -> std::result::Result<Cursor, ReplyOrIdError> {
    let font = conn.generate_id()?;
    conn.open_font(font, b"cursor")?;
    let cursor = conn.generate_id()?;
    conn.create_glyph_cursor(
        cursor,
        font,
        font,
        XC_CROSSHAIR,
        XC_CROSSHAIR + 1,
        0,
        0,
        0,
        u16::MAX,
        u16::MAX,
        u16::MAX,
    )?;
    conn.close_font(font)?;
    Ok(cursor)
}

fn grab_with_crosshair<C: Connection>(
    conn: &C,
    root: Window,
) -> std::result::Result<(), GrabError> {
    let cursor = crosshair_cursor(conn)?;
    let reply = conn
        .grab_pointer(
            false,
            root,
            EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            root,
            cursor,
            CURRENT_TIME,
        )
        .map_err(ReplyOrIdError::from)
        .and_then(|cookie| cookie.reply().map_err(ReplyOrIdError::from));
    // The grab keeps its own reference to the cursor.
    if let Err(err) = conn.free_cursor(cursor) {
        debug!(cursor, "failed to free cursor: {}", err);
    }
    let status = reply?.status;
    if status != GrabStatus::SUCCESS {
        return Err(GrabError::Refused(status));
    }
    Ok(())
}

impl<C: Connection> SelectionBackend for C {
    fn acquire_pointer_grab(&self, root: Window) -> Result<()> {
        Ok(grab_with_crosshair(self, root)?)
    }

    fn release_pointer_grab(&self) {
        let result = self
            .ungrab_pointer(CURRENT_TIME)
            .and_then(|_| self.flush());
        if let Err(err) = result {
            warn!("failed to release pointer grab: {}", err);
        }
    }

    fn next_button_event(&self, root: Window) -> Result<ButtonEvent> {
        self.allow_events(Allow::SYNC_POINTER, CURRENT_TIME)?;
        self.flush()?;
        loop {
            match self.wait_for_event()? {
                Event::ButtonPress(event) if event.event == root => {
                    return Ok(ButtonEvent::Press {
                        button: event.detail,
                        child: event.child,
                    });
                }
                Event::ButtonRelease(event) if event.event == root => {
                    return Ok(ButtonEvent::Release {
                        button: event.detail,
                    });
                }
                other => trace!(?other, "ignoring event during selection"),
            }
        }
    }

    fn pointer_child(&self, window: Window) -> Option<Window> {
        match self.query_pointer(window) {
            Ok(cookie) => match cookie.reply() {
                Ok(reply) => Some(reply.child),
                Err(err) => {
                    debug!(window, "pointer query failed: {}", err);
                    None
                }
            },
            Err(err) => {
                debug!(window, "pointer query failed: {}", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use crate::error::Error;
    use x11rb::errors::ConnectionError;

    const ROOT: Window = 0x100;
    const FRAME: Window = 0x200;
    const CLIENT: Window = 0x201;

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Grab,
        Ungrab,
        Query(Window),
    }

    #[derive(Default)]
    struct FakeBackend {
        grab_status: Option<GrabStatus>,
        grab_request_fails: bool,
        events: RefCell<VecDeque<ButtonEvent>>,
        children: HashMap<Window, Window>,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeBackend {
        fn with_events(events: impl IntoIterator<Item = ButtonEvent>) -> Self {
            Self {
                events: RefCell::new(events.into_iter().collect()),
                ..Default::default()
            }
        }

        fn grabbed(&self) -> bool {
            self.calls.borrow().iter().fold(false, |held, call| match call {
                Call::Grab => true,
                Call::Ungrab => false,
                Call::Query(_) => held,
            })
        }

        fn queries(&self) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|call| matches!(call, Call::Query(_)))
                .count()
        }
    }

    impl SelectionBackend for FakeBackend {
        fn acquire_pointer_grab(&self, _root: Window) -> Result<()> {
            if let Some(status) = self.grab_status {
                return Err(GrabError::Refused(status).into());
            }
            if self.grab_request_fails {
                let err = ReplyOrIdError::ConnectionError(ConnectionError::UnknownError);
                return Err(GrabError::from(err).into());
            }
            self.calls.borrow_mut().push(Call::Grab);
            Ok(())
        }

        fn release_pointer_grab(&self) {
            self.calls.borrow_mut().push(Call::Ungrab);
        }

        fn next_button_event(&self, _root: Window) -> Result<ButtonEvent> {
            self.events
                .borrow_mut()
                .pop_front()
                .ok_or(Error::Connection(ConnectionError::UnknownError))
        }

        fn pointer_child(&self, window: Window) -> Option<Window> {
            self.calls.borrow_mut().push(Call::Query(window));
            self.children.get(&window).copied()
        }
    }

    fn press(button: u8, child: Window) -> ButtonEvent {
        ButtonEvent::Press { button, child }
    }

    fn release(button: u8) -> ButtonEvent {
        ButtonEvent::Release { button }
    }

    #[test]
    fn press_on_background_selects_root() {
        let backend = FakeBackend::with_events([press(1, x11rb::NONE), release(1)]);

        assert_eq!(select(&backend, ROOT).unwrap(), ROOT);
        assert_eq!(backend.queries(), 0);
        assert!(!backend.grabbed());
    }

    #[test]
    fn press_selects_descendant_under_pointer() {
        let mut backend = FakeBackend::with_events([press(1, FRAME), release(1)]);
        backend.children.insert(FRAME, CLIENT);

        assert_eq!(select(&backend, ROOT).unwrap(), CLIENT);
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Grab, Call::Query(FRAME), Call::Ungrab]
        );
    }

    #[test]
    fn failed_pointer_query_selects_root() {
        let backend = FakeBackend::with_events([press(1, FRAME), release(1)]);

        assert_eq!(select(&backend, ROOT).unwrap(), ROOT);
    }

    #[test]
    fn sub_window_without_children_is_selected() {
        let mut backend = FakeBackend::with_events([press(3, CLIENT), release(3)]);
        backend.children.insert(CLIENT, x11rb::NONE);

        assert_eq!(select(&backend, ROOT).unwrap(), CLIENT);
    }

    #[test]
    fn waits_for_every_pressed_button() {
        let mut backend = FakeBackend::with_events([
            press(1, FRAME),
            press(2, FRAME),
            release(1),
            release(2),
            press(1, x11rb::NONE),
        ]);
        backend.children.insert(FRAME, CLIENT);

        assert_eq!(select(&backend, ROOT).unwrap(), CLIENT);
        // The trailing press was never consumed.
        assert_eq!(backend.events.borrow().len(), 1);
        assert_eq!(backend.queries(), 1);
    }

    #[test]
    fn grab_released_when_event_wait_fails() {
        let mut backend = FakeBackend::with_events([press(1, FRAME), press(2, FRAME), release(1)]);
        backend.children.insert(FRAME, CLIENT);

        assert!(matches!(
            select(&backend, ROOT),
            Err(Error::Connection(ConnectionError::UnknownError))
        ));
        assert!(!backend.grabbed());
    }

    #[test]
    fn release_before_press_is_ignored() {
        let mut backend = FakeBackend::with_events([release(1), press(1, FRAME), release(1)]);
        backend.children.insert(FRAME, CLIENT);

        assert_eq!(select(&backend, ROOT).unwrap(), CLIENT);
    }

    #[test]
    fn grab_failure_is_reported_without_events() {
        let backend = FakeBackend {
            grab_status: Some(GrabStatus::ALREADY_GRABBED),
            ..FakeBackend::with_events([press(1, FRAME), release(1)])
        };

        assert!(matches!(
            select(&backend, ROOT),
            Err(Error::Grab(GrabError::Refused(GrabStatus::ALREADY_GRABBED)))
        ));
        assert!(backend.calls.borrow().is_empty());
        assert_eq!(backend.events.borrow().len(), 2);
    }

    #[test]
    fn failed_grab_request_is_reported_as_grab_error() {
        let backend = FakeBackend {
            grab_request_fails: true,
            ..FakeBackend::with_events([press(1, FRAME), release(1)])
        };

        assert!(matches!(
            select(&backend, ROOT),
            Err(Error::Grab(GrabError::Request(_)))
        ));
        assert!(backend.calls.borrow().is_empty());
    }

    #[test]
    fn step_counts_pending_buttons() {
        let state = SelectState::AwaitingPress.step(press(1, FRAME), |_| CLIENT);
        assert_eq!(
            state,
            SelectState::AwaitingRelease {
                target: CLIENT,
                pending: 1
            }
        );

        let state = state.step(press(2, x11rb::NONE), |_| unreachable!());
        assert_eq!(
            state,
            SelectState::AwaitingRelease {
                target: CLIENT,
                pending: 2
            }
        );

        let state = state.step(release(2), |_| unreachable!());
        let state = state.step(release(1), |_| unreachable!());
        assert_eq!(state, SelectState::Released(CLIENT));
        assert_eq!(
            state.step(press(1, FRAME), |_| unreachable!()),
            SelectState::Released(CLIENT)
        );
    }
}
