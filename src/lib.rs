//! Query and drive X11 display state: resolution, pointer position and
//! warping, focused window title, and interactive window selection.

pub mod cli;
pub mod display;
pub mod error;
pub mod inspect;
pub mod select;

pub use error::{Error, Result};
