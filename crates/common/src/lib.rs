//! Common utilities and types shared across trailpack crates.

pub mod action;
pub mod error;
pub mod hash;
pub mod window;

pub use action::ActionType;
pub use error::{Error, ErrorKind, Result};
pub use window::DateWindow;
