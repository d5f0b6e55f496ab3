//! Error types shared with the rest of the workspace

pub use wm_error::{Result, WmError};
