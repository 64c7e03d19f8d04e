//! Ordered walk over a capture rotation.

mod rotation;

pub use rotation::{FileFormat, RotationCursor};

use std::path::PathBuf;

use crate::error::CursorError;

/// Outcome of asking a cursor for its next file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStep {
    File(PathBuf),
    /// The rotation has no more files. Not an error.
    Exhausted,
}

/// Yields rotated capture files in capture order.
pub trait FileCursor {
    fn next_file(&mut self) -> Result<CursorStep, CursorError>;
}
