//! Error types for frame header handling.

use thiserror::Error;

/// Frame-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame too short for the header being read
    #[error("frame too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Header carries a version this build does not speak
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// Type tag outside the known set
    #[error("unknown frame type: 0x{0:04X}")]
    UnknownFrameType(u16),
}
