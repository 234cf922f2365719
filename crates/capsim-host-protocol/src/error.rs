//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when building or decoding protocol frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame is too short to be valid.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Frame length does not match its length field.
    #[error("frame length mismatch: length field implies {declared} bytes, got {actual}")]
    LengthMismatch {
        /// Total length implied by the length field.
        declared: usize,
        /// Actual length received.
        actual: usize,
    },

    /// An outgoing frame would exceed the fixed frame buffer.
    #[error("frame overflow: output exceeds {max} bytes", max = crate::MAX_FRAME_SIZE)]
    FrameOverflow,

    /// Frame checksum did not verify.
    #[error("checksum mismatch: frame sum residue 0x{0:02X}")]
    ChecksumMismatch(u8),

    /// Unknown command code.
    #[error("unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Unknown response code.
    #[error("unknown response code: 0x{0:02X}")]
    UnknownResponse(u8),

    /// A recognized command is missing required sub-command bytes.
    #[error("malformed command 0x{command:02X}: missing or invalid sub-command bytes")]
    MalformedCommand {
        /// The command byte.
        command: u8,
    },

    /// A response payload is shorter than its command requires.
    #[error("malformed response 0x{command:02X}: truncated payload")]
    MalformedResponse {
        /// The command byte.
        command: u8,
    },

    /// A string field was not valid ASCII/UTF-8.
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
}
