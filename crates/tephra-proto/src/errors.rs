//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while decoding a frame.
///
/// Every variant is fatal for the connection that produced the frame.
/// Encoding never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame ended in the middle of a field
    #[error("unexpected end of frame while reading {field}")]
    UnexpectedEof {
        /// Field being read when input ran out
        field: &'static str,
    },

    /// Varint longer than 10 bytes or wider than 64 bits
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// Mutation record tag outside the known tag space
    #[error("unknown mutation tag {0}")]
    UnknownMutationTag(u64),

    /// Event tag outside the known tag space
    #[error("unknown event tag {0}")]
    UnknownEventTag(u64),

    /// Attribute value kind byte outside the known kinds
    #[error("unknown attribute value kind {0}")]
    UnknownValueKind(u8),

    /// Enumerated field carried an out-of-range discriminant
    #[error("invalid {field} discriminant {value}")]
    InvalidDiscriminant {
        /// Field name
        field: &'static str,
        /// Raw value on the wire
        value: u64,
    },

    /// Boolean encoded as something other than 0 or 1
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    /// String payload is not UTF-8
    #[error("string field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field being read
        field: &'static str,
    },

    /// Declared record length runs past the end of the frame
    #[error("record declares {declared} bytes but only {remaining} remain")]
    BodyOverrun {
        /// Length from the record header
        declared: u64,
        /// Bytes left in the frame
        remaining: usize,
    },

    /// Bytes left over inside a record or after an event
    #[error("{0} trailing bytes after record body")]
    TrailingBytes(usize),

    /// Frame exceeds [`crate::MAX_FRAME_SIZE`]
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Attribute value nested deeper than [`crate::MAX_VALUE_DEPTH`]
    #[error("attribute value nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// Event frame with no bytes at all
    #[error("empty event frame")]
    EmptyEventFrame,
}
