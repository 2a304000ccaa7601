//! Error types for the protocol layer.
//!
//! Each crate in duetnet defines its own error enum. A `ProtocolError`
//! always means the bytes themselves were wrong (or the value could not be
//! written), never that a socket or a peer misbehaved.

/// Errors that can occur while encoding or decoding a message.
///
/// The first four variants are "framing" errors: the datagram being decoded
/// is unusable and must be dropped. The caller decides whether to log and
/// continue (the network pump does) or to propagate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer ended before the value being read was complete.
    ///
    /// Decoding never zero-fills: a short buffer is always this error.
    #[error("truncated frame: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A concrete message was asked to decode a frame carrying a
    /// different tag.
    #[error("tag mismatch: expected {expected}, found {found}")]
    TagMismatch { expected: u16, found: u16 },

    /// A string length prefix was negative.
    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    /// A Group declared a negative member count.
    #[error("negative group member count: {0}")]
    NegativeCount(i32),

    /// The tag does not name any known message kind.
    ///
    /// The top-level pump ignores these; inside a Group they are fatal
    /// because the unknown member's size cannot be known.
    #[error("unknown message tag {0}")]
    UnknownTag(u16),

    /// Text contained a character outside the single-byte (ASCII) range.
    #[error("non-ASCII text cannot be encoded: {0:?}")]
    NonAscii(String),

    /// An enumeration byte did not match any known variant.
    #[error("invalid {kind} value {value}")]
    InvalidEnum { kind: &'static str, value: u8 },

    /// A string is longer than the wire accepts.
    #[error("text of {len} bytes exceeds the {max} byte limit")]
    TextTooLong { len: usize, max: usize },

    /// Groups were nested deeper than the wire accepts.
    #[error("groups nested deeper than {0}")]
    NestingTooDeep(usize),

    /// A length or count does not fit in the wire's 32-bit signed field.
    #[error("{0} bytes exceed the wire length limit")]
    TooLong(usize),
}
