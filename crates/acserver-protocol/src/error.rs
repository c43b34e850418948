//! Codec error types.

use thiserror::Error;

/// Errors produced while decoding or encoding a plugin protocol datagram.
///
/// Decoding never truncates or substitutes defaults: any mismatch between the
/// datagram and the layout registered for its tag is reported here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The datagram carried no bytes at all.
    #[error("empty datagram")]
    Empty,

    /// The leading tag byte is not registered.
    #[error("unknown message tag {0}")]
    UnknownTag(u8),

    /// The datagram ended before a field could be read.
    #[error("datagram too short: need {needed} bytes at offset {offset}, total {len}")]
    Truncated {
        /// Bytes required by the field being read.
        needed: usize,
        /// Offset at which the read started.
        offset: usize,
        /// Total datagram length.
        len: usize,
    },

    /// The message decoded cleanly but bytes were left over.
    #[error("{remaining} trailing bytes after {kind} message")]
    TrailingBytes {
        /// Name of the decoded message kind.
        kind: &'static str,
        /// Number of unread bytes.
        remaining: usize,
    },

    /// A narrow string was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A wide string contained a value that is not a Unicode scalar.
    #[error("wide string contains invalid code point {0:#x}")]
    InvalidChar(u32),

    /// A string does not fit the u8 length prefix.
    #[error("string length {len} exceeds maximum {max}")]
    StringTooLong {
        /// Length of the rejected string (bytes or chars, per string kind).
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },

    /// A list does not fit its u8 count prefix.
    #[error("list of {len} entries exceeds maximum {max}")]
    TooManyEntries {
        /// Number of entries in the rejected list.
        len: usize,
        /// Maximum encodable count.
        max: usize,
    },

    /// A client-event datagram carried an event type with no known layout.
    #[error("unknown client event type {0}")]
    UnknownClientEvent(u8),
}

impl CodecError {
    /// Create a truncation error.
    #[must_use]
    pub fn truncated(needed: usize, offset: usize, len: usize) -> Self {
        Self::Truncated {
            needed,
            offset,
            len,
        }
    }

    /// Create a string-length error.
    #[must_use]
    pub fn string_too_long(len: usize, max: usize) -> Self {
        Self::StringTooLong { len, max }
    }
}

/// A specialized `Result` type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::truncated(4, 10, 12);
        assert!(err.to_string().contains("offset 10"));

        let err = CodecError::TrailingBytes {
            kind: "car_update",
            remaining: 3,
        };
        assert!(err.to_string().contains("car_update"));
    }
}
