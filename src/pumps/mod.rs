//! Ready-made pumps.
//!
//! The framing pumps convert a raw segment stream into discrete
//! application-level items and back:
//!
//! - [`lines`]: delimiter-based line framing (default CRLF)
//! - [`netstring`]: `<length>:<data>,` framing
//! - [`prefixed`]: fixed-width binary length prefixes (8/16/32-bit)
//!
//! Each decoder buffers partial input across `received` calls and may emit
//! zero, one or many items per call. Malformed input is a terminal
//! [`fault`](crate::pump::Emission::fault): everything parsed before the bad
//! region is still delivered, then the flow stops with a [`FramingError`].

pub mod lines;
pub mod netstring;
pub mod passthrough;
pub mod prefixed;

pub use lines::{bytes_to_lines, lines_to_bytes, LineJoiner, LineSplitter};
pub use netstring::{netstrings_to_strings, strings_to_netstrings, NetstringDecoder, NetstringEncoder};
pub use passthrough::PassThrough;
pub use prefixed::{packed_prefix_to_strings, strings_to_packed_prefix, PrefixDecoder, PrefixEncoder, PrefixWidth};

use thiserror::Error;

/// Data errors raised by the framing pumps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// A netstring declared a length beyond the decoder's limit.
    #[error("netstring length {length} exceeds the limit of {limit} bytes")]
    TooLong {
        /// The declared payload length.
        length: usize,
        /// The decoder's configured limit.
        limit: usize,
    },

    /// A netstring length field contained something other than digits.
    #[error("expected a digit in netstring length, got byte {byte:#04x}")]
    BadLength {
        /// The offending byte.
        byte: u8,
    },

    /// A netstring payload was not followed by the `,` trailer.
    #[error("expected ',' after netstring payload, got byte {byte:#04x}")]
    MissingTrailer {
        /// The offending byte.
        byte: u8,
    },

    /// An item is too large for the configured length-prefix width.
    #[error("item of {length} bytes does not fit in a {width:?} length prefix")]
    PrefixOverflow {
        /// The item length.
        length: usize,
        /// The configured prefix width.
        width: PrefixWidth,
    },
}
