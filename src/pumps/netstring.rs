//! Netstring framing: `<decimal-length>:<bytes>,`.

use bytes::{Bytes, BytesMut};

use super::FramingError;
use crate::pump::{Emission, Pump};

/// Default cap on a declared netstring length, matching the classic
/// receiver limit.
pub const DEFAULT_MAX_LENGTH: usize = 99_999;

#[derive(Clone, Copy)]
enum State {
    /// Parsing the decimal length field.
    Length { value: usize, seen_digit: bool },
    /// Collecting payload bytes.
    Payload { remaining: usize },
    /// Expecting the `,` trailer.
    Trailer,
    /// A fault was emitted; all further input is ignored.
    Failed,
}

/// Decode a raw byte stream into netstring payloads.
///
/// Incremental: a netstring may arrive split across any number of chunks,
/// and one chunk may carry any number of netstrings. Anything malformed
/// (a non-digit in the length, a missing `,` trailer, a length beyond the
/// configured cap) delivers the items parsed so far and then faults the
/// flow with a [`FramingError`].
///
/// ```rust
/// use bytes::Bytes;
/// use siphon::pump::{Emitted, Pump};
/// use siphon::pumps::netstrings_to_strings;
///
/// let mut decoder = netstrings_to_strings();
/// let out: Vec<Bytes> = decoder
///     .received(Bytes::from("5:hello,5:world,"))
///     .filter_map(|e| match e {
///         Emitted::Item(item) => Some(item),
///         _ => None,
///     })
///     .collect();
/// assert_eq!(out, vec![Bytes::from("hello"), Bytes::from("world")]);
/// ```
pub struct NetstringDecoder {
    state: State,
    partial: BytesMut,
    max_length: usize,
}

/// Create a [`NetstringDecoder`] with the default length cap.
pub fn netstrings_to_strings() -> NetstringDecoder {
    NetstringDecoder::new()
}

/// Create a [`NetstringEncoder`].
pub fn strings_to_netstrings() -> NetstringEncoder {
    NetstringEncoder::new()
}

impl NetstringDecoder {
    /// Create a decoder capped at [`DEFAULT_MAX_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LENGTH)
    }

    /// Create a decoder with a custom cap on the declared payload length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            state: State::Length {
                value: 0,
                seen_digit: false,
            },
            partial: BytesMut::new(),
            max_length,
        }
    }
}

impl Default for NetstringDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pump for NetstringDecoder {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        if matches!(self.state, State::Failed) {
            return Emission::none();
        }
        let mut items = Vec::new();
        let data = &item[..];
        let mut i = 0;
        while i < data.len() {
            match self.state {
                State::Length { value, seen_digit } => {
                    let byte = data[i];
                    i += 1;
                    match byte {
                        b'0'..=b'9' => {
                            let length = value * 10 + usize::from(byte - b'0');
                            if length > self.max_length {
                                self.state = State::Failed;
                                return Emission::from(items).and_fault(FramingError::TooLong {
                                    length,
                                    limit: self.max_length,
                                });
                            }
                            self.state = State::Length {
                                value: length,
                                seen_digit: true,
                            };
                        }
                        b':' if seen_digit => {
                            self.partial = BytesMut::with_capacity(value);
                            self.state = if value == 0 {
                                State::Trailer
                            } else {
                                State::Payload { remaining: value }
                            };
                        }
                        _ => {
                            self.state = State::Failed;
                            return Emission::from(items)
                                .and_fault(FramingError::BadLength { byte });
                        }
                    }
                }
                State::Payload { remaining } => {
                    let take = remaining.min(data.len() - i);
                    self.partial.extend_from_slice(&data[i..i + take]);
                    i += take;
                    self.state = if remaining == take {
                        State::Trailer
                    } else {
                        State::Payload {
                            remaining: remaining - take,
                        }
                    };
                }
                State::Trailer => {
                    let byte = data[i];
                    i += 1;
                    if byte == b',' {
                        items.push(self.partial.split().freeze());
                        self.state = State::Length {
                            value: 0,
                            seen_digit: false,
                        };
                    } else {
                        self.state = State::Failed;
                        return Emission::from(items)
                            .and_fault(FramingError::MissingTrailer { byte });
                    }
                }
                State::Failed => return Emission::from(items),
            }
        }
        items.into()
    }

    fn name(&self) -> &str {
        "netstrings-to-strings"
    }
}

/// Encode payloads as netstrings.
pub struct NetstringEncoder;

impl NetstringEncoder {
    /// Create an encoder.
    pub fn new() -> Self {
        Self
    }
}

impl Default for NetstringEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pump for NetstringEncoder {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        let header = format!("{}:", item.len());
        let mut framed = BytesMut::with_capacity(header.len() + item.len() + 1);
        framed.extend_from_slice(header.as_bytes());
        framed.extend_from_slice(&item);
        framed.extend_from_slice(b",");
        Emission::single(framed.freeze())
    }

    fn name(&self) -> &str {
        "strings-to-netstrings"
    }
}
