//! Length-prefixed framing with fixed-width binary prefixes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::FramingError;
use crate::pump::{Emission, Pump};

/// Width of the big-endian unsigned length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixWidth {
    /// One-byte prefix; items up to 255 bytes.
    U8,
    /// Two-byte prefix; items up to 64 KiB - 1.
    U16,
    /// Four-byte prefix; items up to 4 GiB - 1.
    U32,
}

impl PrefixWidth {
    /// Size of the prefix in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// Largest item length this width can express.
    pub const fn max_length(self) -> usize {
        match self {
            Self::U8 => u8::MAX as usize,
            Self::U16 => u16::MAX as usize,
            Self::U32 => u32::MAX as usize,
        }
    }

    fn decode(self, data: &[u8]) -> usize {
        let mut data = data;
        match self {
            Self::U8 => usize::from(data.get_u8()),
            Self::U16 => usize::from(data.get_u16()),
            Self::U32 => data.get_u32() as usize,
        }
    }

    fn encode(self, length: usize, out: &mut BytesMut) {
        match self {
            Self::U8 => out.put_u8(length as u8),
            Self::U16 => out.put_u16(length as u16),
            Self::U32 => out.put_u32(length as u32),
        }
    }
}

/// Decode a raw byte stream of length-prefixed items.
///
/// Like the other framing decoders this is incremental: prefixes and
/// payloads may arrive split across chunks, and one chunk may carry many
/// complete items.
pub struct PrefixDecoder {
    width: PrefixWidth,
    buffer: BytesMut,
}

/// Create a [`PrefixDecoder`] for the given width.
pub fn packed_prefix_to_strings(width: PrefixWidth) -> PrefixDecoder {
    PrefixDecoder::new(width)
}

/// Create a [`PrefixEncoder`] for the given width.
pub fn strings_to_packed_prefix(width: PrefixWidth) -> PrefixEncoder {
    PrefixEncoder::new(width)
}

impl PrefixDecoder {
    /// Create a decoder.
    pub fn new(width: PrefixWidth) -> Self {
        Self {
            width,
            buffer: BytesMut::new(),
        }
    }
}

impl Pump for PrefixDecoder {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        self.buffer.extend_from_slice(&item);
        let prefix = self.width.size();
        let mut items = Vec::new();
        loop {
            if self.buffer.len() < prefix {
                break;
            }
            let length = self.width.decode(&self.buffer[..prefix]);
            if self.buffer.len() < prefix + length {
                break;
            }
            self.buffer.advance(prefix);
            items.push(self.buffer.split_to(length).freeze());
        }
        items.into()
    }

    fn name(&self) -> &str {
        "packed-prefix-to-strings"
    }
}

/// Encode items with a fixed-width length prefix.
///
/// An item longer than the prefix can express faults the flow with
/// [`FramingError::PrefixOverflow`].
pub struct PrefixEncoder {
    width: PrefixWidth,
}

impl PrefixEncoder {
    /// Create an encoder.
    pub fn new(width: PrefixWidth) -> Self {
        Self { width }
    }
}

impl Pump for PrefixEncoder {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        if item.len() > self.width.max_length() {
            return Emission::fault(FramingError::PrefixOverflow {
                length: item.len(),
                width: self.width,
            });
        }
        let mut framed = BytesMut::with_capacity(self.width.size() + item.len());
        self.width.encode(item.len(), &mut framed);
        framed.extend_from_slice(&item);
        Emission::single(framed.freeze())
    }

    fn name(&self) -> &str {
        "strings-to-packed-prefix"
    }
}
