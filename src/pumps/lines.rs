//! Delimiter-based line framing.

use bytes::{Buf, Bytes, BytesMut};

use crate::pump::{Emission, Pump, SwitchablePump};

const CRLF: &[u8] = b"\r\n";

/// Split a raw byte stream into delimiter-terminated lines.
///
/// Emits each line without its delimiter; a trailing partial line stays
/// buffered until its delimiter (or more bytes) arrive. One `received` call
/// can therefore produce zero, one or many lines.
///
/// Switchable: when its tube is re-pointed mid-stream, undelivered lines are
/// re-joined with the delimiter and the unconsumed partial buffer is handed
/// over verbatim, so a successor parser sees exactly the bytes this one
/// never consumed.
///
/// ```rust
/// use bytes::Bytes;
/// use siphon::pump::{Emitted, Pump};
/// use siphon::pumps::bytes_to_lines;
///
/// let mut splitter = bytes_to_lines();
/// let lines: Vec<Bytes> = splitter
///     .received(Bytes::from("one\r\ntwo\r\npartial"))
///     .filter_map(|e| match e {
///         Emitted::Item(line) => Some(line),
///         _ => None,
///     })
///     .collect();
/// assert_eq!(lines, vec![Bytes::from("one"), Bytes::from("two")]);
/// ```
pub struct LineSplitter {
    delimiter: Bytes,
    buffer: BytesMut,
}

/// Create a [`LineSplitter`] with the default CRLF delimiter.
pub fn bytes_to_lines() -> LineSplitter {
    LineSplitter::new()
}

/// Create a [`LineJoiner`] with the default CRLF delimiter.
pub fn lines_to_bytes() -> LineJoiner {
    LineJoiner::new()
}

impl LineSplitter {
    /// Create a splitter using CRLF.
    pub fn new() -> Self {
        Self::with_delimiter(Bytes::from_static(CRLF))
    }

    /// Create a splitter using a custom delimiter.
    ///
    /// The delimiter must not be empty.
    pub fn with_delimiter(delimiter: impl Into<Bytes>) -> Self {
        let delimiter = delimiter.into();
        assert!(!delimiter.is_empty(), "line delimiter must not be empty");
        Self {
            delimiter,
            buffer: BytesMut::new(),
        }
    }

    fn next_delimiter(&self) -> Option<usize> {
        self.buffer
            .windows(self.delimiter.len())
            .position(|window| window == &self.delimiter[..])
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Pump for LineSplitter {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        self.buffer.extend_from_slice(&item);
        let mut lines = Vec::new();
        while let Some(position) = self.next_delimiter() {
            let line = self.buffer.split_to(position).freeze();
            self.buffer.advance(self.delimiter.len());
            lines.push(line);
        }
        lines.into()
    }

    fn name(&self) -> &str {
        "bytes-to-lines"
    }
}

impl SwitchablePump for LineSplitter {
    fn reassemble(&mut self, data: Vec<Bytes>) -> Vec<Bytes> {
        let mut out: Vec<Bytes> = data
            .into_iter()
            .map(|line| {
                let mut joined = BytesMut::with_capacity(line.len() + self.delimiter.len());
                joined.extend_from_slice(&line);
                joined.extend_from_slice(&self.delimiter);
                joined.freeze()
            })
            .collect();
        if !self.buffer.is_empty() {
            out.push(self.buffer.split().freeze());
        }
        out
    }
}

/// Join discrete line items back into a delimited byte stream.
pub struct LineJoiner {
    delimiter: Bytes,
}

impl LineJoiner {
    /// Create a joiner using CRLF.
    pub fn new() -> Self {
        Self {
            delimiter: Bytes::from_static(CRLF),
        }
    }

    /// Create a joiner using a custom delimiter.
    pub fn with_delimiter(delimiter: impl Into<Bytes>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl Default for LineJoiner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pump for LineJoiner {
    type Input = Bytes;
    type Output = Bytes;

    fn received(&mut self, item: Bytes) -> Emission<Bytes> {
        let mut framed = BytesMut::with_capacity(item.len() + self.delimiter.len());
        framed.extend_from_slice(&item);
        framed.extend_from_slice(&self.delimiter);
        Emission::single(framed.freeze())
    }

    fn name(&self) -> &str {
        "lines-to-bytes"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::Emitted;

    fn items(emission: Emission<Bytes>) -> Vec<Bytes> {
        emission
            .filter_map(|e| match e {
                Emitted::Item(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut splitter = bytes_to_lines();
        assert!(items(splitter.received(Bytes::from("hel"))).is_empty());
        assert!(items(splitter.received(Bytes::from("lo\r"))).is_empty());
        assert_eq!(
            items(splitter.received(Bytes::from("\nworld\r\n"))),
            vec![Bytes::from("hello"), Bytes::from("world")]
        );
    }

    #[test]
    fn test_many_lines_per_chunk() {
        let mut splitter = bytes_to_lines();
        assert_eq!(
            items(splitter.received(Bytes::from("a\r\nb\r\nc\r\ntail"))),
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]
        );
        // The partial tail is not delivered.
        assert_eq!(items(splitter.received(Bytes::from("\r\n"))), vec![Bytes::from("tail")]);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut splitter = LineSplitter::with_delimiter(Bytes::from_static(b"\n"));
        assert_eq!(
            items(splitter.received(Bytes::from("x\ny\n"))),
            vec![Bytes::from("x"), Bytes::from("y")]
        );
    }

    #[test]
    fn test_empty_lines() {
        let mut splitter = bytes_to_lines();
        assert_eq!(
            items(splitter.received(Bytes::from("\r\n\r\n"))),
            vec![Bytes::from(""), Bytes::from("")]
        );
    }

    #[test]
    fn test_reassemble_rejoins_lines_and_partial_buffer() {
        let mut splitter = bytes_to_lines();
        // Consume input so "rest" stays buffered.
        let delivered = items(splitter.received(Bytes::from("a\r\nb\r\nrest")));
        assert_eq!(delivered.len(), 2);
        let reassembled = splitter.reassemble(vec![Bytes::from("b")]);
        assert_eq!(
            reassembled,
            vec![Bytes::from("b\r\n"), Bytes::from("rest")]
        );
    }

    #[test]
    fn test_reassemble_without_partial_buffer() {
        let mut splitter = bytes_to_lines();
        let reassembled = splitter.reassemble(vec![Bytes::from("only")]);
        assert_eq!(reassembled, vec![Bytes::from("only\r\n")]);
    }

    #[test]
    fn test_joiner_appends_delimiter() {
        let mut joiner = lines_to_bytes();
        assert_eq!(
            items(joiner.received(Bytes::from("hello"))),
            vec![Bytes::from("hello\r\n")]
        );
    }

    #[test]
    fn test_split_join_round_trip() {
        let mut joiner = lines_to_bytes();
        let mut splitter = bytes_to_lines();
        let mut restored = Vec::new();
        for line in ["alpha", "beta"] {
            for framed in items(joiner.received(Bytes::from(line))) {
                restored.extend(items(splitter.received(framed)));
            }
        }
        assert_eq!(restored, vec![Bytes::from("alpha"), Bytes::from("beta")]);
    }
}
