//! Chunked transfer encoding for request bodies of unknown length.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use tracing::trace;

/// Frames every write as one chunk on the wrapped writer.
///
/// [`ChunkedEncoder::finish`] writes the terminal chunk. An encoder dropped
/// without it leaves the body unterminated.
#[derive(Debug)]
pub struct ChunkedEncoder<W> {
    inner: W,
    frame: BytesMut,
    sent: u64,
}

impl<W: Write> ChunkedEncoder<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, frame: BytesMut::new(), sent: 0 }
    }

    /// Ends the body and returns the wrapped writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.write_all(b"0\r\n\r\n")?;
        trace!(sent = self.sent, "finished chunked body");
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkedEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // an empty chunk would end the body
        if buf.is_empty() {
            return Ok(0);
        }

        self.frame.clear();
        self.frame.reserve(buf.len() + 20);
        write!(helper::Writer(&mut self.frame), "{:X}\r\n", buf.len())?;
        self.frame.put_slice(buf);
        self.frame.put_slice(b"\r\n");
        self.inner.write_all(&self.frame)?;

        self.sent += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

mod helper {
    use bytes::{BufMut, BytesMut};
    use std::io;

    pub struct Writer<'a>(pub &'a mut BytesMut);

    impl io::Write for Writer<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.put_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::body::ChunkedDecoder;
    use crate::stream::PushbackStream;
    use std::io::{Cursor, Read};

    #[test]
    fn frames_each_write_as_a_chunk() {
        let mut encoder = ChunkedEncoder::new(Vec::new());
        encoder.write_all(b"hello").unwrap();
        encoder.write_all(&[b'x'; 26]).unwrap();
        encoder.write_all(b"").unwrap();

        let wire = encoder.finish().unwrap();
        let expected = format!("5\r\nhello\r\n1A\r\n{}\r\n0\r\n\r\n", "x".repeat(26));
        assert_eq!(String::from_utf8(wire).unwrap(), expected);
    }

    #[test]
    fn empty_body_is_only_the_terminal_chunk() {
        let wire = ChunkedEncoder::new(Vec::new()).finish().unwrap();
        assert_eq!(wire, b"0\r\n\r\n");
    }

    #[test]
    fn decoder_reads_back_what_was_framed() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 241) as u8).collect();
        let mut encoder = ChunkedEncoder::new(Vec::new());
        for piece in data.chunks(700) {
            encoder.write_all(piece).unwrap();
        }
        let wire = encoder.finish().unwrap();

        let mut decoder = ChunkedDecoder::new(PushbackStream::new(Cursor::new(wire)));
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
