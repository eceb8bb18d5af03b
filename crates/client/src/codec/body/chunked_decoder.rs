//! Decoder for HTTP chunked transfer encoding over a blocking stream.
//!
//! Each chunk is a hex length line followed by that many bytes and a line
//! terminator; a zero length ends the body. Terminators are read tolerantly:
//! CRLF, LFCR, CRCR, LFLF, a lone CR and a lone LF are all accepted, since
//! real servers emit every one of them. Chunk extensions and trailers are not
//! supported.

use std::io;
use std::io::Read;

use tracing::{trace, warn};

use crate::protocol::HttpError;
use crate::stream::{BodyStream, Completion, PushbackStream};
use ChunkedState::*;

/// Exposes the de-chunked bytes of a chunked body as a plain stream.
///
/// Chunk data is read straight from the source into the caller's buffer, so
/// memory use does not depend on the chunk sizes the server declares. The
/// decoder is self-terminating: it reports [`Completion::Done`] once the
/// terminal chunk is consumed.
#[derive(Debug)]
pub struct ChunkedDecoder<S> {
    source: PushbackStream<S>,
    state: ChunkedState,
    remaining_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Skip an optional second terminator byte after the size
    SizeEnd,
    /// Copy chunk data
    Body,
    /// Read the terminator after chunk data
    BodyEnd,
    /// Skip an optional second terminator byte after chunk data
    BodyEndSecond,
    /// Terminal chunk consumed
    Complete,
}

impl<S: Read> ChunkedDecoder<S> {
    pub fn new(source: PushbackStream<S>) -> Self {
        Self { source, state: Size, remaining_size: 0 }
    }

    pub fn get_ref(&self) -> &PushbackStream<S> {
        &self.source
    }

    /// Returns the source stream, positioned wherever decoding stopped.
    pub fn into_inner(self) -> PushbackStream<S> {
        self.source
    }

    /// Advances through framing; chunk data is handled by [`Self::read_body`].
    fn step(&mut self) -> Result<ChunkedState, HttpError> {
        match self.state {
            Size => self.read_size(),
            SizeEnd => self.read_size_end(),
            BodyEnd => self.read_body_end(),
            BodyEndSecond => self.read_body_end_second(),
            Body | Complete => Ok(self.state),
        }
    }

    /// Accumulates hex digits until a line terminator.
    ///
    /// A zero size completes the body straight away, without waiting for
    /// anything that may follow it. The end of the stream also completes it.
    fn read_size(&mut self) -> Result<ChunkedState, HttpError> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Err(HttpError::invalid_chunk("invalid overflow chunked length")),
                }
            };
        }

        let radix = 16;
        let digit = match self.source.read_byte()? {
            None => {
                warn!(pending_size = self.remaining_size, "stream ended before terminal chunk");
                return Ok(Complete);
            }
            Some(b @ b'0'..=b'9') => b - b'0',
            Some(b @ b'a'..=b'f') => b + 10 - b'a',
            Some(b @ b'A'..=b'F') => b + 10 - b'A',
            Some(b'\r' | b'\n') if self.remaining_size == 0 => {
                trace!("finished reading chunked data");
                return Ok(Complete);
            }
            Some(b'\r' | b'\n') => return Ok(SizeEnd),
            Some(b) => {
                return Err(HttpError::invalid_chunk(format!("invalid chunk size line: unexpected byte {b:#04x}")));
            }
        };

        self.remaining_size = or_overflow!(self.remaining_size.checked_mul(radix));
        self.remaining_size = or_overflow!(self.remaining_size.checked_add(digit as u64));
        Ok(Size)
    }

    fn read_size_end(&mut self) -> Result<ChunkedState, HttpError> {
        self.skip_second_terminator()?;
        Ok(Body)
    }

    /// Reads at most the rest of the current chunk into `buf`.
    ///
    /// The chunk size counts down with every read, so a read that fails
    /// with a timeout leaves the decoder resumable.
    fn read_body(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        let len = usize::try_from(self.remaining_size).map_or(buf.len(), |remaining| remaining.min(buf.len()));
        let n = self.source.read(&mut buf[..len])?;
        if n == 0 {
            return Err(HttpError::invalid_chunk(format!(
                "stream ended inside chunk, {} bytes missing",
                self.remaining_size
            )));
        }

        self.remaining_size -= n as u64;
        trace!(len = n, remaining = self.remaining_size, "read chunked bytes");
        if self.remaining_size == 0 {
            self.state = BodyEnd;
        }
        Ok(n)
    }

    fn read_body_end(&mut self) -> Result<ChunkedState, HttpError> {
        match self.source.read_byte()? {
            Some(b'\r' | b'\n') => Ok(BodyEndSecond),
            Some(b) => {
                warn!(byte = b, "chunk data not followed by a line terminator");
                self.source.unread_byte(b)?;
                Ok(Size)
            }
            None => {
                warn!("stream ended before terminal chunk");
                Ok(Complete)
            }
        }
    }

    fn read_body_end_second(&mut self) -> Result<ChunkedState, HttpError> {
        self.skip_second_terminator()?;
        Ok(Size)
    }

    /// Consumes a terminator byte if one comes next, otherwise leaves the stream untouched.
    fn skip_second_terminator(&mut self) -> io::Result<()> {
        match self.source.read_byte()? {
            Some(b'\r' | b'\n') | None => Ok(()),
            Some(b) => self.source.unread_byte(b),
        }
    }
}

impl<S: Read> Read for ChunkedDecoder<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.state {
                Complete => return Ok(0),
                Body => return self.read_body(buf).map_err(io::Error::from),
                _ => self.state = self.step().map_err(io::Error::from)?,
            }
        }
    }
}

impl<S: Read> BodyStream for ChunkedDecoder<S> {
    fn completion(&self) -> Completion {
        if self.state == Complete { Completion::Done } else { Completion::Pending }
    }
}
