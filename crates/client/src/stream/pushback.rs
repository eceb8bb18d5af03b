//! A stream wrapper with an `unread` operation.
//!
//! Bytes handed back through [`PushbackStream::unread`] are returned again by
//! the next reads, either by seeking the underlying stream backwards (when it
//! was wrapped with [`PushbackStream::seekable`]) or by replaying them from a
//! FIFO buffer.

use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::connection::ResponseSource;
use crate::stream::BodyStream;

type Rewind<R> = fn(&mut R, u64) -> io::Result<u64>;

/// A reader that can push consumed bytes back. Not thread safe.
pub struct PushbackStream<R> {
    inner: R,
    buffer: BytesMut,
    position: u64,
    rewind: Option<Rewind<R>>,
}

impl<R: Read> PushbackStream<R> {
    /// Wraps a stream, replaying unread bytes from an internal buffer.
    pub fn new(inner: R) -> Self {
        Self { inner, buffer: BytesMut::new(), position: 0, rewind: None }
    }

    /// Number of bytes read so far, less any bytes pushed back.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Bytes waiting in the replay buffer, not counting the underlying stream.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Pushes bytes back so the next reads return them again.
    ///
    /// `bytes` must be the data returned by the matching read, in order.
    pub fn unread(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        match self.rewind {
            Some(rewind) => {
                self.position = rewind(&mut self.inner, bytes.len() as u64)?;
            }
            None => {
                // bytes pushed back later must be replayed before those pushed back earlier
                let mut replay = BytesMut::with_capacity(bytes.len() + self.buffer.len());
                replay.extend_from_slice(bytes);
                replay.extend_from_slice(&self.buffer);
                self.buffer = replay;
                self.position = self.position.saturating_sub(bytes.len() as u64);
            }
        }
        trace!(len = bytes.len(), "unread bytes");
        Ok(())
    }

    /// Pushes back a single byte.
    pub fn unread_byte(&mut self, byte: u8) -> io::Result<()> {
        self.unread(&[byte])
    }

    /// Reads one byte, `None` at end of stream.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Returns the wrapped stream. Bytes still waiting in the replay buffer are dropped.
    pub fn into_inner(self) -> R {
        if !self.buffer.is_empty() {
            trace!(len = self.buffer.len(), "discarding pushed back bytes");
        }
        self.inner
    }
}

impl<R: Read + Seek> PushbackStream<R> {
    /// Wraps a seekable stream; `unread` seeks backwards instead of buffering.
    pub fn seekable(mut inner: R) -> io::Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self { inner, buffer: BytesMut::new(), position, rewind: Some(rewind_by::<R>) })
    }
}

fn rewind_by<R: Seek>(inner: &mut R, len: u64) -> io::Result<u64> {
    let offset = i64::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "unread length overflow"))?;
    inner.seek(SeekFrom::Current(-offset))
}

impl<R: Read> Read for PushbackStream<R> {
    /// Replays pushed back bytes first; only reads the underlying stream once they are gone.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let len = if self.buffer.is_empty() {
            self.inner.read(buf)?
        } else {
            let len = buf.len().min(self.buffer.len());
            buf[..len].copy_from_slice(&self.buffer[..len]);
            self.buffer.advance(len);
            len
        };

        self.position += len as u64;
        Ok(len)
    }
}

/// Writes pass straight through; they do not touch the replay buffer.
impl<R: Read + Write> Write for PushbackStream<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<R: Read> BodyStream for PushbackStream<R> {}

impl<R: ResponseSource> ResponseSource for PushbackStream<R> {
    fn reset_counts(&mut self) {
        self.inner.reset_counts();
    }
}

impl<R> std::fmt::Debug for PushbackStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushbackStream")
            .field("position", &self.position)
            .field("pending", &self.buffer.len())
            .field("seekable", &self.rewind.is_some())
            .finish_non_exhaustive()
    }
}
