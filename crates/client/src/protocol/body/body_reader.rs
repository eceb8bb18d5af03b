//! Reading a response body: to its declared length, until the peer goes
//! quiet, or as a plain [`std::io::Read`] stream.

use std::io;
use std::io::Read;
use std::time::Duration;

use tracing::trace;

use crate::codec::body::{Dechunked, PayloadDecoder, RawBody};
use crate::protocol::HttpError;
use crate::stream::{BodyStream, Completion, DEFAULT_BUFFER_SIZE, Progress, copy_to_length, copy_until_idle};

/// The decoded body of a response.
///
/// `expected_length` starts as the declared `Content-Length` (0 when absent
/// or chunked) and is replaced by the number of bytes actually copied after a
/// `*_to_length` read, since servers often declare the wrong length. Both it
/// and [`BodyReader::is_complete`] are best effort.
///
/// The reader owns the decode pipeline and, through it, the connection.
/// [`BodyReader::close`] releases them; dropping the reader does the same.
pub struct BodyReader<S: Read> {
    decoder: Option<PayloadDecoder<S>>,
    expected_length: u64,
    declared_length: Option<u64>,
    read_so_far: u64,
    timeout: Duration,
}

impl<S: Read> BodyReader<S> {
    pub fn new(decoder: PayloadDecoder<S>, expected_length: u64, declared_length: Option<u64>, timeout: Duration) -> Self {
        Self { decoder: Some(decoder), expected_length, declared_length, read_so_far: 0, timeout }
    }

    pub fn expected_length(&self) -> u64 {
        self.expected_length
    }

    /// The `Content-Length` the server sent; `None` when absent or the body is chunked.
    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }

    pub fn read_so_far(&self) -> u64 {
        self.read_so_far
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn is_closed(&self) -> bool {
        self.decoder.is_none()
    }

    /// Reads until the expected length, or until a self-terminating body ends.
    pub fn read_bytes_to_length(&mut self, progress: Progress<'_>) -> Result<Vec<u8>, HttpError> {
        let remaining = self.remaining();
        let mut out = Vec::with_capacity(remaining.min(DEFAULT_BUFFER_SIZE as u64) as usize);
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(out);
        };

        let copied = copy_to_length(decoder, &mut out, remaining, self.timeout, progress)?;
        self.read_so_far += copied;
        trace!(copied, expected = self.expected_length, "read body to length");
        self.expected_length = self.read_so_far;
        Ok(out)
    }

    /// [`BodyReader::read_bytes_to_length`], decoded as UTF-8 with invalid sequences replaced.
    pub fn read_string_to_length(&mut self, progress: Progress<'_>) -> Result<String, HttpError> {
        let bytes = self.read_bytes_to_length(progress)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads until the body ends or no data arrives for the timeout.
    pub fn read_bytes_to_timeout(&mut self, progress: Progress<'_>) -> Result<Vec<u8>, HttpError> {
        let mut out = Vec::new();
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(out);
        };

        let copied = copy_until_idle(decoder, &mut out, self.timeout, progress)?;
        self.read_so_far += copied;
        trace!(copied, "read body to timeout");
        Ok(out)
    }

    pub fn read_string_to_timeout(&mut self, progress: Progress<'_>) -> Result<String, HttpError> {
        let bytes = self.read_bytes_to_timeout(progress)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Whether the whole body has been read, as far as can be told.
    ///
    /// A self-terminating body (chunked or compressed) answers for itself;
    /// otherwise the body is complete once the expected length has been read.
    pub fn is_complete(&self) -> bool {
        match self.decoder.as_ref().map(|decoder| decoder.completion()) {
            None => true,
            Some(Completion::Unknown) => self.read_so_far >= self.expected_length,
            Some(completion) => completion.is_done(),
        }
    }

    /// Releases the decode pipeline and the connection. Later calls do nothing.
    pub fn close(&mut self) {
        if self.decoder.is_some() {
            trace!(read_so_far = self.read_so_far, complete = self.is_complete(), "closing body");
            self.decoder = None;
        }
    }

    /// Unwinds the pipeline to the undecoded body stream, `None` once closed.
    pub fn into_raw(mut self) -> Option<RawBody<S>> {
        self.decoder.take().map(PayloadDecoder::into_raw)
    }

    /// Unwinds the pipeline to the body with transfer framing removed but
    /// content encoding kept, `None` once closed.
    pub fn into_dechunked(mut self) -> Option<Dechunked<S>> {
        self.decoder.take().map(PayloadDecoder::into_dechunked)
    }

    fn remaining(&self) -> u64 {
        self.expected_length.saturating_sub(self.read_so_far)
    }
}

/// Passes reads through for manual streaming; a closed body reads as empty.
impl<S: Read> Read for BodyReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(0);
        };
        let n = decoder.read(buf)?;
        self.read_so_far += n as u64;
        Ok(n)
    }
}

impl<S: Read> BodyStream for BodyReader<S> {
    fn completion(&self) -> Completion {
        self.decoder.as_ref().map_or(Completion::Done, |decoder| decoder.completion())
    }
}

impl<S: Read> Drop for BodyReader<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Read> std::fmt::Debug for BodyReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyReader")
            .field("expected_length", &self.expected_length)
            .field("declared_length", &self.declared_length)
            .field("read_so_far", &self.read_so_far)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
