//! Gzip and deflate body decoding with a reliable end-of-stream signal.
//!
//! A decompressing reader that returns 0 bytes cannot tell "nothing yet" from
//! "finished". [`Inflate`] drives [`flate2::Decompress`] itself, so it knows
//! when the final block has been inflated, and for gzip when the CRC32/ISIZE
//! trailer has been checked. Only then does it report [`Completion::Done`].

use std::io;
use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use flate2::{Crc, Decompress, FlushDecompress, Status};
use tracing::{debug, trace};

use crate::protocol::HttpError;
use crate::stream::{BodyStream, Completion, PushbackStream};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_FIXED_HEADER: usize = 10;
const GZIP_TRAILER: usize = 8;
const INPUT_CHUNK: usize = 8 * 1024;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const FRESERVED: u8 = 0xe0;

/// A compression scheme named by `Content-Encoding`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Maps a header value to a scheme; `None` for an identity encoding.
    pub fn from_header(value: &str) -> Result<Option<Self>, HttpError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Ok(None)
        } else if value.eq_ignore_ascii_case("gzip") || value.eq_ignore_ascii_case("x-gzip") {
            Ok(Some(Self::Gzip))
        } else if value.eq_ignore_ascii_case("deflate") {
            Ok(Some(Self::Deflate))
        } else {
            Err(HttpError::unsupported_encoding(value))
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum InflateState {
    /// Peek the first bytes to pick a decoder
    Sniff,
    /// Gzip member header
    GzipHeader,
    /// Compressed blocks
    Inflating,
    /// Gzip CRC32 and ISIZE
    GzipTrailer,
    /// Declared compressed, but the body is not
    Passthrough,
    Finished,
}

/// Decompresses a gzip or deflate body read from `source`.
pub struct Inflate<S> {
    source: PushbackStream<S>,
    encoding: ContentEncoding,
    state: InflateState,
    decompress: Decompress,
    input: BytesMut,
    scratch: Box<[u8]>,
    crc: Crc,
}

impl<S: Read> Inflate<S> {
    pub fn new(source: PushbackStream<S>, encoding: ContentEncoding) -> Self {
        Self {
            source,
            encoding,
            state: InflateState::Sniff,
            decompress: Decompress::new(false),
            input: BytesMut::with_capacity(INPUT_CHUNK),
            scratch: vec![0u8; INPUT_CHUNK].into_boxed_slice(),
            crc: Crc::new(),
        }
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    pub fn get_ref(&self) -> &PushbackStream<S> {
        &self.source
    }

    /// Returns the source stream. Compressed bytes already buffered are dropped.
    pub fn into_inner(self) -> PushbackStream<S> {
        self.source
    }

    /// Reads more compressed input; `false` at end of stream.
    fn fill(&mut self) -> io::Result<bool> {
        let n = self.source.read(&mut self.scratch)?;
        self.input.extend_from_slice(&self.scratch[..n]);
        Ok(n > 0)
    }

    /// Fills the input buffer up to `len` bytes, stopping early at end of stream.
    fn fill_to(&mut self, len: usize) -> io::Result<bool> {
        while self.input.len() < len {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn sniff(&mut self) -> io::Result<()> {
        self.fill_to(GZIP_MAGIC.len())?;
        if self.input.is_empty() {
            trace!("empty compressed body");
            self.state = InflateState::Finished;
            return Ok(());
        }

        // a fill may have pulled in far more than the magic bytes
        let peeked = self.input.split().freeze();
        self.source.unread(&peeked)?;

        self.state = match self.encoding {
            ContentEncoding::Gzip if peeked.starts_with(&GZIP_MAGIC) => InflateState::GzipHeader,
            ContentEncoding::Gzip => {
                debug!("body declared as gzip has no gzip header, passing it through");
                InflateState::Passthrough
            }
            ContentEncoding::Deflate => {
                let zlib = is_zlib_header(&peeked);
                debug!(zlib, "inflating deflate body");
                self.decompress = Decompress::new(zlib);
                InflateState::Inflating
            }
        };
        Ok(())
    }

    fn read_gzip_header(&mut self) -> io::Result<()> {
        loop {
            if let Some(len) = gzip_header_len(&self.input)? {
                self.input.advance(len);
                trace!(len, "read gzip header");
                self.state = InflateState::Inflating;
                return Ok(());
            }
            if !self.fill()? {
                return Err(truncated("gzip header"));
            }
        }
    }

    fn inflate(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let in_before = self.decompress.total_in();
            let out_before = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(&self.input, buf, FlushDecompress::None)
                .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
            let consumed = (self.decompress.total_in() - in_before) as usize;
            let produced = (self.decompress.total_out() - out_before) as usize;
            self.input.advance(consumed);

            if status == Status::StreamEnd {
                self.state = match self.encoding {
                    ContentEncoding::Gzip => InflateState::GzipTrailer,
                    ContentEncoding::Deflate => InflateState::Finished,
                };
                trace!(total_in = self.decompress.total_in(), total_out = self.decompress.total_out(), "inflated final block");
            }

            if produced > 0 {
                self.crc.update(&buf[..produced]);
                return Ok(produced);
            }
            if status == Status::StreamEnd {
                return Ok(0);
            }
            if consumed == 0 && !self.fill()? {
                return Err(truncated("compressed body"));
            }
        }
    }

    fn read_gzip_trailer(&mut self) -> io::Result<()> {
        if !self.fill_to(GZIP_TRAILER)? {
            return Err(truncated("gzip trailer"));
        }

        let crc = self.input.get_u32_le();
        let size = self.input.get_u32_le();
        if crc != self.crc.sum() || size != self.crc.amount() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("gzip trailer mismatch: crc {crc:#010x}, size {size}"),
            ));
        }

        trace!(size, "verified gzip trailer");
        self.state = InflateState::Finished;
        Ok(())
    }
}

/// Length of a complete gzip member header at the start of `buf`, `None` if more bytes are needed.
fn gzip_header_len(buf: &[u8]) -> io::Result<Option<usize>> {
    if buf.len() < GZIP_FIXED_HEADER {
        return Ok(None);
    }
    if buf[..2] != GZIP_MAGIC || buf[2] != 8 {
        return Err(io::Error::new(ErrorKind::InvalidData, "unsupported gzip compression method"));
    }

    let flags = buf[3];
    if flags & FRESERVED != 0 {
        return Err(io::Error::new(ErrorKind::InvalidData, "reserved gzip header flags set"));
    }

    let mut pos = GZIP_FIXED_HEADER;
    if flags & FEXTRA != 0 {
        let Some(len) = buf.get(pos..pos + 2) else {
            return Ok(None);
        };
        pos += 2 + u16::from_le_bytes([len[0], len[1]]) as usize;
    }
    for flag in [FNAME, FCOMMENT] {
        if flags & flag != 0 {
            let Some(end) = buf.get(pos..).and_then(|rest| rest.iter().position(|&b| b == 0)) else {
                return Ok(None);
            };
            pos += end + 1;
        }
    }
    if flags & FHCRC != 0 {
        pos += 2;
    }

    Ok((pos <= buf.len()).then_some(pos))
}

/// RFC 1950 header check: deflate method and a valid FCHECK.
fn is_zlib_header(peeked: &[u8]) -> bool {
    match peeked {
        [cmf, flg, ..] => cmf & 0x0f == 8 && cmf >> 4 <= 7 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0,
        _ => false,
    }
}

fn truncated(what: &str) -> io::Error {
    io::Error::new(ErrorKind::UnexpectedEof, format!("truncated {what}"))
}

impl<S: Read> Read for Inflate<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.state {
                InflateState::Sniff => self.sniff()?,
                InflateState::GzipHeader => self.read_gzip_header()?,
                InflateState::Inflating => {
                    let n = self.inflate(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                }
                InflateState::GzipTrailer => self.read_gzip_trailer()?,
                InflateState::Passthrough => return self.source.read(buf),
                InflateState::Finished => return Ok(0),
            }
        }
    }
}

impl<S: BodyStream> BodyStream for Inflate<S> {
    fn completion(&self) -> Completion {
        match self.state {
            InflateState::Finished => Completion::Done,
            InflateState::Passthrough => match self.source.get_ref().completion() {
                Completion::Done if self.source.pending() > 0 => Completion::Pending,
                completion => completion,
            },
            _ => Completion::Pending,
        }
    }
}

impl<S> std::fmt::Debug for Inflate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflate")
            .field("encoding", &self.encoding)
            .field("state", &self.state)
            .field("buffered_input", &self.input.len())
            .finish_non_exhaustive()
    }
}
