//! The response body pipeline.
//!
//! Raw connection bytes pass through an optional [`ChunkedDecoder`] and then an
//! optional [`Inflate`]; whatever comes out is the decoded payload. Each stage
//! keeps ownership of the one below it, so dropping the pipeline releases the
//! connection, and [`PayloadDecoder::into_raw`] can unwind it back to the
//! undecoded stream.

use std::io;
use std::io::Read;

use tracing::debug;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::inflate::{ContentEncoding, Inflate};
use crate::stream::{BodyStream, Completion, PushbackStream};

/// The raw body of a response: the connection behind its lookahead wrapper.
pub type RawBody<S> = PushbackStream<S>;

/// Removes transfer framing, if any.
#[derive(Debug)]
pub enum Dechunked<S> {
    Chunked(ChunkedDecoder<S>),
    Plain(RawBody<S>),
}

impl<S: Read> Dechunked<S> {
    pub fn into_inner(self) -> RawBody<S> {
        match self {
            Dechunked::Chunked(decoder) => decoder.into_inner(),
            Dechunked::Plain(raw) => raw,
        }
    }
}

impl<S: Read> Read for Dechunked<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Dechunked::Chunked(decoder) => decoder.read(buf),
            Dechunked::Plain(raw) => raw.read(buf),
        }
    }
}

impl<S: Read> BodyStream for Dechunked<S> {
    fn completion(&self) -> Completion {
        match self {
            Dechunked::Chunked(decoder) => decoder.completion(),
            Dechunked::Plain(raw) => raw.completion(),
        }
    }
}

/// Decodes a response payload: dechunk, then decompress.
#[derive(Debug)]
pub struct PayloadDecoder<S> {
    kind: Kind<S>,
}

#[derive(Debug)]
enum Kind<S> {
    /// No content encoding
    Plain(Dechunked<S>),
    /// Gzip or deflate over the dechunked bytes
    Compressed(Inflate<Dechunked<S>>),
}

impl<S: Read> PayloadDecoder<S> {
    pub fn new(raw: RawBody<S>, chunked: bool, encoding: Option<ContentEncoding>) -> Self {
        debug!(chunked, ?encoding, "building body pipeline");

        let dechunked = if chunked { Dechunked::Chunked(ChunkedDecoder::new(raw)) } else { Dechunked::Plain(raw) };

        let kind = match encoding {
            Some(encoding) => Kind::Compressed(Inflate::new(PushbackStream::new(dechunked), encoding)),
            None => Kind::Plain(dechunked),
        };
        Self { kind }
    }

    /// A pipeline that hands the raw stream through unchanged.
    pub fn plain(raw: RawBody<S>) -> Self {
        Self { kind: Kind::Plain(Dechunked::Plain(raw)) }
    }

    pub fn is_chunked(&self) -> bool {
        match &self.kind {
            Kind::Plain(dechunked) => matches!(dechunked, Dechunked::Chunked(_)),
            Kind::Compressed(inflate) => matches!(inflate.get_ref().get_ref(), Dechunked::Chunked(_)),
        }
    }

    pub fn encoding(&self) -> Option<ContentEncoding> {
        match &self.kind {
            Kind::Plain(_) => None,
            Kind::Compressed(inflate) => Some(inflate.encoding()),
        }
    }

    /// Drops the decompression stage, keeping only the transfer framing removal.
    ///
    /// The result is the body as the server encoded it, with its content
    /// encoding intact.
    pub fn into_dechunked(self) -> Dechunked<S> {
        match self.kind {
            Kind::Plain(dechunked) => dechunked,
            Kind::Compressed(inflate) => inflate.into_inner().into_inner(),
        }
    }

    /// Unwinds the pipeline to the undecoded body stream.
    ///
    /// Bytes already pulled into a decoder stage are lost, so this is only
    /// meaningful before the payload has been read.
    pub fn into_raw(self) -> RawBody<S> {
        match self.kind {
            Kind::Plain(dechunked) => dechunked.into_inner(),
            Kind::Compressed(inflate) => inflate.into_inner().into_inner().into_inner(),
        }
    }
}

impl<S: Read> Read for PayloadDecoder<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.kind {
            Kind::Plain(dechunked) => dechunked.read(buf),
            Kind::Compressed(inflate) => inflate.read(buf),
        }
    }
}

impl<S: Read> BodyStream for PayloadDecoder<S> {
    fn completion(&self) -> Completion {
        match &self.kind {
            Kind::Plain(dechunked) => dechunked.completion(),
            Kind::Compressed(inflate) => inflate.completion(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn raw(bytes: &[u8]) -> RawBody<Cursor<Vec<u8>>> {
        PushbackStream::new(Cursor::new(bytes.to_vec()))
    }

    fn chunk(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for piece in data.chunks(100) {
            out.extend_from_slice(format!("{:X}\r\n", piece.len()).as_bytes());
            out.extend_from_slice(piece);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[test]
    fn dechunks_then_inflates() {
        let text = "chunked and gzipped ".repeat(50);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(text.as_bytes()).unwrap();
        let wire = chunk(&encoder.finish().unwrap());

        let mut subject = PayloadDecoder::new(raw(&wire), true, Some(ContentEncoding::Gzip));
        assert!(subject.is_chunked());
        assert_eq!(subject.encoding(), Some(ContentEncoding::Gzip));

        let mut out = String::new();
        subject.read_to_string(&mut out).unwrap();
        assert_eq!(out, text);
        assert!(subject.is_complete());
    }

    #[test]
    fn plain_body_is_not_self_terminating() {
        let mut subject = PayloadDecoder::plain(raw(b"as is"));
        assert_eq!(subject.completion(), Completion::Unknown);

        let mut out = Vec::new();
        subject.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"as is");
    }

    #[test]
    fn into_raw_returns_undecoded_stream() {
        let wire = chunk(b"framed");
        let subject = PayloadDecoder::new(raw(&wire), true, Some(ContentEncoding::Deflate));

        let mut out = Vec::new();
        subject.into_raw().read_to_end(&mut out).unwrap();
        assert_eq!(out, wire);
    }

    #[test]
    fn into_dechunked_keeps_content_encoding() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(b"still compressed").unwrap();
        let gzipped = encoder.finish().unwrap();
        let subject = PayloadDecoder::new(raw(&chunk(&gzipped)), true, Some(ContentEncoding::Gzip));

        let mut dechunked = subject.into_dechunked();
        let mut out = Vec::new();
        dechunked.read_to_end(&mut out).unwrap();
        assert_eq!(out, gzipped);
        assert!(dechunked.is_complete());
    }
}
