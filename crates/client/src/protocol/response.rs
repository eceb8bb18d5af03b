//! HTTP response types.
//!
//! A [`Response`] is produced by the response parser once the status line and
//! headers have been read. The body has not been touched at that point; it is
//! read lazily through [`Response::body`].

use std::io::Read;

use bytes::Bytes;
use http::StatusCode;

use crate::codec::body::{Dechunked, RawBody};
use crate::protocol::HeaderCollection;
use crate::protocol::body::BodyReader;

/// The hundreds group of a status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StatusClass {
    /// Status code 0 or outside 100..=599: the response could not be read
    Invalid = 0,
    Information = 100,
    Success = 200,
    Redirection = 300,
    ClientError = 400,
    ServerError = 500,
}

impl StatusClass {
    pub fn from_code(code: u16) -> Self {
        match code - code % 100 {
            100 => StatusClass::Information,
            200 => StatusClass::Success,
            300 => StatusClass::Redirection,
            400 => StatusClass::ClientError,
            500 => StatusClass::ServerError,
            _ => StatusClass::Invalid,
        }
    }
}

impl From<u16> for StatusClass {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

/// Status line and headers of a response, as read off the wire.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// 0 when the status line could not be parsed
    pub status_code: u16,
    pub status_message: String,
    /// Headers with duplicates joined by the configured separator
    pub headers: HeaderCollection,
    /// Header lines in arrival order, unmodified, duplicates included
    pub exact_headers: Vec<String>,
    /// Every byte of the status line and header block
    pub raw_headers: Bytes,
}

impl ResponseHead {
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_code(self.status_code)
    }
}

/// A response whose head has been read and whose body is ready to stream.
///
/// The response owns the body pipeline and the connection beneath it.
/// Closing it, explicitly or by dropping it, releases them exactly once.
#[derive(Debug)]
pub struct Response<S: Read> {
    head: ResponseHead,
    body: BodyReader<S>,
}

impl<S: Read> Response<S> {
    pub fn new(head: ResponseHead, body: BodyReader<S>) -> Self {
        Self { head, body }
    }

    pub fn status_code(&self) -> u16 {
        self.head.status_code
    }

    pub fn status_class(&self) -> StatusClass {
        self.head.status_class()
    }

    /// The status as an [`http::StatusCode`], `None` for a code outside 100..=999.
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.head.status_code).ok()
    }

    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    pub fn status_message(&self) -> &str {
        &self.head.status_message
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.head.headers
    }

    pub fn exact_headers(&self) -> &[String] {
        &self.head.exact_headers
    }

    /// Raw header bytes, for diagnostics.
    pub fn raw_headers(&self) -> &Bytes {
        &self.head.raw_headers
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&mut self) -> &mut BodyReader<S> {
        &mut self.body
    }

    pub fn into_parts(self) -> (ResponseHead, BodyReader<S>) {
        (self.head, self.body)
    }

    /// The undecoded body stream, for handing the body on without decoding it.
    ///
    /// `None` if the response has already been closed.
    pub fn into_raw_body(self) -> Option<RawBody<S>> {
        self.body.into_raw()
    }

    /// The body as the server encoded it, with only chunked framing removed.
    ///
    /// This is what gets forwarded when a body is passed from one server to
    /// another. `None` if the response has already been closed.
    pub fn into_transfer_body(self) -> Option<Dechunked<S>> {
        self.body.into_dechunked()
    }

    pub fn close(&mut self) {
        self.body.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_from_code() {
        assert_eq!(StatusClass::from_code(0), StatusClass::Invalid);
        assert_eq!(StatusClass::from_code(101), StatusClass::Information);
        assert_eq!(StatusClass::from_code(204), StatusClass::Success);
        assert_eq!(StatusClass::from_code(302), StatusClass::Redirection);
        assert_eq!(StatusClass::from_code(404), StatusClass::ClientError);
        assert_eq!(StatusClass::from_code(599), StatusClass::ServerError);
        assert_eq!(StatusClass::from_code(999), StatusClass::Invalid);
        assert_eq!(StatusClass::Success as u16, 200);
    }
}
