//! Serializes a request head into wire bytes.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::{HeaderName, HeaderValue, Method, Uri, header};
use tracing::error;

use crate::protocol::{HeaderCollection, HttpError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 1024;

/// How a request body is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body, no framing header
    NoBody,
    /// `Content-Length` with the given size
    Length(u64),
    /// `Transfer-Encoding: chunked`, for bodies of unknown size
    Chunked,
}

/// Writes `VERB path?query HTTP/1.1`, one line per header and the blank line.
///
/// `Content-Length` and `Transfer-Encoding` are written from the framing
/// only. Values stored in the collection under those names are never
/// serialized, so neither name can appear twice.
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// # Errors
    ///
    /// [`HttpError::InvalidRequest`] when a header name is not a valid token
    /// or a value holds control characters such as CR or LF.
    pub fn encode(
        &self,
        method: &Method,
        target: &Uri,
        headers: &HeaderCollection,
        framing: BodyFraming,
        dst: &mut BytesMut,
    ) -> Result<(), HttpError> {
        dst.reserve(INIT_HEADER_SIZE);

        let path = target.path_and_query().map(|path| path.as_str()).filter(|path| !path.is_empty()).unwrap_or("/");
        write!(FastWrite(dst), "{} {} HTTP/1.1\r\n", method.as_str(), path)?;

        for (name, value) in headers.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                error!(name, "invalid request header name");
                HttpError::invalid_request(format!("invalid header name {name:?}: {e}"))
            })?;
            if header_name == header::CONTENT_LENGTH || header_name == header::TRANSFER_ENCODING {
                continue;
            }
            HeaderValue::from_bytes(value.as_bytes()).map_err(|e| {
                error!(name, "invalid request header value");
                HttpError::invalid_request(format!("invalid value for header {name}: {e}"))
            })?;

            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }

        match framing {
            BodyFraming::NoBody => {}
            BodyFraming::Length(length) => write!(FastWrite(dst), "Content-Length: {length}\r\n")?,
            BodyFraming::Chunked => dst.put_slice(b"Transfer-Encoding: chunked\r\n"),
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Formats straight into a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn try_encode(
        method: Method,
        target: &str,
        headers: &HeaderCollection,
        framing: BodyFraming,
    ) -> Result<String, HttpError> {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode(&method, &target.parse().unwrap(), headers, framing, &mut dst)?;
        Ok(String::from_utf8(dst.to_vec()).unwrap())
    }

    fn encode(method: Method, target: &str, headers: &HeaderCollection, framing: BodyFraming) -> String {
        try_encode(method, target, headers, framing).unwrap()
    }

    #[test]
    fn writes_request_line_headers_and_blank_line() {
        let mut headers = HeaderCollection::new();
        headers.set("Host", "www.example.com:80");
        headers.add("Accept-Encoding", "gzip");
        headers.add("Accept-Encoding", "deflate");

        let head = encode(Method::GET, "http://www.example.com/my/path?a=1", &headers, BodyFraming::NoBody);
        assert_eq!(
            head,
            indoc! {"
                GET /my/path?a=1 HTTP/1.1\r
                Host: www.example.com:80\r
                Accept-Encoding: gzip,deflate\r
                \r
            "}
        );
    }

    #[test]
    fn framing_headers_come_from_the_body() {
        let mut headers = HeaderCollection::new();
        headers.set("Content-Length", "999");
        headers.set("transfer-encoding", "gzip");

        let head = encode(Method::PUT, "http://example.com/upload", &headers, BodyFraming::Length(12));
        assert_eq!(head, "PUT /upload HTTP/1.1\r\nContent-Length: 12\r\n\r\n");

        let head = encode(Method::POST, "http://example.com/upload", &headers, BodyFraming::Chunked);
        assert_eq!(head, "POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");

        let head = encode(Method::DELETE, "http://example.com", &headers, BodyFraming::NoBody);
        assert_eq!(head, "DELETE / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn line_breaks_in_values_are_rejected() {
        let mut headers = HeaderCollection::new();
        headers.set("X-Note", "a\r\n\r\nGET /other HTTP/1.1");

        let result = try_encode(Method::GET, "http://example.com/", &headers, BodyFraming::NoBody);
        assert!(matches!(result, Err(HttpError::InvalidRequest { .. })));
    }

    #[test]
    fn invalid_names_are_rejected() {
        for name in ["Bad Name", "X-Split\r\nHost", ""] {
            let mut headers = HeaderCollection::new();
            headers.set(name, "value");

            let result = try_encode(Method::GET, "http://example.com/", &headers, BodyFraming::NoBody);
            assert!(matches!(result, Err(HttpError::InvalidRequest { .. })), "{name:?}");
        }
    }

    #[test]
    fn non_ascii_values_are_written_as_utf8() {
        let mut headers = HeaderCollection::new();
        headers.set("X-Title", "café\tmenu");

        let head = encode(Method::GET, "http://example.com/", &headers, BodyFraming::NoBody);
        assert!(head.contains("X-Title: café\tmenu\r\n"));
    }
}
