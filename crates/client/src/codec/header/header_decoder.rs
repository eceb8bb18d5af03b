//! Reads a response status line and header block off a blocking stream.
//!
//! The stream is consumed one byte at a time so that nothing past the blank
//! line is taken from the connection; the body stays in the stream for the
//! body pipeline.
//!
//! Line endings are read tolerantly. A line ends at the first CR or LF, and
//! the complementary byte of a CRLF or LFCR pair is consumed along with it.
//! Every byte read is also kept in a raw buffer, which is what a malformed
//! header error reports.

use std::io::Read;

use bytes::BytesMut;
use http::header;
use tracing::{debug, trace};

use crate::codec::body::ContentEncoding;
use crate::ensure;
use crate::protocol::{DEFAULT_SEPARATOR, HeaderCollection, HttpError, ResponseHead};
use crate::stream::PushbackStream;

/// Maximum size in bytes allowed for the status line and header block
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Parses the head of a response.
#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    separator: String,
    max_header_bytes: usize,
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR, MAX_HEADER_BYTES)
    }
}

impl HeaderDecoder {
    pub fn new<S: Into<String>>(separator: S, max_header_bytes: usize) -> Self {
        Self { separator: separator.into(), max_header_bytes }
    }

    /// Reads the status line and headers, leaving `source` at the first body byte.
    ///
    /// # Errors
    ///
    /// - [`HttpError::MalformedHeader`] for a header line without `": "`; the
    ///   remaining header lines are read first so the error carries the whole block
    /// - [`HttpError::TooLargeHeader`] once the head exceeds the configured limit
    /// - [`HttpError::Io`] for transport failures
    pub fn decode<S: Read>(&self, source: &mut PushbackStream<S>) -> Result<ResponseHead, HttpError> {
        let mut lines = LineReader { source, raw: BytesMut::new(), max_header_bytes: self.max_header_bytes };

        let status_line = loop {
            match lines.next_line()? {
                Some(line) if line.is_empty() => trace!("skipping blank line before status line"),
                Some(line) => break line,
                None => break String::new(),
            }
        };
        let (status_code, status_message) = parse_status_line(&status_line);
        trace!(status_code, %status_message, "parsed status line");

        let mut headers = HeaderCollection::with_separator(self.separator.as_str());
        let mut exact_headers = Vec::new();

        while let Some(line) = lines.next_line()? {
            if line.trim().is_empty() {
                break;
            }

            let Some((name, value)) = line.split_once(": ") else {
                lines.drain()?;
                return Err(HttpError::malformed_header(line, &lines.raw));
            };
            headers.append(name, value);
            exact_headers.push(line);
        }

        debug!(status_code, header_count = exact_headers.len(), raw_len = lines.raw.len(), "read response head");

        Ok(ResponseHead {
            status_code,
            status_message,
            headers,
            exact_headers,
            raw_headers: lines.raw.freeze(),
        })
    }
}

struct LineReader<'a, S> {
    source: &'a mut PushbackStream<S>,
    raw: BytesMut,
    max_header_bytes: usize,
}

impl<S: Read> LineReader<'_, S> {
    fn next_byte(&mut self) -> Result<Option<u8>, HttpError> {
        let byte = self.source.read_byte()?;
        if let Some(b) = byte {
            ensure!(
                self.raw.len() < self.max_header_bytes,
                HttpError::too_large_header(self.raw.len() + 1, self.max_header_bytes)
            );
            self.raw.extend_from_slice(&[b]);
        }
        Ok(byte)
    }

    fn push_back(&mut self, byte: u8) -> Result<(), HttpError> {
        self.raw.truncate(self.raw.len().saturating_sub(1));
        self.source.unread_byte(byte)?;
        Ok(())
    }

    /// Next line without its terminator, `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>, HttpError> {
        let mut line = Vec::new();
        loop {
            match self.next_byte()? {
                None if line.is_empty() => return Ok(None),
                None => break,
                Some(terminator @ (b'\r' | b'\n')) => {
                    let pair = if terminator == b'\r' { b'\n' } else { b'\r' };
                    match self.next_byte()? {
                        Some(b) if b == pair => {}
                        Some(b) => self.push_back(b)?,
                        None => {}
                    }
                    break;
                }
                Some(b) => line.push(b),
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Reads the remaining header lines into the raw buffer.
    fn drain(&mut self) -> Result<(), HttpError> {
        while let Some(line) = self.next_line()? {
            if line.trim().is_empty() {
                break;
            }
        }
        Ok(())
    }
}

/// Splits `HTTP/1.1 200 OK` into code and message; code 0 when unparseable.
fn parse_status_line(line: &str) -> (u16, String) {
    let mut wire = Vec::with_capacity(line.len() + 4);
    wire.extend_from_slice(line.as_bytes());
    wire.extend_from_slice(b"\r\n\r\n");

    let mut response = httparse::Response::new(&mut []);
    if let Ok(httparse::Status::Complete(_)) = response.parse(&wire) {
        if let Some(code) = response.code {
            return (code, response.reason.unwrap_or_default().to_string());
        }
    }

    // not HTTP/1.x shaped, fall back to splitting on spaces
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    match parts.next().and_then(|code| code.trim().parse::<u16>().ok()) {
        Some(code) => (code, parts.next().unwrap_or_default().to_string()),
        None => {
            debug!(status_line = line, "unparseable status line");
            (0, line.to_string())
        }
    }
}

/// How the response body is framed and encoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PayloadSize {
    pub chunked: bool,
    pub content_length: Option<u64>,
    pub encoding: Option<ContentEncoding>,
}

impl PayloadSize {
    /// Length the body reader should expect: the declared length, or 0 when chunked or undeclared.
    pub fn expected_length(&self) -> u64 {
        self.transfer_length().unwrap_or(0)
    }

    /// The declared `Content-Length`, unless chunked framing overrides it.
    pub fn transfer_length(&self) -> Option<u64> {
        if self.chunked { None } else { self.content_length }
    }
}

/// Determines body framing from the parsed headers.
///
/// # Errors
///
/// - [`HttpError::InvalidContentLength`] if `Content-Length` is not a number
/// - [`HttpError::UnsupportedEncoding`] for a `Content-Encoding` other than gzip, deflate or identity
pub fn parse_payload(headers: &HeaderCollection) -> Result<PayloadSize, HttpError> {
    let chunked = is_chunked(headers.get(header::TRANSFER_ENCODING.as_str()).as_deref());

    let content_length = match headers.get(header::CONTENT_LENGTH.as_str()) {
        Some(value) => Some(
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| HttpError::invalid_content_length(format!("value {value} is not u64")))?,
        ),
        None => None,
    };

    let encoding = match headers.get(header::CONTENT_ENCODING.as_str()) {
        Some(value) => ContentEncoding::from_header(&value)?,
        None => None,
    };

    Ok(PayloadSize { chunked, content_length, encoding })
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// Chunked must be the last encoding if present.
fn is_chunked(header_value: Option<&str>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(bytes) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return bytes.trim_ascii().eq_ignore_ascii_case(CHUNKED);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::io::Cursor;

    fn source(raw: &str) -> PushbackStream<Cursor<Vec<u8>>> {
        PushbackStream::new(Cursor::new(raw.as_bytes().to_vec()))
    }

    fn rest<S: Read>(mut source: PushbackStream<S>) -> String {
        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn check_is_chunked() {
        assert!(!is_chunked(None));
        assert!(is_chunked(Some("chunked")));
        assert!(is_chunked(Some("gzip, Chunked")));
        assert!(!is_chunked(Some("chunked, gzip")));
        assert!(!is_chunked(Some("gzip")));
    }

    #[test]
    fn reads_head_and_leaves_body() {
        let raw = indoc! {"
            HTTP/1.1 200 OK\r
            Date: Mon, 23 May 2005 22:38:34 GMT\r
            Content-Type: text/html; charset=UTF-8\r
            Content-Length: 5\r
            \r
            hello"};
        let mut src = source(raw);
        let head = HeaderDecoder::default().decode(&mut src).unwrap();

        assert_eq!(head.status_code, 200);
        assert_eq!(head.status_message, "OK");
        assert_eq!(head.headers.get("content-type").as_deref(), Some("text/html; charset=UTF-8"));
        assert_eq!(head.exact_headers.len(), 3);
        assert_eq!(&head.raw_headers[..], raw.strip_suffix("hello").unwrap().as_bytes());
        assert_eq!(rest(src), "hello");
    }

    #[test]
    fn tolerates_mixed_line_endings() {
        let raw = "\r\nHTTP/1.1 404 Not Found\nServer: test\n\rX-Thing: a\rX-Thing: b\r\n\nbody";
        let mut src = source(raw);
        let head = HeaderDecoder::default().decode(&mut src).unwrap();

        assert_eq!(head.status_code, 404);
        assert_eq!(head.status_message, "Not Found");
        assert_eq!(head.headers.get("Server").as_deref(), Some("test"));
        assert_eq!(head.headers.get("x-thing").as_deref(), Some("a,b"));
        assert_eq!(rest(src), "body");
    }

    #[test]
    fn duplicate_headers_use_configured_separator() {
        let raw = "HTTP/1.1 200 OK\r\nVia: a\r\nVia: b\r\nContent-Length: 90\r\nContent-Length: 96\r\n\r\n";
        let head = HeaderDecoder::new("; ", MAX_HEADER_BYTES).decode(&mut source(raw)).unwrap();

        assert_eq!(head.headers.get("Via").as_deref(), Some("a; b"));
        assert_eq!(head.headers.get("Content-Length").as_deref(), Some("96"));
        assert_eq!(head.exact_headers, ["Via: a", "Via: b", "Content-Length: 90", "Content-Length: 96"]);
    }

    #[test]
    fn malformed_header_reports_whole_block() {
        let raw = "HTTP/1.1 200 OK\r\nDate: today\r\nBadHeader\r\nAfter: this\r\n\r\nbody";
        let err = HeaderDecoder::default().decode(&mut source(raw)).unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Bad header -- BadHeader\r\nFull headers:"));
        assert!(message.ends_with("HTTP/1.1 200 OK\r\nDate: today\r\nBadHeader\r\nAfter: this\r\n\r\n"));
    }

    #[test]
    fn oversized_head_is_rejected() {
        let raw = format!("HTTP/1.1 200 OK\r\nX-Long: {}\r\n\r\n", "a".repeat(200));
        let err = HeaderDecoder::new(",", 64).decode(&mut source(&raw)).unwrap_err();
        assert!(matches!(err, HttpError::TooLargeHeader { max_size: 64, .. }));
    }

    #[test]
    fn unparseable_status_line_gives_code_zero() {
        let head = HeaderDecoder::default().decode(&mut source("garbage\r\n\r\n")).unwrap();
        assert_eq!(head.status_code, 0);
        assert_eq!(head.status_message, "garbage");

        let head = HeaderDecoder::default().decode(&mut source("ICY 200 OK\r\n\r\n")).unwrap();
        assert_eq!(head.status_code, 200);
        assert_eq!(head.status_message, "OK");
    }

    #[test]
    fn empty_stream_gives_code_zero() {
        let head = HeaderDecoder::default().decode(&mut source("")).unwrap();
        assert_eq!(head.status_code, 0);
        assert!(head.headers.is_empty());
    }

    #[test]
    fn payload_size_from_headers() {
        let mut headers = HeaderCollection::new();
        headers.append("Content-Length", "42");
        headers.append("Content-Encoding", "gzip");
        let payload = parse_payload(&headers).unwrap();
        assert_eq!(payload, PayloadSize { chunked: false, content_length: Some(42), encoding: Some(ContentEncoding::Gzip) });
        assert_eq!(payload.expected_length(), 42);

        headers.append("Transfer-Encoding", "chunked");
        assert_eq!(parse_payload(&headers).unwrap().expected_length(), 0);

        headers.set("Content-Length", "lots");
        assert!(matches!(parse_payload(&headers), Err(HttpError::InvalidContentLength { .. })));

        let mut headers = HeaderCollection::new();
        headers.append("Content-Encoding", "compress");
        assert!(matches!(parse_payload(&headers), Err(HttpError::UnsupportedEncoding { .. })));
    }
}
