//! Turns a connection stream into a [`Response`].
//!
//! Parsing reads only the head. The body is wired into a decode pipeline
//! (dechunk, then decompress) and left on the connection for the caller to
//! read through the response's [`BodyReader`](crate::protocol::body::BodyReader).

use std::time::Duration;

use tracing::debug;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{HeaderDecoder, MAX_HEADER_BYTES, parse_payload};
use crate::connection::ResponseSource;
use crate::protocol::body::BodyReader;
use crate::protocol::{DEFAULT_SEPARATOR, HttpError, Response};
use crate::stream::PushbackStream;

/// Settings for reading response heads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Joins the values of a header received more than once
    pub header_separator: String,
    /// Upper bound on the status line and header block together
    pub max_header_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { header_separator: DEFAULT_SEPARATOR.to_string(), max_header_bytes: MAX_HEADER_BYTES }
    }
}

/// Parses responses off connection streams.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    header_decoder: HeaderDecoder,
    timeout: Duration,
}

impl ResponseParser {
    /// `timeout` is the quiet time after which body reads give up.
    pub fn new(config: &ParserConfig, timeout: Duration) -> Self {
        Self { header_decoder: HeaderDecoder::new(config.header_separator.as_str(), config.max_header_bytes), timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads the status line and headers and sets up the body pipeline.
    ///
    /// On error the source is dropped, which releases the connection.
    pub fn parse<S: ResponseSource>(&self, source: S) -> Result<Response<S>, HttpError> {
        let mut source = PushbackStream::new(source);
        let head = self.header_decoder.decode(&mut source)?;

        // head bytes do not count towards the body transfer
        source.reset_counts();

        let payload = parse_payload(&head.headers)?;
        debug!(
            status_code = head.status_code,
            chunked = payload.chunked,
            content_length = ?payload.content_length,
            encoding = ?payload.encoding,
            "parsed response"
        );

        let decoder = PayloadDecoder::new(source, payload.chunked, payload.encoding);
        let body = BodyReader::new(decoder, payload.expected_length(), payload.transfer_length(), self.timeout);
        Ok(Response::new(head, body))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default(), Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusClass;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use indoc::indoc;
    use std::io::{Cursor, Write};

    static CHUNKED_RESPONSE: &str = include_str!("../../resources/chunked_response.txt");
    static CHUNKED_PLAINTEXT: &str = include_str!("../../resources/chunked_plaintext.txt");

    fn parse(raw: &[u8]) -> Result<Response<Cursor<Vec<u8>>>, HttpError> {
        ResponseParser::new(&ParserConfig::default(), Duration::from_secs(1)).parse(Cursor::new(raw.to_vec()))
    }

    #[test]
    fn empty_body_with_declared_length() {
        let raw = indoc! {"
            HTTP/1.1 200 OK\r
            Date: Mon, 23 May 2005 22:38:34 GMT\r
            Content-Length: 96\r
            \r
        "};

        let mut response = parse(raw.as_bytes()).unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.status_class(), StatusClass::Success);
        assert_eq!(response.status_message(), "OK");
        assert_eq!(response.body().expected_length(), 96);

        assert_eq!(response.body().read_string_to_length(None).unwrap(), "");
        assert_eq!(response.body().expected_length(), 0);
    }

    #[test]
    fn duplicate_content_length_keeps_last() {
        let raw = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Length: 90\r
            content-length: 96\r
            \r
        "};

        let response = parse(raw.as_bytes()).unwrap();
        assert_eq!(response.headers().get("Content-Length").as_deref(), Some("96"));
        assert_eq!(response.exact_headers(), ["Content-Length: 90", "content-length: 96"]);
    }

    #[test]
    fn repeated_headers_are_joined_in_order() {
        let raw = indoc! {"
            HTTP/1.1 204 No Content\r
            Set-Cookie: a=1\r
            X-Other: x\r
            set-cookie: b=2\r
            \r
        "};

        let response = parse(raw.as_bytes()).unwrap();
        assert_eq!(response.headers().get("SET-COOKIE").as_deref(), Some("a=1,b=2"));
        assert_eq!(response.exact_headers().len(), 3);
    }

    #[test]
    fn separator_comes_from_config() {
        let config = ParserConfig { header_separator: "; ".to_string(), ..ParserConfig::default() };
        let raw = b"HTTP/1.1 200 OK\r\nVia: a\r\nVia: b\r\n\r\n";

        let response = ResponseParser::new(&config, Duration::from_secs(1)).parse(&raw[..]).unwrap();
        assert_eq!(response.headers().get("via").as_deref(), Some("a; b"));
    }

    #[test]
    fn malformed_header_reports_whole_block() {
        let raw = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Type: text/plain\r
            BadHeader\r
            Server: test\r
            \r
            body
        "};

        let message = match parse(raw.as_bytes()) {
            Err(e @ HttpError::MalformedHeader { .. }) => e.to_string(),
            other => panic!("expected a malformed header error, got {other:?}"),
        };

        assert!(message.starts_with("Bad header -- BadHeader\r\nFull headers:"));
        assert!(message.contains("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nBadHeader\r\n"));
    }

    #[test]
    fn chunked_fixture_decodes_to_plaintext() {
        let mut response = parse(CHUNKED_RESPONSE.as_bytes()).unwrap();
        assert_eq!(response.status_class(), StatusClass::Success);
        assert!(!response.body().is_complete());

        assert_eq!(response.body().read_string_to_length(None).unwrap(), CHUNKED_PLAINTEXT);
        assert!(response.body().is_complete());
        assert_eq!(response.body().expected_length(), CHUNKED_PLAINTEXT.len() as u64);
    }

    #[test]
    fn chunked_fixture_reads_to_timeout() {
        let mut response = parse(CHUNKED_RESPONSE.as_bytes()).unwrap();
        assert_eq!(response.body().read_string_to_timeout(None).unwrap(), CHUNKED_PLAINTEXT);
    }

    #[test]
    fn gzip_body_is_inflated() {
        let text = "compressed response body ".repeat(20);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let gzipped = encoder.finish().unwrap();

        let mut raw = format!("HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n", gzipped.len())
            .into_bytes();
        raw.extend_from_slice(&gzipped);

        let mut response = parse(&raw).unwrap();
        assert_eq!(response.body().read_string_to_length(None).unwrap(), text);
        assert!(response.body().is_complete());
    }

    #[test]
    fn mislabelled_gzip_is_returned_unchanged() {
        let raw = indoc! {"
            HTTP/1.1 200 OK\r
            Content-Encoding: gzip\r
            Content-Length: 11\r
            \r
            plain text!"};

        let mut response = parse(raw.as_bytes()).unwrap();
        assert_eq!(response.body().read_string_to_length(None).unwrap(), "plain text!");
    }

    #[test]
    fn unknown_encoding_fails() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Encoding: br\r\n\r\n";
        assert!(matches!(parse(raw), Err(HttpError::UnsupportedEncoding { encoding }) if encoding == "br"));
    }

    #[test]
    fn invalid_content_length_fails() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: lots\r\n\r\n";
        assert!(matches!(parse(raw), Err(HttpError::InvalidContentLength { .. })));
    }

    #[test]
    fn empty_stream_is_invalid_status() {
        let response = parse(b"").unwrap();
        assert_eq!(response.status_code(), 0);
        assert_eq!(response.status_class(), StatusClass::Invalid);
    }

    #[test]
    fn lf_only_head_is_accepted() {
        let mut response = parse(b"HTTP/1.0 404 Not Found\nContent-Length: 4\n\nnope").unwrap();
        assert_eq!(response.status_class(), StatusClass::ClientError);
        assert_eq!(response.status_message(), "Not Found");
        assert_eq!(response.body().read_string_to_length(None).unwrap(), "nope");
    }
}
