//! Errors raised while building, sending and receiving HTTP messages.

use std::io;
use std::io::ErrorKind;
use std::time::Duration;

use http::Uri;
use thiserror::Error;

use crate::protocol::HeaderCollection;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("timeout: no data received within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Bad header -- {line}\r\nFull headers:{raw_headers}")]
    MalformedHeader { line: String, raw_headers: String },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunked body: {reason}")]
    InvalidChunk { reason: String },

    #[error("unknown compression scheme: {encoding}")]
    UnsupportedEncoding { encoding: String },

    #[error("{0}")]
    Transfer(Box<TransferError>),

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("io error: {source}")]
    Io { source: io::Error },
}

impl HttpError {
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    pub fn malformed_header<S: ToString>(line: S, raw_headers: &[u8]) -> Self {
        Self::MalformedHeader { line: line.to_string(), raw_headers: String::from_utf8_lossy(raw_headers).into_owned() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunk { reason: str.to_string() }
    }

    pub fn unsupported_encoding<S: ToString>(str: S) -> Self {
        Self::UnsupportedEncoding { encoding: str.to_string() }
    }

    pub fn invalid_request<S: ToString>(str: S) -> Self {
        Self::InvalidRequest { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::from(e.into())
    }

    /// Returns true for a quiet-timeout expiry, whether raised here or by the socket.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Io { source } => matches!(source.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock),
            _ => false,
        }
    }
}

/// Converts an io error back, unwrapping an `HttpError` raised inside a stream adaptor.
impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().is_some_and(|inner| inner.is::<HttpError>()) {
            return Self::Io { source: e };
        }

        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<HttpError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io { source: io::Error::new(kind, other) },
            None => Self::Io { source: io::Error::from(kind) },
        }
    }
}

/// Lets decode failures travel through `std::io::Read` implementations.
impl From<HttpError> for io::Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io { source } => source,
            e @ HttpError::Timeout { .. } => io::Error::new(ErrorKind::TimedOut, e),
            e => io::Error::new(ErrorKind::InvalidData, e),
        }
    }
}

/// A request completed with a status outside the success class.
#[derive(Debug, Error)]
#[error("transfer to {target} failed with status {status_code} {status_message}")]
pub struct TransferError {
    pub headers: HeaderCollection,
    pub target: Uri,
    pub status_code: u16,
    pub status_message: String,
}

impl From<TransferError> for HttpError {
    fn from(e: TransferError) -> Self {
        Self::Transfer(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_survives_io_round_trip() {
        let io_error = io::Error::from(HttpError::invalid_chunk("bad byte"));
        assert_eq!(io_error.kind(), ErrorKind::InvalidData);

        match HttpError::from(io_error) {
            HttpError::InvalidChunk { reason } => assert_eq!(reason, "bad byte"),
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn timeout_becomes_timed_out_kind() {
        let io_error = io::Error::from(HttpError::timeout(Duration::from_millis(5)));
        assert_eq!(io_error.kind(), ErrorKind::TimedOut);
        assert!(HttpError::from(io_error).is_timeout());
    }

    #[test]
    fn plain_io_errors_are_kept() {
        let e = HttpError::from(io::Error::new(ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(e, HttpError::Io { ref source } if source.kind() == ErrorKind::ConnectionReset));
        assert!(!e.is_timeout());
    }
}
