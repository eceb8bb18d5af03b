//! The blocking HTTP client.
//!
//! Each call opens one connection through the [`ConnectionSource`], writes
//! the request head and body, and returns once the response head is parsed.
//! The response owns the connection from then on; its body is read lazily.

use std::io::Write;
use std::time::Duration;

use sha2::Digest;
use tracing::{debug, trace, warn};

use crate::codec::{ParserConfig, ResponseParser};
use crate::connection::{ConnectionSource, TcpConnector};
use crate::protocol::{HttpError, Request, RequestBuilder, Response, TransferError};
use crate::stream::{HashingReader, Progress, copy_body};

/// Client wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Connect timeout, per-read socket timeout and quiet timeout for body copies
    pub timeout: Duration,
    pub parser: ParserConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(5), parser: ParserConfig::default() }
    }
}

/// Sends requests over connections from a [`ConnectionSource`].
///
/// There is no pooling or keep-alive: every request gets its own connection,
/// which is released with the response. A client can be shared across
/// threads when its connection source can.
#[derive(Debug)]
pub struct HttpClient<C> {
    connector: C,
    config: ClientConfig,
    parser: ResponseParser,
}

impl HttpClient<TcpConnector> {
    /// A client on plain TCP and `rustls`, with default settings.
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self::with_connector(TcpConnector::new()?))
    }
}

impl<C: ConnectionSource> HttpClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self::with_config(connector, ClientConfig::default())
    }

    pub fn with_config(connector: C, config: ClientConfig) -> Self {
        let parser = ResponseParser::new(&config.parser, config.timeout);
        Self { connector, config, parser }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Sends `request` and returns the response whatever its status.
    ///
    /// `progress` receives the cumulative number of request body bytes sent.
    ///
    /// # Errors
    ///
    /// Transport failures, a request body that stays quiet past the timeout,
    /// and responses whose head cannot be parsed.
    pub fn request(&self, request: Request, progress: Progress<'_>) -> Result<Response<C::Connection>, HttpError> {
        let timeout = self.config.timeout;
        let (head, body) = request.into_body();

        let mut connection = if head.secure {
            self.connector.connect_ssl(&head.target, timeout)?
        } else {
            self.connector.connect_unsecured(&head.target, timeout)?
        };
        debug!(method = %head.method, target = %head.target, secure = head.secure, "sending request");

        connection.write_all(&head.head)?;
        if let Some(body) = body {
            let (mut stream, length) = body.into_parts();
            let sent = copy_body(&mut stream, &mut connection, length, timeout, progress)?;
            trace!(sent, ?length, "sent request body");
        }
        connection.flush()?;

        self.parser.parse(connection)
    }

    /// Like [`HttpClient::request`], but fails unless the status is 2xx.
    ///
    /// An unsuccessful response is closed before the error is returned.
    ///
    /// # Errors
    ///
    /// [`HttpError::Transfer`] for a status outside the success class, plus
    /// everything [`HttpClient::request`] reports.
    pub fn request_or_fail(
        &self,
        request: Request,
        progress: Progress<'_>,
    ) -> Result<Response<C::Connection>, HttpError> {
        let target = request.target().clone();
        let mut response = self.request(request, progress)?;
        if response.is_success() {
            return Ok(response);
        }

        response.close();
        warn!(%target, status_code = response.status_code(), status_message = response.status_message(), "transfer failed");
        Err(TransferError {
            headers: response.headers().clone(),
            target,
            status_code: response.status_code(),
            status_message: response.status_message().to_string(),
        }
        .into())
    }

    /// Streams the body of `load`'s response into a request built from `store`.
    ///
    /// The body goes from one connection to the other through a fixed size
    /// copy buffer and is never held in memory as a whole. It is forwarded
    /// as the server encoded it: content encoding is kept and announced with
    /// `Content-Encoding` on the store request. A load response without a
    /// `Content-Length` is stored with `Transfer-Encoding: chunked`.
    ///
    /// # Errors
    ///
    /// [`HttpError::Transfer`] if either side answers with a non-success
    /// status, plus everything [`HttpClient::request`] reports.
    pub fn cross_load(&self, load: Request, store: &RequestBuilder, progress: Progress<'_>) -> Result<(), HttpError>
    where
        C::Connection: 'static,
    {
        let (mut loaded, store) = self.start_cross_load(load, store)?;
        let length = loaded.body().declared_length();
        let source = loaded.into_transfer_body().ok_or_else(|| HttpError::invalid_request("load response is closed"))?;

        let request = store.build_stream(source, length)?;
        self.request_or_fail(request, progress)?.close();
        Ok(())
    }

    /// [`HttpClient::cross_load`], returning the digest of the bytes forwarded.
    ///
    /// The digest is computed while copying; the data is not read twice.
    pub fn cross_load_hashed<D>(
        &self,
        load: Request,
        store: &RequestBuilder,
        progress: Progress<'_>,
    ) -> Result<Vec<u8>, HttpError>
    where
        D: Digest + Clone + Send + 'static,
        C::Connection: 'static,
    {
        let (mut loaded, store) = self.start_cross_load(load, store)?;
        let length = loaded.body().declared_length();
        let source = loaded.into_transfer_body().ok_or_else(|| HttpError::invalid_request("load response is closed"))?;

        let hashing = HashingReader::<_, D>::new(source);
        let digest = hashing.digest_handle();
        let request = store.build_stream(hashing, length)?;
        self.request_or_fail(request, progress)?.close();
        Ok(digest.finalize())
    }

    fn start_cross_load(
        &self,
        load: Request,
        store: &RequestBuilder,
    ) -> Result<(Response<C::Connection>, RequestBuilder), HttpError> {
        let loaded = self.request_or_fail(load, None)?;
        debug!(declared_length = ?loaded.headers().get("Content-Length"), "cross loading body");

        let mut store = store.clone();
        if let Some(encoding) = loaded.headers().get("Content-Encoding") {
            store.set_header("Content-Encoding", encoding);
        }
        Ok((loaded, store))
    }
}
