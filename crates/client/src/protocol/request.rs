//! Building HTTP requests.
//!
//! [`RequestBuilder`] collects the verb, target and headers; each `build*`
//! call takes an immutable [`Request`] snapshot with its head already
//! serialized to wire bytes. The builder can be reused for further requests.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use http::{Method, Uri};
use serde::Serialize;
use tracing::trace;

use crate::codec::header::{BodyFraming, HeaderEncoder};
use crate::connection::{default_port, is_secure};
use crate::protocol::{HeaderCollection, HttpError};
use crate::stream::BodyStream;

/// A request body: a stream and, when known, its length.
///
/// With no length the body is sent with `Transfer-Encoding: chunked` and
/// drained from the stream until it ends or goes quiet.
pub struct RequestBody {
    stream: Box<dyn BodyStream + Send>,
    length: Option<u64>,
}

impl RequestBody {
    pub fn new<B: BodyStream + Send + 'static>(stream: B, length: Option<u64>) -> Self {
        Self { stream: Box::new(stream), length }
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn framing(&self) -> BodyFraming {
        self.length.map_or(BodyFraming::Chunked, BodyFraming::Length)
    }

    pub fn into_parts(self) -> (Box<dyn BodyStream + Send>, Option<u64>) {
        (self.stream, self.length)
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBody").field("length", &self.length).finish_non_exhaustive()
    }
}

/// A request ready to send.
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: Uri,
    headers: HeaderCollection,
    head: Bytes,
    body: Option<RequestBody>,
    secure: bool,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &Uri {
        &self.target
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    /// Serialized request line and headers, ending with the blank line.
    pub fn head(&self) -> &Bytes {
        &self.head
    }

    /// True when the target scheme is `https`.
    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn body_length(&self) -> Option<u64> {
        self.body.as_ref().and_then(RequestBody::length)
    }

    /// Splits off the body for sending.
    pub fn into_body(self) -> (RequestHead, Option<RequestBody>) {
        let head = RequestHead { method: self.method, target: self.target, head: self.head, secure: self.secure };
        (head, self.body)
    }
}

/// What is left of a [`Request`] once its body has been taken.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub target: Uri,
    pub head: Bytes,
    pub secure: bool,
}

/// Accumulates the parts of a request.
///
/// A new builder carries `Accept-Encoding: gzip,deflate`. Every verb method
/// resets the target and sets `Host` and `Accept: */*` for it.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    target: Option<Uri>,
    headers: HeaderCollection,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        let mut headers = HeaderCollection::new();
        headers.add("Accept-Encoding", "gzip");
        headers.add("Accept-Encoding", "deflate");
        Self { method: Method::GET, target: None, headers }
    }

    pub fn get(&mut self, target: Uri) -> &mut Self {
        self.verb(Method::GET, target)
    }

    pub fn head(&mut self, target: Uri) -> &mut Self {
        self.verb(Method::HEAD, target)
    }

    pub fn post(&mut self, target: Uri) -> &mut Self {
        self.verb(Method::POST, target)
    }

    pub fn put(&mut self, target: Uri) -> &mut Self {
        self.verb(Method::PUT, target)
    }

    pub fn delete(&mut self, target: Uri) -> &mut Self {
        self.verb(Method::DELETE, target)
    }

    /// Sets any verb and target.
    pub fn verb(&mut self, method: Method, target: Uri) -> &mut Self {
        match target.host() {
            Some(host) => {
                let port = target.port_u16().unwrap_or_else(|| default_port(&target));
                self.headers.set("Host", format!("{host}:{port}"));
            }
            None => {
                self.headers.remove("Host");
            }
        }
        self.headers.set("Accept", mime::STAR_STAR.as_ref());
        self.method = method;
        self.target = Some(target);
        self
    }

    /// Replaces every value of a header.
    pub fn set_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Adds a header value unless the header already has it.
    pub fn add_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.add(name, value);
        self
    }

    pub fn accept<V: Into<String>>(&mut self, media_type: V) -> &mut Self {
        self.set_header("Accept", media_type)
    }

    pub fn basic_authentication(&mut self, user: &str, password: &str) -> &mut Self {
        let token = STANDARD.encode(format!("{user}:{password}"));
        self.set_header("Authorization", format!("Basic {token}"))
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    /// A request with no body.
    pub fn build(&self) -> Result<Request, HttpError> {
        self.build_with(self.headers.clone(), None)
    }

    pub fn build_bytes<B: Into<Bytes>>(&self, data: B) -> Result<Request, HttpError> {
        let data = data.into();
        let length = data.len() as u64;
        self.build_with(self.headers.clone(), Some(RequestBody::new(Cursor::new(data), Some(length))))
    }

    /// The string is sent UTF-8 encoded.
    pub fn build_string<S: Into<String>>(&self, data: S) -> Result<Request, HttpError> {
        self.build_bytes(data.into().into_bytes())
    }

    /// A request whose body is read from `stream`.
    ///
    /// Without a `length` the body is sent chunked and the stream is drained
    /// until it ends or stays quiet for the client timeout.
    pub fn build_stream<B: BodyStream + Send + 'static>(&self, stream: B, length: Option<u64>) -> Result<Request, HttpError> {
        self.build_with(self.headers.clone(), Some(RequestBody::new(stream, length)))
    }

    /// A request with `form` serialized as `application/x-www-form-urlencoded`.
    pub fn build_form<T: Serialize + ?Sized>(&self, form: &T) -> Result<Request, HttpError> {
        let encoded = serde_urlencoded::to_string(form).map_err(HttpError::invalid_request)?;
        let mut headers = self.headers.clone();
        headers.set("Content-Type", mime::APPLICATION_WWW_FORM_URLENCODED.as_ref());

        let data = Bytes::from(encoded);
        let length = data.len() as u64;
        self.build_with(headers, Some(RequestBody::new(Cursor::new(data), Some(length))))
    }

    fn build_with(&self, headers: HeaderCollection, body: Option<RequestBody>) -> Result<Request, HttpError> {
        let target = self.target.clone().ok_or_else(|| HttpError::invalid_request("no target set"))?;
        if target.host().is_none() {
            return Err(HttpError::invalid_request(format!("target {target} has no host")));
        }

        let mut head = BytesMut::new();
        let framing = body.as_ref().map_or(BodyFraming::NoBody, RequestBody::framing);
        HeaderEncoder.encode(&self.method, &target, &headers, framing, &mut head)?;
        trace!(method = %self.method, %target, head_len = head.len(), "built request");

        Ok(Request { method: self.method.clone(), secure: is_secure(&target), target, headers, head: head.freeze(), body })
    }
}
