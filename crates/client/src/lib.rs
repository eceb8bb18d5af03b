//! A blocking micro HTTP/1.1 client over raw byte streams
//!
//! This crate speaks HTTP/1.1 directly over any bidirectional byte stream. It
//! builds request heads itself, parses response heads tolerantly, and exposes
//! response bodies as plain `std::io::Read` streams with chunked framing and
//! gzip/deflate encoding already removed.
//!
//! # Features
//!
//! - One connection per request, synchronous and blocking
//! - Quiet-timeout body copies: slow but live peers are never cut off
//! - Chunked transfer decoding, tolerant of non-conformant line terminators
//! - Gzip and deflate decoding with a real end-of-stream signal
//! - Cross loading: streaming one server's response body into a request to
//!   another server, optionally hashing it on the way, without buffering it
//!
//! # Example
//!
//! ```no_run
//! use micro_client::HttpClient;
//! use micro_client::protocol::RequestBuilder;
//!
//! let client = HttpClient::new()?;
//! let request = RequestBuilder::new().get("http://example.com/".parse()?).build()?;
//!
//! let mut response = client.request_or_fail(request, None)?;
//! let body = response.body().read_string_to_length(None)?;
//! println!("{} {}: {body}", response.status_code(), response.status_message());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - [`stream`]: blocking stream primitives, pushback and timeout-bound copies
//! - [`codec`]: request head encoding, response head decoding, body decoding
//! - [`protocol`]: requests, responses, headers and errors
//! - [`connection`]: where connections come from, TCP and TLS by default
//! - [`HttpClient`]: ties them together
//!
//! # Limitations
//!
//! - HTTP/1.1 only, no keep-alive, no connection pooling
//! - No redirects, cookies or retries
//! - Chunk extensions and trailers are not supported

mod client;
pub mod codec;
pub mod connection;
pub mod protocol;
pub mod stream;

mod utils;
pub(crate) use utils::ensure;

pub use client::{ClientConfig, HttpClient};
