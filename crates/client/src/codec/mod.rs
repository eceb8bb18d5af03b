//! Wire encoding of requests and decoding of responses.
//!
//! - Requests: [`header::HeaderEncoder`] serializes the request line and
//!   headers into bytes once, when the request is built
//! - Responses: [`ResponseParser`] reads the head with
//!   [`header::HeaderDecoder`] and wires the body through the
//!   [`body::PayloadDecoder`] pipeline
//!
//! Everything here works on blocking `std::io` streams. Nothing beyond the
//! response head is read until the caller asks for the body.

pub mod body;
pub mod header;
mod response_decoder;

pub use response_decoder::{ParserConfig, ResponseParser};
