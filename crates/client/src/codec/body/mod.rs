//! Response body decoding.
//!
//! - [`ChunkedDecoder`]: removes chunked transfer framing
//! - [`Inflate`]: unwraps gzip and deflate content encodings
//! - [`PayloadDecoder`]: chains the two over the raw connection stream
//! - [`ChunkedEncoder`]: frames request bodies of unknown length

mod chunked_decoder;
mod chunked_encoder;
mod inflate;
mod payload_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use inflate::{ContentEncoding, Inflate};
pub use payload_decoder::{Dechunked, PayloadDecoder, RawBody};
