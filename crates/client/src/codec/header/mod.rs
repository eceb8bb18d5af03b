//! Request head encoding and response head decoding.

mod header_decoder;
mod header_encoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, PayloadSize, parse_payload};
pub use header_encoder::{BodyFraming, HeaderEncoder};
