//! The caller-facing response body.

mod body_reader;

pub use body_reader::BodyReader;
