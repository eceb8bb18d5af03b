//! Blocking byte-stream primitives shared by request and response bodies.
//!
//! - [`BodyStream`]: a readable source that may know where its data ends
//! - [`PushbackStream`]: lookahead by "unreading" consumed bytes
//! - [`copy_to_length`] / [`copy_until_idle`]: timeout-bound body transfers
//! - [`HashingReader`]: digests bytes as they pass through

use std::fs::File;
use std::io::{Cursor, Read};

mod copy;
mod hashing;
mod pushback;

pub(crate) use copy::copy_body;
pub use copy::{copy_to_length, copy_until_idle};
pub use hashing::{DigestHandle, HashingReader};
pub use pushback::PushbackStream;

/// Default buffer size for body transfers, 64KiB
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Receives the cumulative number of bytes transferred so far.
pub type Progress<'a> = Option<&'a mut dyn FnMut(u64)>;

/// What a stream knows about its own end.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A plain stream: its end is only known by reading it.
    Unknown,
    /// A self-terminating stream that will still produce data.
    Pending,
    /// A self-terminating stream that will never produce more data.
    Done,
}

impl Completion {
    #[inline]
    pub fn is_self_terminating(self) -> bool {
        !matches!(self, Completion::Unknown)
    }

    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, Completion::Done)
    }
}

/// A readable body source.
///
/// Decoders that can tell, independent of how they are read, that no more
/// bytes will ever be produced report it through [`BodyStream::completion`].
/// Everything else keeps the default of [`Completion::Unknown`].
pub trait BodyStream: Read {
    fn completion(&self) -> Completion {
        Completion::Unknown
    }

    /// Shorthand for `completion().is_done()`.
    fn is_complete(&self) -> bool {
        self.completion().is_done()
    }
}

impl BodyStream for &[u8] {}

impl<T: AsRef<[u8]>> BodyStream for Cursor<T> {}

impl BodyStream for File {}

impl<S: BodyStream + ?Sized> BodyStream for Box<S> {
    fn completion(&self) -> Completion {
        (**self).completion()
    }
}

impl<S: BodyStream + ?Sized> BodyStream for &mut S {
    fn completion(&self) -> Completion {
        (**self).completion()
    }
}

/// Adapts any reader into a plain [`BodyStream`].
#[derive(Debug)]
pub struct PlainBody<R>(pub R);

impl<R: Read> Read for PlainBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> BodyStream for PlainBody<R> {}
