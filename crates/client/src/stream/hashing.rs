//! Digesting bytes on their way through a reader.

use std::io;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::Digest;

use crate::stream::{BodyStream, Completion};

/// Feeds every byte read through it into a digest.
///
/// The digest sits behind a shared handle so it can be finalized after the
/// reader itself has been handed off, e.g. as the body of another request.
pub struct HashingReader<R, D> {
    inner: R,
    digest: Arc<Mutex<D>>,
}

impl<R: Read, D: Digest> HashingReader<R, D> {
    pub fn new(inner: R) -> Self {
        Self::with_digest(inner, D::new())
    }

    pub fn with_digest(inner: R, digest: D) -> Self {
        Self { inner, digest: Arc::new(Mutex::new(digest)) }
    }

    /// Handle to the running digest.
    pub fn digest_handle(&self) -> DigestHandle<D> {
        DigestHandle(Arc::clone(&self.digest))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read, D: Digest> Read for HashingReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            lock(&self.digest).update(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R: BodyStream, D: Digest> BodyStream for HashingReader<R, D> {
    fn completion(&self) -> Completion {
        self.inner.completion()
    }
}

impl<R: std::fmt::Debug, D> std::fmt::Debug for HashingReader<R, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingReader").field("inner", &self.inner).finish_non_exhaustive()
    }
}

/// Shared access to the digest of a [`HashingReader`].
#[derive(Clone)]
pub struct DigestHandle<D>(Arc<Mutex<D>>);

impl<D: Digest + Clone> DigestHandle<D> {
    /// Digest of everything read so far. Reading may continue afterwards.
    pub fn finalize(&self) -> Vec<u8> {
        lock(&self.0).clone().finalize().to_vec()
    }
}

impl<D> std::fmt::Debug for DigestHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestHandle").finish_non_exhaustive()
    }
}

fn lock<D>(digest: &Mutex<D>) -> MutexGuard<'_, D> {
    // a panic mid-update cannot leave the digest half written
    digest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
