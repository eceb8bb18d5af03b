//! Timeout-bound body copies.
//!
//! Both copies share one notion of idleness: a read that fails with
//! `WouldBlock` or `TimedOut` produced no data. The quiet clock restarts on
//! every read that returns bytes, so a slow but live peer is never cut off.

use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::codec::body::ChunkedEncoder;
use crate::protocol::HttpError;
use crate::stream::{BodyStream, Completion, DEFAULT_BUFFER_SIZE, Progress};

/// Lengths below this are treated as unreliable and get a full buffer anyway.
const SMALL_LENGTH: u64 = 256;

/// Longest pause between reads of a source that has nothing to give.
const MAX_IDLE_BACKOFF: Duration = Duration::from_millis(50);

/// Sleeps between idle reads, doubling the pause up to [`MAX_IDLE_BACKOFF`].
struct Backoff(Duration);

impl Backoff {
    const INITIAL: Duration = Duration::from_millis(1);

    fn new() -> Self {
        Self(Self::INITIAL)
    }

    fn reset(&mut self) {
        self.0 = Self::INITIAL;
    }

    fn wait(&mut self) {
        std::thread::sleep(self.0);
        self.0 = (self.0 * 2).min(MAX_IDLE_BACKOFF);
    }
}

enum Step {
    Data(usize),
    Idle,
    End,
}

fn read_step<R: BodyStream + ?Sized>(src: &mut R, buf: &mut [u8]) -> Result<Step, HttpError> {
    loop {
        match src.read(buf) {
            Ok(0) => return Ok(Step::End),
            Ok(n) => return Ok(Step::Data(n)),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => return Ok(Step::Idle),
            Err(e) => return Err(e.into()),
        }
    }
}

fn buffer_for(length: u64) -> Vec<u8> {
    let size = if length < SMALL_LENGTH { DEFAULT_BUFFER_SIZE } else { length.min(DEFAULT_BUFFER_SIZE as u64) as usize };
    vec![0u8; size]
}

/// Copies `length` bytes from `src` into `dst`.
///
/// When `src` is self-terminating the target keeps moving: while it reports
/// [`Completion::Pending`] copying continues past `length`, and once it reports
/// [`Completion::Done`] the copy stops at whatever has been read. A plain
/// source that ends early also stops the copy.
///
/// Fails with [`HttpError::Timeout`] when no data arrives for `timeout`.
/// Returns the number of bytes actually copied, which callers use to correct
/// a declared length.
pub fn copy_to_length<R, W>(
    src: &mut R,
    dst: &mut W,
    length: u64,
    timeout: Duration,
    mut progress: Progress<'_>,
) -> Result<u64, HttpError>
where
    R: BodyStream + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = buffer_for(length);
    let mut read = 0u64;
    let mut last_data = Instant::now();
    let mut backoff = Backoff::new();

    loop {
        let target = match src.completion() {
            Completion::Unknown => length,
            Completion::Pending => u64::MAX,
            Completion::Done => read,
        };
        if read >= target {
            break;
        }

        let want = (target - read).min(buf.len() as u64) as usize;
        match read_step(src, &mut buf[..want])? {
            Step::Data(n) => {
                dst.write_all(&buf[..n])?;
                read += n as u64;
                last_data = Instant::now();
                backoff.reset();
                trace!(len = n, total = read, "copied body bytes");
                if let Some(progress) = progress.as_mut() {
                    progress(read);
                }
            }
            Step::Idle => {
                if last_data.elapsed() > timeout {
                    debug!(copied = read, ?timeout, "copy stalled past quiet timeout");
                    return Err(HttpError::timeout(timeout));
                }
                backoff.wait();
            }
            Step::End => {
                if read < length && !src.completion().is_self_terminating() {
                    debug!(copied = read, expected = length, "source ended before declared length");
                }
                break;
            }
        }
    }

    Ok(read)
}

/// Drains `src` into `dst` until the source ends or stays quiet for `timeout`.
///
/// A quiet timeout here is the normal end of the body, not an error. Returns
/// the number of bytes copied.
pub fn copy_until_idle<R, W>(src: &mut R, dst: &mut W, timeout: Duration, mut progress: Progress<'_>) -> Result<u64, HttpError>
where
    R: BodyStream + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
    let mut read = 0u64;
    let mut last_data = Instant::now();
    let mut backoff = Backoff::new();

    while !src.is_complete() {
        match read_step(src, &mut buf)? {
            Step::Data(n) => {
                dst.write_all(&buf[..n])?;
                read += n as u64;
                last_data = Instant::now();
                backoff.reset();
                if let Some(progress) = progress.as_mut() {
                    progress(read);
                }
            }
            Step::Idle => {
                if last_data.elapsed() > timeout {
                    trace!(copied = read, "source went quiet, treating as end of body");
                    break;
                }
                backoff.wait();
            }
            Step::End => break,
        }
    }

    Ok(read)
}

/// Copies a request body.
///
/// A known length bounds the copy. A body of unknown length is drained until
/// idle and sent chunked, ending with the terminal chunk.
pub(crate) fn copy_body<R, W>(
    src: &mut R,
    dst: &mut W,
    length: Option<u64>,
    timeout: Duration,
    progress: Progress<'_>,
) -> Result<u64, HttpError>
where
    R: BodyStream + ?Sized,
    W: Write + ?Sized,
{
    match length {
        Some(0) => Ok(0),
        Some(length) => copy_to_length(src, dst, length, timeout, progress),
        None => {
            let mut chunked = ChunkedEncoder::new(dst);
            let copied = copy_until_idle(src, &mut chunked, timeout, progress)?;
            chunked.finish()?;
            Ok(copied)
        }
    }
}
