//! Helper macros used across the crate.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for validation that reports an error instead of
/// panicking:
///
/// ```ignore
/// ensure!(raw.len() <= max_header_bytes, HttpError::too_large_header(raw.len(), max_header_bytes));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
