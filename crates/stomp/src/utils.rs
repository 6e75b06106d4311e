//! Utility macros shared by the codec, negotiator and connection modules.

/// A macro for early returns with an error if a condition is not met.
///
/// Works like `assert!`, but returns the error instead of panicking, which
/// keeps frame and header validation free of panics.
///
/// ```text
/// ensure!(headers.pair_count() <= MAX_HEADER_NUM, ParseError::too_many_headers(MAX_HEADER_NUM));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
