//! Transient vs fatal error classification.

use std::io::ErrorKind;

/// Errors that know whether retrying them can help.
///
/// Transient errors (timeouts, rate limiting, 5xx responses, dropped
/// connections) are retried; everything else is fatal and propagates after a
/// single attempt.
pub trait Transience {
    /// Returns `true` if the same call may succeed when repeated.
    fn is_transient(&self) -> bool;
}

impl Transience for std::io::Error {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TimedOut
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionRefused
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        )
    }
}

/// Returns `true` for HTTP statuses worth retrying: 408, 429 and 5xx.
///
/// # Examples
///
/// ```
/// use tradeflow_retry::is_transient_status;
///
/// assert!(is_transient_status(429));
/// assert!(is_transient_status(503));
/// assert!(!is_transient_status(401));
/// assert!(!is_transient_status(404));
/// ```
#[must_use]
pub const fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
