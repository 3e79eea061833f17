//! Retry policy — which outcome codes stop polling.

use rollcheck_core::StatusCode;

/// Whether polling a resource in state `code` should stop.
pub fn is_terminal(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::Success
            | StatusCode::Unknown
            | StatusCode::KubectlProcessKilled
            | StatusCode::UserCancelled
            | StatusCode::DeadlineExceeded
    )
}

/// Like [`is_terminal`], but with failures retried until the deadline.
///
/// Only success and the two upstream overrides stop polling.
pub fn is_terminal_tolerating_failures(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::Success | StatusCode::UserCancelled | StatusCode::DeadlineExceeded
    )
}
