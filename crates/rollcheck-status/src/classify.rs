//! Rollout probe classification.
//!
//! Turns the captured output of `kubectl rollout status` (or the error it
//! failed with) into a single outcome. Pure: no state, no I/O.

use std::time::Duration;

use rollcheck_core::{format_duration, ActionableError, StatusCode};

/// Advisory shown for any unreachable-cluster failure.
pub const MSG_KUBECTL_CONNECTION: &str =
    "kubectl connection error: could not reach the cluster, check your connectivity and kube context";

const ROLLOUT_SUCCESS: &str = "successfully rolled out";
const CONNECTION_ERR: &str = "Unable to connect to the server";
const KILLED_ERR: &str = "signal: killed";

/// Explicit inputs for [`classify_rollout`] besides the probe result itself.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions {
    /// Deadline the probe ran under.
    pub deadline: Duration,
    /// The caller knows the check was cancelled upstream.
    pub cancelled: bool,
}

/// Classify one rollout probe result.
///
/// Returns `None` when the probe produced no usable signal (no error and
/// no output); the caller keeps its previous outcome.
pub fn classify_rollout(
    details: &str,
    opts: ClassifyOptions,
    err: Option<&str>,
) -> Option<ActionableError> {
    if let Some(err) = err {
        return Some(classify_error(err, opts));
    }

    if details.is_empty() {
        return None;
    }
    if details.contains(ROLLOUT_SUCCESS) {
        return Some(ActionableError::success(details));
    }
    Some(ActionableError::new(
        StatusCode::DeploymentRolloutPending,
        details.to_lowercase(),
    ))
}

fn classify_error(err: &str, opts: ClassifyOptions) -> ActionableError {
    if err.contains(CONNECTION_ERR) {
        return ActionableError::new(StatusCode::KubectlConnectionError, MSG_KUBECTL_CONNECTION);
    }
    if err.contains(KILLED_ERR) {
        // A kill signal cannot tell a Ctrl-C from an expired deadline, with
        // or without `opts.cancelled`.
        return ActionableError::new(
            StatusCode::KubectlProcessKilled,
            format!(
                "received Ctrl-C or deployments could not stabilize within {}: kubectl rollout status command interrupted\n",
                format_duration(opts.deadline)
            ),
        );
    }
    ActionableError::new(StatusCode::Unknown, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ClassifyOptions {
        ClassifyOptions {
            deadline: Duration::from_secs(10),
            cancelled: false,
        }
    }

    #[test]
    fn connection_error_uses_fixed_advisory() {
        for err in [
            "Unable to connect to the server",
            "Unable to connect to the server: dial tcp 10.0.0.1:6443: i/o timeout",
            "error: Unable to connect to the server: EOF",
        ] {
            let ae = classify_rollout("", opts(), Some(err)).unwrap();
            assert_eq!(ae.code, StatusCode::KubectlConnectionError);
            assert_eq!(ae.message, MSG_KUBECTL_CONNECTION);
        }
    }

    #[test]
    fn killed_process_hedges_and_embeds_deadline() {
        let ae = classify_rollout("", opts(), Some("signal: killed")).unwrap();
        assert_eq!(ae.code, StatusCode::KubectlProcessKilled);
        assert_eq!(
            ae.message,
            "received Ctrl-C or deployments could not stabilize within 10s: kubectl rollout status command interrupted\n"
        );
    }

    #[test]
    fn cancelled_flag_keeps_hedge_wording() {
        let cancelled = ClassifyOptions {
            cancelled: true,
            ..opts()
        };
        let a = classify_rollout("", opts(), Some("signal: killed")).unwrap();
        let b = classify_rollout("", cancelled, Some("signal: killed")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn killed_message_formats_longer_deadlines() {
        let long = ClassifyOptions {
            deadline: Duration::from_secs(150),
            cancelled: false,
        };
        let ae = classify_rollout("", long, Some("exec failed: signal: killed")).unwrap();
        assert!(ae.message.contains("within 2m30s"));
        assert!(ae.message.ends_with('\n'));
    }

    #[test]
    fn other_error_is_unknown_with_raw_text() {
        let ae = classify_rollout("", opts(), Some("deployment test not found")).unwrap();
        assert_eq!(ae, ActionableError::new(StatusCode::Unknown, "deployment test not found"));
    }

    #[test]
    fn error_wins_over_output() {
        let ae = classify_rollout("successfully rolled out", opts(), Some("boom")).unwrap();
        assert_eq!(ae.code, StatusCode::Unknown);
    }

    #[test]
    fn success_keeps_case() {
        let ae = classify_rollout("Successfully rolled out", opts(), None);
        // marker match is case sensitive
        assert_eq!(ae.unwrap().code, StatusCode::DeploymentRolloutPending);

        let ae = classify_rollout("successfully rolled out", opts(), None).unwrap();
        assert_eq!(ae, ActionableError::success("successfully rolled out"));
    }

    #[test]
    fn pending_is_lowercased() {
        let ae = classify_rollout("Waiting for replicas to be available", opts(), None).unwrap();
        assert_eq!(ae.code, StatusCode::DeploymentRolloutPending);
        assert_eq!(ae.message, "waiting for replicas to be available");
    }

    #[test]
    fn empty_output_is_no_signal() {
        assert!(classify_rollout("", opts(), None).is_none());
    }
}
