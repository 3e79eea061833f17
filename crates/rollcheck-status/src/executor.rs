//! kubectl execution.
//!
//! The status engine never builds a shell line itself: it describes a
//! [`KubectlCommand`] and hands it to an [`Executor`]. Production code uses
//! [`KubectlExecutor`]; tests inject scripted executors.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Boxed future returned by [`Executor::run`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = ExecResult<String>> + Send + 'a>>;

/// Result type alias for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors returned by an executor.
///
/// The `Display` text is what the rollout classifier inspects.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process was killed, either by a signal or because the deadline
    /// expired.
    #[error("signal: killed")]
    Killed,

    #[error("{message}")]
    Failed { code: Option<i32>, message: String },
}

impl ExecError {
    fn failed(code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let message = match (stderr.is_empty(), code) {
            (false, _) => stderr.to_string(),
            (true, Some(c)) => format!("exit status {c}"),
            (true, None) => "process exited abnormally".to_string(),
        };
        ExecError::Failed { code, message }
    }
}

/// A kubectl invocation, described by its semantic parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlCommand {
    pub context: Option<String>,
    pub namespace: String,
    /// Subcommand and positional arguments (e.g., `rollout status deployment web`).
    pub verb: Vec<String>,
    /// Flags appended after `--namespace`.
    pub flags: Vec<String>,
    /// Upper bound on the run time. `Duration::ZERO` means unbounded.
    pub deadline: Duration,
}

impl KubectlCommand {
    /// `kubectl rollout status deployment <name> --watch=false`.
    pub fn rollout_status(
        context: Option<&str>,
        namespace: &str,
        name: &str,
        deadline: Duration,
    ) -> Self {
        Self {
            context: context.map(str::to_string),
            namespace: namespace.to_string(),
            verb: vec![
                "rollout".to_string(),
                "status".to_string(),
                "deployment".to_string(),
                name.to_string(),
            ],
            flags: vec!["--watch=false".to_string()],
            deadline,
        }
    }

    /// `kubectl get pods -l <selector> -o json`.
    pub fn get_pods(
        context: Option<&str>,
        namespace: &str,
        selector: &str,
        deadline: Duration,
    ) -> Self {
        Self {
            context: context.map(str::to_string),
            namespace: namespace.to_string(),
            verb: vec!["get".to_string(), "pods".to_string()],
            flags: vec![
                "-l".to_string(),
                selector.to_string(),
                "-o".to_string(),
                "json".to_string(),
            ],
            deadline,
        }
    }

    /// `kubectl logs <pod> --all-containers --tail=<n>`.
    pub fn logs(
        context: Option<&str>,
        namespace: &str,
        pod: &str,
        tail: u32,
        deadline: Duration,
    ) -> Self {
        Self {
            context: context.map(str::to_string),
            namespace: namespace.to_string(),
            verb: vec!["logs".to_string(), pod.to_string()],
            flags: vec!["--all-containers".to_string(), format!("--tail={tail}")],
            deadline,
        }
    }

    /// Full argument list, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.verb.len() + self.flags.len() + 4);
        if let Some(ctx) = &self.context {
            args.push("--context".to_string());
            args.push(ctx.clone());
        }
        args.extend(self.verb.iter().cloned());
        args.push("--namespace".to_string());
        args.push(self.namespace.clone());
        args.extend(self.flags.iter().cloned());
        args
    }
}

/// Runs kubectl commands and returns their stdout.
///
/// Implementations must give up once `cmd.deadline` elapses and stop the
/// underlying work when the returned future is dropped.
pub trait Executor: Send + Sync {
    fn run<'a>(&'a self, cmd: &'a KubectlCommand) -> ExecFuture<'a>;
}

/// Executor backed by a local kubectl binary.
#[derive(Debug, Clone)]
pub struct KubectlExecutor {
    program: String,
}

impl KubectlExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run_inner(&self, cmd: &KubectlCommand) -> ExecResult<String> {
        let args = cmd.to_args();
        debug!(program = %self.program, args = ?args, "running kubectl");

        let child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let waited = if cmd.deadline.is_zero() {
            child.wait_with_output().await
        } else {
            match tokio::time::timeout(cmd.deadline, child.wait_with_output()).await {
                Ok(out) => out,
                Err(_) => {
                    // Dropping the wait future kills the child.
                    debug!(program = %self.program, deadline = ?cmd.deadline, "kubectl timed out");
                    return Err(ExecError::Killed);
                }
            }
        };
        let output = waited.map_err(|source| ExecError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        if killed_by_signal(&output.status) {
            return Err(ExecError::Killed);
        }
        Err(ExecError::failed(
            output.status.code(),
            &String::from_utf8_lossy(&output.stderr),
        ))
    }
}

impl Default for KubectlExecutor {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl Executor for KubectlExecutor {
    fn run<'a>(&'a self, cmd: &'a KubectlCommand) -> ExecFuture<'a> {
        Box::pin(self.run_inner(cmd))
    }
}

#[cfg(unix)]
fn killed_by_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn killed_by_signal(_status: &std::process::ExitStatus) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_status_args() {
        let cmd = KubectlCommand::rollout_status(
            Some("kubecontext"),
            "test",
            "graph",
            Duration::from_secs(1),
        );
        assert_eq!(
            cmd.to_args().join(" "),
            "--context kubecontext rollout status deployment graph --namespace test --watch=false"
        );
    }

    #[test]
    fn args_without_context() {
        let cmd = KubectlCommand::get_pods(None, "ns", "app=web", Duration::ZERO);
        assert_eq!(
            cmd.to_args().join(" "),
            "get pods --namespace ns -l app=web -o json"
        );
    }

    #[test]
    fn logs_args() {
        let cmd = KubectlCommand::logs(None, "ns", "web-1", 20, Duration::ZERO);
        assert_eq!(
            cmd.to_args().join(" "),
            "logs web-1 --namespace ns --all-containers --tail=20"
        );
    }

    #[test]
    fn killed_error_text_matches_signal_wording() {
        assert_eq!(ExecError::Killed.to_string(), "signal: killed");
    }

    #[test]
    fn failed_prefers_stderr() {
        let err = ExecError::failed(Some(1), "Unable to connect to the server: EOF\n");
        assert_eq!(err.to_string(), "Unable to connect to the server: EOF");
        let err = ExecError::failed(Some(2), "  ");
        assert_eq!(err.to_string(), "exit status 2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let exec = KubectlExecutor::new("/nonexistent/kubectl-binary");
        let cmd = KubectlCommand::get_pods(None, "ns", "app=web", Duration::from_secs(1));
        let err = exec.run(&cmd).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deadline_kills_slow_process() {
        // Trailing `--namespace ns` become $0 and $1 for `sh -c`.
        let exec = KubectlExecutor::new("sh");
        let cmd = KubectlCommand {
            context: None,
            namespace: "ns".to_string(),
            verb: vec!["-c".to_string(), "sleep 5".to_string()],
            flags: vec![],
            deadline: Duration::from_millis(100),
        };
        let err = exec.run(&cmd).await.unwrap_err();
        assert!(matches!(err, ExecError::Killed));
    }
}
