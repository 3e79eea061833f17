//! rollcheck-status — rollout status engine for Kubernetes workloads.
//!
//! Decides whether deployments and standalone pods have stabilized. Raw
//! `kubectl rollout status` output is classified into outcomes, a retry
//! policy decides when polling stops, and each resource aggregates the
//! state of its pods into one representative code and message.
//!
//! # Architecture
//!
//! ```text
//! StatusMonitor
//!   ├── Per-resource task (select! on cancel / deadline / poll)
//!   │   ├── PodProbe → child SubResourceStatus map
//!   │   ├── Resource::check_status
//!   │   │     ├── Executor (kubectl rollout status)
//!   │   │     └── classify_rollout → ActionableError
//!   │   ├── policy::is_terminal → stop or sleep poll_interval
//!   │   └── Reporter → ReportWriter (logs tail + LogSink)
//!   └── Optional TransitionObserver
//! ```
//!
//! # Overrides
//!
//! Cancellation and deadline expiry are applied from outside the poll:
//! the in-flight kubectl call is dropped (killing the child) and the
//! resource ends on `UserCancelled` or `DeadlineExceeded`.

pub mod classify;
pub mod executor;
pub mod monitor;
pub mod policy;
pub mod probe;
pub mod report;
pub mod resource;

pub use classify::{classify_rollout, ClassifyOptions};
pub use executor::{ExecError, ExecFuture, ExecResult, Executor, KubectlCommand, KubectlExecutor};
pub use monitor::{
    Canceller, MonitorConfig, ReportWriter, ResourceSummary, ResourceTransition,
    StatusCheckSummary, StatusMonitor, TransitionObserver,
};
pub use probe::{KubectlPodProbe, PodProbe, PodStatuses, ProbeError, ProbeFuture};
pub use report::{FileLogSink, LogSink, ReportOptions, Reporter};
pub use resource::{ProbeConfig, Resource};
