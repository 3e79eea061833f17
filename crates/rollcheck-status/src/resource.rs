//! Resource — the per-workload status state machine.
//!
//! A `Resource` starts unobserved (`StatusCode::Unset`), moves through
//! retryable outcomes while its rollout progresses, and ends on a terminal
//! outcome as judged by [`crate::policy`]. Every change goes through
//! [`Resource::update_status`], which keeps the change/report bookkeeping
//! the reporter relies on.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use rollcheck_core::{ActionableError, PodPhase, ResourceKind, StatusCode, SubResourceStatus};

use crate::classify::{classify_rollout, ClassifyOptions};
use crate::executor::{Executor, KubectlCommand};
use crate::policy;

/// Cluster-side parameters of a status probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// kubeconfig context; kubectl's current context when `None`.
    pub kube_context: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Status {
    pub(crate) ae: ActionableError,
    pub(crate) changed: bool,
    pub(crate) reported: bool,
    /// Outcome in effect at the last report.
    pub(crate) last_reported: Option<ActionableError>,
}

/// A tracked workload and its last observed children.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    kind: ResourceKind,
    namespace: String,
    deadline: Duration,
    selector: Option<String>,
    tolerate_failures: bool,
    pub(crate) resources: BTreeMap<String, SubResourceStatus>,
    pub(crate) status: Status,
}

impl Resource {
    pub fn new(name: &str, kind: ResourceKind, namespace: &str, deadline: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            namespace: namespace.to_string(),
            deadline,
            selector: None,
            tolerate_failures: false,
            resources: BTreeMap::new(),
            status: Status::default(),
        }
    }

    /// Label selector used to find this resource's pods.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Keep polling through failures until the deadline.
    pub fn with_tolerate_failures(mut self, tolerate: bool) -> Self {
        self.tolerate_failures = tolerate;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// The current outcome.
    pub fn status(&self) -> &ActionableError {
        &self.status.ae
    }

    /// Whether the outcome differs from the one in effect at the last report.
    pub fn changed(&self) -> bool {
        self.status.changed
    }

    /// Whether the current outcome has already been reported.
    pub fn reported(&self) -> bool {
        self.status.reported
    }

    pub fn sub_resources(&self) -> &BTreeMap<String, SubResourceStatus> {
        &self.resources
    }

    /// Replace the child snapshot wholesale.
    pub fn set_sub_resources(&mut self, resources: BTreeMap<String, SubResourceStatus>) {
        self.resources = resources;
    }

    /// Poll the resource once and fold the result into its outcome.
    ///
    /// Deployments run a `kubectl rollout status` probe through `executor`;
    /// standalone pods are judged from the current child snapshot only.
    /// Returns whether the outcome changed.
    pub async fn check_status(&mut self, executor: &dyn Executor, cfg: &ProbeConfig) -> bool {
        match self.kind {
            ResourceKind::Deployment => self.check_rollout_status(executor, cfg).await,
            ResourceKind::StandalonePods => self.check_standalone_pods_status(),
        }
    }

    async fn check_rollout_status(&mut self, executor: &dyn Executor, cfg: &ProbeConfig) -> bool {
        let cmd = KubectlCommand::rollout_status(
            cfg.kube_context.as_deref(),
            &self.namespace,
            &self.name,
            self.deadline,
        );

        let (details, err) = match executor.run(&cmd).await {
            Ok(out) => (self.cleanup_status(&out), None),
            Err(e) => (String::new(), Some(e.to_string())),
        };

        let opts = ClassifyOptions {
            deadline: self.deadline,
            cancelled: false,
        };
        match classify_rollout(&details, opts, err.as_deref()) {
            Some(ae) => self.update_status(ae),
            None => {
                debug!(resource = %self, "rollout probe returned no output");
                false
            }
        }
    }

    fn check_standalone_pods_status(&mut self) -> bool {
        let mut failed = None;
        let mut pending = Vec::new();
        for (name, pod) in &self.resources {
            match pod.phase() {
                PodPhase::Failed => {
                    failed.get_or_insert(name);
                }
                PodPhase::Succeeded => {}
                _ => pending.push(name.as_str()),
            }
        }

        let ae = if let Some(name) = failed {
            ActionableError::new(StatusCode::Unknown, format!("pod {name} failed"))
        } else if !pending.is_empty() || self.resources.is_empty() {
            ActionableError::new(
                StatusCode::StandalonePodsPending,
                format!("pods not ready: [{}]", pending.join(" ")),
            )
        } else {
            ActionableError::success("")
        };
        self.update_status(ae)
    }

    /// Strip kubectl's `deployment "<name>" ` prefix and surrounding space.
    fn cleanup_status(&self, out: &str) -> String {
        out.replace(&format!("deployment \"{}\" ", self.name), "")
            .trim()
            .to_string()
    }

    /// Replace the outcome. Returns whether it differs from the previous one.
    pub fn update_status(&mut self, ae: ActionableError) -> bool {
        let changed = ae != self.status.ae;
        self.status.changed = self.status.last_reported.as_ref() != Some(&ae);
        if changed {
            debug!(
                resource = %self,
                from = %self.status.ae.code,
                to = %ae.code,
                "status changed"
            );
            self.status.reported = false;
            self.status.ae = ae;
        }
        changed
    }

    /// Record that the current outcome has been reported.
    pub(crate) fn mark_reported(&mut self) {
        self.status.reported = true;
        self.status.changed = false;
        self.status.last_reported = Some(self.status.ae.clone());
    }

    /// Whether polling should stop.
    pub fn is_complete(&self) -> bool {
        let code = self.status.ae.code;
        if self.tolerate_failures {
            policy::is_terminal_tolerating_failures(code)
        } else {
            policy::is_terminal(code)
        }
    }

    /// Single representative code for this resource and its children.
    ///
    /// Cancellation wins, then a parent-level success; otherwise the first
    /// failing child (by name) speaks for the resource.
    pub fn status_code(&self) -> StatusCode {
        self.failing_child()
            .map(SubResourceStatus::code)
            .unwrap_or(self.status.ae.code)
    }

    /// Message matching [`Resource::status_code`].
    ///
    /// Falls back to the resource's own message when the failing child
    /// has none.
    pub fn status_message(&self) -> &str {
        self.failing_child()
            .map(SubResourceStatus::message)
            .filter(|msg| !msg.is_empty())
            .unwrap_or(self.status.ae.message.as_str())
    }

    fn failing_child(&self) -> Option<&SubResourceStatus> {
        if matches!(
            self.status.ae.code,
            StatusCode::UserCancelled | StatusCode::Success
        ) {
            return None;
        }
        self.resources.values().find(|pod| !pod.code().is_success())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.namespace, self.kind, self.name)
    }
}
