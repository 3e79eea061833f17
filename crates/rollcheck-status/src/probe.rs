//! Pod probing — builds the child snapshots a resource aggregates.
//!
//! [`KubectlPodProbe`] lists the pods matching a resource's selector with
//! `kubectl get pods -o json` and maps scheduling and container states to
//! status codes. Unhealthy containers get a tail of their logs attached.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use rollcheck_core::{ActionableError, ResourceKind, StatusCode, SubResourceStatus};

use crate::executor::{ExecError, Executor, KubectlCommand};
use crate::resource::Resource;

/// Children of one resource, keyed by pod name.
pub type PodStatuses = BTreeMap<String, SubResourceStatus>;

/// Boxed future returned by [`PodProbe::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult<PodStatuses>> + Send + 'a>>;

/// Result type alias for pod probes.
pub type ProbeResult<T> = Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("listing pods failed: {0}")]
    Exec(#[from] ExecError),

    #[error("unexpected pod list: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Observes the children of a resource.
pub trait PodProbe: Send + Sync {
    fn probe<'a>(&'a self, resource: &'a Resource) -> ProbeFuture<'a>;
}

/// Pod probe backed by kubectl.
#[derive(Clone)]
pub struct KubectlPodProbe {
    executor: Arc<dyn Executor>,
    kube_context: Option<String>,
    log_tail: u32,
    timeout: Duration,
}

impl KubectlPodProbe {
    pub fn new(executor: Arc<dyn Executor>, kube_context: Option<String>) -> Self {
        Self {
            executor,
            kube_context,
            log_tail: 20,
            timeout: Duration::from_secs(30),
        }
    }

    /// Number of log lines fetched per unhealthy pod.
    pub fn with_log_tail(mut self, lines: u32) -> Self {
        self.log_tail = lines;
        self
    }

    /// Upper bound for each kubectl call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn probe_inner(&self, resource: &Resource) -> ProbeResult<PodStatuses> {
        let Some(selector) = resource.selector() else {
            return Ok(PodStatuses::new());
        };

        let cmd = KubectlCommand::get_pods(
            self.kube_context.as_deref(),
            resource.namespace(),
            selector,
            self.timeout,
        );
        let out = self.executor.run(&cmd).await?;
        let list: PodList = serde_json::from_str(&out)?;

        let mut pods = PodStatuses::new();
        for pod in list.items {
            let namespace = pod
                .metadata
                .namespace
                .clone()
                .unwrap_or_else(|| resource.namespace().to_string());
            let error = pod_error(&pod, resource.kind());
            let logs = match &error {
                Some(ae) if wants_logs(ae.code) => self.fetch_logs(&namespace, &pod.metadata.name).await,
                _ => Vec::new(),
            };
            let status = SubResourceStatus::new(
                namespace,
                "pod",
                pod.metadata.name.clone(),
                pod.status.phase.clone(),
                error,
                logs,
            );
            pods.insert(pod.metadata.name, status);
        }
        debug!(resource = %resource, pods = pods.len(), "probed pods");
        Ok(pods)
    }

    async fn fetch_logs(&self, namespace: &str, pod: &str) -> Vec<String> {
        let cmd = KubectlCommand::logs(
            self.kube_context.as_deref(),
            namespace,
            pod,
            self.log_tail,
            self.timeout,
        );
        match self.executor.run(&cmd).await {
            Ok(out) => out
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                debug!(%pod, error = %e, "could not fetch pod logs");
                Vec::new()
            }
        }
    }
}

impl PodProbe for KubectlPodProbe {
    fn probe<'a>(&'a self, resource: &'a Resource) -> ProbeFuture<'a> {
        Box::pin(self.probe_inner(resource))
    }
}

fn wants_logs(code: StatusCode) -> bool {
    matches!(
        code,
        StatusCode::ContainerRestarting
            | StatusCode::ContainerTerminated
            | StatusCode::RunContainerError
    )
}

// ── Pod JSON ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: ObjectMeta,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    phase: String,
    reason: Option<String>,
    #[serde(default)]
    conditions: Vec<PodCondition>,
    #[serde(default)]
    init_container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct PodCondition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatus {
    name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    waiting: Option<WaitingState>,
    terminated: Option<TerminatedState>,
}

#[derive(Debug, Deserialize)]
struct WaitingState {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerminatedState {
    exit_code: i32,
}

/// Map a pod's observed state to an outcome; `None` means healthy.
fn pod_error(pod: &Pod, owner: ResourceKind) -> Option<ActionableError> {
    let status = &pod.status;
    if status.phase == "Succeeded" {
        return None;
    }

    if let Some(cond) = status
        .conditions
        .iter()
        .find(|c| c.kind == "PodScheduled" && c.status == "False")
    {
        if cond.reason.as_deref() == Some("Unschedulable") {
            let detail = cond.message.as_deref().unwrap_or("no details");
            let code = if detail.contains("node") {
                StatusCode::NodeUnschedulable
            } else {
                StatusCode::UnknownUnschedulable
            };
            return Some(ActionableError::new(code, format!("unschedulable: {detail}")));
        }
    }

    let containers = status
        .init_container_statuses
        .iter()
        .chain(&status.container_statuses);
    for c in containers {
        if let Some(ae) = container_error(c, owner) {
            return Some(ae);
        }
    }

    if status.phase == "Failed" {
        let reason = status.reason.as_deref().unwrap_or("unknown reason");
        return Some(ActionableError::new(
            StatusCode::Unhealthy,
            format!("pod {} failed: {reason}", pod.metadata.name),
        ));
    }
    None
}

fn container_error(c: &ContainerStatus, owner: ResourceKind) -> Option<ActionableError> {
    if let Some(waiting) = &c.state.waiting {
        let reason = waiting.reason.as_deref().unwrap_or("");
        let detail = waiting.message.as_deref().unwrap_or(reason);
        let ae = match reason {
            "ErrImagePull" | "ImagePullBackOff" | "InvalidImageName" => ActionableError::new(
                StatusCode::ImagePullError,
                format!("container {} is waiting to start: {} can't be pulled", c.name, c.image),
            ),
            "CrashLoopBackOff" => ActionableError::new(
                StatusCode::ContainerRestarting,
                format!("container {} is backing off waiting to restart", c.name),
            ),
            "RunContainerError" | "CreateContainerConfigError" | "CreateContainerError" => {
                ActionableError::new(
                    StatusCode::RunContainerError,
                    format!("container {} in error: {detail}", c.name),
                )
            }
            "ContainerCreating" => ActionableError::new(
                StatusCode::ContainerCreating,
                format!("creating container {}", c.name),
            ),
            "PodInitializing" => ActionableError::new(
                StatusCode::PodInitializing,
                format!("waiting for init containers before starting {}", c.name),
            ),
            "" => return None,
            other => ActionableError::new(
                StatusCode::Unhealthy,
                format!("container {} is waiting to start: {other}", c.name),
            ),
        };
        return Some(ae);
    }

    match &c.state.terminated {
        // Completed containers of standalone pods are the expected end state.
        Some(t) if t.exit_code == 0 && owner == ResourceKind::StandalonePods => None,
        Some(t) if t.exit_code != 0 => Some(ActionableError::new(
            StatusCode::ContainerTerminated,
            format!("container {} terminated with exit code {}", c.name, t.exit_code),
        )),
        _ => None,
    }
}
