//! Domain types shared by the status engine and its collaborators.
//!
//! These types are the vocabulary of a status check: the closed set of
//! status codes, the (code, message) outcome pair attached to a resource,
//! and the immutable snapshot of one child object (usually a pod).

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Status codes ──────────────────────────────────────────────────

/// Closed set of status-check outcome codes.
///
/// The external names (`STATUSCHECK_*`) are stable and shared with
/// reporting and telemetry consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum StatusCode {
    /// Zero value; the resource has not been observed yet.
    #[default]
    #[serde(rename = "STATUSCHECK_UNSET")]
    Unset,
    #[serde(rename = "STATUSCHECK_SUCCESS")]
    Success,
    #[serde(rename = "STATUSCHECK_UNKNOWN")]
    Unknown,
    #[serde(rename = "STATUSCHECK_KUBECTL_CONNECTION_ERR")]
    KubectlConnectionError,
    #[serde(rename = "STATUSCHECK_KUBECTL_PID_KILLED")]
    KubectlProcessKilled,
    #[serde(rename = "STATUSCHECK_DEPLOYMENT_ROLLOUT_PENDING")]
    DeploymentRolloutPending,
    #[serde(rename = "STATUSCHECK_STANDALONE_PODS_PENDING")]
    StandalonePodsPending,
    #[serde(rename = "STATUSCHECK_USER_CANCELLED")]
    UserCancelled,
    #[serde(rename = "STATUSCHECK_DEADLINE_EXCEEDED")]
    DeadlineExceeded,
    #[serde(rename = "STATUSCHECK_NODE_UNSCHEDULABLE")]
    NodeUnschedulable,
    #[serde(rename = "STATUSCHECK_UNKNOWN_UNSCHEDULABLE")]
    UnknownUnschedulable,
    #[serde(rename = "STATUSCHECK_CONTAINER_RESTARTING")]
    ContainerRestarting,
    #[serde(rename = "STATUSCHECK_RUN_CONTAINER_ERR")]
    RunContainerError,
    #[serde(rename = "STATUSCHECK_UNHEALTHY")]
    Unhealthy,
    #[serde(rename = "STATUSCHECK_IMAGE_PULL_ERR")]
    ImagePullError,
    #[serde(rename = "STATUSCHECK_CONTAINER_TERMINATED")]
    ContainerTerminated,
    #[serde(rename = "STATUSCHECK_CONTAINER_CREATING")]
    ContainerCreating,
    #[serde(rename = "STATUSCHECK_POD_INITIALIZING")]
    PodInitializing,
}

impl StatusCode {
    /// Stable external name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Unset => "STATUSCHECK_UNSET",
            StatusCode::Success => "STATUSCHECK_SUCCESS",
            StatusCode::Unknown => "STATUSCHECK_UNKNOWN",
            StatusCode::KubectlConnectionError => "STATUSCHECK_KUBECTL_CONNECTION_ERR",
            StatusCode::KubectlProcessKilled => "STATUSCHECK_KUBECTL_PID_KILLED",
            StatusCode::DeploymentRolloutPending => "STATUSCHECK_DEPLOYMENT_ROLLOUT_PENDING",
            StatusCode::StandalonePodsPending => "STATUSCHECK_STANDALONE_PODS_PENDING",
            StatusCode::UserCancelled => "STATUSCHECK_USER_CANCELLED",
            StatusCode::DeadlineExceeded => "STATUSCHECK_DEADLINE_EXCEEDED",
            StatusCode::NodeUnschedulable => "STATUSCHECK_NODE_UNSCHEDULABLE",
            StatusCode::UnknownUnschedulable => "STATUSCHECK_UNKNOWN_UNSCHEDULABLE",
            StatusCode::ContainerRestarting => "STATUSCHECK_CONTAINER_RESTARTING",
            StatusCode::RunContainerError => "STATUSCHECK_RUN_CONTAINER_ERR",
            StatusCode::Unhealthy => "STATUSCHECK_UNHEALTHY",
            StatusCode::ImagePullError => "STATUSCHECK_IMAGE_PULL_ERR",
            StatusCode::ContainerTerminated => "STATUSCHECK_CONTAINER_TERMINATED",
            StatusCode::ContainerCreating => "STATUSCHECK_CONTAINER_CREATING",
            StatusCode::PodInitializing => "STATUSCHECK_POD_INITIALIZING",
        }
    }

    pub fn is_success(&self) -> bool {
        *self == StatusCode::Success
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Outcome ───────────────────────────────────────────────────────

/// A (code, message) classification of a resource's rollout state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionableError {
    pub code: StatusCode,
    pub message: String,
}

impl ActionableError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Success, message)
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message.trim_end())
    }
}

// ── Resource kinds ────────────────────────────────────────────────

/// The two kinds of tracked workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Replica-controlled workload, checked with `kubectl rollout status`.
    Deployment,
    /// Pods without a controller; their phases are the only signal.
    #[serde(rename = "pods", alias = "standalone-pods")]
    StandalonePods,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::StandalonePods => "pods",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Pods ──────────────────────────────────────────────────────────

/// Pod lifecycle phase as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    /// Any phase string the cluster may add later.
    Other,
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Unknown" => PodPhase::Unknown,
            _ => PodPhase::Other,
        }
    }

    /// Whether the pod has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

/// Snapshot of one child object at its last observation.
///
/// Never mutated once built; a new observation replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubResourceStatus {
    namespace: String,
    kind: String,
    name: String,
    phase: String,
    error: Option<ActionableError>,
    logs: Vec<String>,
}

impl SubResourceStatus {
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        phase: impl Into<String>,
        error: Option<ActionableError>,
        logs: Vec<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
            phase: phase.into(),
            error,
            logs,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> PodPhase {
        PodPhase::parse(&self.phase)
    }

    pub fn phase_str(&self) -> &str {
        &self.phase
    }

    pub fn error(&self) -> Option<&ActionableError> {
        self.error.as_ref()
    }

    /// Code of the attached error; a child without one is considered healthy.
    pub fn code(&self) -> StatusCode {
        self.error.as_ref().map_or(StatusCode::Success, |e| e.code)
    }

    /// Message of the attached error, or `""`.
    pub fn message(&self) -> &str {
        self.error.as_ref().map_or("", |e| e.message.as_str())
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }
}

impl fmt::Display for SubResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.namespace, self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_wire_names() {
        assert_eq!(StatusCode::Success.as_str(), "STATUSCHECK_SUCCESS");
        assert_eq!(
            StatusCode::KubectlProcessKilled.to_string(),
            "STATUSCHECK_KUBECTL_PID_KILLED"
        );
        let json = serde_json::to_string(&StatusCode::UserCancelled).unwrap();
        assert_eq!(json, "\"STATUSCHECK_USER_CANCELLED\"");
    }

    #[test]
    fn outcome_defaults_to_unset() {
        let ae = ActionableError::default();
        assert_eq!(ae.code, StatusCode::Unset);
        assert!(ae.message.is_empty());
    }

    #[test]
    fn pod_phase_parsing() {
        assert_eq!(PodPhase::parse("Failed"), PodPhase::Failed);
        assert_eq!(PodPhase::parse("Succeeded"), PodPhase::Succeeded);
        assert_eq!(PodPhase::parse("Evicted"), PodPhase::Other);
        assert!(!PodPhase::Running.is_terminal());
        assert!(PodPhase::Failed.is_terminal());
    }

    #[test]
    fn sub_resource_without_error_counts_as_success() {
        let pod = SubResourceStatus::new("ns", "pod", "web-1", "Running", None, vec![]);
        assert_eq!(pod.code(), StatusCode::Success);
        assert_eq!(pod.message(), "");
        assert_eq!(pod.to_string(), "ns:pod/web-1");
    }

    #[test]
    fn resource_kind_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ResourceKind,
        }
        let w: Wrapper = toml::from_str("kind = \"standalone-pods\"").unwrap();
        assert_eq!(w.kind, ResourceKind::StandalonePods);
        let w: Wrapper = toml::from_str("kind = \"deployment\"").unwrap();
        assert_eq!(w.kind, ResourceKind::Deployment);
    }
}
