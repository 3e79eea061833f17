//! Status monitor — drives every tracked resource to a terminal outcome.
//!
//! `StatusMonitor::check` spawns one task per resource. Each task owns its
//! resource for the whole check: it refreshes the pods, polls, reports, and
//! sleeps until the outcome is terminal. A poll is raced against the shared
//! cancellation signal and the resource deadline; whichever wins first
//! decides the final outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use rollcheck_core::{
    format_duration, ActionableError, ConfigResult, ResourceKind, StatusCheckConfig, StatusCode,
};

use crate::executor::Executor;
use crate::probe::PodProbe;
use crate::report::{ReportOptions, Reporter};
use crate::resource::{ProbeConfig, Resource};

/// Message of the override applied when a check is cancelled.
pub const MSG_CANCELLED: &str = "context cancelled";

/// An outcome change of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTransition {
    /// `namespace:kind/name`.
    pub resource: String,
    /// The resource's own outcome after the change.
    pub status: ActionableError,
    /// Aggregate code over the resource and its pods.
    pub aggregate: StatusCode,
}

/// Callback invoked after each outcome transition.
pub type TransitionObserver = Arc<dyn Fn(&ResourceTransition) + Send + Sync>;

/// Destination of rendered status reports.
pub type ReportWriter = Arc<dyn Fn(&str) + Send + Sync>;

/// Runtime knobs of a status check.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub kube_context: Option<String>,
    pub poll_interval: Duration,
    pub mute_logs: bool,
    /// Cancel the remaining resources once one fails.
    pub fail_fast: bool,
}

impl MonitorConfig {
    pub fn from_status_check(cfg: &StatusCheckConfig) -> ConfigResult<Self> {
        Ok(Self {
            kube_context: cfg.kube_context.clone(),
            poll_interval: cfg.poll_interval()?,
            mute_logs: cfg.mute_logs,
            fail_fast: cfg.fail_fast,
        })
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            kube_context: None,
            poll_interval: Duration::from_secs(1),
            mute_logs: false,
            fail_fast: true,
        }
    }
}

/// Handle that cancels a running check from another task.
#[derive(Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Final state of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSummary {
    pub resource: String,
    pub code: StatusCode,
    pub message: String,
}

/// Result of a whole status check, in the order resources were given.
#[derive(Debug, Clone)]
pub struct StatusCheckSummary {
    pub resources: Vec<ResourceSummary>,
    pub elapsed: Duration,
}

impl StatusCheckSummary {
    /// True when every resource stabilized.
    pub fn is_success(&self) -> bool {
        self.resources.iter().all(|r| r.code.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceSummary> {
        self.resources.iter().filter(|r| !r.code.is_success())
    }
}

/// Shared, read-only state of the worker tasks.
struct WorkerContext {
    executor: Arc<dyn Executor>,
    pod_probe: Option<Arc<dyn PodProbe>>,
    reporter: Reporter,
    observer: Option<TransitionObserver>,
    writer: ReportWriter,
    config: MonitorConfig,
    probe_cfg: ProbeConfig,
    cancel: Arc<watch::Sender<bool>>,
}

/// Polls resources until they stabilize, fail, time out, or are cancelled.
pub struct StatusMonitor {
    executor: Arc<dyn Executor>,
    pod_probe: Option<Arc<dyn PodProbe>>,
    reporter: Reporter,
    observer: Option<TransitionObserver>,
    writer: ReportWriter,
    config: MonitorConfig,
    cancel: Arc<watch::Sender<bool>>,
}

impl StatusMonitor {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            executor,
            pod_probe: None,
            reporter: Reporter::default(),
            observer: None,
            writer: Arc::new(|text: &str| info!("{}", text.trim_end())),
            config: MonitorConfig::default(),
            cancel: Arc::new(cancel),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Refresh each resource's pods before polling it.
    pub fn with_pod_probe(mut self, probe: Arc<dyn PodProbe>) -> Self {
        self.pod_probe = Some(probe);
        self
    }

    pub fn with_observer(mut self, observer: TransitionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Send rendered reports somewhere other than the `info` log.
    pub fn with_report_writer(mut self, writer: ReportWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            tx: self.cancel.clone(),
        }
    }

    /// Run the check to completion.
    pub async fn check(&self, resources: Vec<Resource>) -> StatusCheckSummary {
        let started = Instant::now();
        info!(count = resources.len(), "waiting for resources to stabilize");

        let ctx = Arc::new(WorkerContext {
            executor: self.executor.clone(),
            pod_probe: self.pod_probe.clone(),
            reporter: self.reporter.clone(),
            observer: self.observer.clone(),
            writer: self.writer.clone(),
            probe_cfg: ProbeConfig {
                kube_context: self.config.kube_context.clone(),
            },
            config: self.config.clone(),
            cancel: self.cancel.clone(),
        });

        let handles: Vec<_> = resources
            .into_iter()
            .map(|resource| {
                let label = resource.to_string();
                let ctx = ctx.clone();
                (label, tokio::spawn(run_resource(resource, ctx)))
            })
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for (label, handle) in handles {
            let summary = match handle.await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(resource = %label, error = %e, "status check task failed");
                    ResourceSummary {
                        resource: label,
                        code: StatusCode::Unknown,
                        message: format!("status check task failed: {e}"),
                    }
                }
            };
            summaries.push(summary);
        }

        let summary = StatusCheckSummary {
            resources: summaries,
            elapsed: started.elapsed(),
        };
        if summary.is_success() {
            info!(elapsed = %format_duration(summary.elapsed), "all resources stabilized");
        } else {
            warn!(
                failed = summary.failures().count(),
                elapsed = %format_duration(summary.elapsed),
                "status check failed"
            );
        }
        summary
    }
}

enum Step {
    Polled(bool),
    Cancelled,
    DeadlineExceeded,
}

async fn run_resource(mut resource: Resource, ctx: Arc<WorkerContext>) -> ResourceSummary {
    let mut cancel_rx = ctx.cancel.subscribe();
    let deadline_at = Some(resource.deadline())
        .filter(|d| !d.is_zero())
        .and_then(|d| Instant::now().checked_add(d));
    let opts = ReportOptions {
        mute_logs: ctx.config.mute_logs,
    };
    let mut last_aggregate = resource.status_code();
    let mut stopped = false;
    let mut cancelled_upstream = false;

    loop {
        let step = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => Step::Cancelled,
            _ = deadline_reached(deadline_at) => Step::DeadlineExceeded,
            changed = poll_once(&mut resource, &ctx) => Step::Polled(changed),
        };

        let changed = match step {
            Step::Polled(changed) => changed,
            Step::Cancelled => {
                stopped = true;
                cancelled_upstream = true;
                resource.update_status(ActionableError::new(StatusCode::UserCancelled, MSG_CANCELLED))
            }
            Step::DeadlineExceeded => {
                stopped = true;
                let msg = format!(
                    "could not stabilize within {}",
                    format_duration(resource.deadline())
                );
                resource.update_status(ActionableError::new(StatusCode::DeadlineExceeded, msg))
            }
        };

        let aggregate = resource.status_code();
        if changed || aggregate != last_aggregate {
            last_aggregate = aggregate;
            if let Some(observer) = &ctx.observer {
                observer(&ResourceTransition {
                    resource: resource.to_string(),
                    status: resource.status().clone(),
                    aggregate,
                });
            }
        }

        let text = ctx.reporter.report_since_last_updated(&mut resource, opts);
        if !text.is_empty() {
            (ctx.writer)(&text);
        }

        if stopped || resource.is_complete() {
            break;
        }

        tokio::select! {
            _ = cancelled(&mut cancel_rx) => {}
            _ = deadline_reached(deadline_at) => {}
            _ = tokio::time::sleep(ctx.config.poll_interval) => {}
        }
    }

    let code = resource.status_code();
    if code.is_success() {
        info!(resource = %resource, "resource stabilized");
    } else {
        warn!(resource = %resource, %code, message = resource.status_message(), "resource failed");
        if ctx.config.fail_fast && !cancelled_upstream {
            debug!(resource = %resource, "cancelling remaining resources");
            ctx.cancel.send_replace(true);
        }
    }

    ResourceSummary {
        resource: resource.to_string(),
        code,
        message: resource.status_message().to_string(),
    }
}

/// Refresh pods if the resource has any, then poll once.
async fn poll_once(resource: &mut Resource, ctx: &WorkerContext) -> bool {
    let wants_pods =
        resource.selector().is_some() || resource.kind() == ResourceKind::StandalonePods;
    if let (Some(probe), true) = (&ctx.pod_probe, wants_pods) {
        match probe.probe(resource).await {
            Ok(pods) => resource.set_sub_resources(pods),
            Err(e) => warn!(resource = %resource, error = %e, "could not refresh pods"),
        }
    }
    resource.check_status(ctx.executor.as_ref(), &ctx.probe_cfg).await
}

/// Resolves once cancellation is requested.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves at `at`; never when there is no deadline.
async fn deadline_reached(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
