use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use rollcheck_core::{format_duration, RollcheckConfig};
use rollcheck_status::{
    KubectlExecutor, KubectlPodProbe, MonitorConfig, Reporter, Resource,
    StatusCheckSummary, StatusMonitor,
};

/// Command-line overrides for `rollcheck check`.
#[derive(Debug, Default)]
pub struct CheckOptions {
    pub context: Option<String>,
    pub mute_logs: bool,
    pub deadline: Option<String>,
}

/// Run a status check. Returns whether every resource stabilized.
pub async fn check(config_path: &Path, opts: CheckOptions) -> anyhow::Result<bool> {
    let mut config = RollcheckConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    apply_overrides(&mut config, opts);
    config.validate()?;

    let resources = build_resources(&config)?;
    if resources.is_empty() {
        info!(config = %config_path.display(), "no resources to check");
        return Ok(true);
    }

    let sc = &config.status_check;
    let executor = Arc::new(KubectlExecutor::new(sc.kubectl.clone()));
    let probe = KubectlPodProbe::new(executor.clone(), sc.kube_context.clone())
        .with_log_tail(sc.log_tail);

    let monitor = StatusMonitor::new(executor)
        .with_config(MonitorConfig::from_status_check(sc)?)
        .with_pod_probe(Arc::new(probe))
        .with_reporter(Reporter::default())
        .with_report_writer(Arc::new(|text: &str| eprint!("{text}")));

    let canceller = monitor.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling status check");
            canceller.cancel();
        }
    });

    let summary = monitor.check(resources).await;
    ctrl_c.abort();

    print_summary(&summary);
    Ok(summary.is_success())
}

fn apply_overrides(config: &mut RollcheckConfig, opts: CheckOptions) {
    let sc = &mut config.status_check;
    if let Some(ctx) = opts.context {
        sc.kube_context = Some(ctx);
    }
    if opts.mute_logs {
        sc.mute_logs = true;
    }
    if let Some(deadline) = opts.deadline {
        sc.deadline = deadline;
        for res in &mut config.resources {
            res.deadline = None;
        }
    }
}

fn build_resources(config: &RollcheckConfig) -> anyhow::Result<Vec<Resource>> {
    let sc = &config.status_check;
    config
        .resources
        .iter()
        .map(|rc| -> anyhow::Result<Resource> {
            let mut resource = Resource::new(&rc.name, rc.kind, &rc.namespace, rc.deadline(sc)?)
                .with_tolerate_failures(sc.tolerate_failures);
            if let Some(selector) = &rc.selector {
                resource = resource.with_selector(selector.clone());
            }
            Ok(resource)
        })
        .collect()
}

fn print_summary(summary: &StatusCheckSummary) {
    let elapsed = format_duration(summary.elapsed);
    if summary.is_success() {
        eprintln!("✓ {} resource(s) stabilized in {elapsed}", summary.resources.len());
        return;
    }
    eprintln!(
        "✗ {} of {} resource(s) failed after {elapsed}:",
        summary.failures().count(),
        summary.resources.len()
    );
    for failed in summary.failures() {
        eprintln!("  {} [{}] {}", failed.resource, failed.code, failed.message.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rollcheck_core::ResourceKind;

    use super::*;

    const CONFIG: &str = r#"
[status_check]
deadline = "5m"
tolerate_failures = true

[[resources]]
kind = "deployment"
name = "web"
namespace = "shop"
selector = "app=web"

[[resources]]
kind = "pods"
name = "migrate"
selector = "job=migrate"
deadline = "30s"
"#;

    #[test]
    fn resources_from_config() {
        let config: RollcheckConfig = CONFIG.parse().unwrap();
        let resources = build_resources(&config).unwrap();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].to_string(), "shop:deployment/web");
        assert_eq!(resources[0].deadline(), Duration::from_secs(300));
        assert_eq!(resources[0].selector(), Some("app=web"));

        assert_eq!(resources[1].kind(), ResourceKind::StandalonePods);
        assert_eq!(resources[1].namespace(), "default");
        assert_eq!(resources[1].deadline(), Duration::from_secs(30));
    }

    #[test]
    fn cli_overrides_config() {
        let mut config: RollcheckConfig = CONFIG.parse().unwrap();
        apply_overrides(
            &mut config,
            CheckOptions {
                context: Some("kind-dev".to_string()),
                mute_logs: true,
                deadline: Some("45s".to_string()),
            },
        );

        assert_eq!(config.status_check.kube_context.as_deref(), Some("kind-dev"));
        assert!(config.status_check.mute_logs);
        let resources = build_resources(&config).unwrap();
        assert!(resources.iter().all(|r| r.deadline() == Duration::from_secs(45)));
    }

    #[test]
    fn no_overrides_keep_config() {
        let mut config: RollcheckConfig = CONFIG.parse().unwrap();
        apply_overrides(&mut config, CheckOptions::default());
        assert!(config.status_check.kube_context.is_none());
        assert!(!config.status_check.mute_logs);
        assert_eq!(config.resources[1].deadline.as_deref(), Some("30s"));
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = check(&dir.path().join("nope.toml"), CheckOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[tokio::test]
    async fn empty_config_succeeds_without_kubectl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcheck.toml");
        std::fs::write(&path, "[status_check]\nkubectl = \"/nonexistent/kubectl\"\n").unwrap();
        assert!(check(&path, CheckOptions::default()).await.unwrap());
    }
}
