//! rollcheck.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::ResourceKind;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollcheckConfig {
    #[serde(default)]
    pub status_check: StatusCheckConfig,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCheckConfig {
    /// kubeconfig context to target; kubectl's current context when unset.
    pub kube_context: Option<String>,
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
    /// Default per-resource deadline (e.g., "10m").
    #[serde(default = "default_deadline")]
    pub deadline: String,
    /// Delay between two polls of the same resource (e.g., "1s").
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default)]
    pub mute_logs: bool,
    /// Cancel every other resource once one fails.
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    /// Keep polling failed resources until their deadline.
    #[serde(default)]
    pub tolerate_failures: bool,
    /// Number of log lines fetched for an unhealthy container.
    #[serde(default = "default_log_tail")]
    pub log_tail: u32,
}

impl Default for StatusCheckConfig {
    fn default() -> Self {
        Self {
            kube_context: None,
            kubectl: default_kubectl(),
            deadline: default_deadline(),
            poll_interval: default_poll_interval(),
            mute_logs: false,
            fail_fast: true,
            tolerate_failures: false,
            log_tail: default_log_tail(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Label selector for the resource's pods (e.g., "app=web").
    pub selector: Option<String>,
    /// Overrides `status_check.deadline` for this resource.
    pub deadline: Option<String>,
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_deadline() -> String {
    "10m".to_string()
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_log_tail() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

impl RollcheckConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        content.parse()
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check names, selectors and duration strings.
    pub fn validate(&self) -> ConfigResult<()> {
        self.status_check.deadline()?;
        self.status_check.poll_interval()?;

        for res in &self.resources {
            if res.name.trim().is_empty() {
                return Err(ConfigError::InvalidResource(format!(
                    "{} resource in namespace {:?} has an empty name",
                    res.kind, res.namespace
                )));
            }
            if res.kind == ResourceKind::StandalonePods && res.selector.is_none() {
                return Err(ConfigError::InvalidResource(format!(
                    "pods/{} needs a selector",
                    res.name
                )));
            }
            res.deadline(&self.status_check)?;
        }
        Ok(())
    }

    /// Scaffold a config tracking a single deployment.
    pub fn scaffold(name: &str, namespace: &str) -> Self {
        RollcheckConfig {
            status_check: StatusCheckConfig::default(),
            resources: vec![ResourceConfig {
                kind: ResourceKind::Deployment,
                name: name.to_string(),
                namespace: namespace.to_string(),
                selector: Some(format!("app={name}")),
                deadline: None,
            }],
        }
    }
}

impl std::str::FromStr for RollcheckConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl StatusCheckConfig {
    pub fn deadline(&self) -> ConfigResult<Duration> {
        duration_field("status_check.deadline", &self.deadline)
    }

    pub fn poll_interval(&self) -> ConfigResult<Duration> {
        duration_field("status_check.poll_interval", &self.poll_interval)
    }
}

impl ResourceConfig {
    /// Effective deadline for this resource.
    pub fn deadline(&self, defaults: &StatusCheckConfig) -> ConfigResult<Duration> {
        match &self.deadline {
            Some(d) => duration_field(&format!("{}/{}.deadline", self.kind, self.name), d),
            None => defaults.deadline(),
        }
    }
}

fn duration_field(field: &str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "2m", "1h".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok()?.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Render a duration compactly: "500ms", "10s", "1m30s", "1h5m".
pub fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms == 0 {
        return "0s".to_string();
    }
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let secs = d.as_secs();
    let (hours, mins, rem) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let millis = d.subsec_millis();

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if mins > 0 {
        out.push_str(&format!("{mins}m"));
    }
    if millis > 0 {
        let frac = format!("{millis:03}");
        out.push_str(&format!("{rem}.{}s", frac.trim_end_matches('0')));
    } else if rem > 0 {
        out.push_str(&format!("{rem}s"));
    }
    out
}
