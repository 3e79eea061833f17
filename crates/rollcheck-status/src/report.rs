//! Progress reporting with change dedup.
//!
//! The reporter renders a resource and its failing children only when the
//! resource's outcome changed since the last report. Child logs are shown
//! inline; when muted, long logs are cut to a short tail and the full text
//! goes to a [`LogSink`].

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use rollcheck_core::{StatusCode, SubResourceStatus};

use crate::resource::Resource;

/// Tool name used in the default log location.
pub const TOOL_NAME: &str = "rollcheck";

/// Log lines kept inline when muting.
pub const MAX_LOG_LINES: usize = 3;

const HEADER: &str = " - ";
const CHILD_HEADER: &str = "    - ";
const DETAIL_INDENT: &str = "      ";

/// Explicit reporting switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Show only a log tail inline and persist the full logs.
    pub mute_logs: bool,
}

/// Destination for full child logs when reporting is muted.
pub trait LogSink: Send + Sync {
    /// Store `lines` for `pod`, replacing anything stored before.
    /// Returns where the logs can be found.
    fn persist(&self, pod: &str, lines: &[String]) -> std::io::Result<PathBuf>;
}

/// Writes logs to `<dir>/<pod>.log`.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<tmp>/rollcheck/statuscheck`.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join(TOOL_NAME).join("statuscheck")
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl Default for FileLogSink {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

impl LogSink for FileLogSink {
    fn persist(&self, pod: &str, lines: &[String]) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{pod}.log"));
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Renders resource progress since the last report.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn LogSink>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Text describing `resource`, or `""` when there is nothing new.
    ///
    /// Marks the current outcome as reported; a second call without an
    /// intervening status change returns `""`.
    pub fn report_since_last_updated(&self, resource: &mut Resource, opts: ReportOptions) -> String {
        if resource.status.reported || resource.status.ae.code == StatusCode::Unset {
            return String::new();
        }

        let mut out = String::new();
        let message = resource.status_message().trim_end();
        let _ = writeln!(out, "{HEADER}{resource}: {message}");

        for pod in resource.resources.values() {
            let message = pod.message().trim_end();
            if message.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{CHILD_HEADER}{pod}: {message}");
            self.write_logs(&mut out, pod, opts);
        }

        resource.mark_reported();
        out
    }

    fn write_logs(&self, out: &mut String, pod: &SubResourceStatus, opts: ReportOptions) {
        let logs = pod.logs();
        let truncate = opts.mute_logs && logs.len() > MAX_LOG_LINES;
        let shown = if truncate {
            &logs[logs.len() - MAX_LOG_LINES..]
        } else {
            logs
        };

        for line in shown {
            let _ = writeln!(out, "{DETAIL_INDENT}> {}", line.trim_end());
        }

        if truncate {
            match self.sink.persist(pod.name(), logs) {
                Ok(path) => {
                    let _ = writeln!(out, "{DETAIL_INDENT}Full logs at {}", path.display());
                }
                Err(e) => {
                    warn!(pod = %pod, error = %e, "failed to persist pod logs");
                }
            }
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(Arc::new(FileLogSink::default()))
    }
}
