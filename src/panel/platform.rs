use crate::panel::posix::PosixHost;
use crate::panel::procs::ProcessDescriptor;
use crate::panel::runner::CommandRunner;
use crate::panel::windows::WindowsHost;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Wait after issuing start/stop before the single follow-up status check.
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_millis(1000);

/// Host operating system, as far as process control cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostOs {
    Linux,
    MacOs,
    FreeBsd,
    Windows,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        Self::from_tag(std::env::consts::OS)
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            "freebsd" => HostOs::FreeBsd,
            "windows" => HostOs::Windows,
            _ => HostOs::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, HostOs::Windows)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::MacOs => "macos",
            HostOs::FreeBsd => "freebsd",
            HostOs::Windows => "windows",
            HostOs::Other => "other",
        }
    }
}

impl std::fmt::Display for HostOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Running,
    Stopped,
    Paused,
    Unknown,
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
            ServiceState::Paused => "paused",
            ServiceState::Unknown => "unknown",
            ServiceState::Error => "error",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: ServiceState,
    /// Untouched backend output, for operators.
    pub raw: String,
}

impl ServiceStatus {
    pub fn new(status: ServiceState, raw: impl Into<String>) -> Self {
        Self { status, raw: raw.into() }
    }

    pub fn error(raw: impl Into<String>) -> Self {
        Self::new(ServiceState::Error, raw)
    }
}

/// Outcome of start/stop. `success` means "accepted", not "converged".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
}

impl ControlResult {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KillError {
    #[error("invalid pid: {0}")]
    InvalidPid(i64),
    #[error("process {0} not found")]
    NotFound(i64),
    #[error("permission denied to kill process {0}")]
    PermissionDenied(i64),
    #[error("{0}")]
    Failed(String),
}

impl KillError {
    /// Map the text a kill/taskkill invocation printed onto an error kind.
    pub(crate) fn from_output(pid: i64, message: String) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("no such process") || m.contains("not found") {
            KillError::NotFound(pid)
        } else if m.contains("not permitted") || m.contains("access is denied") || m.contains("permission denied") {
            KillError::PermissionDenied(pid)
        } else {
            KillError::Failed(message)
        }
    }
}

/// Uniform service/process control over one host process model.
#[async_trait]
pub trait HostPlatform: Send + Sync {
    fn os(&self) -> HostOs;

    async fn query(&self, name: &str) -> ServiceStatus;

    async fn start(&self, name: &str) -> ControlResult;

    async fn stop(&self, name: &str) -> ControlResult;

    async fn kill(&self, pid: i64) -> Result<(), KillError>;

    fn keep(&self, proc: &ProcessDescriptor) -> bool;
}

/// Pick the platform variant once, at startup.
pub fn select_platform(os: HostOs, runner: Arc<dyn CommandRunner>, settle: Duration) -> Arc<dyn HostPlatform> {
    if os.is_windows() {
        Arc::new(WindowsHost::new(runner, settle))
    } else {
        Arc::new(PosixHost::new(os, runner, settle))
    }
}

/// Service names are passed as one argv entry to pm2/systemctl/sc/nssm. A leading '-' would read as an option.
pub fn validate_service_name(name: &str) -> anyhow::Result<()> {
    anyhow::ensure!(!name.trim().is_empty(), "service name is empty");
    anyhow::ensure!(!name.starts_with('-'), "service name must not start with '-': {name:?}");
    anyhow::ensure!(
        !name.chars().any(char::is_control),
        "invalid service name (control characters): {name:?}"
    );
    Ok(())
}

pub(crate) fn validate_pid(pid: i64) -> Result<(), KillError> {
    if pid <= 0 || pid > i64::from(u32::MAX) {
        return Err(KillError::InvalidPid(pid));
    }
    Ok(())
}

/// Messages reported after the settle check, depending on whether the target state was observed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SettleMessages {
    pub(crate) target: ServiceState,
    pub(crate) converged: &'static str,
    pub(crate) pending: &'static str,
}

/// Sleep once for `settle`, re-query, and describe what was seen. Always reports acceptance.
pub(crate) async fn settle_and_check<P>(platform: &P, name: &str, settle: Duration, msgs: SettleMessages) -> ControlResult
where
    P: HostPlatform + ?Sized,
{
    tokio::time::sleep(settle).await;
    let seen = platform.query(name).await;
    log::info!(
        "[service] app={name} attempt=settle_check target={} observed={} raw={:?}",
        msgs.target,
        seen.status,
        seen.raw
    );
    if seen.status == msgs.target {
        ControlResult::accepted(msgs.converged)
    } else {
        ControlResult::accepted(msgs.pending)
    }
}
