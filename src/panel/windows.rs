use crate::panel::classify;
use crate::panel::fallback::{run_chain, Attempt, OnFailure};
use crate::panel::platform::{
    settle_and_check, validate_pid, validate_service_name, ControlResult, HostOs, HostPlatform, KillError,
    ServiceState, ServiceStatus, SettleMessages,
};
use crate::panel::procs::ProcessDescriptor;
use crate::panel::runner::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const STARTED: SettleMessages = SettleMessages {
    target: ServiceState::Running,
    converged: "Service started",
    pending: "Start command sent, waiting...",
};

const STOPPED: SettleMessages = SettleMessages {
    target: ServiceState::Stopped,
    converged: "Service stopped",
    pending: "Stop command sent, waiting...",
};

/// Windows: Service Control Manager for status, nssm for start/stop.
pub struct WindowsHost {
    runner: Arc<dyn CommandRunner>,
    settle: Duration,
}

impl WindowsHost {
    pub fn new(runner: Arc<dyn CommandRunner>, settle: Duration) -> Self {
        Self { runner, settle }
    }

    async fn control(&self, verb: &str, name: &str, msgs: SettleMessages) -> ControlResult {
        if let Err(e) = validate_service_name(name) {
            return ControlResult::failed(e.to_string());
        }
        // nssm exits non-zero for e.g. "already running"; the settle check tells the real story.
        let attempts = [Attempt::new("nssm", &["nssm", verb, name], OnFailure::Proceed)];
        run_chain(self.runner.as_ref(), name, &attempts).await;
        settle_and_check(self, name, self.settle, msgs).await
    }
}

/// Classify `sc query` output. Priority: RUNNING, STOPPED, PAUSED.
pub fn classify_sc_output(output: &str) -> ServiceState {
    if output.contains("RUNNING") {
        ServiceState::Running
    } else if output.contains("STOPPED") {
        ServiceState::Stopped
    } else if output.contains("PAUSED") {
        ServiceState::Paused
    } else {
        ServiceState::Unknown
    }
}

#[async_trait]
impl HostPlatform for WindowsHost {
    fn os(&self) -> HostOs {
        HostOs::Windows
    }

    async fn query(&self, name: &str) -> ServiceStatus {
        if let Err(e) = validate_service_name(name) {
            return ServiceStatus::error(e.to_string());
        }
        let out = self.runner.run(&["sc", "query", name]).await;
        if !out.success {
            return ServiceStatus::error(out.error_text());
        }
        ServiceStatus::new(classify_sc_output(&out.stdout), out.stdout)
    }

    async fn start(&self, name: &str) -> ControlResult {
        self.control("start", name, STARTED).await
    }

    async fn stop(&self, name: &str) -> ControlResult {
        self.control("stop", name, STOPPED).await
    }

    async fn kill(&self, pid: i64) -> Result<(), KillError> {
        validate_pid(pid)?;
        let pid_s = pid.to_string();
        let out = self.runner.run(&["taskkill", "/PID", &pid_s, "/F"]).await;
        if out.success {
            log::info!("[kill] pid={pid} method=taskkill outcome=sent");
            return Ok(());
        }
        let err = KillError::from_output(pid, out.error_text());
        log::warn!("[kill] pid={pid} method=taskkill outcome=failed err={err}");
        Err(err)
    }

    fn keep(&self, proc: &ProcessDescriptor) -> bool {
        classify::keep(HostOs::Windows, proc)
    }
}
