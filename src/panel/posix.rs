use crate::panel::classify;
use crate::panel::fallback::{run_chain, Attempt, ChainOutcome, OnFailure};
use crate::panel::platform::{
    settle_and_check, validate_pid, validate_service_name, ControlResult, HostOs, HostPlatform, KillError,
    ServiceState, ServiceStatus, SettleMessages,
};
use crate::panel::procs::ProcessDescriptor;
use crate::panel::runner::CommandRunner;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const STARTED: SettleMessages = SettleMessages {
    target: ServiceState::Running,
    converged: "Service started",
    pending: "Start command sent",
};

const STOPPED: SettleMessages = SettleMessages {
    target: ServiceState::Stopped,
    converged: "Service stopped",
    pending: "Stop command sent",
};

/// One row of `pm2 jlist`. Only the fields we read.
#[derive(Debug, Deserialize)]
struct Pm2Entry {
    name: String,
    #[serde(default)]
    pm2_env: Pm2Env,
}

#[derive(Debug, Default, Deserialize)]
struct Pm2Env {
    #[serde(default)]
    status: String,
}

/// Linux/macOS/BSD: pm2 when it knows the service, systemd otherwise.
pub struct PosixHost {
    os: HostOs,
    runner: Arc<dyn CommandRunner>,
    settle: Duration,
}

impl PosixHost {
    pub fn new(os: HostOs, runner: Arc<dyn CommandRunner>, settle: Duration) -> Self {
        Self { os, runner, settle }
    }

    /// `Ok(None)` when pm2 answered but does not manage `name`.
    async fn query_pm2(&self, name: &str) -> Result<Option<ServiceStatus>, String> {
        let out = self.runner.run(&["pm2", "jlist"]).await;
        if !out.success {
            return Err(out.error_text());
        }
        let list = parse_pm2_jlist(&out.stdout)?;
        Ok(list.into_iter().find(|p| p.name == name).map(|p| {
            let status = if p.pm2_env.status == "online" {
                ServiceState::Running
            } else {
                ServiceState::Stopped
            };
            ServiceStatus::new(status, format!("pm2: {}", p.pm2_env.status))
        }))
    }

    async fn query_systemd(&self, name: &str) -> ServiceStatus {
        let out = self.runner.run(&["systemctl", "is-active", name]).await;
        // is-active exits non-zero for anything but "active" yet still prints the state.
        let state = out.stdout.lines().next().unwrap_or("").trim().to_string();
        if !out.success && (state.is_empty() || !is_unit_state(&state)) {
            return ServiceStatus::error(out.error_text());
        }
        let status = match state.as_str() {
            "active" => ServiceState::Running,
            "inactive" => ServiceState::Stopped,
            _ => ServiceState::Unknown,
        };
        ServiceStatus::new(status, format!("systemctl: {state}"))
    }

    fn control_chain(verb: &str, name: &str) -> Vec<Attempt> {
        vec![
            Attempt::new("pm2", &["pm2", verb, name], OnFailure::TryNext),
            Attempt::new("systemd", &["sudo", "-n", "systemctl", verb, name], OnFailure::Surface),
        ]
    }

    async fn control(&self, verb: &str, name: &str, msgs: SettleMessages) -> ControlResult {
        if let Err(e) = validate_service_name(name) {
            return ControlResult::failed(e.to_string());
        }
        match run_chain(self.runner.as_ref(), name, &Self::control_chain(verb, name)).await {
            ChainOutcome::Issued { .. } => settle_and_check(self, name, self.settle, msgs).await,
            ChainOutcome::Failed { message, .. } => ControlResult::failed(message),
        }
    }
}

/// States `systemctl is-active` prints.
fn is_unit_state(s: &str) -> bool {
    matches!(
        s,
        "active" | "inactive" | "failed" | "activating" | "deactivating" | "reloading" | "maintenance" | "refreshing"
    )
}

fn parse_pm2_jlist(stdout: &str) -> Result<Vec<Pm2Entry>, String> {
    // pm2 may print banner lines (some starting with "[PM2]") before the JSON array.
    let mut last_err = "pm2 jlist: no JSON array in output".to_string();
    for (idx, _) in stdout.match_indices('[') {
        match serde_json::from_str::<Vec<Pm2Entry>>(&stdout[idx..]) {
            Ok(list) => return Ok(list),
            Err(e) => last_err = format!("pm2 jlist: invalid JSON: {e}"),
        }
    }
    Err(last_err)
}

#[async_trait]
impl HostPlatform for PosixHost {
    fn os(&self) -> HostOs {
        self.os
    }

    async fn query(&self, name: &str) -> ServiceStatus {
        if let Err(e) = validate_service_name(name) {
            return ServiceStatus::error(e.to_string());
        }
        match self.query_pm2(name).await {
            Ok(Some(st)) => return st,
            Ok(None) => log::debug!("[service] app={name} attempt=query backend=pm2 outcome=absent"),
            Err(e) => log::debug!("[service] app={name} attempt=query backend=pm2 outcome=unavailable err={e:?}"),
        }
        self.query_systemd(name).await
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
        let out = self.runner.run(&["kill", "-9", &pid_s]).await;
        if out.success {
            log::info!("[kill] pid={pid} signal=SIGKILL outcome=sent");
            return Ok(());
        }
        let err = KillError::from_output(pid, out.error_text());
        log::warn!("[kill] pid={pid} signal=SIGKILL outcome=failed err={err}");
        Err(err)
    }

    fn keep(&self, proc: &ProcessDescriptor) -> bool {
        classify::keep(self.os, proc)
    }
}
