use crate::panel::platform::HostPlatform;
use serde::{Deserialize, Serialize};
use sysinfo::System;

pub const DEFAULT_PROCESS_LIMIT: usize = 30;

/// One row of the OS process table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub pid: i64,
    pub name: String,
    /// Percent of total CPU capacity.
    pub cpu: f64,
    /// Percent of physical memory.
    pub mem: f64,
    #[serde(rename = "memRss")]
    pub mem_rss: u64,
    pub state: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessListing {
    pub processes: Vec<ProcessDescriptor>,
    /// Every process on the host, before filtering.
    pub total: usize,
}

/// Snapshot the host process table. Blocks for one CPU sampling interval.
pub fn snapshot() -> Vec<ProcessDescriptor> {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu();
    sys.refresh_processes();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes();

    let cpus = sys.cpus().len().max(1) as f64;
    let total_mem = sys.total_memory();
    sys.processes()
        .iter()
        .map(|(pid, p)| {
            let rss = p.memory();
            let mem = if total_mem == 0 {
                0.0
            } else {
                rss as f64 * 100.0 / total_mem as f64
            };
            ProcessDescriptor {
                pid: i64::from(pid.as_u32()),
                name: p.name().to_string(),
                cpu: f64::from(p.cpu_usage()) / cpus,
                mem,
                mem_rss: rss,
                state: format!("{:?}", p.status()).to_ascii_lowercase(),
            }
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Filter with `keep`, order by CPU descending, and cut to `limit` rows.
pub fn top_processes<F>(all: Vec<ProcessDescriptor>, keep: F, limit: usize) -> ProcessListing
where
    F: Fn(&ProcessDescriptor) -> bool,
{
    let total = all.len();
    let mut kept: Vec<ProcessDescriptor> = all.into_iter().filter(|p| keep(p)).collect();
    kept.sort_by(|a, b| b.cpu.total_cmp(&a.cpu).then_with(|| a.pid.cmp(&b.pid)));
    kept.truncate(limit);
    for p in &mut kept {
        p.cpu = round2(p.cpu);
        p.mem = round2(p.mem);
    }
    ProcessListing { processes: kept, total }
}

/// Full listing for the selected platform. Runs the table scan off the async workers.
pub async fn list_processes(platform: &dyn HostPlatform, limit: usize) -> anyhow::Result<ProcessListing> {
    let all = tokio::task::spawn_blocking(snapshot)
        .await
        .map_err(|e| anyhow::anyhow!("process table scan failed: {e}"))?;
    Ok(top_processes(all, |p| platform.keep(p), limit))
}
