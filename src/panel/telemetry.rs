use serde::Serialize;
use std::time::Instant;
use sysinfo::{Components, Disks, Networks, System};

#[derive(Debug, Clone, Serialize)]
pub struct CpuSummary {
    pub load: f64,
    pub cores: Vec<f64>,
    /// Hottest CPU sensor in °C; `None` where the host exposes no CPU sensors.
    pub temp: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemorySummary {
    pub total: u64,
    pub used: u64,
    /// total - available.
    pub active: u64,
    pub available: u64,
    /// `active` as a percentage of `total`.
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskSummary {
    pub fs: String,
    pub mount: String,
    pub size: u64,
    pub used: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub iface: String,
    pub rx_sec: f64,
    pub tx_sec: f64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSummary {
    pub cpu: CpuSummary,
    pub memory: MemorySummary,
    pub disk: Vec<DiskSummary>,
    pub network: Vec<NetworkSummary>,
    pub uptime: u64,
    pub os: String,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

const CPU_SENSOR_MARKERS: &[&str] = &["cpu", "core", "package", "tctl", "tdie", "k10temp", "coretemp"];

/// Max temperature among readings whose label names a CPU sensor.
pub fn cpu_temperature<'a, I>(readings: I) -> Option<f32>
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    readings
        .into_iter()
        .filter(|(label, t)| {
            let l = label.to_ascii_lowercase();
            t.is_finite() && CPU_SENSOR_MARKERS.iter().any(|m| l.contains(m))
        })
        .map(|(_, t)| t)
        .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |a| a.max(t))))
}

/// Collect a host summary. Blocks for one CPU sampling interval.
pub fn collect() -> SystemSummary {
    let mut sys = System::new();
    let mut networks = Networks::new_with_refreshed_list();
    sys.refresh_cpu();
    let t0 = Instant::now();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();
    networks.refresh();
    let secs = t0.elapsed().as_secs_f64().max(0.001);

    let components = Components::new_with_refreshed_list();
    let cpu = CpuSummary {
        load: round2(f64::from(sys.global_cpu_info().cpu_usage())),
        cores: sys.cpus().iter().map(|c| round2(f64::from(c.cpu_usage()))).collect(),
        temp: cpu_temperature(components.iter().map(|c| (c.label(), c.temperature()))),
    };

    let total = sys.total_memory();
    let available = sys.available_memory();
    let active = total.saturating_sub(available);
    let memory = MemorySummary {
        total,
        used: sys.used_memory(),
        active,
        available,
        percent: percent(active, total),
    };

    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .iter()
        .map(|d| {
            let size = d.total_space();
            let used = size.saturating_sub(d.available_space());
            DiskSummary {
                fs: d.name().to_string_lossy().to_string(),
                mount: d.mount_point().display().to_string(),
                size,
                used,
                percent: percent(used, size),
            }
        })
        .collect();

    let mut network: Vec<NetworkSummary> = networks
        .iter()
        .map(|(iface, data)| NetworkSummary {
            iface: iface.clone(),
            rx_sec: round2(data.received() as f64 / secs),
            tx_sec: round2(data.transmitted() as f64 / secs),
            rx_bytes: data.total_received(),
            tx_bytes: data.total_transmitted(),
        })
        .collect();
    network.sort_by(|a, b| a.iface.cmp(&b.iface));

    let os = match (System::name(), System::os_version()) {
        (Some(n), Some(v)) => format!("{n} {v}"),
        (Some(n), None) => n,
        _ => std::env::consts::OS.to_string(),
    };

    SystemSummary {
        cpu,
        memory,
        disk,
        network,
        uptime: System::uptime(),
        os,
    }
}

pub async fn collect_async() -> anyhow::Result<SystemSummary> {
    tokio::task::spawn_blocking(collect)
        .await
        .map_err(|e| anyhow::anyhow!("telemetry collection failed: {e}"))
}
