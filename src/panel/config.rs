use crate::panel::procs::DEFAULT_PROCESS_LIMIT;
use crate::panel::runner::OutputDecoding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub dashboard: DashboardConfig,
    pub auth: AuthConfig,
    pub service: ServiceConfig,
    pub rcon: RconConfig,
    pub processes: ProcessesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub bind: String,
    pub port: u16,
    /// Directory served for every non-API path.
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// bcrypt hash of the dashboard password (`mcpanel hash-password`).
    pub password_hash: Option<String>,
    pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// pm2 app / systemd unit / Windows service name of the game server.
    pub name: String,
    pub settle_ms: u64,
    pub command_timeout_ms: u64,
    /// Code page used to decode command output on Windows.
    pub console_encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub timeout_ms: u64,
    pub server_properties_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessesConfig {
    pub limit: usize,
}

impl ServiceConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl RconConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_hash: None,
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            password: None,
            timeout_ms: default_rcon_timeout_ms(),
            server_properties_path: None,
        }
    }
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            limit: default_process_limit(),
        }
    }
}

// -------- YAML file schema (grouped; strict) --------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DashboardConfigFile {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_static_dir")]
    static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthConfigFile {
    #[serde(default)]
    password_hash: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    session_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceConfigFile {
    name: String,
    #[serde(default = "default_settle_ms")]
    settle_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    command_timeout_ms: u64,
    #[serde(default = "default_console_encoding")]
    console_encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RconConfigFile {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_password")]
    password: Option<String>,
    #[serde(default = "default_rcon_timeout_ms")]
    timeout_ms: u64,
    #[serde(default)]
    server_properties_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProcessesConfigFile {
    #[serde(default = "default_process_limit")]
    limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PanelConfigFile {
    #[serde(default)]
    dashboard: Option<DashboardConfigFile>,
    #[serde(default)]
    auth: Option<AuthConfigFile>,
    #[serde(default)]
    service: Option<ServiceConfigFile>,
    #[serde(default)]
    rcon: Option<RconConfigFile>,
    #[serde(default)]
    processes: Option<ProcessesConfigFile>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_static_dir() -> PathBuf {
    "public".into()
}
fn default_session_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_settle_ms() -> u64 {
    1000
}
fn default_command_timeout_ms() -> u64 {
    15_000
}
fn default_console_encoding() -> String {
    "gbk".to_string()
}
fn default_rcon_timeout_ms() -> u64 {
    5000
}
fn default_process_limit() -> usize {
    DEFAULT_PROCESS_LIMIT
}

/// RCON passwords are often numeric in hand-written configs; accept both.
fn deserialize_password<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let v = serde_yaml::Value::deserialize(deserializer)?;
    match v {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(D::Error::custom("rcon.password must be a string")),
    }
}

pub fn load_config(config_path: &Path) -> anyhow::Result<PanelConfig> {
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", config_path.display()))?;
    parse_config(&raw, config_path)
}

fn parse_config(raw: &str, config_path: &Path) -> anyhow::Result<PanelConfig> {
    let file_cfg: PanelConfigFile = serde_yaml::from_str(raw)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", config_path.display()))?;

    let Some(svc) = file_cfg.service else {
        anyhow::bail!("missing required config section: service (must define name)");
    };
    let name = svc.name.trim().to_string();
    anyhow::ensure!(!name.is_empty(), "service.name must not be empty");
    crate::panel::platform::validate_service_name(&name)
        .map_err(|e| anyhow::anyhow!("service.name: {e}"))?;
    anyhow::ensure!(svc.command_timeout_ms > 0, "service.command_timeout_ms must be > 0");
    OutputDecoding::for_label(&svc.console_encoding)
        .map_err(|e| anyhow::anyhow!("service.console_encoding: {e}"))?;

    let mut cfg = PanelConfig {
        dashboard: DashboardConfig::default(),
        auth: AuthConfig::default(),
        service: ServiceConfig {
            name,
            settle_ms: svc.settle_ms,
            command_timeout_ms: svc.command_timeout_ms,
            console_encoding: svc.console_encoding,
        },
        rcon: RconConfig::default(),
        processes: ProcessesConfig::default(),
    };

    if let Some(d) = file_cfg.dashboard {
        cfg.dashboard.bind = d.bind;
        cfg.dashboard.port = d.port;
        cfg.dashboard.static_dir = d.static_dir;
    }
    if let Some(a) = file_cfg.auth {
        if let Some(h) = a.password_hash.as_deref() {
            anyhow::ensure!(
                h.starts_with("$2"),
                "auth.password_hash must be a bcrypt hash (generate one with `mcpanel hash-password`)"
            );
        }
        anyhow::ensure!(a.session_ttl_secs > 0, "auth.session_ttl_secs must be > 0");
        cfg.auth.password_hash = a.password_hash;
        cfg.auth.session_ttl_secs = a.session_ttl_secs;
    }
    if let Some(r) = file_cfg.rcon {
        if let Some(h) = r.host.as_deref() {
            anyhow::ensure!(!h.trim().is_empty(), "rcon.host must not be empty if provided");
        }
        anyhow::ensure!(r.timeout_ms > 0, "rcon.timeout_ms must be > 0");
        cfg.rcon.host = r.host.map(|h| h.trim().to_string());
        cfg.rcon.port = r.port;
        cfg.rcon.password = r.password;
        cfg.rcon.timeout_ms = r.timeout_ms;
        cfg.rcon.server_properties_path = r.server_properties_path;
    }
    if let Some(p) = file_cfg.processes {
        anyhow::ensure!(p.limit > 0, "processes.limit must be > 0");
        cfg.processes.limit = p.limit;
    }

    // Resolve relative paths against the config file directory.
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    if cfg.dashboard.static_dir.is_relative() {
        cfg.dashboard.static_dir = base.join(&cfg.dashboard.static_dir);
    }
    if let Some(p) = cfg.rcon.server_properties_path.clone() {
        if p.is_relative() {
            cfg.rcon.server_properties_path = Some(base.join(p));
        }
    }

    Ok(cfg)
}

/// Parse a Java-style `server.properties` file into key/value pairs.
pub fn read_server_properties(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    Ok(parse_properties(&raw))
}

pub fn parse_properties(raw: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in raw.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        out.insert(k.trim().to_string(), v.trim().to_string());
    }
    out
}
