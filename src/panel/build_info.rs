use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub host: &'static str,
    pub built: String,
    pub banner: String,
}

pub fn build_host() -> &'static str {
    option_env!("MCPANEL_BUILD_HOST").unwrap_or("unknown")
}

pub fn build_epoch_raw() -> &'static str {
    option_env!("MCPANEL_BUILD_EPOCH").unwrap_or("")
}

/// Seconds since the epoch as UTC "YYYY-MM-DD HH:MM:SS"; "unknown" if unparsable.
pub fn format_build_time(raw: &str) -> String {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn banner() -> String {
    format!(
        "mcpanel {VERSION} (built on {} at {}).",
        build_host(),
        format_build_time(build_epoch_raw())
    )
}

pub fn info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        host: build_host(),
        built: format_build_time(build_epoch_raw()),
        banner: banner(),
    }
}
