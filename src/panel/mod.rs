pub mod build_info;
pub mod classify;
pub mod cli;
pub mod config;
pub mod fallback;
pub mod platform;
pub mod posix;
pub mod procs;
pub mod rcon;
pub mod runner;
pub mod telemetry;
pub mod web_console;
pub mod windows;

pub async fn main() -> anyhow::Result<()> {
    cli::run().await
}
