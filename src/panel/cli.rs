use crate::panel::config::{self, PanelConfig};
use crate::panel::platform::{select_platform, HostOs, HostPlatform, ServiceStatus};
use crate::panel::procs::{list_processes, ProcessListing};
use crate::panel::rcon::{resolve_target, send_command, TcpConsoleConnector};
use crate::panel::runner::{HostCommandRunner, OutputDecoding};
use crate::panel::web_console::{self, WebState};
use crate::panel::build_info;
use clap::ValueEnum;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "mcpanel", version, about = "game server admin panel")]
pub struct Args {
    /// Path to config YAML
    #[arg(short = 'c', long = "config", default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Run the web dashboard (default)
    Serve,
    /// Show the managed service's status
    Status {
        /// Output format: text (default) or json
        #[arg(long = "format", default_value = "text")]
        format: OutputFormat,
    },
    /// Start the managed service
    Start,
    /// Stop the managed service
    Stop,
    /// List user processes by CPU usage
    Ps {
        /// Max rows (defaults to processes.limit)
        #[arg(short = 'n')]
        n: Option<usize>,
        /// Output format: text (default) or json
        #[arg(long = "format", default_value = "text")]
        format: OutputFormat,
    },
    /// Forcefully kill a process
    Kill { pid: i64 },
    /// Send one command over RCON and print the reply
    Rcon {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print a bcrypt hash for auth.password_hash
    HashPassword { password: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Host platform for this machine, with command output decoded the way its console writes it.
pub fn host_platform(cfg: &PanelConfig) -> anyhow::Result<Arc<dyn HostPlatform>> {
    let os = HostOs::current();
    let decoding = if os.is_windows() {
        OutputDecoding::for_label(&cfg.service.console_encoding)?
    } else {
        OutputDecoding::Utf8
    };
    let runner = HostCommandRunner::new(cfg.service.command_timeout(), decoding);
    Ok(select_platform(os, Arc::new(runner), cfg.service.settle()))
}

fn render_status(name: &str, st: &ServiceStatus) -> String {
    let raw = st.raw.trim();
    if raw.is_empty() {
        return format!("{name}: {}", st.status);
    }
    let mut out = format!("{name}: {}", st.status);
    for line in raw.lines() {
        out.push_str("\n  ");
        out.push_str(line.trim_end());
    }
    out
}

fn render_processes(l: &ProcessListing) -> String {
    let mut out = format!(
        "{:>8}  {:>6}  {:>6}  {:>10}  {:<10}  {}",
        "PID", "CPU%", "MEM%", "RSS", "STATE", "NAME"
    );
    for p in &l.processes {
        out.push_str(&format!(
            "\n{:>8}  {:>6.2}  {:>6.2}  {:>10}  {:<10}  {}",
            p.pid, p.cpu, p.mem, p.mem_rss, p.state, p.name
        ));
    }
    out.push_str(&format!("\n({} shown, {} total)", l.processes.len(), l.total));
    out
}

pub async fn run() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    if let Some(Cmd::HashPassword { password }) = &args.cmd {
        anyhow::ensure!(!password.is_empty(), "password must not be empty");
        let h = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| anyhow::anyhow!("bcrypt failed: {e}"))?;
        println!("{h}");
        return Ok(());
    }

    let cfg = config::load_config(&args.config)?;
    let platform = host_platform(&cfg)?;
    let name = cfg.service.name.clone();

    match args.cmd {
        None | Some(Cmd::Serve) => {
            log::info!("[main] {}", build_info::banner());
            let timeout = cfg.rcon.timeout();
            let st = WebState::new(cfg, platform, Arc::new(TcpConsoleConnector::new(timeout)));
            web_console::serve(st).await
        }
        Some(Cmd::Status { format }) => {
            let st = platform.query(&name).await;
            match format {
                OutputFormat::Text => println!("{}", render_status(&name, &st)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&st)?),
            }
            Ok(())
        }
        Some(Cmd::Start) => {
            let r = platform.start(&name).await;
            anyhow::ensure!(r.success, "{}", r.message);
            println!("{}", r.message);
            Ok(())
        }
        Some(Cmd::Stop) => {
            let r = platform.stop(&name).await;
            anyhow::ensure!(r.success, "{}", r.message);
            println!("{}", r.message);
            Ok(())
        }
        Some(Cmd::Ps { n, format }) => {
            let limit = n.unwrap_or(cfg.processes.limit);
            let l = list_processes(platform.as_ref(), limit).await?;
            match format {
                OutputFormat::Text => println!("{}", render_processes(&l)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&l)?),
            }
            Ok(())
        }
        Some(Cmd::Kill { pid }) => {
            platform.kill(pid).await?;
            println!("Process {pid} killed");
            Ok(())
        }
        Some(Cmd::Rcon { command }) => {
            let target = resolve_target(&cfg.rcon)?;
            let connector = TcpConsoleConnector::new(cfg.rcon.timeout());
            let reply = send_command(&connector, &target, &command.join(" ")).await?;
            if !reply.trim().is_empty() {
                println!("{}", reply.trim_end());
            }
            Ok(())
        }
        Some(Cmd::HashPassword { .. }) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::platform::ServiceState;
    use crate::panel::procs::ProcessDescriptor;

    #[test]
    fn parses_subcommands() {
        let a = Args::try_parse_from(["mcpanel"]).unwrap();
        assert_eq!(a.config, PathBuf::from("config.yaml"));
        assert!(a.cmd.is_none());

        let a = Args::try_parse_from(["mcpanel", "-c", "/etc/mcpanel.yaml", "status", "--format", "json"]).unwrap();
        assert_eq!(a.config, PathBuf::from("/etc/mcpanel.yaml"));
        assert!(matches!(a.cmd, Some(Cmd::Status { format: OutputFormat::Json })));

        let a = Args::try_parse_from(["mcpanel", "rcon", "say", "hello", "-world"]).unwrap();
        match a.cmd {
            Some(Cmd::Rcon { command }) => assert_eq!(command.join(" "), "say hello -world"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(Args::try_parse_from(["mcpanel", "rcon"]).is_err());
        assert!(Args::try_parse_from(["mcpanel", "kill", "abc"]).is_err());
        assert!(matches!(
            Args::try_parse_from(["mcpanel", "kill", "42"]).unwrap().cmd,
            Some(Cmd::Kill { pid: 42 })
        ));
    }

    #[test]
    fn status_text_indents_raw_output() {
        let st = ServiceStatus::new(ServiceState::Running, "SERVICE_NAME: mc\r\n  STATE : 4  RUNNING");
        assert_eq!(render_status("mc", &st), "mc: running\n  SERVICE_NAME: mc\n    STATE : 4  RUNNING");
        assert_eq!(render_status("mc", &ServiceStatus::new(ServiceState::Stopped, "")), "mc: stopped");
    }

    #[test]
    fn process_table_has_a_footer() {
        let l = ProcessListing {
            processes: vec![ProcessDescriptor {
                pid: 1234,
                name: "java".to_string(),
                cpu: 12.5,
                mem: 3.25,
                mem_rss: 2048,
                state: "run".to_string(),
            }],
            total: 200,
        };
        let text = render_processes(&l);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("PID") && lines[0].ends_with("NAME"));
        assert!(lines[1].contains("1234") && lines[1].contains("12.50") && lines[1].ends_with("java"));
        assert_eq!(lines[2], "(1 shown, 200 total)");
    }
}
