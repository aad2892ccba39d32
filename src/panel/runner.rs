use async_trait::async_trait;
use encoding_rs::Encoding;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Result of a single command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error_message: Option<String>,
    pub exit_code: Option<i32>,
}

impl CommandOutcome {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Human-readable failure text. Falls back to stderr/stdout when no message was recorded.
    pub fn error_text(&self) -> String {
        if let Some(m) = self.error_message.as_deref() {
            if !m.is_empty() {
                return m.to_string();
            }
        }
        if !self.stderr.is_empty() {
            return self.stderr.clone();
        }
        if !self.stdout.is_empty() {
            return self.stdout.clone();
        }
        "command failed".to_string()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, argv: &[&str]) -> CommandOutcome;
}

/// How raw child output bytes become text.
#[derive(Debug, Clone, Copy)]
pub enum OutputDecoding {
    Utf8,
    /// Strict decode with a legacy console code page; permissive UTF-8 if that fails.
    Legacy(&'static Encoding),
}

impl OutputDecoding {
    pub fn for_label(label: &str) -> anyhow::Result<Self> {
        let t = label.trim();
        if t.eq_ignore_ascii_case("utf-8") || t.eq_ignore_ascii_case("utf8") {
            return Ok(OutputDecoding::Utf8);
        }
        let enc = Encoding::for_label(t.as_bytes())
            .ok_or_else(|| anyhow::anyhow!("unknown console encoding label: {t:?}"))?;
        Ok(OutputDecoding::Legacy(enc))
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let text = match self {
            OutputDecoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            OutputDecoding::Legacy(enc) => match enc.decode_without_bom_handling_and_without_replacement(bytes) {
                Some(s) => s.into_owned(),
                None => String::from_utf8_lossy(bytes).into_owned(),
            },
        };
        text.trim().to_string()
    }
}

/// Runs real host programs through `tokio::process`.
#[derive(Debug, Clone)]
pub struct HostCommandRunner {
    timeout: Duration,
    decoding: OutputDecoding,
}

impl HostCommandRunner {
    pub fn new(timeout: Duration, decoding: OutputDecoding) -> Self {
        Self { timeout, decoding }
    }
}

impl Default for HostCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT, OutputDecoding::Utf8)
    }
}

#[async_trait]
impl CommandRunner for HostCommandRunner {
    async fn run(&self, argv: &[&str]) -> CommandOutcome {
        let Some((program, args)) = argv.split_first() else {
            return CommandOutcome::failed("empty command");
        };
        let display = argv.join(" ");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let ms = self.timeout.as_millis();
        let out = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                log::debug!("[runner] cmd={display:?} outcome=timeout timeout_ms={ms}");
                return CommandOutcome::failed(format!("command timed out after {ms}ms: {display}"));
            }
            Ok(Err(e)) => {
                log::debug!("[runner] cmd={display:?} outcome=spawn_failed err={e}");
                return CommandOutcome::failed(format!("failed to run {program}: {e}"));
            }
            Ok(Ok(out)) => out,
        };

        let stdout = self.decoding.decode(&out.stdout);
        let stderr = self.decoding.decode(&out.stderr);
        let exit_code = out.status.code();

        if out.status.success() {
            log::debug!("[runner] cmd={display:?} outcome=ok");
            return CommandOutcome {
                success: true,
                stdout,
                stderr,
                error_message: None,
                exit_code,
            };
        }

        let message = if !stderr.is_empty() {
            stderr.clone()
        } else if !stdout.is_empty() {
            stdout.clone()
        } else {
            format!("{program} exited with {}", out.status)
        };
        log::debug!(
            "[runner] cmd={display:?} outcome=failed exit_code={} err={message:?}",
            exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
        );
        CommandOutcome {
            success: false,
            stdout,
            stderr,
            error_message: Some(message),
            exit_code,
        }
    }
}
