use crate::panel::config::{read_server_properties, RconConfig};
use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const DEFAULT_RCON_HOST: &str = "127.0.0.1";
pub const DEFAULT_RCON_PORT: u16 = 25575;

const PACKET_AUTH: i32 = 3;
const PACKET_AUTH_RESPONSE: i32 = 2;
const PACKET_EXEC: i32 = 2;
const PACKET_RESPONSE: i32 = 0;
/// id + type + two terminating nulls.
const PACKET_OVERHEAD: usize = 10;
const MAX_PACKET_LEN: usize = 64 * 1024;
const MAX_COMMAND_LEN: usize = 1446;

/// Where and how to reach the game server's remote console. Used for exactly one session.
#[derive(Clone, PartialEq, Eq)]
pub struct RconTarget {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl std::fmt::Debug for RconTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RconTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RconTarget {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("rcon connection to {addr} failed: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("rcon authentication failed (wrong password?)")]
    Auth,
    #[error("rcon protocol error: {0}")]
    Protocol(String),
    #[error("rcon timed out after {0}ms")]
    Timeout(u64),
    #[error("rcon i/o error: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait ConsoleConnector: Send + Sync {
    /// Connect and authenticate. On failure nothing is left open.
    async fn open(&self, target: &RconTarget) -> Result<Box<dyn ConsoleConnection>, ConsoleError>;
}

#[async_trait]
pub trait ConsoleConnection: Send {
    async fn send(&mut self, command: &str) -> Result<String, ConsoleError>;

    async fn close(&mut self) -> Result<(), ConsoleError>;
}

/// Open one session, run one command, and always close the session before returning.
pub async fn send_command(
    connector: &dyn ConsoleConnector,
    target: &RconTarget,
    command: &str,
) -> Result<String, ConsoleError> {
    let mut conn = connector.open(target).await?;
    let result = conn.send(command).await;
    if let Err(e) = conn.close().await {
        log::debug!("[rcon] addr={} attempt=close outcome=failed err={e}", target.addr());
    }
    match &result {
        Ok(_) => log::info!("[rcon] addr={} command={command:?} outcome=ok", target.addr()),
        Err(e) => log::warn!("[rcon] addr={} command={command:?} outcome=failed err={e}", target.addr()),
    }
    result
}

/// Resolve host/port/password: explicit config first, then `server.properties`.
pub fn resolve_target(cfg: &RconConfig) -> anyhow::Result<RconTarget> {
    let props = match cfg.server_properties_path.as_deref() {
        Some(p) => match read_server_properties(p) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("[rcon] attempt=read_properties outcome=failed err={e:#}");
                Default::default()
            }
        },
        None => Default::default(),
    };
    let non_empty = |k: &str| props.get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let host = cfg
        .host
        .clone()
        .or_else(|| non_empty("server-ip"))
        .unwrap_or_else(|| DEFAULT_RCON_HOST.to_string());
    let port = match cfg.port {
        Some(p) => p,
        None => match non_empty("rcon.port") {
            Some(v) => v
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("invalid rcon.port {v:?} in server.properties: {e}"))?,
            None => DEFAULT_RCON_PORT,
        },
    };
    let password = cfg
        .password
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| non_empty("rcon.password"))
        .ok_or_else(|| anyhow::anyhow!("Cannot read RCON password"))?;
    Ok(RconTarget { host, port, password })
}

/// Minecraft-style RCON over TCP.
#[derive(Debug, Clone)]
pub struct TcpConsoleConnector {
    timeout: Duration,
}

impl TcpConsoleConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

pub struct TcpConsoleConnection {
    stream: TcpStream,
    next_id: i32,
    timeout: Duration,
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, ConsoleError>
where
    F: std::future::Future<Output = Result<T, ConsoleError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(r) => r,
        Err(_) => Err(ConsoleError::Timeout(timeout.as_millis() as u64)),
    }
}

pub(crate) fn encode_packet(id: i32, kind: i32, body: &str) -> Vec<u8> {
    let len = (body.len() + PACKET_OVERHEAD) as i32;
    let mut buf = Vec::with_capacity(body.len() + PACKET_OVERHEAD + 4);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&id.to_le_bytes());
    buf.extend_from_slice(&kind.to_le_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Packet {
    pub(crate) id: i32,
    pub(crate) kind: i32,
    pub(crate) body: String,
}

pub(crate) async fn read_packet<R>(r: &mut R) -> Result<Packet, ConsoleError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match r.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ConsoleError::Protocol("connection closed by server".to_string()));
        }
        Err(e) => return Err(e.into()),
    }
    let len = i32::from_le_bytes(len_buf);
    if len < PACKET_OVERHEAD as i32 || len as usize > MAX_PACKET_LEN {
        return Err(ConsoleError::Protocol(format!("invalid packet length {len}")));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ConsoleError::Protocol("truncated packet".to_string()),
        _ => ConsoleError::Io(e),
    })?;
    let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let body = &payload[8..];
    let Some(body) = body.strip_suffix(&[0, 0]) else {
        return Err(ConsoleError::Protocol("packet is missing its null terminator".to_string()));
    };
    Ok(Packet {
        id,
        kind,
        body: String::from_utf8_lossy(body).into_owned(),
    })
}

impl TcpConsoleConnection {
    async fn request(&mut self, kind: i32, body: &str) -> Result<Packet, ConsoleError> {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let frame = encode_packet(id, kind, body);
        let stream = &mut self.stream;
        bounded(self.timeout, async move {
            stream.write_all(&frame).await?;
            stream.flush().await?;
            read_packet(stream).await
        })
        .await
    }

    async fn authenticate(&mut self, password: &str) -> Result<(), ConsoleError> {
        let expected = self.next_id;
        let mut reply = self.request(PACKET_AUTH, password).await?;
        // Some servers send an empty RESPONSE_VALUE ahead of the auth response.
        if reply.kind == PACKET_RESPONSE && reply.id == expected {
            let stream = &mut self.stream;
            reply = bounded(self.timeout, read_packet(stream)).await?;
        }
        if reply.id == -1 {
            return Err(ConsoleError::Auth);
        }
        if reply.kind != PACKET_AUTH_RESPONSE || reply.id != expected {
            return Err(ConsoleError::Protocol(format!(
                "unexpected auth reply id={} type={}",
                reply.id, reply.kind
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConsoleConnector for TcpConsoleConnector {
    async fn open(&self, target: &RconTarget) -> Result<Box<dyn ConsoleConnection>, ConsoleError> {
        let addr = target.addr();
        let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await {
            Err(_) => return Err(ConsoleError::Timeout(self.timeout.as_millis() as u64)),
            Ok(Err(source)) => return Err(ConsoleError::Connect { addr, source }),
            Ok(Ok(s)) => s,
        };
        let mut conn = TcpConsoleConnection {
            stream,
            next_id: 1,
            timeout: self.timeout,
        };
        if let Err(e) = conn.authenticate(&target.password).await {
            if let Err(close_err) = conn.close().await {
                log::debug!("[rcon] addr={addr} attempt=close outcome=failed err={close_err}");
            }
            return Err(e);
        }
        log::debug!("[rcon] addr={addr} attempt=open outcome=authenticated");
        Ok(Box::new(conn))
    }
}

#[async_trait]
impl ConsoleConnection for TcpConsoleConnection {
    async fn send(&mut self, command: &str) -> Result<String, ConsoleError> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(ConsoleError::Protocol(format!(
                "command too long ({} bytes, max {MAX_COMMAND_LEN})",
                command.len()
            )));
        }
        let expected = self.next_id;
        let reply = self.request(PACKET_EXEC, command).await?;
        if reply.kind != PACKET_RESPONSE || reply.id != expected {
            return Err(ConsoleError::Protocol(format!(
                "unexpected command reply id={} type={}",
                reply.id, reply.kind
            )));
        }
        Ok(reply.body)
    }

    async fn close(&mut self) -> Result<(), ConsoleError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
