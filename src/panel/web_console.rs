use crate::panel::build_info;
use crate::panel::config::PanelConfig;
use crate::panel::platform::{HostPlatform, KillError};
use crate::panel::procs::list_processes;
use crate::panel::rcon::{resolve_target, send_command, ConsoleConnector};
use crate::panel::telemetry;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use base64::Engine;
use rand::RngCore;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct WebState {
    cfg: Arc<PanelConfig>,
    platform: Arc<dyn HostPlatform>,
    console: Arc<dyn ConsoleConnector>,
    sessions: Arc<Mutex<SessionStore>>,
}

impl WebState {
    pub fn new(cfg: PanelConfig, platform: Arc<dyn HostPlatform>, console: Arc<dyn ConsoleConnector>) -> Self {
        let ttl = Duration::from_secs(cfg.auth.session_ttl_secs);
        Self {
            cfg: Arc::new(cfg),
            platform,
            console,
            sessions: Arc::new(Mutex::new(SessionStore::new(ttl))),
        }
    }
}

/// Capability tokens handed out by `/api/login`, each valid for `ttl`.
pub(crate) struct SessionStore {
    ttl: Duration,
    issued: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl SessionStore {
    const MAX_ENTRIES: usize = 1024;

    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            issued: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(crate) fn issue(&mut self) -> String {
        self.issue_at(Instant::now())
    }

    fn issue_at(&mut self, now: Instant) -> String {
        self.prune(now);
        let token = new_token();
        self.issued.insert(token.clone(), now);
        self.order.push_back(token.clone());
        while self.issued.len() > Self::MAX_ENTRIES {
            match self.order.pop_front() {
                Some(k) => {
                    self.issued.remove(&k);
                }
                None => break,
            }
        }
        token
    }

    pub(crate) fn is_valid(&self, token: &str) -> bool {
        self.is_valid_at(token, Instant::now())
    }

    fn is_valid_at(&self, token: &str, now: Instant) -> bool {
        match self.issued.get(token) {
            Some(t) => now.saturating_duration_since(*t) < self.ttl,
            None => false,
        }
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.issued.retain(|_, t| now.saturating_duration_since(*t) < ttl);
        let issued = &self.issued;
        self.order.retain(|k| issued.contains_key(k));
    }
}

fn new_token() -> String {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

fn json_error(code: StatusCode, msg: impl Into<String>) -> AxumResponse {
    (code, Json(json!({ "error": msg.into() }))).into_response()
}

pub fn build_router(st: WebState) -> Router {
    let protected = Router::new()
        .route("/api/system", get(system))
        .route("/api/mc/status", get(mc_status))
        .route("/api/mc/start", post(mc_start))
        .route("/api/mc/stop", post(mc_stop))
        .route("/api/processes", get(processes))
        .route("/api/processes/kill", post(kill_process))
        .route("/api/mc/rcon", post(rcon))
        .route("/api/version", get(version))
        .route_layer(middleware::from_fn_with_state(st.clone(), bearer_auth_middleware));

    Router::new()
        .route("/api/login", post(login))
        .merge(protected)
        .fallback(static_asset)
        .with_state(st)
}

pub async fn serve(st: WebState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", st.cfg.dashboard.bind, st.cfg.dashboard.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid dashboard bind/port: {e}"))?;
    anyhow::ensure!(
        st.cfg.auth.password_hash.is_some(),
        "auth.password_hash is not set; generate one with `mcpanel hash-password <password>`"
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    log::info!(
        "[web] bind={addr} service={} os={} static_dir={}",
        st.cfg.service.name,
        st.platform.os(),
        st.cfg.dashboard.static_dir.display()
    );
    let app = build_router(st);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("[web] ctrl_c handler failed: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("[web] shutting down");
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

// ---------------- auth ----------------

async fn bearer_auth_middleware(
    State(st): State<WebState>,
    req: axum::http::Request<Body>,
    next: middleware::Next,
) -> AxumResponse {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());
    let Some(token) = token else {
        return json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let ok = st
        .sessions
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .is_valid(&token);
    if !ok {
        return json_error(StatusCode::UNAUTHORIZED, "Invalid token");
    }
    next.run(req).await
}

/// Reads one field out of a JSON request body. Absent, unparsable or null bodies yield `None`.
fn body_field(body: &Bytes, key: &str) -> Option<Value> {
    let v: Value = serde_json::from_slice(body).ok()?;
    match v.get(key)? {
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn value_as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn login(State(st): State<WebState>, body: Bytes) -> AxumResponse {
    let Some(hash) = st.cfg.auth.password_hash.clone() else {
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "Login is not configured");
    };
    let password = body_field(&body, "password").as_ref().and_then(value_as_text);
    let Some(password) = password else {
        return json_error(StatusCode::FORBIDDEN, "Wrong password");
    };
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await;
    match verified {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => {
            log::warn!("[web] attempt=login outcome=rejected");
            return json_error(StatusCode::FORBIDDEN, "Wrong password");
        }
        Ok(Err(e)) => {
            log::error!("[web] attempt=login outcome=failed err={e}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
        Err(e) => {
            log::error!("[web] attempt=login outcome=failed err={e}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    }
    let token = st.sessions.lock().unwrap_or_else(|p| p.into_inner()).issue();
    log::info!("[web] attempt=login outcome=ok");
    Json(json!({ "token": token })).into_response()
}

// ---------------- API ----------------

async fn system() -> AxumResponse {
    match telemetry::collect_async().await {
        Ok(s) => Json(s).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn mc_status(State(st): State<WebState>) -> AxumResponse {
    Json(st.platform.query(&st.cfg.service.name).await).into_response()
}

async fn mc_start(State(st): State<WebState>) -> AxumResponse {
    let r = st.platform.start(&st.cfg.service.name).await;
    log::info!("[web] attempt=start app={} success={} message={:?}", st.cfg.service.name, r.success, r.message);
    Json(r).into_response()
}

async fn mc_stop(State(st): State<WebState>) -> AxumResponse {
    let r = st.platform.stop(&st.cfg.service.name).await;
    log::info!("[web] attempt=stop app={} success={} message={:?}", st.cfg.service.name, r.success, r.message);
    Json(r).into_response()
}

async fn processes(State(st): State<WebState>) -> AxumResponse {
    match list_processes(st.platform.as_ref(), st.cfg.processes.limit).await {
        Ok(l) => Json(l).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn kill_process(State(st): State<WebState>, body: Bytes) -> AxumResponse {
    let pid = body_field(&body, "pid")
        .as_ref()
        .and_then(value_as_text)
        .and_then(|s| s.trim().parse::<i64>().ok());
    let Some(pid) = pid else {
        return json_error(StatusCode::BAD_REQUEST, "No PID provided");
    };
    match st.platform.kill(pid).await {
        Ok(()) => Json(json!({ "success": true, "message": format!("Process {pid} killed") })).into_response(),
        Err(e) => {
            let code = match e {
                KillError::InvalidPid(_) => StatusCode::BAD_REQUEST,
                KillError::NotFound(_) => StatusCode::NOT_FOUND,
                KillError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                KillError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, Json(json!({ "success": false, "message": e.to_string() }))).into_response()
        }
    }
}

async fn rcon(State(st): State<WebState>, body: Bytes) -> AxumResponse {
    let command = body_field(&body, "command")
        .as_ref()
        .and_then(value_as_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let Some(command) = command else {
        return json_error(StatusCode::BAD_REQUEST, "No command provided");
    };
    let target = match resolve_target(&st.cfg.rcon) {
        Ok(t) => t,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    match send_command(st.console.as_ref(), &target, &command).await {
        Ok(response) => Json(json!({ "response": response })).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn version() -> AxumResponse {
    Json(build_info::info()).into_response()
}

// ---------------- static files ----------------

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Map a request path onto a file under `root`. Anything but plain path segments is refused.
fn resolve_static_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let rel = request_path.trim_start_matches('/');
    let rel = if rel.is_empty() { "index.html" } else { rel };
    if rel.contains('\\') || rel.contains('\0') {
        return None;
    }
    let rel = Path::new(rel);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

async fn static_asset(State(st): State<WebState>, uri: Uri) -> AxumResponse {
    if uri.path().starts_with("/api/") {
        return json_error(StatusCode::NOT_FOUND, "Not found");
    }
    let Some(mut path) = resolve_static_path(&st.cfg.dashboard.static_dir, uri.path()) else {
        return (StatusCode::BAD_REQUEST, "bad path").into_response();
    };
    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push("index.html");
    }
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&path))],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(e) => {
            log::warn!("[web] static path={} err={e}", path.display());
            (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::config::{AuthConfig, DashboardConfig, ProcessesConfig, RconConfig, ServiceConfig};
    use crate::panel::platform::{select_platform, HostOs};
    use crate::panel::rcon::{ConsoleConnection, ConsoleError, RconTarget};
    use crate::panel::runner::tests::ScriptedRunner;
    use crate::panel::runner::CommandOutcome;
    use async_trait::async_trait;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoConsole;
    struct EchoConnection;

    #[async_trait]
    impl ConsoleConnector for EchoConsole {
        async fn open(&self, target: &RconTarget) -> Result<Box<dyn ConsoleConnection>, ConsoleError> {
            if target.password != "rconpw" {
                return Err(ConsoleError::Auth);
            }
            Ok(Box::new(EchoConnection))
        }
    }

    #[async_trait]
    impl ConsoleConnection for EchoConnection {
        async fn send(&mut self, command: &str) -> Result<String, ConsoleError> {
            Ok(format!("ran {command}"))
        }

        async fn close(&mut self) -> Result<(), ConsoleError> {
            Ok(())
        }
    }

    fn config(static_dir: PathBuf, rcon_password: Option<&str>) -> PanelConfig {
        PanelConfig {
            dashboard: DashboardConfig {
                static_dir,
                ..DashboardConfig::default()
            },
            auth: AuthConfig {
                password_hash: Some(bcrypt::hash("letmein", 4).unwrap()),
                session_ttl_secs: 60,
            },
            service: ServiceConfig {
                name: "mc".to_string(),
                settle_ms: 0,
                command_timeout_ms: 1000,
                console_encoding: "utf-8".to_string(),
            },
            rcon: RconConfig {
                password: rcon_password.map(str::to_string),
                ..RconConfig::default()
            },
            processes: ProcessesConfig::default(),
        }
    }

    fn state(runner: ScriptedRunner, static_dir: PathBuf, rcon_password: Option<&str>) -> WebState {
        let platform = select_platform(HostOs::Linux, Arc::new(runner), Duration::ZERO);
        WebState::new(config(static_dir, rcon_password), platform, Arc::new(EchoConsole))
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut b = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(v) => b
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => b.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn as_json(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn login_token(app: &Router) -> String {
        let (code, body) = call(app, "POST", "/api/login", None, Some(json!({ "password": "letmein" }))).await;
        assert_eq!(code, StatusCode::OK);
        as_json(&body)["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn api_requires_a_bearer_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), None));

        let (code, body) = call(&app, "GET", "/api/mc/status", None, None).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(as_json(&body), json!({ "error": "Unauthorized" }));

        let (code, body) = call(&app, "POST", "/api/mc/start", Some("forged"), None).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
        assert_eq!(as_json(&body), json!({ "error": "Invalid token" }));
    }

    #[tokio::test]
    async fn login_checks_the_password() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), None));

        let (code, body) = call(&app, "POST", "/api/login", None, Some(json!({ "password": "nope" }))).await;
        assert_eq!(code, StatusCode::FORBIDDEN);
        assert_eq!(as_json(&body), json!({ "error": "Wrong password" }));

        let (code, _) = call(&app, "POST", "/api/login", None, None).await;
        assert_eq!(code, StatusCode::FORBIDDEN);

        let token = login_token(&app).await;
        assert!(token.len() >= 40);
    }

    #[tokio::test]
    async fn status_start_and_stop_go_through_the_platform() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on("pm2 jlist", CommandOutcome::ok(r#"[{"name":"mc","pm2_env":{"status":"online"}}]"#))
            .on("pm2 start mc", CommandOutcome::ok(""));
        let app = build_router(state(runner, dir.path().to_path_buf(), None));
        let token = login_token(&app).await;

        let (code, body) = call(&app, "GET", "/api/mc/status", Some(&token), None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(as_json(&body), json!({ "status": "running", "raw": "pm2: online" }));

        let (code, body) = call(&app, "POST", "/api/mc/start", Some(&token), None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(as_json(&body), json!({ "success": true, "message": "Service started" }));

        // pm2 stop is unscripted, so the chain falls through to systemd, which is unscripted too.
        let (code, body) = call(&app, "POST", "/api/mc/stop", Some(&token), None).await;
        assert_eq!(code, StatusCode::OK);
        let v = as_json(&body);
        assert_eq!(v["success"], false);
        assert!(v["message"].as_str().unwrap().contains("sudo"), "{v}");
    }

    #[tokio::test]
    async fn kill_maps_errors_to_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new()
            .on("kill -9 4242", CommandOutcome::ok(""))
            .on("kill -9 4243", CommandOutcome::failed("kill: (4243) - No such process"))
            .on("kill -9 4244", CommandOutcome::failed("kill: (4244) - Operation not permitted"));
        let app = build_router(state(runner, dir.path().to_path_buf(), None));
        let token = login_token(&app).await;

        let (code, body) = call(&app, "POST", "/api/processes/kill", Some(&token), Some(json!({}))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": "No PID provided" }));

        let (code, body) = call(&app, "POST", "/api/processes/kill", Some(&token), Some(json!({ "pid": 4242 }))).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(as_json(&body), json!({ "success": true, "message": "Process 4242 killed" }));

        let (code, _) = call(&app, "POST", "/api/processes/kill", Some(&token), Some(json!({ "pid": "4243" }))).await;
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, body) = call(&app, "POST", "/api/processes/kill", Some(&token), Some(json!({ "pid": 4244 }))).await;
        assert_eq!(code, StatusCode::FORBIDDEN);
        assert_eq!(as_json(&body)["success"], false);

        let (code, _) = call(&app, "POST", "/api/processes/kill", Some(&token), Some(json!({ "pid": -3 }))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rcon_relays_commands() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), Some("rconpw")));
        let token = login_token(&app).await;

        let (code, body) = call(&app, "POST", "/api/mc/rcon", Some(&token), Some(json!({ "command": "  " }))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(as_json(&body), json!({ "error": "No command provided" }));

        let (code, body) = call(&app, "POST", "/api/mc/rcon", Some(&token), Some(json!({ "command": "list" }))).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(as_json(&body), json!({ "response": "ran list" }));
    }

    #[tokio::test]
    async fn rcon_without_password_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), None));
        let token = login_token(&app).await;

        let (code, body) = call(&app, "POST", "/api/mc/rcon", Some(&token), Some(json!({ "command": "list" }))).await;
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(as_json(&body), json!({ "error": "Cannot read RCON password" }));
    }

    #[tokio::test]
    async fn version_reports_the_banner() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), None));
        let token = login_token(&app).await;
        let (code, body) = call(&app, "GET", "/api/version", Some(&token), None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(as_json(&body)["version"], build_info::VERSION);
    }

    #[tokio::test]
    async fn static_files_are_served_without_auth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>panel</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let app = build_router(state(ScriptedRunner::new(), dir.path().to_path_buf(), None));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>panel</h1>");

        let (code, body) = call(&app, "GET", "/app.js", None, None).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body, b"console.log(1)");

        let (code, _) = call(&app, "GET", "/missing.css", None, None).await;
        assert_eq!(code, StatusCode::NOT_FOUND);

        let (code, _) = call(&app, "GET", "/api/nothing", None, None).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[test]
    fn static_paths_cannot_escape_the_root() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve_static_path(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_static_path(root, "/css/site.css"), Some(root.join("css/site.css")));
        assert_eq!(resolve_static_path(root, "/../etc/passwd"), None);
        assert_eq!(resolve_static_path(root, "/a/../../b"), None);
        assert_eq!(resolve_static_path(root, "/./x"), None);
        assert_eq!(resolve_static_path(root, "/..\\x"), None);
    }

    #[test]
    fn sessions_expire_after_ttl() {
        let mut s = SessionStore::new(Duration::from_secs(10));
        let t0 = Instant::now();
        let tok = s.issue_at(t0);
        assert!(s.is_valid_at(&tok, t0 + Duration::from_secs(9)));
        assert!(!s.is_valid_at(&tok, t0 + Duration::from_secs(10)));
        assert!(!s.is_valid_at("other", t0));

        // Issuing later prunes expired tokens.
        let _ = s.issue_at(t0 + Duration::from_secs(11));
        assert!(!s.issued.contains_key(&tok));
        assert_eq!(s.issued.len(), s.order.len());
    }

    #[test]
    fn session_store_is_bounded() {
        let mut s = SessionStore::new(Duration::from_secs(60));
        let first = s.issue();
        for _ in 0..SessionStore::MAX_ENTRIES {
            s.issue();
        }
        assert_eq!(s.issued.len(), SessionStore::MAX_ENTRIES);
        assert!(!s.is_valid(&first));
    }
}
