//! HTTP trigger layer: start runs, health, status and log tail.
//!
//! A run started over HTTP executes in the background; a second `POST /run`
//! while one is executing in this process is refused with 429.

use crate::domain::{DomainError, ModeSelector, RunResult, Target, TriggerInput};
use crate::ports::RunTrigger;
use crate::shared::logging::recent_lines;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info};

const LOG_TAIL: usize = 50;

#[derive(Clone)]
pub struct AppState {
    trigger: Arc<dyn RunTrigger>,
    running: Arc<AtomicBool>,
    last_result: Arc<RwLock<Option<RunResult>>>,
    last_error: Arc<RwLock<Option<RunError>>>,
    log_path: PathBuf,
}

/// A background run that ended without a result (rejected or state failure).
#[derive(Debug, Clone, Serialize)]
struct RunError {
    error: String,
    at: DateTime<Utc>,
}

impl AppState {
    pub fn new(trigger: Arc<dyn RunTrigger>, log_path: PathBuf) -> Self {
        Self {
            trigger,
            running: Arc::new(AtomicBool::new(false)),
            last_result: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
            log_path,
        }
    }
}

/// Clears the in-process running flag when the background run ends, even on panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// `POST /run` body. Every field is optional; `mode` defaults to `auto`.
#[derive(Debug, Default, Deserialize)]
pub struct RunBody {
    pub mode: Option<String>,
    pub target: Option<String>,
    pub query: Option<String>,
    pub topic: Option<String>,
    pub limit: Option<usize>,
    pub count: Option<usize>,
    #[serde(default)]
    pub force: bool,
}

impl RunBody {
    pub fn into_input(self) -> Result<(TriggerInput, bool), DomainError> {
        let selector = match self.mode.as_deref() {
            Some(m) => m.parse::<ModeSelector>()?,
            None => ModeSelector::Auto,
        };
        let target = match (self.target, self.query) {
            (Some(h), _) => Some(Target::handle(&h)),
            (None, Some(q)) => Some(Target::query(&q)),
            (None, None) => None,
        };
        let input = TriggerInput {
            selector,
            target,
            topic: self.topic,
            limit: self.limit,
            count: self.count,
        };
        input.precheck()?;
        Ok((input, self.force))
    }
}

/// Build the axum Router. Used by `serve()` and by tests.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/run", post(start_run))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/logs", get(logs))
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP trigger listening");
    axum::serve(listener, build_router(state)).await
}

fn bad_request(msg: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "error": msg.into()})),
    )
        .into_response()
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "service": "feedpilot",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /run": "start a run: {mode?, target?, query?, topic?, limit?, count?, force?}",
            "GET /health": "liveness",
            "GET /status": "run state and last result",
            "GET /logs": "last 50 log lines"
        }
    }))
}

async fn start_run(State(state): State<AppState>, body: Bytes) -> Response {
    let parsed: RunBody = if body.iter().all(u8::is_ascii_whitespace) {
        RunBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(b) => b,
            Err(e) => return bad_request(format!("invalid JSON body: {}", e)),
        }
    };
    let (input, force) = match parsed.into_input() {
        Ok(v) => v,
        Err(e) => return bad_request(e.to_string()),
    };

    if state
        .running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"status": "already_running"})),
        )
            .into_response();
    }

    let guard = RunningGuard(Arc::clone(&state.running));
    let trigger = Arc::clone(&state.trigger);
    let last_result = Arc::clone(&state.last_result);
    let last_error = Arc::clone(&state.last_error);
    tokio::spawn(async move {
        let _guard = guard;
        match trigger.trigger(input, force).await {
            Ok(result) => {
                info!(status = %result.status, mode = %result.mode, "HTTP-triggered run finished");
                *last_result.write().await = Some(result);
                *last_error.write().await = None;
            }
            Err(e) => {
                error!(error = %e, "HTTP-triggered run failed");
                *last_error.write().await = Some(RunError {
                    error: e.to_string(),
                    at: Utc::now(),
                });
            }
        }
    });

    (StatusCode::ACCEPTED, Json(json!({"status": "started"}))).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "feedpilot",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let run_state = state.trigger.current_state().await;
    let last = state.last_result.read().await.clone();
    let last_error = state.last_error.read().await.clone();
    Json(json!({
        "currently_running": state.running.load(Ordering::SeqCst),
        "state": run_state,
        "last_result": last,
        "last_error": last_error,
        "server_time": Utc::now().to_rfc3339(),
    }))
}

async fn logs(State(state): State<AppState>) -> Response {
    let path = state.log_path.clone();
    let read = tokio::task::spawn_blocking(move || recent_lines(&path, LOG_TAIL)).await;
    match read {
        Ok(Ok((lines, total))) => Json(json!({
            "logs": lines,
            "total_lines": total,
            "showing_last": lines.len(),
        }))
        .into_response(),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "error": format!("read log: {}", e)})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "error": e.to_string()})),
        )
            .into_response(),
    }
}
