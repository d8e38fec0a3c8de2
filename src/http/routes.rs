//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::MatchStatus;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.client_origin))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/match", get(match_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `*` allows any origin, otherwise a comma-separated list
fn allowed_origins(client_origin: &str) -> AllowOrigin {
    if client_origin.trim() == "*" {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    AllowOrigin::list(origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions_completed: u32,
    current_session: Option<Uuid>,
    spectators: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.sessions.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        sessions_completed: stats.sessions_completed,
        current_session: stats.current_session,
        spectators: state.board.feed().receiver_count(),
    })
}

// ============================================================================
// Match endpoint
// ============================================================================

#[derive(Serialize)]
struct MatchResponse {
    status: MatchStatus,
    message: String,
    score: String,
    last_winner: Option<String>,
}

async fn match_handler(State(state): State<AppState>) -> Result<Json<MatchResponse>, AppError> {
    let status = state
        .status_rx
        .borrow()
        .clone()
        .ok_or_else(|| AppError::NotFound("No match session has started yet".to_string()))?;

    Ok(Json(MatchResponse {
        status,
        message: state.board.message_text(),
        score: state.board.score_text(),
        last_winner: state.sessions.stats().last_winner,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio_test::assert_ok;

    fn state() -> AppState {
        AppState::new(assert_ok!(Config::from_lookup(|_| None)))
    }

    #[tokio::test]
    async fn health_reports_idle_server() {
        let Json(health) = health_handler(State(state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.sessions_completed, 0);
        assert!(health.current_session.is_none());
    }

    #[tokio::test]
    async fn match_is_not_found_before_first_session() {
        let response = match match_handler(State(state())).await {
            Ok(_) => panic!("expected no match yet"),
            Err(e) => e.into_response(),
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
