//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::round::RoundPhase;
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/health", get(health_handler))
        .route("/twitch_client_id", get(twitch_client_id_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    state: RoundPhase,
    players: usize,
    spectators: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let arena = state.arena.status();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        state: arena.state,
        players: arena.players,
        spectators: arena.spectators,
    })
}

// ============================================================================
// Twitch login bootstrap
// ============================================================================

#[derive(Serialize)]
struct TwitchClientIdResponse {
    client_id: Option<String>,
}

/// Browsers need the public client id to start the implicit OAuth flow
async fn twitch_client_id_handler(State(state): State<AppState>) -> Json<TwitchClientIdResponse> {
    Json(TwitchClientIdResponse {
        client_id: state.identity.client_id().map(str::to_string),
    })
}
