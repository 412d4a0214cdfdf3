// Presentation layer - JSON HTTP surface
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/cases", get(list_cases))
        .route("/cases/hierarchy", get(case_hierarchy))
        .route("/cases/:id/tracks", get(case_tracks))
        .route("/cases/:id/labs", get(case_labs))
        .route("/signals/default", get(default_signal))
        .route("/signals/:track_id", get(signal_window))
        .route("/cache", get(cache_stats).delete(clear_cache))
        .route("/crisis", get(crisis_view))
        .route("/crisis/simulate", post(crisis_simulate))
        .route("/session", get(session_snapshot))
        .route("/session/navigate", post(session_navigate))
        .route("/session/link", get(session_link))
        .route("/session/select", post(session_select))
        .route("/session/track", post(session_track))
        .route("/session/seek", post(session_seek))
        .route("/session/play", post(session_play))
        .route("/session/pause", post(session_pause))
        .route("/session/rewind", post(session_rewind))
        .route("/session/forward", post(session_forward))
        .route("/session/speed", post(session_speed))
        .route("/session/brush", post(session_brush))
        .route("/session/annotations", get(session_annotations))
        .route("/session/anomalies", get(session_anomalies))
        .route("/session/moving-averages", get(session_moving_averages))
        .route("/session/simulate", post(session_simulate))
        .route("/session/events", get(session_events))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
