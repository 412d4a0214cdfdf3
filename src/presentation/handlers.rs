// HTTP request handlers
use crate::application::crisis::SimulationRequest;
use crate::application::data_service::CacheScope;
use crate::application::navigation::{NavigationParams, NavigationQuery, TimeWindow, DEFAULT_CASE_ID};
use crate::application::session::SessionSnapshot;
use crate::domain::case::{CaseHierarchy, CaseId, CaseSummary};
use crate::domain::intervention::InterventionFamily;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{json_response, respond, ApiError};
use crate::presentation::app_state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::Response,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type HandlerResult = Result<Response<Body>, ApiError>;

fn json<T: Serialize>(data: &T) -> Response<Body> {
    respond(json_response(data))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl RangeQuery {
    fn bounds(&self) -> (f64, f64) {
        let default = TimeWindow::default();
        (self.from.unwrap_or(default.start), self.to.unwrap_or(default.end))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearQuery {
    pub case_id: Option<CaseId>,
    pub track_id: Option<String>,
}

#[derive(Serialize)]
struct Cleared {
    removed: usize,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all cases
pub async fn list_cases(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.data_service.get_case_list().await {
        Ok(cases) => json(&cases),
        Err(e) => {
            tracing::error!("Error fetching cases: {}", e);
            // Return empty list on error
            json(&Vec::<CaseSummary>::new())
        }
    }
}

pub async fn case_hierarchy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hierarchy: Arc<CaseHierarchy> = state.data_service.get_case_hierarchy().await;
    json(&hierarchy)
}

pub async fn case_tracks(Path(id): Path<CaseId>, State(state): State<Arc<AppState>>) -> HandlerResult {
    let tracks = state.data_service.get_tracks_for_case(id).await?;
    Ok(json(&tracks))
}

pub async fn case_labs(Path(id): Path<CaseId>, State(state): State<Arc<AppState>>) -> HandlerResult {
    let labs = state.data_service.get_labs_for_case(id).await?;
    Ok(json(&labs))
}

pub async fn default_signal(
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let (start, end) = query.bounds();
    json(&state.data_service.generate_default_data(start, end))
}

/// Signal window for a track (synthetic when the track has no usable data)
pub async fn signal_window(
    Path(track_id): Path<String>,
    Query(query): Query<RangeQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    let (start, end) = query.bounds();
    let series = state.data_service.get_signal_data(&track_id, start, end).await?;
    Ok(json(&series))
}

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json(&state.data_service.cache_stats())
}

/// Clear the cache for a track, a case, or everything
pub async fn clear_cache(
    Query(query): Query<ClearQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let scope = match (query.track_id, query.case_id) {
        (Some(track_id), _) => CacheScope::Track(track_id),
        (None, Some(case_id)) => CacheScope::Case(case_id),
        (None, None) => CacheScope::All,
    };
    let removed = state.data_service.clear_cache(&scope);
    json(&Cleared { removed })
}

pub async fn crisis_view(
    Query(query): Query<NavigationQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    let params = NavigationParams::from_query(&query);
    let view = state.crisis_service.load(params.case_id, params.window).await?;
    Ok(json(&view))
}

pub async fn crisis_simulate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulationRequest>,
) -> HandlerResult {
    let simulated = state.crisis_service.simulate(&request).await?;
    Ok(json(&simulated))
}

// --- Session ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub case_id: CaseId,
    pub track_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub track_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub time: f64,
}

#[derive(Debug, Deserialize)]
pub struct SpeedRequest {
    pub speed: f64,
}

/// A brush gesture; no `start`/`end` means the brush was cleared.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushRequest {
    pub start: Option<f64>,
    pub end: Option<f64>,
    #[serde(default)]
    pub ended: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSimulateRequest {
    pub family: InterventionFamily,
    pub event_type: String,
    pub effort: f64,
}

#[derive(Serialize)]
struct BrushResult {
    domain: Option<(f64, f64)>,
}

#[derive(Serialize)]
struct Link {
    query: String,
}

fn current_or(state: &AppState, applied: Option<SessionSnapshot>) -> Response<Body> {
    json(&applied.unwrap_or_else(|| state.session.snapshot()))
}

pub async fn session_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json(&state.session.snapshot())
}

/// Restore the session from link parameters
pub async fn session_navigate(
    Query(query): Query<NavigationQuery>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    let params = NavigationParams::from_query(&query);
    let applied = state.session.bootstrap(&params).await?;
    Ok(current_or(&state, applied))
}

pub async fn session_link(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    let params = NavigationParams {
        case_id: snapshot.case_id.unwrap_or(DEFAULT_CASE_ID),
        track_id: snapshot.track_id,
        window: snapshot.window,
        ..NavigationParams::default()
    };
    json(&Link {
        query: params.to_query(),
    })
}

pub async fn session_select(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelectRequest>,
) -> HandlerResult {
    let applied = state
        .session
        .select_case(request.case_id, request.track_id)
        .await?;
    Ok(current_or(&state, applied))
}

pub async fn session_track(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> HandlerResult {
    let applied = state.session.select_track(&request.track_id).await?;
    Ok(current_or(&state, applied))
}

pub async fn session_seek(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SeekRequest>,
) -> impl IntoResponse {
    state.session.seek(request.time);
    json(&state.session.snapshot().playback)
}

pub async fn session_play(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.play();
    json(&state.session.snapshot().playback)
}

pub async fn session_pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.pause();
    json(&state.session.snapshot().playback)
}

pub async fn session_rewind(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.rewind();
    json(&state.session.snapshot().playback)
}

pub async fn session_forward(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.fast_forward();
    json(&state.session.snapshot().playback)
}

pub async fn session_speed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SpeedRequest>,
) -> HandlerResult {
    state.session.set_speed(request.speed)?;
    Ok(json(&state.session.snapshot().playback))
}

pub async fn session_brush(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BrushRequest>,
) -> impl IntoResponse {
    let selection = request.start.zip(request.end);
    let domain = if request.ended {
        Some(state.session.brush_ended(selection))
    } else {
        state.session.brush_moved(selection)
    };
    json(&BrushResult { domain })
}

pub async fn session_annotations(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json(&state.session.annotations())
}

pub async fn session_anomalies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json(&state.session.anomalies())
}

pub async fn session_moving_averages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    json(&state.session.moving_averages())
}

pub async fn session_simulate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SessionSimulateRequest>,
) -> HandlerResult {
    let simulated = state
        .session
        .simulate(request.family, &request.event_type, request.effort)?;
    Ok(json(&simulated))
}

/// Live render, loading and error events as NDJSON
pub async fn session_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_receiver(state.ports.subscribe())
}
