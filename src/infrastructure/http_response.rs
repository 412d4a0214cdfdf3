// HTTP response utilities for JSON bodies and dashboard errors
use crate::domain::error::DashboardError;
use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;

/// Serialize `data` to a JSON response with an explicit length.
pub fn json_response<T: Serialize>(data: &T) -> Result<Response<Body>, StatusCode> {
    let body = serde_json::to_vec(data).map_err(|e| {
        tracing::error!("JSON serialization error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let length = HeaderValue::from_str(&body.len().to_string()).map_err(|e| {
        tracing::error!("Content length header error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, length)
        .body(Body::from(body))
        .map_err(|e| {
            tracing::error!("Response build error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Collapses a response result into a response.
pub fn respond(result: Result<Response<Body>, StatusCode>) -> Response<Body> {
    match result {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub fn status_for(error: &DashboardError) -> StatusCode {
    match error {
        DashboardError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        DashboardError::InsufficientData { .. } => StatusCode::NOT_FOUND,
        DashboardError::Fetch { .. } | DashboardError::Parse { .. } => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Dashboard error as an HTTP response: `{"error": "..."}` with a matching status.
pub struct ApiError(pub DashboardError);

impl From<DashboardError> for ApiError {
    fn from(error: DashboardError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }
        let mut response = respond(json_response(&ErrorBody {
            error: self.0.to_string(),
        }));
        *response.status_mut() = status;
        response
    }
}
