// Navigation parameters carried in the page URL
use crate::domain::case::{CaseId, ComplexityLevel};
use axum::extract::Query;
use axum::http::Uri;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CASE_ID: CaseId = 1;
/// Longest crisis window, in seconds.
pub const MAX_WINDOW_SECONDS: f64 = 3600.0;

/// Validated crisis-view time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
    pub center_time: f64,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 600.0,
            center_time: 300.0,
        }
    }
}

impl TimeWindow {
    /// Any missing bound gives the default window. Otherwise the window is cut
    /// to an hour, an empty or inverted one falls back to the default range, and
    /// a center outside the window moves to its midpoint.
    pub fn validate(start: Option<f64>, end: Option<f64>, center: Option<f64>) -> Self {
        let (Some(start), Some(mut end), Some(mut center)) = (start, end, center) else {
            tracing::warn!("Invalid time parameters, using the default window");
            return Self::default();
        };

        if end - start > MAX_WINDOW_SECONDS {
            tracing::warn!("Time window too large, limiting to one hour");
            end = start + MAX_WINDOW_SECONDS;
        }
        let (start, end) = if end <= start {
            tracing::warn!("End time must be after start time, using defaults");
            let fallback = Self::default();
            (fallback.start, fallback.end)
        } else {
            (start, end)
        };
        if center < start || center > end {
            center = (start + end) / 2.0;
        }

        Self {
            start,
            end,
            center_time: center,
        }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Raw query-string values, as they arrive.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationQuery {
    pub case_id: Option<String>,
    pub track_id: Option<String>,
    pub center_time: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub operation_type: Option<String>,
    pub complexity: Option<String>,
}

impl NavigationQuery {
    /// Decodes a query string (with or without the leading `?`) the same way the
    /// `Query` extractor does. Unknown keys are ignored; a malformed string
    /// gives the empty query.
    pub fn parse(query: &str) -> Self {
        let uri = format!("/?{}", query.trim_start_matches('?'));
        let parsed = uri
            .parse::<Uri>()
            .ok()
            .and_then(|uri| Query::<NavigationQuery>::try_from_uri(&uri).ok());
        match parsed {
            Some(Query(query)) => query,
            None => {
                tracing::warn!("Unreadable navigation query, using defaults");
                Self::default()
            }
        }
    }
}

fn number(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Everything the session needs to restore a view from a link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationParams {
    pub case_id: CaseId,
    pub track_id: Option<String>,
    pub window: TimeWindow,
    pub operation_type: Option<String>,
    pub complexity: Option<ComplexityLevel>,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self::from_query(&NavigationQuery::default())
    }
}

impl NavigationParams {
    pub fn from_query(query: &NavigationQuery) -> Self {
        let case_id = query
            .case_id
            .as_deref()
            .and_then(|v| v.trim().parse::<CaseId>().ok())
            .filter(|id| *id > 0)
            .unwrap_or(DEFAULT_CASE_ID);

        Self {
            case_id,
            track_id: non_empty(&query.track_id),
            window: TimeWindow::validate(
                number(&query.start),
                number(&query.end),
                number(&query.center_time),
            ),
            operation_type: non_empty(&query.operation_type),
            complexity: query.complexity.as_deref().and_then(ComplexityLevel::parse),
        }
    }

    pub fn from_query_string(query: &str) -> Self {
        Self::from_query(&NavigationQuery::parse(query))
    }

    /// Query string (without `?`) that restores this view.
    pub fn to_query(&self) -> String {
        let mut parts = vec![format!("caseId={}", self.case_id)];
        if let Some(track_id) = &self.track_id {
            parts.push(format!("trackId={}", urlencoding::encode(track_id)));
        }
        parts.push(format!("start={}", self.window.start));
        parts.push(format!("end={}", self.window.end));
        parts.push(format!("centerTime={}", self.window.center_time));
        if let Some(operation_type) = &self.operation_type {
            parts.push(format!("operationType={}", urlencoding::encode(operation_type)));
        }
        if let Some(complexity) = self.complexity {
            parts.push(format!("complexity={:?}", complexity));
        }
        parts.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_times_missing() {
        let params = NavigationParams::from_query_string("caseId=7&start=10");
        assert_eq!(params.case_id, 7);
        assert_eq!(params.window, TimeWindow::default());
    }

    #[test]
    fn test_window_longer_than_an_hour_is_cut() {
        let window = TimeWindow::validate(Some(100.0), Some(10_000.0), Some(200.0));
        assert_eq!(window.end, 3700.0);
        assert_eq!(window.center_time, 200.0);
    }

    #[test]
    fn test_inverted_window_uses_default_range() {
        let window = TimeWindow::validate(Some(500.0), Some(400.0), Some(450.0));
        assert_eq!((window.start, window.end), (0.0, 600.0));
        assert_eq!(window.center_time, 450.0);
    }

    #[test]
    fn test_center_outside_window_moves_to_midpoint() {
        let window = TimeWindow::validate(Some(100.0), Some(300.0), Some(900.0));
        assert_eq!(window.center_time, 200.0);
    }

    #[test]
    fn test_bad_case_id_defaults() {
        assert_eq!(NavigationParams::from_query_string("caseId=abc").case_id, 1);
        assert_eq!(NavigationParams::from_query_string("caseId=0").case_id, 1);
        assert_eq!(NavigationParams::from_query_string("").case_id, 1);
    }

    #[test]
    fn test_query_round_trip() {
        let query = "?caseId=12&trackId=Solar8000%2FHR&start=60&end=660&centerTime=360\
                     &operationType=thoracic+surgery&complexity=High";
        let params = NavigationParams::from_query_string(query);
        assert_eq!(params.track_id.as_deref(), Some("Solar8000/HR"));
        assert_eq!(params.operation_type.as_deref(), Some("thoracic surgery"));
        assert_eq!(params.complexity, Some(ComplexityLevel::High));
        assert_eq!(params.window.center_time, 360.0);

        let rendered = params.to_query();
        assert!(rendered.contains("trackId=Solar8000%2FHR"));
        assert_eq!(NavigationParams::from_query_string(&rendered), params);
    }

    #[test]
    fn test_unknown_keys_ignored_and_bad_query_defaults() {
        let query = NavigationQuery::parse("caseId=3&zoom=2");
        assert_eq!(query.case_id.as_deref(), Some("3"));
        assert_eq!(NavigationQuery::parse("caseId=3 4"), NavigationQuery::default());
    }
}
