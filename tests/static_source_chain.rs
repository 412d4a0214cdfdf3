// Catalog source chain over local data directories, end to end
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use biosignal_dashboard::application::data_service::CacheScope;
use biosignal_dashboard::application::ports::PortEvent;
use biosignal_dashboard::domain::case::ComplexityLevel;
use biosignal_dashboard::domain::signal::SeriesOrigin;
use biosignal_dashboard::infrastructure::config::AppConfig;
use biosignal_dashboard::presentation::app_state::AppState;
use biosignal_dashboard::presentation::handlers::{self, RangeQuery};
use std::fs;
use std::path::Path as FsPath;
use std::sync::Arc;
use tempfile::TempDir;

fn offline_state(processed: &FsPath, raw: &FsPath) -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.sources.processed_dir = processed.to_path_buf();
    config.sources.raw_dir = raw.to_path_buf();
    config.sources.remote_enabled = false;
    Arc::new(AppState::from_config(&config).unwrap())
}

/// Processed dir has cases and the hierarchy; raw dir has tracks and labs.
fn split_data_dirs() -> (TempDir, TempDir) {
    let processed = TempDir::new().unwrap();
    let raw = TempDir::new().unwrap();
    fs::write(
        processed.path().join("cases_processed.txt"),
        "caseid,opname,department,operation_type,complexity_score\n\
         1,Lobectomy,Thoracic surgery,thoracic,81\n\
         2,Cholecystectomy,General surgery,general,22\n",
    )
    .unwrap();
    fs::write(
        processed.path().join("case_hierarchy.json"),
        r#"{"thoracic": {"High": ["1"]}, "general": {"Low": ["2"]}}"#,
    )
    .unwrap();
    fs::write(
        raw.path().join("trks.txt"),
        "caseid,tname,tid\n\
         1,Solar8000/HR,aaa\n\
         1,BIS/BIS,bbb\n\
         2,Solar8000/ART_MBP,ccc\n",
    )
    .unwrap();
    fs::write(
        raw.path().join("labs.txt"),
        "caseid,dt,name,result\n1,900,hb,11.2\n1,-300,alb,3.9\n",
    )
    .unwrap();
    (processed, raw)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_each_table_comes_from_the_first_source_that_has_it() {
    let (processed, raw) = split_data_dirs();
    let state = offline_state(processed.path(), raw.path());

    let cases = state.data_service.get_case_list().await.unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].operation_type.as_deref(), Some("thoracic"));

    let tracks = state.data_service.get_tracks_for_case(1).await.unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[1].tname, "BIS/BIS");

    let labs = state.data_service.get_labs_for_case(1).await.unwrap();
    assert_eq!(labs.iter().map(|l| l.dt).collect::<Vec<_>>(), vec![-300.0, 900.0]);

    let hierarchy = state.data_service.get_case_hierarchy().await;
    assert_eq!(hierarchy.cases("thoracic", ComplexityLevel::High), ["1".to_string()]);
    assert!(state.ports.errors().is_empty());
}

#[tokio::test]
async fn test_missing_files_surface_errors_and_defaults() {
    let processed = TempDir::new().unwrap();
    let raw = TempDir::new().unwrap();
    let state = offline_state(processed.path(), raw.path());

    let response = handlers::list_cases(State(state.clone())).await.into_response();
    assert_eq!(body_json(response).await, serde_json::json!([]));
    assert_eq!(state.ports.errors().len(), 1);

    let hierarchy = state.data_service.get_case_hierarchy().await;
    assert!(hierarchy.operation_types().any(|op| op == "general"));

    let snapshot = state.session.select_case(1, None).await.unwrap().unwrap();
    assert_eq!(snapshot.series.origin, SeriesOrigin::Synthetic);
    assert!(snapshot.tracks.is_empty());
}

#[tokio::test]
async fn test_signal_without_remote_is_synthetic() {
    let (processed, raw) = split_data_dirs();
    let state = offline_state(processed.path(), raw.path());

    let response = handlers::signal_window(
        Path("aaa".to_string()),
        Query(RangeQuery {
            from: Some(0.0),
            to: Some(120.0),
        }),
        State(state.clone()),
    )
    .await
    .into_response();
    let series = body_json(response).await;
    assert_eq!(series["origin"], "synthetic");
    assert_eq!(series["points"].as_array().unwrap().len(), 500);
    assert_eq!(state.data_service.cache_stats().signals, 0);
    assert_eq!(state.data_service.cache_stats().synthetic, 1);

    let bad = handlers::signal_window(
        Path("aaa".to_string()),
        Query(RangeQuery {
            from: Some(50.0),
            to: Some(10.0),
        }),
        State(state.clone()),
    )
    .await
    .into_response();
    assert_eq!(bad.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_over_local_catalog() {
    let (processed, raw) = split_data_dirs();
    let state = offline_state(processed.path(), raw.path());

    let snapshot = state.session.select_case(1, None).await.unwrap().unwrap();
    assert_eq!(snapshot.track_id.as_deref(), Some("aaa"));
    assert_eq!(snapshot.labs.len(), 2);
    assert!(state.ports.events().iter().any(|e| matches!(e, PortEvent::Render { .. })));

    // Tracks, labs and the synthetic window of track "aaa".
    assert_eq!(state.data_service.clear_cache(&CacheScope::Case(1)), 3);
    assert_eq!(state.data_service.cache_stats().cases, 1);

    let view = state
        .crisis_service
        .load(1, Default::default())
        .await
        .unwrap();
    assert!(!view.demo_signals);
    assert_eq!(view.signals.len(), 2);
    assert_eq!(view.overlay.len(), 2);
}
