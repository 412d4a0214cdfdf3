// Application state for HTTP handlers
use crate::application::crisis::CrisisService;
use crate::application::data_service::DataService;
use crate::application::data_source::{CatalogSource, SignalSource, SourceChain};
use crate::application::ports::RecordingPorts;
use crate::application::session::{DashboardSession, SessionSettings};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::static_files::{FileLayout, StaticFileSource};
use crate::infrastructure::vitaldb_repository::VitalDbRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub data_service: Arc<DataService>,
    pub crisis_service: Arc<CrisisService>,
    pub session: Arc<DashboardSession>,
    /// Same ports the data service and session report to
    pub ports: Arc<RecordingPorts>,
}

impl AppState {
    /// Wires sources, services and the session from configuration. Catalog
    /// tables are tried in order: processed files, raw files, then the remote API.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let sources = &config.sources;
        let mut catalog: Vec<Arc<dyn CatalogSource>> = vec![
            Arc::new(StaticFileSource::new(&sources.processed_dir, FileLayout::Processed)),
            Arc::new(StaticFileSource::new(&sources.raw_dir, FileLayout::Raw)),
        ];
        let mut signal_source: Option<Arc<dyn SignalSource>> = None;
        if sources.remote_enabled {
            let remote = Arc::new(VitalDbRepository::new(
                &sources.remote_base_url,
                sources.request_timeout(),
            )?);
            catalog.push(remote.clone());
            signal_source = Some(remote);
        }
        tracing::info!(
            "Catalog sources: {}",
            catalog.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );

        let ports = Arc::new(RecordingPorts::default());
        let mut data_service = DataService::new(
            SourceChain::new(catalog),
            signal_source,
            ports.clone(),
            config.display.clone(),
            sources.parse_worker,
        );
        if let Some(ttl) = config.cache.expiry() {
            data_service = data_service.with_cache_expiry(ttl);
        }
        let data_service = Arc::new(data_service);
        let crisis_service = Arc::new(CrisisService::new(
            data_service.clone(),
            config.analysis.annotation_sensitivity,
        ));
        let session = DashboardSession::new(
            data_service.clone(),
            SessionSettings {
                analysis: config.analysis.clone(),
                playback: config.playback.clone(),
                brush: config.brush.clone(),
            },
        );

        Ok(Self {
            data_service,
            crisis_service,
            session,
            ports,
        })
    }
}
