// Data service - cached catalog and signal access with synthetic fallbacks
use crate::analysis::downsample::downsample;
use crate::analysis::synthetic;
use crate::application::data_source::{CatalogTable, SignalSource, SourceChain};
use crate::application::ports::{LoadingState, UiPorts};
use crate::application::request_cache::RequestCache;
use crate::domain::case::{CaseHierarchy, CaseId, CaseSummary, LabResult, Track};
use crate::domain::error::{DashboardError, DashboardResult};
use crate::domain::signal::{SeriesOrigin, SharedSeries, SignalSeries};
use crate::infrastructure::config::DisplaySettings;
use crate::infrastructure::csv_parser::{
    parse_delimited, rows_to_points, rows_to_points_progressive, sort_by_time,
};
use crate::infrastructure::parse_worker::parse_in_worker;
use crate::infrastructure::row_mapper::{rows_to_cases, rows_to_labs, rows_to_tracks};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cache key of a signal window. Times are compared bit for bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub track_id: String,
    start_bits: u64,
    end_bits: u64,
}

impl SignalKey {
    pub fn new(track_id: &str, start: f64, end: f64) -> Self {
        Self {
            track_id: track_id.to_string(),
            start_bits: start.to_bits(),
            end_bits: end.to_bits(),
        }
    }

    pub fn start(&self) -> f64 {
        f64::from_bits(self.start_bits)
    }

    pub fn end(&self) -> f64 {
        f64::from_bits(self.end_bits)
    }

    fn covers(&self, other: &SignalKey) -> bool {
        self.track_id == other.track_id && self.start() <= other.start() && self.end() >= other.end()
    }
}

/// A fetched window: the display resolution handed out, and the full
/// resolution kept for serving narrower windows later.
#[derive(Debug, Clone)]
struct SignalWindow {
    display: SharedSeries,
    full: SharedSeries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    All,
    Case(CaseId),
    Track(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub cases: usize,
    pub hierarchy: usize,
    pub tracks: usize,
    pub labs: usize,
    pub signals: usize,
    pub synthetic: usize,
    pub in_flight: usize,
}

pub struct DataService {
    catalog: SourceChain,
    signal_source: Option<Arc<dyn SignalSource>>,
    ports: Arc<dyn UiPorts>,
    display: DisplaySettings,
    parse_worker: bool,
    cases: RequestCache<(), Arc<Vec<CaseSummary>>>,
    hierarchy: RequestCache<(), Arc<CaseHierarchy>>,
    tracks: RequestCache<CaseId, Arc<Vec<Track>>>,
    labs: RequestCache<CaseId, Arc<Vec<LabResult>>>,
    signals: RequestCache<SignalKey, SignalWindow>,
    /// Fallback series, kept apart so they never shadow recorded data.
    synthetic: RequestCache<SignalKey, SharedSeries>,
    track_cases: Mutex<HashMap<String, CaseId>>,
}

impl DataService {
    pub fn new(
        catalog: SourceChain,
        signal_source: Option<Arc<dyn SignalSource>>,
        ports: Arc<dyn UiPorts>,
        display: DisplaySettings,
        parse_worker: bool,
    ) -> Self {
        Self {
            catalog,
            signal_source,
            ports,
            display,
            parse_worker,
            cases: RequestCache::new("cases"),
            hierarchy: RequestCache::new("hierarchy"),
            tracks: RequestCache::new("tracks"),
            labs: RequestCache::new("labs"),
            signals: RequestCache::new("signals"),
            synthetic: RequestCache::new("synthetic"),
            track_cases: Mutex::new(HashMap::new()),
        }
    }

    /// Cached tables and windows older than `ttl` are fetched again.
    pub fn with_cache_expiry(self, ttl: Duration) -> Self {
        Self {
            cases: self.cases.with_ttl(ttl),
            hierarchy: self.hierarchy.with_ttl(ttl),
            tracks: self.tracks.with_ttl(ttl),
            labs: self.labs.with_ttl(ttl),
            signals: self.signals.with_ttl(ttl),
            synthetic: self.synthetic.with_ttl(ttl),
            ..self
        }
    }

    pub fn display(&self) -> &DisplaySettings {
        &self.display
    }

    pub fn ports(&self) -> &Arc<dyn UiPorts> {
        &self.ports
    }

    pub async fn get_case_list(&self) -> DashboardResult<Arc<Vec<CaseSummary>>> {
        let chain = self.catalog.clone();
        let ports = Arc::clone(&self.ports);
        let worker = self.parse_worker;
        self.cases
            .get_or_fetch((), move || {
                with_loading(ports, "Loading cases".to_string(), load_cases(chain, worker))
            })
            .await
    }

    pub async fn get_tracks_for_case(&self, case_id: CaseId) -> DashboardResult<Arc<Vec<Track>>> {
        let chain = self.catalog.clone();
        let ports = Arc::clone(&self.ports);
        let message = format!("Loading tracks for case {}", case_id);
        let tracks = self
            .tracks
            .get_or_fetch(case_id, move || {
                with_loading(ports, message, load_tracks(chain, case_id))
            })
            .await?;

        let mut track_cases = self.track_cases.lock().unwrap_or_else(|e| e.into_inner());
        for track in tracks.iter() {
            track_cases.insert(track.tid.clone(), case_id);
        }
        Ok(tracks)
    }

    pub async fn get_labs_for_case(&self, case_id: CaseId) -> DashboardResult<Arc<Vec<LabResult>>> {
        let chain = self.catalog.clone();
        let ports = Arc::clone(&self.ports);
        let message = format!("Loading labs for case {}", case_id);
        self.labs
            .get_or_fetch(case_id, move || {
                with_loading(ports, message, load_labs(chain, case_id))
            })
            .await
    }

    /// Operation type / complexity hierarchy, or the built-in one when no
    /// source has it. The built-in fallback is not cached.
    pub async fn get_case_hierarchy(&self) -> Arc<CaseHierarchy> {
        let chain = self.catalog.clone();
        let result = self
            .hierarchy
            .get_or_fetch((), move || load_hierarchy(chain))
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!("Using default case hierarchy: {}", e);
            Arc::new(CaseHierarchy::fallback())
        })
    }

    /// Display-resolution series for a window. Missing, short or failed data is
    /// replaced by a synthetic series. The real source is always tried first;
    /// concurrent fallbacks for one window share a single generated series.
    pub async fn get_signal_data(
        &self,
        track_id: &str,
        start: f64,
        end: f64,
    ) -> DashboardResult<SharedSeries> {
        validate_window(track_id, start, end)?;

        match self.load_signal(track_id, start, end).await {
            Ok(series) => {
                let key = SignalKey::new(track_id, start, end);
                self.synthetic.invalidate_where(|k| k == &key);
                Ok(series)
            }
            Err(e) if !e.is_recoverable() => Err(e),
            Err(e) => {
                tracing::warn!("Using synthetic data for {}: {}", track_id, e);
                self.synthetic_window(track_id, start, end).await
            }
        }
    }

    async fn synthetic_window(&self, track_id: &str, start: f64, end: f64) -> DashboardResult<SharedSeries> {
        let id = track_id.to_string();
        self.synthetic
            .get_or_fetch(SignalKey::new(track_id, start, end), move || async move {
                Ok(Arc::new(synthetic::generate(&id, start, end)))
            })
            .await
    }

    async fn load_signal(&self, track_id: &str, start: f64, end: f64) -> DashboardResult<SharedSeries> {
        let key = SignalKey::new(track_id, start, end);
        if let Some(window) = self.signals.peek(&key) {
            return Ok(window.display);
        }
        if let Some(window) = self.window_from_expanded(&key)? {
            tracing::debug!("Built {} {}..{} from a wider window", track_id, start, end);
            let display = Arc::clone(&window.display);
            self.signals.insert(key, window);
            return Ok(display);
        }

        let Some(source) = self.signal_source.clone() else {
            return Err(DashboardError::InsufficientData {
                resource: track_id.to_string(),
                points: 0,
                required: self.display.min_signal_points,
            });
        };
        let ports = Arc::clone(&self.ports);
        let display = self.display.clone();
        let id = track_id.to_string();
        let window = self
            .signals
            .get_or_fetch(key, move || fetch_window(source, ports, display, id, start, end))
            .await?;
        Ok(window.display)
    }

    fn window_from_expanded(&self, key: &SignalKey) -> DashboardResult<Option<SignalWindow>> {
        let Some(full) = self
            .signals
            .find_map(|k, w| (k != key && k.covers(key)).then(|| Arc::clone(&w.full)))
        else {
            return Ok(None);
        };

        let (start, end) = (key.start(), key.end());
        let points: Vec<_> = full
            .points
            .iter()
            .filter(|p| p.time >= start && p.time <= end)
            .copied()
            .collect();
        if points.len() < self.display.min_signal_points {
            return Err(DashboardError::InsufficientData {
                resource: key.track_id.clone(),
                points: points.len(),
                required: self.display.min_signal_points,
            });
        }

        let shown = downsample(&points, self.display.detailed_points);
        let full = SignalSeries::new(key.track_id.clone(), start, end, SeriesOrigin::Recorded, points);
        Ok(Some(SignalWindow {
            display: Arc::new(full.with_points(shown)),
            full: Arc::new(full),
        }))
    }

    /// Waveform painted before a case is chosen.
    pub fn generate_default_data(&self, start: f64, end: f64) -> SharedSeries {
        Arc::new(synthetic::generate_default(start, end))
    }

    /// Returns how many resolved entries were dropped.
    pub fn clear_cache(&self, scope: &CacheScope) -> usize {
        let removed = match scope {
            CacheScope::All => {
                self.track_cases
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clear();
                self.cases.clear()
                    + self.hierarchy.clear()
                    + self.tracks.clear()
                    + self.labs.clear()
                    + self.signals.clear()
                    + self.synthetic.clear()
            }
            CacheScope::Case(case_id) => {
                let case_tracks: Vec<String> = self
                    .track_cases
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .iter()
                    .filter(|(_, c)| *c == case_id)
                    .map(|(tid, _)| tid.clone())
                    .collect();
                self.tracks.invalidate_where(|k| k == case_id)
                    + self.labs.invalidate_where(|k| k == case_id)
                    + self
                        .signals
                        .invalidate_where(|k| case_tracks.contains(&k.track_id))
                    + self
                        .synthetic
                        .invalidate_where(|k| case_tracks.contains(&k.track_id))
            }
            CacheScope::Track(track_id) => {
                self.signals.invalidate_where(|k| &k.track_id == track_id)
                    + self.synthetic.invalidate_where(|k| &k.track_id == track_id)
            }
        };
        tracing::info!("Cleared {} cache entries ({:?})", removed, scope);
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cases: self.cases.len(),
            hierarchy: self.hierarchy.len(),
            tracks: self.tracks.len(),
            labs: self.labs.len(),
            signals: self.signals.len(),
            synthetic: self.synthetic.len(),
            in_flight: self.cases.in_flight()
                + self.hierarchy.in_flight()
                + self.tracks.in_flight()
                + self.labs.in_flight()
                + self.signals.in_flight()
                + self.synthetic.in_flight(),
        }
    }
}

pub fn validate_window(track_id: &str, start: f64, end: f64) -> DashboardResult<()> {
    if track_id.trim().is_empty() {
        return Err(DashboardError::invalid("trackId", "must not be empty"));
    }
    if !start.is_finite() || !end.is_finite() || end <= start {
        return Err(DashboardError::invalid(
            "window",
            format!("{}..{} is not a time range", start, end),
        ));
    }
    Ok(())
}

/// Brackets `fut` with loading indicators. Fetch and parse failures also go to
/// the error port; too little data is left for the caller to substitute.
async fn with_loading<T>(
    ports: Arc<dyn UiPorts>,
    message: String,
    fut: impl Future<Output = DashboardResult<T>>,
) -> DashboardResult<T> {
    ports.loading(LoadingState::Loading { message });
    let result = fut.await;
    ports.loading(LoadingState::Idle);
    match &result {
        Err(e @ DashboardError::InsufficientData { .. }) => tracing::debug!("{}", e),
        Err(e) => {
            tracing::error!("{}", e);
            ports.show_error(e);
        }
        Ok(_) => {}
    }
    result
}

async fn load_cases(chain: SourceChain, worker: bool) -> DashboardResult<Arc<Vec<CaseSummary>>> {
    let text = chain.fetch_table(CatalogTable::Cases).await?;
    let rows = parse_in_worker(worker, Arc::from(text), parse_delimited).await;
    let cases = rows_to_cases(&rows);
    if cases.is_empty() {
        return Err(DashboardError::parse("cases", "no case rows"));
    }
    tracing::info!("Loaded {} cases", cases.len());
    Ok(Arc::new(cases))
}

async fn load_tracks(chain: SourceChain, case_id: CaseId) -> DashboardResult<Arc<Vec<Track>>> {
    let text = chain.fetch_table(CatalogTable::Tracks(case_id)).await?;
    let tracks = rows_to_tracks(&parse_delimited(&text), case_id);
    tracing::info!("Loaded {} tracks for case {}", tracks.len(), case_id);
    Ok(Arc::new(tracks))
}

async fn load_labs(chain: SourceChain, case_id: CaseId) -> DashboardResult<Arc<Vec<LabResult>>> {
    let text = chain.fetch_table(CatalogTable::Labs(case_id)).await?;
    let labs = rows_to_labs(&parse_delimited(&text), case_id);
    tracing::info!("Loaded {} labs for case {}", labs.len(), case_id);
    Ok(Arc::new(labs))
}

async fn load_hierarchy(chain: SourceChain) -> DashboardResult<Arc<CaseHierarchy>> {
    let text = chain.fetch_table(CatalogTable::Hierarchy).await?;
    let hierarchy: CaseHierarchy = serde_json::from_str(&text)
        .map_err(|e| DashboardError::parse("case_hierarchy.json", e))?;
    Ok(Arc::new(hierarchy))
}

async fn fetch_window(
    source: Arc<dyn SignalSource>,
    ports: Arc<dyn UiPorts>,
    display: DisplaySettings,
    track_id: String,
    start: f64,
    end: f64,
) -> DashboardResult<SignalWindow> {
    let message = format!("Loading {}", track_id);
    let progress = Arc::clone(&ports);
    with_loading(
        ports,
        message,
        read_window(source, progress, display, track_id, start, end),
    )
    .await
}

async fn read_window(
    source: Arc<dyn SignalSource>,
    ports: Arc<dyn UiPorts>,
    display: DisplaySettings,
    track_id: String,
    start: f64,
    end: f64,
) -> DashboardResult<SignalWindow> {
    let text = source.fetch_signal(&track_id, start, end).await?;
    let rows = parse_delimited(&text);

    let points = if rows.len() > display.progressive_threshold {
        let mut chunks = Box::pin(rows_to_points_progressive(rows, display.progressive_chunk));
        let mut points = Vec::new();
        while let Some(chunk) = chunks.next().await {
            ports.loading(LoadingState::Progress {
                percent: chunk.percent(),
            });
            points.extend(chunk.points);
        }
        sort_by_time(&mut points);
        points
    } else {
        rows_to_points(&rows)
    };

    if points.len() < display.min_signal_points {
        return Err(DashboardError::InsufficientData {
            resource: track_id,
            points: points.len(),
            required: display.min_signal_points,
        });
    }

    tracing::info!("Loaded {} points for {} ({}..{})", points.len(), track_id, start, end);
    let full = SignalSeries::new(track_id, start, end, SeriesOrigin::Recorded, points);
    let shown = downsample(&full.points, display.detailed_points);
    Ok(SignalWindow {
        display: Arc::new(full.with_points(shown)),
        full: Arc::new(full),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::data_source::CatalogSource;
    use crate::application::ports::{PortEvent, RecordingPorts};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `Time,HR` rows one second apart over the requested window.
    struct CountingSignals {
        calls: AtomicUsize,
        fail_first: bool,
        points_per_window: Option<usize>,
    }

    impl CountingSignals {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_first: false,
                points_per_window: None,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignalSource for CountingSignals {
        async fn fetch_signal(&self, track_id: &str, start: f64, end: f64) -> DashboardResult<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_first && call == 0 {
                return Err(DashboardError::fetch(track_id, "HTTP 503"));
            }
            let n = self
                .points_per_window
                .unwrap_or(((end - start) as usize).max(1));
            let mut text = String::from("Time,Solar8000/HR\n");
            for i in 0..n {
                let t = start + (end - start) * i as f64 / n as f64;
                text.push_str(&format!("{},{}\n", t, 70 + (i % 7)));
            }
            Ok(text)
        }
    }

    struct MemoryCatalog {
        tables: HashMap<&'static str, String>,
    }

    #[async_trait]
    impl CatalogSource for MemoryCatalog {
        fn name(&self) -> &str {
            "memory"
        }

        async fn fetch_table(&self, table: CatalogTable) -> DashboardResult<String> {
            let name = match table {
                CatalogTable::Cases => "cases",
                CatalogTable::Tracks(_) => "tracks",
                CatalogTable::Labs(_) => "labs",
                CatalogTable::Hierarchy => "hierarchy",
            };
            self.tables
                .get(name)
                .cloned()
                .ok_or_else(|| DashboardError::fetch(name, "not found"))
        }
    }

    fn catalog(tables: &[(&'static str, &str)]) -> SourceChain {
        let tables = tables.iter().map(|(k, v)| (*k, v.to_string())).collect();
        SourceChain::new(vec![Arc::new(MemoryCatalog { tables })])
    }

    fn service(
        chain: SourceChain,
        signals: Option<Arc<dyn SignalSource>>,
    ) -> (DataService, Arc<RecordingPorts>) {
        let ports = Arc::new(RecordingPorts::default());
        let service = DataService::new(
            chain,
            signals,
            ports.clone(),
            DisplaySettings::default(),
            true,
        );
        (service, ports)
    }

    #[tokio::test]
    async fn test_concurrent_signal_requests_fetch_once() {
        let signals = CountingSignals::new();
        let (service, _) = service(SourceChain::default(), Some(signals.clone()));

        let (a, b) = tokio::join!(
            service.get_signal_data("hr", 0.0, 600.0),
            service.get_signal_data("hr", 0.0, 600.0),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(signals.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.origin, SeriesOrigin::Recorded);
        assert_eq!(a.len(), 600);

        service.get_signal_data("hr", 0.0, 600.0).await.unwrap();
        assert_eq!(signals.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_and_retries() {
        let signals = Arc::new(CountingSignals {
            calls: AtomicUsize::new(0),
            fail_first: true,
            points_per_window: None,
        });
        let (service, ports) = service(SourceChain::default(), Some(signals.clone()));

        let first = service.get_signal_data("hr", 0.0, 100.0).await.unwrap();
        assert_eq!(first.origin, SeriesOrigin::Synthetic);
        assert_eq!(first.len(), synthetic::SYNTHETIC_POINTS);
        assert_eq!(ports.errors().len(), 1);

        assert_eq!(service.cache_stats().synthetic, 1);

        let second = service.get_signal_data("hr", 0.0, 100.0).await.unwrap();
        assert_eq!(second.origin, SeriesOrigin::Recorded);
        assert_eq!(signals.calls(), 2);
        assert_eq!(service.cache_stats().synthetic, 0);
    }

    #[tokio::test]
    async fn test_short_window_is_replaced_silently() {
        let signals = Arc::new(CountingSignals {
            calls: AtomicUsize::new(0),
            fail_first: false,
            points_per_window: Some(3),
        });
        let (service, ports) = service(SourceChain::default(), Some(signals.clone()));

        let series = service.get_signal_data("hr", 0.0, 100.0).await.unwrap();
        assert_eq!(series.origin, SeriesOrigin::Synthetic);
        assert!(ports.errors().is_empty());
        assert_eq!(service.cache_stats().signals, 0);
        assert_eq!(service.cache_stats().synthetic, 1);
    }

    #[tokio::test]
    async fn test_narrow_window_served_from_wider_one() {
        let signals = CountingSignals::new();
        let (service, _) = service(SourceChain::default(), Some(signals.clone()));

        service.get_signal_data("hr", 0.0, 600.0).await.unwrap();
        let narrow = service.get_signal_data("hr", 100.0, 200.0).await.unwrap();
        assert_eq!(signals.calls(), 1);
        assert_eq!(narrow.origin, SeriesOrigin::Recorded);
        assert_eq!(narrow.len(), 101);
        assert!(narrow.points.iter().all(|p| p.time >= 100.0 && p.time <= 200.0));

        // A different track still fetches.
        service.get_signal_data("bp", 100.0, 200.0).await.unwrap();
        assert_eq!(signals.calls(), 2);
    }

    #[tokio::test]
    async fn test_large_window_is_converted_progressively() {
        let signals = Arc::new(CountingSignals {
            calls: AtomicUsize::new(0),
            fail_first: false,
            points_per_window: Some(12_000),
        });
        let (service, ports) = service(SourceChain::default(), Some(signals));

        let series = service.get_signal_data("hr", 0.0, 1200.0).await.unwrap();
        assert_eq!(series.len(), 2000);
        assert!(series.points.windows(2).all(|w| w[0].time <= w[1].time));

        let progress: Vec<u8> = ports
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PortEvent::Loading {
                    state: LoadingState::Progress { percent },
                } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![41, 83, 100]);
    }

    #[tokio::test]
    async fn test_clear_cache_by_track_refetches() {
        let signals = CountingSignals::new();
        let (service, _) = service(SourceChain::default(), Some(signals.clone()));

        service.get_signal_data("hr", 0.0, 60.0).await.unwrap();
        service.get_signal_data("bp", 0.0, 60.0).await.unwrap();
        assert_eq!(service.clear_cache(&CacheScope::Track("hr".into())), 1);
        service.get_signal_data("hr", 0.0, 60.0).await.unwrap();
        service.get_signal_data("bp", 0.0, 60.0).await.unwrap();
        assert_eq!(signals.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_window_is_an_error() {
        let (service, _) = service(SourceChain::default(), None);
        assert!(service.get_signal_data("", 0.0, 1.0).await.is_err());
        assert!(service.get_signal_data("hr", 5.0, 5.0).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_fallbacks_share_one_series() {
        let (service, _) = service(SourceChain::default(), None);
        let (a, b) = tokio::join!(
            service.get_signal_data("hr", 0.0, 60.0),
            service.get_signal_data("hr", 0.0, 60.0)
        );
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(service.cache_stats().synthetic, 1);
        assert_eq!(service.clear_cache(&CacheScope::Track("hr".into())), 1);
    }

    #[tokio::test]
    async fn test_no_signal_source_gives_synthetic() {
        let (service, ports) = service(SourceChain::default(), None);
        let series = service.get_signal_data("hr", 0.0, 60.0).await.unwrap();
        assert_eq!(series.origin, SeriesOrigin::Synthetic);
        assert!(ports.errors().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_tables() {
        let chain = catalog(&[
            ("cases", "caseid,opname,department\n1,Lobectomy,Thoracic\n2,,\n"),
            ("tracks", "caseid,tname,tid\n1,Solar8000/HR,t1\n2,BIS/BIS,t2\n"),
            ("labs", "caseid,dt,name,result\n1,300,hb,12\n1,-60,hb,13\n"),
        ]);
        let (service, _) = service(chain, None);

        let cases = service.get_case_list().await.unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].opname, CaseSummary::UNKNOWN_OPERATION);

        let tracks = service.get_tracks_for_case(1).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].tid, "t1");

        let labs = service.get_labs_for_case(1).await.unwrap();
        assert_eq!(labs.iter().map(|l| l.dt).collect::<Vec<_>>(), vec![-60.0, 300.0]);

        let stats = service.cache_stats();
        assert_eq!((stats.cases, stats.tracks, stats.labs), (1, 1, 1));
        assert_eq!(service.clear_cache(&CacheScope::Case(1)), 2);
        assert_eq!(service.clear_cache(&CacheScope::All), 1);
    }

    #[tokio::test]
    async fn test_catalog_failure_reaches_error_port() {
        let (service, ports) = service(catalog(&[]), None);
        assert!(service.get_case_list().await.is_err());
        assert_eq!(ports.errors().len(), 1);
        assert_eq!(service.cache_stats().cases, 0);
    }

    #[tokio::test]
    async fn test_hierarchy_falls_back_to_default() {
        let (service, _) = service(catalog(&[("hierarchy", "not json")]), None);
        let hierarchy = service.get_case_hierarchy().await;
        assert_eq!(*hierarchy, CaseHierarchy::fallback());

        let json = r#"{"general": {"Low": ["1"], "Medium": [], "High": ["9"]}}"#;
        let (service, _) = service_with_hierarchy(json);
        let hierarchy = service.get_case_hierarchy().await;
        assert_eq!(hierarchy.operation_types().collect::<Vec<_>>(), vec!["general"]);
        assert_eq!(service.cache_stats().hierarchy, 1);
    }

    fn service_with_hierarchy(json: &str) -> (DataService, Arc<RecordingPorts>) {
        service(catalog(&[("hierarchy", json)]), None)
    }
}
