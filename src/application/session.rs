// Dashboard session - selection, playback, brushing and analysis state
use crate::analysis::annotations::extract_annotations;
use crate::analysis::anomaly::AnomalyDetector;
use crate::analysis::moving_average::{add_moving_averages, SmoothedPoint};
use crate::analysis::simulation::{InterventionSimulator, SimulatedSeries, SimulationInput};
use crate::application::data_service::DataService;
use crate::application::navigation::{NavigationParams, TimeWindow};
use crate::application::overview::{build_overview, BrushController};
use crate::application::playback::{spawn_ticker, GenerationToken, PlaybackClock};
use crate::application::ports::{RenderUpdate, UiPorts};
use crate::domain::annotation::Annotation;
use crate::domain::anomaly::Anomaly;
use crate::domain::case::{CaseId, LabResult, Track};
use crate::domain::error::{DashboardError, DashboardResult};
use crate::domain::intervention::InterventionFamily;
use crate::domain::signal::{SharedSeries, SignalSeries};
use crate::infrastructure::config::{AnalysisSettings, BrushSettings, PlaybackSettings};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Settings a session reads.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub analysis: AnalysisSettings,
    pub playback: PlaybackSettings,
    pub brush: BrushSettings,
}

struct SessionState {
    window: TimeWindow,
    case_id: Option<CaseId>,
    track_id: Option<String>,
    tracks: Arc<Vec<Track>>,
    labs: Arc<Vec<LabResult>>,
    series: SharedSeries,
    overview: Arc<SignalSeries>,
    annotations: Vec<Annotation>,
    clock: PlaybackClock,
    brush: BrushController,
    detector: AnomalyDetector,
    simulator: InterventionSimulator,
    ticker: Option<JoinHandle<()>>,
}

/// What the renderer needs to draw the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub case_id: Option<CaseId>,
    pub track_id: Option<String>,
    pub window: TimeWindow,
    pub playback: PlaybackClock,
    pub tracks: Arc<Vec<Track>>,
    pub labs: Arc<Vec<LabResult>>,
    pub series: SharedSeries,
    pub overview: Arc<SignalSeries>,
    pub annotations: Vec<Annotation>,
    pub anomalies: Vec<Anomaly>,
    pub simulation: Option<SimulatedSeries>,
}

/// Everything the dashboard shows for one viewer.
///
/// State changes only in synchronous sections. A selection takes a token before
/// fetching and its results are dropped if another selection started meanwhile.
pub struct DashboardSession {
    data: Arc<DataService>,
    ports: Arc<dyn UiPorts>,
    settings: SessionSettings,
    selection: AtomicU64,
    generation: GenerationToken,
    state: Mutex<SessionState>,
}

impl DashboardSession {
    /// A session showing the default waveform over the default window.
    pub fn new(data: Arc<DataService>, settings: SessionSettings) -> Arc<Self> {
        let window = TimeWindow::default();
        let series = data.generate_default_data(window.start, window.end);
        let overview = Arc::new(build_overview(&series, data.display().brush_points));
        let domain = (window.start, window.end);
        let state = SessionState {
            window,
            case_id: None,
            track_id: None,
            tracks: Arc::new(Vec::new()),
            labs: Arc::new(Vec::new()),
            annotations: extract_annotations(
                &series.points,
                domain,
                settings.analysis.annotation_sensitivity,
            ),
            series,
            overview,
            clock: PlaybackClock::new(&settings.playback, domain),
            brush: BrushController::new(&settings.brush, domain),
            detector: AnomalyDetector::new(settings.analysis.anomaly.clone()),
            simulator: InterventionSimulator::new(),
            ticker: None,
        };

        Arc::new(Self {
            ports: Arc::clone(data.ports()),
            data,
            settings,
            selection: AtomicU64::new(0),
            generation: GenerationToken::default(),
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            case_id: state.case_id,
            track_id: state.track_id.clone(),
            window: state.window,
            playback: state.clock.clone(),
            tracks: Arc::clone(&state.tracks),
            labs: Arc::clone(&state.labs),
            series: Arc::clone(&state.series),
            overview: Arc::clone(&state.overview),
            annotations: state.annotations.clone(),
            anomalies: state.detector.anomalies().to_vec(),
            simulation: state.simulator.current().cloned(),
        }
    }

    /// Restores the view a link describes.
    pub async fn bootstrap(&self, params: &NavigationParams) -> DashboardResult<Option<SessionSnapshot>> {
        self.lock().window = params.window;
        self.select_case(params.case_id, params.track_id.clone()).await
    }

    /// Loads a case and shows `track_id` (or its first track). Returns `None`
    /// when a newer selection superseded this one.
    pub async fn select_case(
        &self,
        case_id: CaseId,
        track_id: Option<String>,
    ) -> DashboardResult<Option<SessionSnapshot>> {
        let token = self.begin_selection();
        let window = self.lock().window;

        let tracks = match self.data.get_tracks_for_case(case_id).await {
            Ok(tracks) => tracks,
            Err(e) => {
                tracing::warn!("Tracks for case {} unavailable, painting default data: {}", case_id, e);
                let series = self.data.generate_default_data(window.start, window.end);
                return Ok(self.commit(token, Some(case_id), None, None, None, series));
            }
        };
        let labs = match self.data.get_labs_for_case(case_id).await {
            Ok(labs) => labs,
            Err(e) => {
                tracing::warn!("Labs for case {} unavailable: {}", case_id, e);
                Arc::new(Vec::new())
            }
        };

        let chosen = track_id.or_else(|| tracks.first().map(|t| t.tid.clone()));
        let series = match &chosen {
            Some(tid) => self.data.get_signal_data(tid, window.start, window.end).await?,
            None => {
                tracing::info!("Case {} has no tracks", case_id);
                self.data.generate_default_data(window.start, window.end)
            }
        };

        Ok(self.commit(token, Some(case_id), chosen, Some(tracks), Some(labs), series))
    }

    /// Shows another track of the current case.
    pub async fn select_track(&self, track_id: &str) -> DashboardResult<Option<SessionSnapshot>> {
        let token = self.begin_selection();
        let (window, case_id) = {
            let state = self.lock();
            (state.window, state.case_id)
        };
        let series = self
            .data
            .get_signal_data(track_id, window.start, window.end)
            .await?;
        Ok(self.commit(token, case_id, Some(track_id.to_string()), None, None, series))
    }

    fn begin_selection(&self) -> u64 {
        self.pause();
        self.selection.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Applies a finished selection unless a newer one started. `None` keeps the
    /// current track and lab lists.
    fn commit(
        &self,
        token: u64,
        case_id: Option<CaseId>,
        track_id: Option<String>,
        tracks: Option<Arc<Vec<Track>>>,
        labs: Option<Arc<Vec<LabResult>>>,
        series: SharedSeries,
    ) -> Option<SessionSnapshot> {
        let update = {
            let mut state = self.lock();
            if self.selection.load(Ordering::SeqCst) != token {
                tracing::debug!("Dropping superseded selection {}", token);
                return None;
            }

            let domain = series
                .time_extent()
                .unwrap_or((state.window.start, state.window.end));
            state.case_id = case_id;
            state.track_id = track_id;
            if let Some(tracks) = tracks {
                state.tracks = tracks;
            }
            if let Some(labs) = labs {
                state.labs = labs;
            }
            state.annotations = extract_annotations(
                &series.points,
                domain,
                self.settings.analysis.annotation_sensitivity,
            );
            state.overview = Arc::new(build_overview(&series, self.data.display().brush_points));
            state.clock.reset(domain);
            state.brush.set_extent(domain);
            state.detector.reset();
            state.simulator.reset();
            state.series = Arc::clone(&series);

            RenderUpdate::Series {
                track_id: series.track_id.clone(),
                origin: series.origin,
                points: series.len(),
            }
        };
        self.ports.render(update);
        Some(self.snapshot())
    }

    pub fn seek(&self, time: f64) -> f64 {
        let time = self.lock().clock.seek(time);
        self.ports.render(RenderUpdate::PlaybackTime { time });
        time
    }

    pub fn rewind(&self) -> f64 {
        let time = self.lock().clock.rewind();
        self.ports.render(RenderUpdate::PlaybackTime { time });
        time
    }

    pub fn fast_forward(&self) -> f64 {
        let time = self.lock().clock.fast_forward();
        self.ports.render(RenderUpdate::PlaybackTime { time });
        time
    }

    pub fn set_speed(&self, speed: f64) -> DashboardResult<()> {
        if self.lock().clock.set_speed(speed) {
            Ok(())
        } else {
            Err(DashboardError::invalid("speed", format!("{} is not a positive speed", speed)))
        }
    }

    pub fn is_playing(&self) -> bool {
        self.lock().clock.is_playing()
    }

    /// Starts the playback task. Playing from the domain end restarts at the
    /// domain start.
    pub fn play(self: &Arc<Self>) {
        let generation = self.generation.next();
        let mut state = self.lock();
        let (start, end) = state.clock.domain();
        if state.clock.time() >= end {
            state.clock.seek(start);
        }
        state.clock.set_playing(true);

        let session: Weak<Self> = Arc::downgrade(self);
        let handle = spawn_ticker(
            self.settings.playback.tick(),
            self.generation.clone(),
            generation,
            move |generation| session.upgrade().is_some_and(|s| s.tick(generation)),
        );
        if let Some(previous) = state.ticker.replace(handle) {
            previous.abort();
        }
        tracing::debug!("Playback started (generation {})", generation);
    }

    pub fn pause(&self) {
        self.generation.next();
        let mut state = self.lock();
        state.clock.set_playing(false);
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
    }

    /// One playback step. Does nothing for a stale generation.
    fn tick(&self, generation: u64) -> bool {
        let (time, added, playing) = {
            let mut state = self.lock();
            if !self.generation.is_current(generation) || !state.clock.is_playing() {
                return false;
            }
            let playing = state.clock.advance();
            let time = state.clock.time();
            let series = Arc::clone(&state.series);
            let added = state.detector.detect(&series.points, time);
            (time, added, playing)
        };

        self.ports.render(RenderUpdate::PlaybackTime { time });
        if !added.is_empty() {
            tracing::info!("{} new anomalies at {:.1}s", added.len(), time);
            self.ports.render(RenderUpdate::Anomalies { added });
        }
        playing
    }

    /// Domain to draw while brushing, if this update passes the throttle.
    pub fn brush_moved(&self, selection: Option<(f64, f64)>) -> Option<(f64, f64)> {
        let domain = {
            let mut state = self.lock();
            let domain = state.brush.brush_moved(selection, Instant::now())?;
            state.clock.set_domain(domain);
            domain
        };
        self.ports.render(RenderUpdate::Domain {
            start: domain.0,
            end: domain.1,
        });
        Some(domain)
    }

    /// Final brush domain, snapped to nearby annotations.
    pub fn brush_ended(&self, selection: Option<(f64, f64)>) -> (f64, f64) {
        let domain = {
            let mut state = self.lock();
            let annotations = state.annotations.clone();
            let domain = state.brush.brush_ended(selection, &annotations);
            state.clock.set_domain(domain);
            domain
        };
        self.ports.render(RenderUpdate::Domain {
            start: domain.0,
            end: domain.1,
        });
        domain
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.lock().annotations.clone()
    }

    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.lock().detector.anomalies().to_vec()
    }

    /// Current series with the configured moving averages.
    pub fn moving_averages(&self) -> Vec<SmoothedPoint> {
        let series = Arc::clone(&self.lock().series);
        add_moving_averages(&series.points, &self.settings.analysis.moving_average_windows)
    }

    /// Simulates an intervention against the shown series over the viewed domain.
    pub fn simulate(
        &self,
        family: InterventionFamily,
        event_type: &str,
        effort: f64,
    ) -> DashboardResult<SimulatedSeries> {
        let result = {
            let mut state = self.lock();
            let series = Arc::clone(&state.series);
            let signal_name = state
                .track_id
                .as_deref()
                .and_then(|tid| state.tracks.iter().find(|t| t.tid == tid))
                .map(|t| t.tname.clone())
                .unwrap_or_else(|| series.track_id.clone());
            let domain = state.clock.domain();
            let case_id = state.case_id.unwrap_or_default();

            // A rejected request leaves the previous simulation in place.
            let previous = state.simulator.clone();
            state.simulator.choose(family, event_type);
            let result = state.simulator.apply(SimulationInput {
                reference: &series.points,
                domain,
                case_id,
                signal_name: &signal_name,
                effort,
            });
            if result.is_err() {
                state.simulator = previous;
            }
            result
        };

        match &result {
            Ok(simulated) => self.ports.render(RenderUpdate::Simulation {
                points: simulated.points.len(),
            }),
            Err(e) => self.ports.show_error(e),
        }
        result
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
    }
}
