// Crisis analysis view: signal selection, overlay data and intervention simulation
use crate::analysis::annotations::extract_annotations;
use crate::analysis::downsample::downsample;
use crate::analysis::simulation::{InterventionSimulator, SimulatedSeries, SimulationInput};
use crate::application::data_service::DataService;
use crate::application::navigation::TimeWindow;
use crate::domain::annotation::Annotation;
use crate::domain::case::{CaseId, Track};
use crate::domain::error::{DashboardError, DashboardResult};
use crate::domain::intervention::{build_intervention_tree, InterventionFamily, InterventionNode};
use crate::domain::signal::{nearest_point, SamplePoint, SharedSeries, SignalType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_SIGNALS: usize = 8;
const CHECKED_BY_DEFAULT: usize = 3;
/// Tooltips only show a sample this close to the cursor, in seconds.
pub const TOOLTIP_MAX_DISTANCE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalChoice {
    pub tid: String,
    pub name: String,
    pub checked: bool,
    pub signal_type: SignalType,
}

impl SignalChoice {
    fn new(tid: &str, name: &str, checked: bool) -> Self {
        Self {
            tid: tid.to_string(),
            name: name.to_string(),
            checked,
            signal_type: SignalType::classify(name),
        }
    }
}

/// Device-qualified tracks ("Device/Signal"), at most eight, first three checked.
pub fn select_signals(tracks: &[Track]) -> Vec<SignalChoice> {
    tracks
        .iter()
        .filter(|t| t.tname.contains('/'))
        .take(MAX_SIGNALS)
        .enumerate()
        .map(|(i, t)| SignalChoice::new(&t.tid, &t.tname, i < CHECKED_BY_DEFAULT))
        .collect()
}

/// Demo signals shown when the track list cannot be loaded.
pub fn fallback_signals() -> Vec<SignalChoice> {
    const BIS: &str = "fd869e25ba82a66cc95b38ed47110bf4f14bb368";
    const EEG1: &str = "0aa685df768489a18a5e9f53af0d83bf60890c73";
    const EEG2: &str = "ad13b2c39b19193c8ae4a2de4f8315f18d61a57e";
    vec![
        SignalChoice::new(BIS, "BIS/BIS", true),
        SignalChoice::new(EEG1, "BIS/EEG1_WAV", true),
        SignalChoice::new(EEG2, "BIS/EEG2_WAV", true),
        SignalChoice::new(BIS, "HR/HR", false),
        SignalChoice::new(EEG1, "BP/Systolic", false),
        SignalChoice::new(EEG2, "BP/Diastolic", false),
    ]
}

/// Sample nearest to `time`, if it lies within `max_distance`.
pub fn nearest_within(points: &[SamplePoint], time: f64, max_distance: f64) -> Option<&SamplePoint> {
    nearest_point(points, time).filter(|p| (p.time - time).abs() <= max_distance)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisSignal {
    pub tid: String,
    pub name: String,
    pub series: SharedSeries,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisView {
    pub case_id: CaseId,
    pub window: TimeWindow,
    pub signals: Vec<SignalChoice>,
    /// Loaded series of the checked signals, in selection order
    pub overlay: Vec<CrisisSignal>,
    pub intervention_tree: InterventionNode,
    pub demo_signals: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub case_id: CaseId,
    /// Reference track the simulation departs from
    pub tid: String,
    pub signal_name: String,
    pub start: f64,
    pub end: f64,
    pub family: InterventionFamily,
    pub event_type: String,
    pub effort: f64,
}

pub struct CrisisService {
    data: Arc<DataService>,
    annotation_sensitivity: f64,
}

impl CrisisService {
    pub fn new(data: Arc<DataService>, annotation_sensitivity: f64) -> Self {
        Self {
            data,
            annotation_sensitivity,
        }
    }

    /// Signals, overlay data and decision tree for a case and window.
    pub async fn load(&self, case_id: CaseId, window: TimeWindow) -> DashboardResult<CrisisView> {
        let (signals, demo_signals) = match self.data.get_tracks_for_case(case_id).await {
            Ok(tracks) => {
                let signals = select_signals(&tracks);
                if signals.is_empty() {
                    tracing::warn!("Case {} has no device signals, using demo signals", case_id);
                    (fallback_signals(), true)
                } else {
                    (signals, false)
                }
            }
            Err(e) => {
                tracing::warn!("Track list for case {} unavailable ({}), using demo signals", case_id, e);
                (fallback_signals(), true)
            }
        };

        let overview_points = self.data.display().overview_points;
        let mut overlay = Vec::new();
        for choice in signals.iter().filter(|s| s.checked) {
            let mut series = self
                .data
                .get_signal_data(&choice.tid, window.start, window.end)
                .await?;
            if series.len() > overview_points {
                series = Arc::new(series.with_points(downsample(&series.points, overview_points)));
            }
            let annotations = extract_annotations(
                &series.points,
                (window.start, window.end),
                self.annotation_sensitivity,
            );
            overlay.push(CrisisSignal {
                tid: choice.tid.clone(),
                name: choice.name.clone(),
                series,
                annotations,
            });
        }

        let tree_signal = signals
            .iter()
            .find(|s| s.checked)
            .map(|s| s.signal_type)
            .unwrap_or(SignalType::Unknown);
        tracing::info!(
            "Crisis view for case {}: {} signals, {} loaded",
            case_id,
            signals.len(),
            overlay.len()
        );

        Ok(CrisisView {
            case_id,
            intervention_tree: build_intervention_tree(window.center_time, case_id, tree_signal),
            window,
            signals,
            overlay,
            demo_signals,
        })
    }

    /// Simulates the requested intervention against the reference track.
    pub async fn simulate(&self, request: &SimulationRequest) -> DashboardResult<SimulatedSeries> {
        let tree = build_intervention_tree(
            (request.start + request.end) / 2.0,
            request.case_id,
            SignalType::classify(&request.signal_name),
        );
        if tree
            .find_intervention(&request.event_type, request.family)
            .is_none()
        {
            return Err(DashboardError::invalid(
                "eventType",
                format!("no intervention {:?} for {}", request.family, request.event_type),
            ));
        }

        let reference = self
            .data
            .get_signal_data(&request.tid, request.start, request.end)
            .await?;

        let mut simulator = InterventionSimulator::new();
        simulator.choose(request.family, request.event_type.clone());
        simulator.apply(SimulationInput {
            reference: &reference.points,
            domain: (request.start, request.end),
            case_id: request.case_id,
            signal_name: &request.signal_name,
            effort: request.effort,
        })
    }
}
