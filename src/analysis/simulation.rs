// Intervention simulation: synthesizes the post-intervention trajectory
use crate::domain::case::CaseId;
use crate::domain::error::{DashboardError, DashboardResult};
use crate::domain::intervention::{case_factor, InterventionFamily};
use crate::domain::signal::{nearest_point, value_extent, SamplePoint, SignalType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::f64::consts::PI;

/// Output resolution: `SIMULATION_STEPS + 1` points across the domain.
pub const SIMULATION_STEPS: usize = 100;

// Allowed output band, as a multiple of the observed reference range.
const CLAMP_SPAN: f64 = 1.5;
const RELAPSE_CASE_FACTOR: f64 = 0.7;
const RELAPSE_EFFORT: f64 = 0.7;
const RELAPSE_START: f64 = 0.6;
const RELAPSE_DEPTH: f64 = 0.6;

/// Everything a simulation run reads.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInput<'a> {
    pub reference: &'a [SamplePoint],
    /// Time domain of the chart the simulation is drawn on.
    pub domain: (f64, f64),
    pub case_id: CaseId,
    pub signal_name: &'a str,
    /// Slider value in `[0, 100]`.
    pub effort: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedSeries {
    pub family: InterventionFamily,
    pub effort: f64,
    pub signal_type: SignalType,
    pub target_value: f64,
    pub points: Vec<SamplePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationState {
    Idle,
    InterventionChosen {
        family: InterventionFamily,
        event_type: String,
    },
    Simulated {
        family: InterventionFamily,
        event_type: String,
        series: SimulatedSeries,
    },
}

/// Tracks the chosen intervention and the simulated series it produced.
#[derive(Debug, Clone)]
pub struct InterventionSimulator {
    state: SimulationState,
}

impl Default for InterventionSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl InterventionSimulator {
    pub fn new() -> Self {
        Self {
            state: SimulationState::Idle,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn current(&self) -> Option<&SimulatedSeries> {
        match &self.state {
            SimulationState::Simulated { series, .. } => Some(series),
            _ => None,
        }
    }

    /// Picks an intervention. Any previous simulation is dropped.
    pub fn choose(&mut self, family: InterventionFamily, event_type: impl Into<String>) {
        self.state = SimulationState::InterventionChosen {
            family,
            event_type: event_type.into(),
        };
    }

    /// Runs the chosen intervention and replaces whatever was simulated before.
    pub fn apply(&mut self, input: SimulationInput<'_>) -> DashboardResult<SimulatedSeries> {
        let (family, event_type) = match &self.state {
            SimulationState::Idle => {
                return Err(DashboardError::invalid(
                    "intervention",
                    "no intervention chosen",
                ));
            }
            SimulationState::InterventionChosen { family, event_type }
            | SimulationState::Simulated {
                family, event_type, ..
            } => (*family, event_type.clone()),
        };

        let mut rng = StdRng::seed_from_u64(input.case_id as u64);
        let series = simulate(&input, family, &mut rng)?;
        tracing::debug!(
            "Simulated intervention {:?} for {} at effort {}",
            family,
            event_type,
            input.effort
        );
        self.state = SimulationState::Simulated {
            family,
            event_type,
            series: series.clone(),
        };
        Ok(series)
    }

    pub fn reset(&mut self) {
        self.state = SimulationState::Idle;
    }
}

/// Synthesizes the trajectory for `family` over `input.domain`.
///
/// Before the domain center the nearest reference sample is copied unchanged.
/// From the center on, the value moves from the reference toward the signal's
/// target by `curve * effort * efficacy`, then is clamped to a band 150% as wide
/// as the reference range.
pub fn simulate<R: Rng>(
    input: &SimulationInput<'_>,
    family: InterventionFamily,
    rng: &mut R,
) -> DashboardResult<SimulatedSeries> {
    if !input.effort.is_finite() {
        return Err(DashboardError::invalid("effort", "must be a number"));
    }
    let (d0, d1) = input.domain;
    if !(d0.is_finite() && d1.is_finite()) || d1 <= d0 {
        return Err(DashboardError::invalid(
            "domain",
            format!("{}..{} is not a time range", d0, d1),
        ));
    }
    let Some((ref_min, ref_max)) = value_extent(input.reference) else {
        return Err(DashboardError::InsufficientData {
            resource: input.signal_name.to_string(),
            points: 0,
            required: 1,
        });
    };

    let effort = input.effort.clamp(0.0, 100.0) / 100.0;
    let factor = case_factor(input.case_id);
    let signal_type = SignalType::classify(input.signal_name);
    let center = (d0 + d1) / 2.0;

    let baseline = Baseline::before(input.reference, center);
    let target = target_value(signal_type, input.signal_name, factor, baseline.mean);
    let gain = effort * efficacy(signal_type);

    let spread = ref_max - ref_min;
    let margin = spread * (CLAMP_SPAN - 1.0) / 2.0;
    let (floor, ceiling) = (ref_min - margin, ref_max + margin);

    let step = (d1 - d0) / SIMULATION_STEPS as f64;
    let mut points = Vec::with_capacity(SIMULATION_STEPS + 1);
    for i in 0..=SIMULATION_STEPS {
        let time = d0 + i as f64 * step;
        let closest = nearest_point(input.reference, time)
            .map(|p| p.value)
            .unwrap_or(baseline.mean);

        if time < center {
            points.push(SamplePoint::new(time, closest));
            continue;
        }

        let elapsed = ((time - center) / (d1 - center)).clamp(0.0, 1.0);
        let (curve, wobble) = match family {
            InterventionFamily::A => {
                let oscillation = baseline.std_dev
                    * 0.3
                    * (-3.0 * elapsed).exp()
                    * (2.0 * PI * 3.0 * elapsed).sin();
                (elapsed.powf(0.7), oscillation)
            }
            InterventionFamily::B => (fast_response_curve(elapsed, factor, effort), 0.0),
        };
        let noise = gaussian_like(rng) * baseline.std_dev * 0.05;

        let value = closest + (target - closest) * curve * gain + (wobble + noise) * effort;
        points.push(SamplePoint::new(time, value.clamp(floor, ceiling)));
    }

    Ok(SimulatedSeries {
        family,
        effort: effort * 100.0,
        signal_type,
        target_value: target,
        points,
    })
}

/// Family B: `1 - exp(-e * speed)`; slower for higher case factors, and for a
/// high factor with low effort the gain erodes after 60% elapsed.
fn fast_response_curve(elapsed: f64, factor: f64, effort: f64) -> f64 {
    let speed = 2.0 + 4.0 * (1.0 - factor);
    let curve = 1.0 - (-elapsed * speed).exp();
    if factor > RELAPSE_CASE_FACTOR && effort < RELAPSE_EFFORT && elapsed > RELAPSE_START {
        let past = (elapsed - RELAPSE_START) / (1.0 - RELAPSE_START);
        curve * (1.0 - RELAPSE_DEPTH * past)
    } else {
        curve
    }
}

/// Mean and population standard deviation of the samples before `center`.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    mean: f64,
    std_dev: f64,
}

impl Baseline {
    fn before(reference: &[SamplePoint], center: f64) -> Self {
        let pre: Vec<f64> = reference
            .iter()
            .filter(|p| p.time < center)
            .map(|p| p.value)
            .collect();
        let values: Vec<f64> = if pre.is_empty() {
            reference.iter().map(|p| p.value).collect()
        } else {
            pre
        };
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Where a successful intervention pulls the signal.
pub fn target_value(signal_type: SignalType, signal_name: &str, factor: f64, pre_avg: f64) -> f64 {
    match signal_type {
        SignalType::HeartRate => 65.0 + factor * 25.0,
        SignalType::BloodPressure => {
            let name = signal_name.to_lowercase();
            if name.contains("dbp") || name.contains("dia") {
                70.0 + factor * 10.0
            } else if name.contains("mbp") || name.contains("map") || name.contains("mean") {
                85.0 + factor * 10.0
            } else {
                110.0 + factor * 20.0
            }
        }
        SignalType::Oxygen => 98.0 + factor * 2.0,
        SignalType::Temperature => 37.0 + (factor - 0.5) * 0.6,
        SignalType::Eeg => 40.0 + factor * 20.0,
        SignalType::Respiration => 35.0 + factor * 10.0,
        SignalType::Unknown => pre_avg,
    }
}

/// Share of the distance to target an all-out intervention closes.
pub fn efficacy(signal_type: SignalType) -> f64 {
    match signal_type {
        SignalType::HeartRate => 0.85,
        SignalType::BloodPressure => 0.8,
        SignalType::Oxygen => 0.9,
        SignalType::Temperature => 0.6,
        SignalType::Eeg => 0.5,
        SignalType::Respiration => 0.7,
        SignalType::Unknown => 0.5,
    }
}

/// Roughly standard-normal value from three uniforms (Irwin-Hall).
fn gaussian_like<R: Rng>(rng: &mut R) -> f64 {
    let sum: f64 = (0..3).map(|_| rng.gen_range(0.0..1.0)).sum();
    (sum - 1.5) * 2.0
}
