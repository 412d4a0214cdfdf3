// Synthetic biosignal generator used whenever real data is missing
use crate::domain::signal::{SamplePoint, SeriesOrigin, SignalSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Points produced for every synthetic window.
pub const SYNTHETIC_POINTS: usize = 500;

/// Window painted before any case is chosen.
pub const DEFAULT_WINDOW: (f64, f64) = (0.0, 1000.0);

/// Track id attached to the default waveform.
pub const DEFAULT_TRACK_ID: &str = "default";

// Crisis interval as fractions of the time span, and its phases as fractions
// of the interval.
const CRISIS_START: f64 = 0.4;
const CRISIS_END: f64 = 0.7;
const CRISIS_RISE: f64 = 0.1;
const CRISIS_PLATEAU_END: f64 = 0.4;
const CRISIS_GAIN: f64 = 0.8;

/// Simple polynomial string hash so an id always maps to the same waveform.
pub fn id_hash(id: &str) -> u32 {
    id.chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

/// Waveform parameters derived from a track id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveShape {
    /// 0.1 - 1.0 cycles per 50 samples
    pub base_frequency: f64,
    /// 5 - 19
    pub amplitude: f64,
    /// -1, 0 or 1
    pub trend: f64,
}

impl WaveShape {
    pub fn for_id(id: &str) -> Self {
        let h = id_hash(id);
        Self {
            base_frequency: (h % 10) as f64 / 10.0 + 0.1,
            amplitude: (h % 15) as f64 + 5.0,
            trend: (h % 3) as f64 - 1.0,
        }
    }
}

/// Seeds the generator for `id`. Same id, same sequence.
pub fn rng_for(id: &str) -> StdRng {
    StdRng::seed_from_u64(id_hash(id) as u64)
}

/// Crisis waveform for `seed_id` over `[start, end)`, seeded from the id.
pub fn generate(seed_id: &str, start: f64, end: f64) -> SignalSeries {
    generate_with_rng(seed_id, start, end, &mut rng_for(seed_id))
}

/// Crisis waveform drawing its noise from `rng`.
pub fn generate_with_rng<R: Rng>(seed_id: &str, start: f64, end: f64, rng: &mut R) -> SignalSeries {
    let shape = WaveShape::for_id(seed_id);
    let amp = shape.amplitude;
    let n = SYNTHETIC_POINTS;
    let span = end - start;
    let step = span / n as f64;
    let crisis_start = start + span * CRISIS_START;
    let crisis_end = start + span * CRISIS_END;

    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let time = start + i as f64 * step;
        let phase = 2.0 * PI * shape.base_frequency * i as f64 / 50.0;

        let mut value = amp * phase.sin();
        value += amp * 0.25 * (phase * 4.0).sin();
        value += shape.trend * (i as f64 / n as f64) * 10.0;

        if time >= crisis_start && time < crisis_end {
            let progress = (time - crisis_start) / (crisis_end - crisis_start);
            value += crisis_offset(progress, amp, rng);
        }

        value += (rng.gen_range(0.0..1.0) - 0.5) * amp * 0.2;

        let low = value - rng.gen_range(0.0..1.0) * 0.5;
        let high = value + rng.gen_range(0.0..1.0) * 0.5;
        points.push(SamplePoint::with_envelope(time, value, low, high));
    }

    SignalSeries::new(seed_id, start, end, SeriesOrigin::Synthetic, points)
}

fn crisis_offset<R: Rng>(progress: f64, amp: f64, rng: &mut R) -> f64 {
    let peak = amp * CRISIS_GAIN;
    if progress < CRISIS_RISE {
        peak * (progress / CRISIS_RISE)
    } else if progress < CRISIS_PLATEAU_END {
        peak + amp * 0.15 * (2.0 * PI * progress * 12.0).sin()
    } else {
        let remaining = 1.0 - (progress - CRISIS_PLATEAU_END) / (1.0 - CRISIS_PLATEAU_END);
        let instability = (rng.gen_range(0.0..1.0) - 0.5) * amp * 0.2 * remaining;
        peak * remaining + instability
    }
}

/// Heart-rate-like waveform without a crisis, for the first paint.
pub fn generate_default(start: f64, end: f64) -> SignalSeries {
    let mut rng = rng_for(DEFAULT_TRACK_ID);
    let n = SYNTHETIC_POINTS;
    let step = (end - start) / n as f64;

    let points = (0..n)
        .map(|i| {
            let time = start + i as f64 * step;
            let value = 72.0
                + 6.0 * (2.0 * PI * time / 90.0).sin()
                + 2.0 * (2.0 * PI * time / 11.0).sin()
                + (rng.gen_range(0.0..1.0) - 0.5) * 2.0;
            let low = value - rng.gen_range(0.0..1.0) * 0.5;
            let high = value + rng.gen_range(0.0..1.0) * 0.5;
            SamplePoint::with_envelope(time, value, low, high)
        })
        .collect();

    SignalSeries::new(DEFAULT_TRACK_ID, start, end, SeriesOrigin::Synthetic, points)
}
