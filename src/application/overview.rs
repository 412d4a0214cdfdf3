// Overview timeline: coarse series plus throttled, snapping brush
use crate::analysis::downsample::downsample;
use crate::domain::annotation::Annotation;
use crate::domain::signal::SignalSeries;
use crate::infrastructure::config::BrushSettings;
use std::time::{Duration, Instant};

/// Coarse copy of `series` for the overview strip.
pub fn build_overview(series: &SignalSeries, points: usize) -> SignalSeries {
    series.with_points(downsample(&series.points, points))
}

/// Lets an update through at most once per `interval`.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether an update at `now` may proceed; records it if so.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let ready = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if ready {
            self.last = Some(now);
        }
        ready
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Turns brush gestures over the overview into main-chart domains.
#[derive(Debug, Clone)]
pub struct BrushController {
    throttle: Throttle,
    snap_fraction: f64,
    extent: (f64, f64),
}

impl BrushController {
    pub fn new(settings: &BrushSettings, extent: (f64, f64)) -> Self {
        Self {
            throttle: Throttle::new(settings.throttle()),
            snap_fraction: settings.snap_fraction,
            extent,
        }
    }

    pub fn extent(&self) -> (f64, f64) {
        self.extent
    }

    pub fn set_extent(&mut self, extent: (f64, f64)) {
        self.extent = extent;
        self.throttle.reset();
    }

    /// Domain to apply while the brush is moving, or `None` if this update is
    /// dropped by the throttle or there is no selection.
    pub fn brush_moved(&mut self, selection: Option<(f64, f64)>, now: Instant) -> Option<(f64, f64)> {
        let selection = ordered(selection?)?;
        self.throttle.try_acquire(now).then_some(selection)
    }

    /// Final domain when the gesture ends; always applied. A cleared or empty
    /// brush restores the full extent, otherwise each edge snaps to the closest
    /// annotation within the snap distance. Edges may arrive in either order.
    pub fn brush_ended(&mut self, selection: Option<(f64, f64)>, annotations: &[Annotation]) -> (f64, f64) {
        self.throttle.reset();
        let Some((start, end)) = selection.and_then(ordered) else {
            return self.extent;
        };

        let threshold = (self.extent.1 - self.extent.0) * self.snap_fraction;
        let snapped_start = closest_within(annotations, start, threshold).unwrap_or(start);
        let snapped_end = closest_within(annotations, end, threshold).unwrap_or(end);
        if snapped_start < snapped_end {
            (snapped_start, snapped_end)
        } else {
            (start, end)
        }
    }
}

/// Edges in time order; `None` for an empty or non-numeric selection.
fn ordered((a, b): (f64, f64)) -> Option<(f64, f64)> {
    if !(a.is_finite() && b.is_finite()) || a == b {
        return None;
    }
    Some((a.min(b), a.max(b)))
}

fn closest_within(annotations: &[Annotation], time: f64, threshold: f64) -> Option<f64> {
    annotations
        .iter()
        .map(|a| a.time)
        .filter(|t| (t - time).abs() < threshold)
        .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
}
