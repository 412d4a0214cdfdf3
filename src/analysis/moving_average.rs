// Time-windowed moving averages
use crate::domain::signal::SamplePoint;
use serde::Serialize;

/// A sample plus one trailing mean per requested window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmoothedPoint {
    #[serde(flatten)]
    pub point: SamplePoint,
    /// Aligned with the `windows` passed to [`add_moving_averages`].
    pub averages: Vec<f64>,
}

/// Trailing mean over each window (seconds), O(n) per window.
///
/// A point leaves the window once it is more than `window` seconds behind the
/// current one. Until a full window has accumulated the mean covers whatever has
/// been seen.
pub fn add_moving_averages(points: &[SamplePoint], windows: &[f64]) -> Vec<SmoothedPoint> {
    let per_window: Vec<Vec<f64>> = windows
        .iter()
        .map(|&window| trailing_means(points, window))
        .collect();

    points
        .iter()
        .enumerate()
        .map(|(i, p)| SmoothedPoint {
            point: *p,
            averages: per_window.iter().map(|means| means[i]).collect(),
        })
        .collect()
}

fn trailing_means(points: &[SamplePoint], window: f64) -> Vec<f64> {
    let mut means = Vec::with_capacity(points.len());
    let mut start = 0;
    let mut sum = 0.0;

    for (end, p) in points.iter().enumerate() {
        sum += p.value;
        while start < end && p.time - points[start].time > window {
            sum -= points[start].value;
            start += 1;
        }
        means.push(sum / (end - start + 1) as f64);
    }
    means
}
