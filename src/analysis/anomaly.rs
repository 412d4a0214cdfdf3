// Z-score anomaly detector driven by playback time
use crate::domain::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::domain::signal::SamplePoint;
use crate::infrastructure::config::AnomalySettings;

/// Scans the samples around the playback position and keeps a running list of
/// outliers for the session. The list only shrinks on [`AnomalyDetector::reset`].
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    settings: AnomalySettings,
    anomalies: Vec<Anomaly>,
}

impl AnomalyDetector {
    pub fn new(settings: AnomalySettings) -> Self {
        Self {
            settings,
            anomalies: Vec::new(),
        }
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    /// Forget everything recorded so far (track or case change).
    pub fn reset(&mut self) {
        self.anomalies.clear();
    }

    /// Runs one sweep at `reference_time` and returns the anomalies it added.
    ///
    /// Statistics come from every sample within the window on either side of the
    /// reference time, but only samples at or before it can be flagged.
    pub fn detect(&mut self, points: &[SamplePoint], reference_time: f64) -> Vec<Anomaly> {
        let window = self.settings.window_seconds;
        let local: Vec<&SamplePoint> = points
            .iter()
            .filter(|p| (p.time - reference_time).abs() <= window)
            .collect();
        if local.len() < self.settings.min_points {
            return Vec::new();
        }

        let n = local.len() as f64;
        let mean = local.iter().map(|p| p.value).sum::<f64>() / n;
        let variance = local.iter().map(|p| (p.value - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return Vec::new();
        }

        let mut added = Vec::new();
        for p in local.into_iter().filter(|p| p.time <= reference_time) {
            let distance = (p.value - mean).abs();
            if distance <= self.settings.warning_sigma * std_dev {
                continue;
            }
            if self.is_known(p.time) {
                continue;
            }

            let severity = if distance > self.settings.critical_sigma * std_dev {
                Severity::Critical
            } else {
                Severity::Warning
            };
            let kind = if p.value >= mean {
                AnomalyKind::Spike
            } else {
                AnomalyKind::Dip
            };
            let anomaly = Anomaly {
                time: p.time,
                value: p.value,
                severity,
                kind,
                deviation: distance / std_dev,
            };
            tracing::debug!(
                "Anomaly at {:.1}s: value {:.2}, {:.1} sigma ({:?})",
                anomaly.time,
                anomaly.value,
                anomaly.deviation,
                anomaly.severity
            );
            self.anomalies.push(anomaly.clone());
            added.push(anomaly);
        }
        added
    }

    fn is_known(&self, time: f64) -> bool {
        self.anomalies
            .iter()
            .any(|a| (a.time - time).abs() < self.settings.dedup_seconds)
    }
}
