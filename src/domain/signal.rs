// Signal domain models
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One sample of a biosignal. `min_value`/`max_value` carry the envelope of an
/// aggregated bucket and are absent on raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoint {
    pub time: f64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

impl SamplePoint {
    pub fn new(time: f64, value: f64) -> Self {
        Self {
            time,
            value,
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_envelope(time: f64, value: f64, min_value: f64, max_value: f64) -> Self {
        Self {
            time,
            value,
            min_value: Some(min_value),
            max_value: Some(max_value),
        }
    }

    /// Lower edge of the envelope, falling back to the raw value.
    pub fn low(&self) -> f64 {
        self.min_value.unwrap_or(self.value)
    }

    /// Upper edge of the envelope, falling back to the raw value.
    pub fn high(&self) -> f64 {
        self.max_value.unwrap_or(self.value)
    }
}

/// Where a series came from. The renderer labels synthetic data as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOrigin {
    Recorded,
    Synthetic,
}

/// Ordered samples of one track over a requested `[start, end]` window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSeries {
    pub track_id: String,
    pub start: f64,
    pub end: f64,
    pub origin: SeriesOrigin,
    pub points: Vec<SamplePoint>,
}

/// Series shared out of the cache. Never mutated after it is stored.
pub type SharedSeries = Arc<SignalSeries>;

impl SignalSeries {
    pub fn new(
        track_id: impl Into<String>,
        start: f64,
        end: f64,
        origin: SeriesOrigin,
        points: Vec<SamplePoint>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            start,
            end,
            origin,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(first time, last time)` of the samples, if any.
    pub fn time_extent(&self) -> Option<(f64, f64)> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }

    /// `(min value, max value)` over the raw values.
    pub fn value_extent(&self) -> Option<(f64, f64)> {
        value_extent(&self.points)
    }

    /// Sample closest in time to `time`.
    pub fn nearest(&self, time: f64) -> Option<&SamplePoint> {
        nearest_point(&self.points, time)
    }

    /// Same track and window, different points.
    pub fn with_points(&self, points: Vec<SamplePoint>) -> Self {
        Self {
            track_id: self.track_id.clone(),
            start: self.start,
            end: self.end,
            origin: self.origin,
            points,
        }
    }
}

pub fn value_extent(points: &[SamplePoint]) -> Option<(f64, f64)> {
    points.iter().fold(None, |acc, p| match acc {
        None => Some((p.value, p.value)),
        Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
    })
}

/// Closest sample by absolute time distance. Ties keep the earlier sample.
pub fn nearest_point(points: &[SamplePoint], time: f64) -> Option<&SamplePoint> {
    // Sorted by time, so a binary search finds the neighbourhood.
    let idx = points.partition_point(|p| p.time < time);
    let before = idx.checked_sub(1).and_then(|i| points.get(i));
    let after = points.get(idx);
    match (before, after) {
        (Some(b), Some(a)) => {
            if (a.time - time).abs() < (time - b.time).abs() {
                Some(a)
            } else {
                Some(b)
            }
        }
        (Some(b), None) => Some(b),
        (None, a) => a,
    }
}

/// Physiological family of a signal, inferred from its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    HeartRate,
    BloodPressure,
    Oxygen,
    Temperature,
    Eeg,
    Respiration,
    Unknown,
}

// Checked in order; the first substring found in the lowercased name wins.
const SIGNAL_NAME_PATTERNS: &[(&str, SignalType)] = &[
    ("heart", SignalType::HeartRate),
    ("pulse", SignalType::HeartRate),
    ("hr", SignalType::HeartRate),
    ("pressure", SignalType::BloodPressure),
    ("bp", SignalType::BloodPressure),
    ("art", SignalType::BloodPressure),
    ("spo2", SignalType::Oxygen),
    ("sat", SignalType::Oxygen),
    ("oxygen", SignalType::Oxygen),
    ("temp", SignalType::Temperature),
    ("bt", SignalType::Temperature),
    ("eeg", SignalType::Eeg),
    ("bis", SignalType::Eeg),
    ("resp", SignalType::Respiration),
    ("co2", SignalType::Respiration),
    ("rr", SignalType::Respiration),
];

impl SignalType {
    pub fn classify(display_name: &str) -> Self {
        let name = display_name.to_lowercase();
        SIGNAL_NAME_PATTERNS
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, kind)| *kind)
            .unwrap_or(SignalType::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[(f64, f64)]) -> Vec<SamplePoint> {
        values.iter().map(|&(t, v)| SamplePoint::new(t, v)).collect()
    }

    #[test]
    fn test_classify_signal_names() {
        assert_eq!(SignalType::classify("Solar8000/HR"), SignalType::HeartRate);
        assert_eq!(SignalType::classify("Solar8000/ART_SBP"), SignalType::BloodPressure);
        assert_eq!(SignalType::classify("Solar8000/PLETH_SPO2"), SignalType::Oxygen);
        assert_eq!(SignalType::classify("Solar8000/BT"), SignalType::Temperature);
        assert_eq!(SignalType::classify("BIS/EEG1_WAV"), SignalType::Eeg);
        assert_eq!(SignalType::classify("Primus/ETCO2"), SignalType::Respiration);
        assert_eq!(SignalType::classify("Orchestra/PPF20_VOL"), SignalType::Unknown);
    }

    #[test]
    fn test_nearest_point() {
        let pts = points(&[(0.0, 1.0), (10.0, 2.0), (20.0, 3.0)]);
        assert_eq!(nearest_point(&pts, 4.0).map(|p| p.value), Some(1.0));
        assert_eq!(nearest_point(&pts, 6.0).map(|p| p.value), Some(2.0));
        assert_eq!(nearest_point(&pts, 5.0).map(|p| p.value), Some(1.0));
        assert_eq!(nearest_point(&pts, -3.0).map(|p| p.value), Some(1.0));
        assert_eq!(nearest_point(&pts, 99.0).map(|p| p.value), Some(3.0));
        assert!(nearest_point(&[], 1.0).is_none());
    }

    #[test]
    fn test_extents_and_envelope() {
        let series = SignalSeries::new(
            "t1",
            0.0,
            20.0,
            SeriesOrigin::Recorded,
            points(&[(0.0, 5.0), (10.0, -2.0), (20.0, 7.5)]),
        );
        assert_eq!(series.time_extent(), Some((0.0, 20.0)));
        assert_eq!(series.value_extent(), Some((-2.0, 7.5)));

        let p = SamplePoint::new(1.0, 4.0);
        assert_eq!((p.low(), p.high()), (4.0, 4.0));
        let p = SamplePoint::with_envelope(1.0, 4.0, 3.0, 6.0);
        assert_eq!((p.low(), p.high()), (3.0, 6.0));
    }
}
