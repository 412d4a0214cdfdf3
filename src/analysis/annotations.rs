// Descriptive markers (peak, low, steep slopes) for a finished series
use crate::domain::annotation::{Annotation, AnnotationKind};
use crate::domain::signal::{value_extent, SamplePoint};

const SLOPE_STEP: usize = 5;
const SLOPE_HALF_WINDOW: usize = 5;
const LOW_MIN_SEPARATION: f64 = 0.3;
const MIN_SPACING_FRACTION: f64 = 0.1;

/// Derives navigation markers from `points` over `time_extent`.
///
/// `sensitivity` scales the average slope of the whole extent into the threshold a
/// local slope must exceed to count as a rapid change.
pub fn extract_annotations(
    points: &[SamplePoint],
    time_extent: (f64, f64),
    sensitivity: f64,
) -> Vec<Annotation> {
    let Some((min_value, max_value)) = value_extent(points) else {
        return Vec::new();
    };
    let value_range = max_value - min_value;
    let time_range = time_extent.1 - time_extent.0;

    let mut annotations = Vec::new();

    let peak = points
        .iter()
        .fold(&points[0], |best, p| if p.value > best.value { p } else { best });
    annotations.push(Annotation::new(
        peak.time,
        AnnotationKind::Peak,
        format!("Peak: {:.1}", peak.value),
        false,
    ));

    let low = points
        .iter()
        .fold(&points[0], |best, p| if p.value < best.value { p } else { best });
    if (peak.value - low.value).abs() > value_range * LOW_MIN_SEPARATION {
        annotations.push(Annotation::new(
            low.time,
            AnnotationKind::Low,
            format!("Low: {:.1}", low.value),
            false,
        ));
    }

    if time_range > 0.0 {
        let threshold = (value_range / time_range) * sensitivity;
        let slopes = sample_slopes(points);

        let steepest_rise = slopes
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, s| match best {
                Some(b) if b.1 >= s.1 => Some(b),
                _ => Some(s),
            });
        if let Some((time, slope)) = steepest_rise {
            if slope > 0.0 && slope.abs() > threshold {
                annotations.push(Annotation::new(
                    time,
                    AnnotationKind::RapidIncrease,
                    "Rapid Increase",
                    true,
                ));
            }
        }

        let steepest_fall = slopes
            .iter()
            .copied()
            .fold(None, |best: Option<(f64, f64)>, s| match best {
                Some(b) if b.1 <= s.1 => Some(b),
                _ => Some(s),
            });
        if let Some((time, slope)) = steepest_fall {
            if slope < 0.0 && slope.abs() > threshold {
                annotations.push(Annotation::new(
                    time,
                    AnnotationKind::RapidDecrease,
                    "Rapid Decrease",
                    true,
                ));
            }
        }
    }

    if annotations.len() < 2 {
        for fraction in [1.0 / 3.0, 2.0 / 3.0] {
            let idx = ((points.len() as f64 * fraction) as usize).min(points.len() - 1);
            annotations.push(Annotation::new(
                points[idx].time,
                AnnotationKind::Event,
                "Event",
                false,
            ));
        }
    }

    space_out(annotations, time_range * MIN_SPACING_FRACTION)
}

/// `(time, slope)` every few samples over a centered window.
fn sample_slopes(points: &[SamplePoint]) -> Vec<(f64, f64)> {
    let last = points.len().saturating_sub(1);
    (0..points.len())
        .step_by(SLOPE_STEP)
        .filter_map(|i| {
            let from = &points[i.saturating_sub(SLOPE_HALF_WINDOW)];
            let to = &points[(i + SLOPE_HALF_WINDOW).min(last)];
            let dt = to.time - from.time;
            (dt > 0.0).then(|| (points[i].time, (to.value - from.value) / dt))
        })
        .collect()
}

/// Drops markers closer than `min_gap` to one already kept. Earlier entries win.
fn space_out(annotations: Vec<Annotation>, min_gap: f64) -> Vec<Annotation> {
    let mut kept: Vec<Annotation> = Vec::with_capacity(annotations.len());
    for a in annotations {
        if kept.iter().all(|k| (k.time - a.time).abs() >= min_gap) {
            kept.push(a);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENSITIVITY: f64 = 50.0;

    fn series(values: impl IntoIterator<Item = f64>) -> Vec<SamplePoint> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| SamplePoint::new(i as f64, v))
            .collect()
    }

    fn kinds(annotations: &[Annotation]) -> Vec<AnnotationKind> {
        annotations.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_peak_and_low() {
        // Smooth hump: max at 50, min at the ends.
        let points = series((0..101).map(|i| 100.0 - ((i as f64 - 50.0) / 5.0).powi(2)));
        let out = extract_annotations(&points, (0.0, 100.0), SENSITIVITY);
        assert_eq!(out[0].kind, AnnotationKind::Peak);
        assert_eq!(out[0].time, 50.0);
        assert_eq!(out[0].label, "Peak: 100.0");
        assert_eq!(out[1].kind, AnnotationKind::Low);
        assert_eq!(out[1].time, 0.0);
    }

    #[test]
    fn test_flat_series_gets_events() {
        let points = series(std::iter::repeat(5.0).take(90));
        let out = extract_annotations(&points, (0.0, 89.0), SENSITIVITY);
        assert_eq!(
            kinds(&out),
            vec![AnnotationKind::Peak, AnnotationKind::Event, AnnotationKind::Event]
        );
        assert_eq!(out[1].time, 30.0);
        assert_eq!(out[2].time, 60.0);
    }

    #[test]
    fn test_step_is_a_rapid_increase() {
        // 0 until t=300, a jump to 10, then a small late bump so the peak sits
        // far from the step.
        let points = series((0..600).map(|i| match i {
            0..300 => 0.0,
            300..591 => 10.0,
            _ => 11.0,
        }));
        let out = extract_annotations(&points, (0.0, 599.0), SENSITIVITY);
        assert_eq!(out[0].kind, AnnotationKind::Peak);
        assert_eq!(out[0].time, 591.0);
        let rise = out
            .iter()
            .find(|a| a.kind == AnnotationKind::RapidIncrease)
            .expect("rapid increase");
        assert!(rise.critical);
        assert!((rise.time - 300.0).abs() <= 5.0);
        assert!(out.iter().all(|a| a.kind != AnnotationKind::RapidDecrease));
    }

    #[test]
    fn test_gentle_ramp_has_no_rapid_change() {
        let points = series((0..200).map(|i| i as f64 * 0.1));
        let out = extract_annotations(&points, (0.0, 199.0), SENSITIVITY);
        assert!(out
            .iter()
            .all(|a| !matches!(a.kind, AnnotationKind::RapidIncrease | AnnotationKind::RapidDecrease)));
    }

    #[test]
    fn test_markers_are_spaced_out() {
        let points = series((0..300).map(|i| ((i as f64) / 7.0).sin() * (i as f64)));
        let out = extract_annotations(&points, (0.0, 299.0), SENSITIVITY);
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                assert!((a.time - b.time).abs() >= 29.9);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_annotations(&[], (0.0, 1.0), SENSITIVITY).is_empty());
    }
}
