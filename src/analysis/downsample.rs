// Bucket-averaging downsampler that keeps the min/max envelope
use crate::domain::signal::SamplePoint;

/// Reduces `points` to at most `target` points.
///
/// Contiguous buckets of `ceil(len / target)` points collapse into one point whose
/// time and value are the bucket means and whose envelope spans the lowest and
/// highest edge of any point in the bucket. Input at or below `target` comes back
/// unchanged.
pub fn downsample(points: &[SamplePoint], target: usize) -> Vec<SamplePoint> {
    if target == 0 {
        return Vec::new();
    }
    if points.len() <= target {
        return points.to_vec();
    }

    let bucket_size = points.len().div_ceil(target);
    points.chunks(bucket_size).map(collapse).collect()
}

fn collapse(bucket: &[SamplePoint]) -> SamplePoint {
    let n = bucket.len() as f64;
    let mut time_sum = 0.0;
    let mut value_sum = 0.0;
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;

    for p in bucket {
        time_sum += p.time;
        value_sum += p.value;
        low = low.min(p.low());
        high = high.max(p.high());
    }

    SamplePoint::with_envelope(time_sum / n, value_sum / n, low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<SamplePoint> {
        (0..n)
            .map(|i| SamplePoint::new(i as f64, ((i * 7) % 13) as f64))
            .collect()
    }

    #[test]
    fn test_two_buckets() {
        let points = vec![
            SamplePoint::new(0.0, 10.0),
            SamplePoint::new(1.0, 20.0),
            SamplePoint::new(2.0, 30.0),
            SamplePoint::new(3.0, 40.0),
        ];
        let out = downsample(&points, 2);
        assert_eq!(
            out,
            vec![
                SamplePoint::with_envelope(0.5, 15.0, 10.0, 20.0),
                SamplePoint::with_envelope(2.5, 35.0, 30.0, 40.0),
            ]
        );
    }

    #[test]
    fn test_short_input_is_returned_unchanged() {
        let points = ramp(10);
        assert_eq!(downsample(&points, 10), points);
        assert_eq!(downsample(&points, 500), points);
    }

    #[test]
    fn test_output_never_exceeds_target() {
        for len in [1usize, 7, 99, 100, 101, 1999, 2001, 10_000] {
            let points = ramp(len);
            for target in [1usize, 2, 3, 7, 150, 500, 2000] {
                let out = downsample(&points, target);
                assert!(out.len() <= target, "len {} target {} got {}", len, target, out.len());
            }
        }
    }

    #[test]
    fn test_trailing_partial_bucket() {
        // 5 points into 2 buckets of 3: the last bucket holds 2 points.
        let points = ramp(5);
        let out = downsample(&points, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].time, 3.5);
    }

    #[test]
    fn test_envelope_contains_mean() {
        let out = downsample(&ramp(1000), 37);
        for p in &out {
            assert!(p.low() <= p.value && p.value <= p.high());
        }
    }

    #[test]
    fn test_redownsampling_keeps_outer_envelope() {
        let points = vec![
            SamplePoint::with_envelope(0.0, 5.0, 1.0, 6.0),
            SamplePoint::new(1.0, 4.0),
            SamplePoint::with_envelope(2.0, 3.0, 2.5, 9.0),
            SamplePoint::new(3.0, 2.0),
        ];
        let once = downsample(&points, 2);
        let twice = downsample(&once, 1);
        assert_eq!(twice.len(), 1);
        assert_eq!(twice[0].low(), 1.0);
        assert_eq!(twice[0].high(), 9.0);
        assert_eq!(twice[0].value, 3.5);
    }

    #[test]
    fn test_zero_target() {
        assert!(downsample(&ramp(3), 0).is_empty());
    }
}
