//! Per-group streaming mean and standard deviation over gait-cycle samples.

use serde::Serialize;
use std::collections::BTreeMap;

use super::loader::GaitSample;

/// Streaming mean and variance (Welford's online algorithm).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Parallel combination of two accumulators.
    pub fn merge(&mut self, other: &Welford) {
        let count = self.count + other.count;
        if count == 0 {
            return;
        }
        let delta = other.mean - self.mean;
        self.mean += delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * self.count as f64 * other.count as f64 / count as f64;
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation (n - 1 denominator); 0 below two samples.
    pub fn sample_sd(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

/// Mean and spread of one metric at one point of the gait cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsemblePoint {
    pub activity: String,
    pub metric: String,
    pub gait_percent: i64,
    pub samples: u64,
    pub mean: f64,
    pub sd: f64,
}

type EnsembleKey = (String, String, i64);

/// Groups samples by (activity, metric, gait percent).
#[derive(Debug, Clone, Default)]
pub struct EnsembleAverager {
    groups: BTreeMap<EnsembleKey, Welford>,
}

impl EnsembleAverager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: &GaitSample) {
        let key = (
            sample.activity.clone(),
            sample.metric.clone(),
            sample.gait_percent,
        );
        self.groups.entry(key).or_default().update(sample.value);
    }

    pub fn observe_all<'a>(&mut self, samples: impl IntoIterator<Item = &'a GaitSample>) {
        for sample in samples {
            self.observe(sample);
        }
    }

    pub fn merge(&mut self, other: &EnsembleAverager) {
        for (key, stats) in &other.groups {
            self.groups.entry(key.clone()).or_default().merge(stats);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Points sorted by activity, metric, then gait percent.
    pub fn finish(&self) -> Vec<EnsemblePoint> {
        self.groups
            .iter()
            .map(|((activity, metric, gait_percent), stats)| EnsemblePoint {
                activity: activity.clone(),
                metric: metric.clone(),
                gait_percent: *gait_percent,
                samples: stats.count(),
                mean: stats.mean(),
                sd: stats.sample_sd(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(activity: &str, metric: &str, pct: i64, value: f64) -> GaitSample {
        GaitSample {
            subject: "S001".to_string(),
            activity: activity.to_string(),
            gait_percent: pct,
            metric: metric.to_string(),
            value,
        }
    }

    #[test]
    fn test_welford_matches_two_pass() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut w = Welford::default();
        for v in values {
            w.update(v);
        }

        assert_eq!(w.count(), 8);
        assert!((w.mean() - 5.0).abs() < 1e-12);
        // sum of squared deviations is 32
        assert!((w.sample_sd() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_welford_single_sample_has_zero_sd() {
        let mut w = Welford::default();
        w.update(3.0);
        assert_eq!(w.sample_sd(), 0.0);
    }

    #[test]
    fn test_welford_merge() {
        let mut all = Welford::default();
        let mut left = Welford::default();
        let mut right = Welford::default();
        for (i, v) in [1.0, 2.0, 3.0, 10.0, 11.0].into_iter().enumerate() {
            all.update(v);
            if i < 2 {
                left.update(v);
            } else {
                right.update(v);
            }
        }
        left.merge(&right);

        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-12);
        assert!((left.sample_sd() - all.sample_sd()).abs() < 1e-12);
    }

    #[test]
    fn test_groups_by_activity_metric_and_percent() {
        let mut averager = EnsembleAverager::new();
        averager.observe_all(&[
            sample("walk", "hip_flexion_r", 0, 30.0),
            sample("walk", "hip_flexion_r", 0, 34.0),
            sample("walk", "hip_flexion_r", 1, 29.0),
            sample("stair", "hip_flexion_r", 0, 60.0),
            sample("walk", "hip_rotation_r", 0, 2.0),
        ]);

        let points = averager.finish();
        assert_eq!(points.len(), 4);

        assert_eq!(points[0].activity, "stair");
        assert_eq!(points[1].activity, "walk");
        assert_eq!(points[1].metric, "hip_flexion_r");
        assert_eq!(points[1].gait_percent, 0);
        assert_eq!(points[1].samples, 2);
        assert_eq!(points[1].mean, 32.0);
        assert!((points[1].sd - 8.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(points[3].metric, "hip_rotation_r");
    }

    #[test]
    fn test_merge_combines_groups() {
        let mut a = EnsembleAverager::new();
        a.observe(&sample("walk", "m", 5, 1.0));
        let mut b = EnsembleAverager::new();
        b.observe(&sample("walk", "m", 5, 3.0));
        b.observe(&sample("walk", "m", 6, 3.0));

        a.merge(&b);
        let points = a.finish();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].samples, 2);
        assert_eq!(points[0].mean, 2.0);
    }
}
