use chrono::NaiveDate;

use crate::metric::MetricSample;

/// Recency weight `exp(-rate * days_ago)`. Samples without a date, or dated
/// after the reference day, keep full weight.
pub fn decay_weight(date: Option<NaiveDate>, as_of: NaiveDate, rate: f64) -> f64 {
    let Some(date) = date else {
        return 1.0;
    };
    let days_ago = (as_of - date).num_days().max(0) as f64;
    (-rate.max(0.0) * days_ago).exp()
}

/// `(value, weight)` pairs for one metric, one team, one side of the ball.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSeries {
    pub points: Vec<(f64, f64)>,
}

impl WeightedSeries {
    /// Invalid counts are dropped. Without an `as_of` day every weight is 1.0.
    pub fn from_samples(samples: &[MetricSample], as_of: Option<NaiveDate>, rate: f64) -> Self {
        let points = samples
            .iter()
            .filter(|s| s.is_usable())
            .map(|s| {
                let w = as_of.map_or(1.0, |day| decay_weight(s.date, day, rate));
                (s.value, w)
            })
            .collect();
        Self { points }
    }

    pub fn uniform(values: &[f64]) -> Self {
        Self {
            points: values.iter().map(|v| (*v, 1.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(v, _)| *v).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.points.iter().map(|(_, w)| *w).collect()
    }
}
