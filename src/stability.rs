use serde::{Deserialize, Serialize};

use crate::config::{CvThresholds, EngineConfig};
use crate::decay::WeightedSeries;
use crate::metric::{MetricFamily, is_valid_count};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Very Stable")]
    VeryStable,
    #[serde(rename = "Stable")]
    Stable,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unstable")]
    Unstable,
    #[serde(rename = "Very Unstable")]
    VeryUnstable,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::VeryStable => "Very Stable",
            Classification::Stable => "Stable",
            Classification::Moderate => "Moderate",
            Classification::Unstable => "Unstable",
            Classification::VeryUnstable => "Very Unstable",
            Classification::NotAvailable => "N/A",
        }
    }
}

/// Mean and dispersion of one weighted series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedStat {
    pub mean: f64,
    pub cv: f64,
    pub classification: Classification,
    pub stability_pct: u8,
    /// Number of samples that went into the stat (matches played for an aggregate).
    pub samples: usize,
}

impl WeightedStat {
    /// The honest "we don't know" answer: CV pinned to 1.0 and no stability.
    pub fn not_available(mean: f64, samples: usize) -> Self {
        Self {
            mean,
            cv: 1.0,
            classification: Classification::NotAvailable,
            stability_pct: 0,
            samples,
        }
    }

    /// Stat for a season aggregate, where the CV is an estimate rather than
    /// something measured.
    pub fn from_aggregate(mean: f64, cv: f64, matches: usize, family: MetricFamily, cfg: &EngineConfig) -> Self {
        if matches == 0 || !(mean > 0.0) {
            return Self::not_available(mean.max(0.0), matches);
        }
        classify(mean, cv, matches, cfg.thresholds(family))
    }
}

pub fn classify_cv(cv: f64, thresholds: &CvThresholds) -> Classification {
    let [very_stable, stable, moderate, unstable] = thresholds.0;
    if cv < very_stable {
        Classification::VeryStable
    } else if cv < stable {
        Classification::Stable
    } else if cv < moderate {
        Classification::Moderate
    } else if cv < unstable {
        Classification::Unstable
    } else {
        Classification::VeryUnstable
    }
}

pub fn stability_pct(cv: f64, instability_threshold: f64) -> u8 {
    if instability_threshold <= 0.0 {
        return 0;
    }
    (100.0 * (1.0 - cv / instability_threshold)).round().clamp(0.0, 100.0) as u8
}

/// Weighted mean and coefficient of variation of `values`. Weights default
/// to 1.0; a weight slice of the wrong length is ignored. Invalid counts and
/// non-positive weights are dropped pairwise.
pub fn weighted_stat(
    values: &[f64],
    weights: Option<&[f64]>,
    family: MetricFamily,
    cfg: &EngineConfig,
) -> WeightedStat {
    let weights = weights.filter(|w| w.len() == values.len());
    let pairs: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (*v, weights.map_or(1.0, |w| w[i])))
        .filter(|(v, w)| is_valid_count(*v) && w.is_finite() && *w > 0.0)
        .collect();
    stat_from_pairs(&pairs, family, cfg)
}

pub fn series_stat(series: &WeightedSeries, family: MetricFamily, cfg: &EngineConfig) -> WeightedStat {
    stat_from_pairs(&series.points, family, cfg)
}

fn stat_from_pairs(pairs: &[(f64, f64)], family: MetricFamily, cfg: &EngineConfig) -> WeightedStat {
    let n = pairs.len();
    let weight_sum: f64 = pairs.iter().map(|(_, w)| w).sum();
    let mean = if weight_sum > 0.0 {
        pairs.iter().map(|(v, w)| v * w).sum::<f64>() / weight_sum
    } else {
        0.0
    };

    // A CV from fewer than two points, or from a zero mean, would read as
    // perfect stability.
    if n < 2 || mean <= 0.0 {
        return WeightedStat::not_available(mean, n);
    }

    let variance = pairs
        .iter()
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum::<f64>()
        / weight_sum;
    let cv = variance.sqrt() / mean;
    classify(mean, cv, n, cfg.thresholds(family))
}

fn classify(mean: f64, cv: f64, samples: usize, thresholds: Option<CvThresholds>) -> WeightedStat {
    let Some(thresholds) = thresholds else {
        return WeightedStat {
            mean,
            cv,
            classification: Classification::NotAvailable,
            stability_pct: 0,
            samples,
        };
    };
    WeightedStat {
        mean,
        cv,
        classification: classify_cv(cv, &thresholds),
        stability_pct: stability_pct(cv, thresholds.instability()),
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn constant_series_is_very_stable() {
        let s = weighted_stat(&[2.0, 2.0, 2.0, 2.0, 2.0], None, MetricFamily::Goals, &cfg());
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.cv, 0.0);
        assert_eq!(s.classification, Classification::VeryStable);
        assert_eq!(s.stability_pct, 100);
    }

    #[test]
    fn single_sample_is_not_available() {
        let s = weighted_stat(&[3.0], None, MetricFamily::Corners, &cfg());
        assert_eq!(s.classification, Classification::NotAvailable);
        assert_eq!(s.cv, 1.0);
        assert_eq!(s.stability_pct, 0);
        assert_eq!(s.mean, 3.0);
    }

    #[test]
    fn all_zero_series_is_not_available() {
        let s = weighted_stat(&[0.0, 0.0, 0.0], None, MetricFamily::Goals, &cfg());
        assert_eq!(s.classification, Classification::NotAvailable);
        assert_eq!(s.cv, 1.0);
        assert_eq!(s.stability_pct, 0);
    }

    #[test]
    fn uniform_weights_match_unweighted() {
        let values = [1.0, 2.0, 3.0, 0.0, 4.0];
        let plain = weighted_stat(&values, None, MetricFamily::Goals, &cfg());
        let weighted = weighted_stat(&values, Some(&[1.0; 5]), MetricFamily::Goals, &cfg());
        assert!((plain.mean - weighted.mean).abs() < 1e-12);
        assert!((plain.cv - weighted.cv).abs() < 1e-12);

        let mean = 2.0;
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 5.0;
        assert!((plain.cv - var.sqrt() / mean).abs() < 1e-12);
    }

    #[test]
    fn recent_weights_pull_the_mean() {
        let values = [4.0, 1.0, 1.0];
        let s = weighted_stat(&values, Some(&[1.0, 0.5, 0.5]), MetricFamily::Corners, &cfg());
        assert!((s.mean - 2.5).abs() < 1e-12);
        let plain = weighted_stat(&values, None, MetricFamily::Corners, &cfg());
        assert!(s.mean > plain.mean);
    }

    #[test]
    fn invalid_values_are_dropped() {
        let s = weighted_stat(&[2.0, -1.0, f64::NAN, 4.0], None, MetricFamily::Shots, &cfg());
        assert_eq!(s.samples, 2);
        assert!((s.mean - 3.0).abs() < 1e-12);
    }

    #[test]
    fn thresholds_are_per_family() {
        // cv = 0.5 is unremarkable for goals but erratic for shots.
        let values = [1.0, 3.0];
        let goals = weighted_stat(&values, None, MetricFamily::Goals, &cfg());
        let shots = weighted_stat(&values, None, MetricFamily::Shots, &cfg());
        assert!((goals.cv - 0.5).abs() < 1e-12);
        assert_eq!(goals.classification, Classification::Stable);
        assert_eq!(shots.classification, Classification::Unstable);
        assert_eq!(goals.stability_pct, 55);
        assert_eq!(shots.stability_pct, 9);
    }

    #[test]
    fn rare_event_family_is_always_not_available() {
        let s = weighted_stat(&[0.0, 1.0, 0.0, 0.0], None, MetricFamily::RedCards, &cfg());
        assert_eq!(s.classification, Classification::NotAvailable);
        assert_eq!(s.stability_pct, 0);
    }

    #[test]
    fn stability_pct_is_clamped() {
        assert_eq!(stability_pct(0.0, 1.1), 100);
        assert_eq!(stability_pct(5.0, 1.1), 0);
    }
}
