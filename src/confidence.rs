use serde::{Deserialize, Serialize};

use crate::config::ConfidenceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

/// `1 - cv`, scaled by how many matches back it, then clamped to the
/// configured band.
pub fn confidence_from_cv(cv: f64, n: usize, cfg: &ConfidenceConfig) -> f64 {
    let cv = if cv.is_finite() { cv.max(0.0) } else { 1.0 };
    let mut c = 1.0 - cv;
    if n < cfg.small_sample {
        c *= cfg.small_sample_factor;
    } else if n >= cfg.large_sample {
        c *= cfg.large_sample_factor;
    } else if n >= cfg.medium_sample {
        c *= cfg.medium_sample_factor;
    }
    clamp_confidence(c, cfg)
}

pub fn clamp_confidence(c: f64, cfg: &ConfidenceConfig) -> f64 {
    if !c.is_finite() {
        return cfg.floor;
    }
    c.clamp(cfg.floor, cfg.ceiling)
}

pub fn confidence_label(c: f64, cfg: &ConfidenceConfig) -> ConfidenceLabel {
    if c >= cfg.high_label {
        ConfidenceLabel::High
    } else if c >= cfg.medium_label {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

pub fn clamp01(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

/// Pulls a model probability toward a coin flip in proportion to how little
/// we trust it: `0.5 + (p - 0.5) * confidence * (1 - uncertainty)`.
pub fn adjusted_chance(p: f64, confidence: f64, uncertainty: f64) -> f64 {
    let trust = clamp01(confidence) * (1.0 - clamp01(uncertainty));
    clamp01(0.5 + (clamp01(p) - 0.5) * clamp01(trust))
}
