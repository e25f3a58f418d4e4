use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::distribution::DistributionSpec;
use crate::metric::MetricFamily;

/// Spread of the Over probability when the expectation itself is uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbInterval {
    pub mean: f64,
    /// `None` for a degenerate (point) estimate.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub uncertainty: f64,
}

impl ProbInterval {
    pub fn point(p: f64) -> Self {
        Self {
            mean: p,
            lower: None,
            upper: None,
            uncertainty: 1.0,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.lower.is_some()
    }
}

/// `cv * mu / sqrt(n)`, with `n` floored at one match.
pub fn standard_error(cv: f64, mu: f64, n: usize) -> f64 {
    let se = cv * mu / (n.max(1) as f64).sqrt();
    if se.is_finite() { se.max(0.0) } else { 0.0 }
}

/// Normal-approximation prediction interval for the total, floored at zero.
pub fn prediction_interval(mu: f64, se: f64, z: f64) -> (f64, f64) {
    ((mu - z * se).max(0.0), mu + z * se)
}

/// Draws `mu' ~ Normal(mu, se)` (floored at `min_mean`), evaluates the model's
/// Over probability at each draw and reports the 2.5/97.5 percentiles.
pub fn simulate_over_prob<R: Rng + ?Sized>(
    spec: &DistributionSpec,
    line: f64,
    se: f64,
    cfg: &SimulationConfig,
    rng: &mut R,
) -> ProbInterval {
    let mu = spec.mu_total;
    if !(se > 0.0) || !se.is_finite() || cfg.draws < cfg.min_draws || cfg.draws == 0 {
        return ProbInterval::point(spec.over_prob(line));
    }

    let mut probs: Vec<f64> = (0..cfg.draws)
        .map(|_| {
            let m = (mu + se * standard_normal(&mut *rng)).max(cfg.min_mean);
            spec.over_prob_at(line, m)
        })
        .collect();
    probs.sort_unstable_by(f64::total_cmp);

    let mean = probs.iter().sum::<f64>() / probs.len() as f64;
    let lower = percentile(&probs, 0.025);
    let upper = percentile(&probs, 0.975);
    ProbInterval {
        mean,
        lower: Some(lower),
        upper: Some(upper),
        uncertainty: (upper - lower).clamp(0.0, 1.0),
    }
}

/// Box-Muller transform over two uniforms in (0, 1].
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Linear interpolation between closest ranks of an ascending slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let pos = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Stable per-(family, line) stream so each line's interval is reproducible
/// regardless of evaluation order.
pub fn line_rng(seed: u64, family: MetricFamily, line: f64) -> StdRng {
    let mixed = splitmix64(seed ^ splitmix64(family.index() as u64) ^ line.to_bits());
    StdRng::seed_from_u64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
