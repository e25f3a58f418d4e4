use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::{ConfidenceLabel, clamp_confidence, confidence_from_cv, confidence_label};
use crate::config::EngineConfig;
use crate::distribution::DistributionSpec;
use crate::expectancy::{Expectancy, round2, round3};
use crate::league_params::LeagueParams;
use crate::lines::generate_lines;
use crate::metric::MetricFamily;
use crate::uncertainty::{ProbInterval, line_rng, prediction_interval, simulate_over_prob, standard_error};

// Expectations below this are treated as this when fitting a count model.
const MIN_LAMBDA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverUnderLine {
    pub line: f64,
    pub over_prob: f64,
    pub under_prob: f64,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
    pub uncertainty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverUnderResult {
    pub family: MetricFamily,
    pub mu_total: f64,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub pred_min: f64,
    pub pred_max: f64,
    pub interval_level: f64,
    pub distribution: DistributionSpec,
    pub lines: Vec<OverUnderLine>,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
}

/// Goals get a Dixon-Coles corrected Poisson with the league's rho; every
/// other family a negative binomial sized from the sides' CVs.
pub fn fit_distribution(exp: &Expectancy, league: &LeagueParams) -> DistributionSpec {
    let lambda_home = exp.lambda_home.max(MIN_LAMBDA);
    let lambda_away = exp.lambda_away.max(MIN_LAMBDA);
    match exp.family {
        MetricFamily::Goals => DistributionSpec::goals(lambda_home, lambda_away, league.dc_rho),
        _ => DistributionSpec::negative_binomial(lambda_home, lambda_away, exp.cv_home, exp.cv_away),
    }
}

pub fn build_over_under(exp: &Expectancy, league: &LeagueParams, cfg: &EngineConfig) -> OverUnderResult {
    let spec = fit_distribution(exp, league);
    over_under_from_spec(exp.family, spec, exp.cv_total(), exp.n(), cfg)
}

/// Lines, intervals and confidence for an already fitted model.
pub fn over_under_from_spec(
    family: MetricFamily,
    spec: DistributionSpec,
    cv: f64,
    n: usize,
    cfg: &EngineConfig,
) -> OverUnderResult {
    let sim = &cfg.simulation;
    let mu = spec.mu_total;
    let se = standard_error(cv, mu, n);
    let (pred_min, pred_max) = prediction_interval(mu, se, sim.interval_z);
    let candidates = generate_lines(mu, cfg.line_step(family), sim.max_lines);

    let mut lines = Vec::with_capacity(candidates.len());
    for &line in &candidates {
        let mut rng = line_rng(sim.seed, family, line);
        let interval = simulate_over_prob(&spec, line, se, sim, &mut rng);
        let over = interval.mean;
        if over >= sim.probability_cutoff || 1.0 - over >= sim.probability_cutoff {
            debug!(?family, line, over, "dropping near-certain line");
            continue;
        }
        lines.push(make_line(line, interval));
    }

    if lines.is_empty() {
        if let Some(&line) = candidates.get(candidates.len() / 2) {
            debug!(?family, line, "every line near-certain, keeping the middle one");
            lines.push(make_line(line, ProbInterval::point(spec.over_prob(line))));
        }
    }

    let base = confidence_from_cv(cv, n, &cfg.confidence);
    let mean_uncertainty = if lines.is_empty() {
        1.0
    } else {
        lines.iter().map(|l| l.uncertainty).sum::<f64>() / lines.len() as f64
    };
    let confidence = clamp_confidence(base * (1.0 - mean_uncertainty), &cfg.confidence);

    OverUnderResult {
        family,
        mu_total: round2(mu),
        lambda_home: round2(spec.lambda_home),
        lambda_away: round2(spec.lambda_away),
        pred_min: round2(pred_min),
        pred_max: round2(pred_max),
        interval_level: sim.interval_level,
        distribution: spec,
        lines,
        confidence: round2(confidence),
        confidence_label: confidence_label(confidence, &cfg.confidence),
    }
}

/// Reports the simulated mean; a point interval carries the model value.
fn make_line(line: f64, interval: ProbInterval) -> OverUnderLine {
    let over_prob = round3(interval.mean);
    OverUnderLine {
        line,
        over_prob,
        under_prob: round3(1.0 - over_prob),
        ci_lower: interval.lower.map(round3),
        ci_upper: interval.upper.map(round3),
        uncertainty: round3(interval.uncertainty),
    }
}
