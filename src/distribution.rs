use serde::{Deserialize, Serialize};

// Below this dispersion the negative binomial is numerically a Poisson.
const MIN_ALPHA: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    PoissonDixonColes,
    NegativeBinomial,
}

/// The fitted count model for one metric of one match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub family: DistributionFamily,
    pub mu_total: f64,
    pub lambda_home: f64,
    pub lambda_away: f64,
    /// Negative binomial alpha (`Var = mu + alpha * mu^2`); zero for goals.
    pub dispersion: f64,
    /// Dixon-Coles rho; zero for negative binomial metrics.
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl DistributionSpec {
    pub fn goals(lambda_home: f64, lambda_away: f64, rho: f64) -> Self {
        Self {
            family: DistributionFamily::PoissonDixonColes,
            mu_total: lambda_home + lambda_away,
            lambda_home,
            lambda_away,
            dispersion: 0.0,
            rho,
        }
    }

    /// Negative binomial whose variance is the sum of the two sides'
    /// `(cv * lambda)^2`, i.e. the sides are treated as independent.
    pub fn negative_binomial(lambda_home: f64, lambda_away: f64, cv_home: f64, cv_away: f64) -> Self {
        let mu = lambda_home + lambda_away;
        let var = (cv_home * lambda_home).powi(2) + (cv_away * lambda_away).powi(2);
        Self {
            family: DistributionFamily::NegativeBinomial,
            mu_total: mu,
            lambda_home,
            lambda_away,
            dispersion: estimate_alpha(mu, var),
            rho: 0.0,
        }
    }

    pub fn over_prob(&self, line: f64) -> f64 {
        self.over_prob_at(line, self.mu_total)
    }

    /// Over probability when the total expectation is moved to `mu`,
    /// keeping the home/away split and the dispersion of the fitted model.
    pub fn over_prob_at(&self, line: f64, mu: f64) -> f64 {
        match self.family {
            DistributionFamily::PoissonDixonColes => {
                let ratio = self.home_ratio();
                over_prob_goals_dc(line, mu * ratio, mu * (1.0 - ratio), self.rho)
            }
            DistributionFamily::NegativeBinomial => over_prob_negbin(line, mu, self.dispersion),
        }
    }

    pub fn home_ratio(&self) -> f64 {
        let sum = self.lambda_home + self.lambda_away;
        if sum > 0.0 { self.lambda_home / sum } else { 0.5 }
    }
}

pub fn poisson_pmf(k: u32, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    // exp(k ln(lambda) - lambda - ln(k!)) stays finite for large k.
    let ln_fact: f64 = (1..=k).map(|i| (i as f64).ln()).sum();
    (k as f64 * lambda.ln() - lambda - ln_fact).exp()
}

pub fn poisson_cdf(n: i64, lambda: f64) -> f64 {
    if n < 0 {
        return 0.0;
    }
    if lambda <= 0.0 {
        return 1.0;
    }
    let mut pmf = (-lambda).exp();
    let mut cdf = pmf;
    for k in 1..=n {
        pmf *= lambda / k as f64;
        cdf += pmf;
    }
    cdf.clamp(0.0, 1.0)
}

/// Dixon-Coles low-score correction. Only the four cells with at most one
/// goal per side are touched.
pub fn dc_tau(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - lambda_home * lambda_away * rho,
        (1, 0) => 1.0 - lambda_away * rho,
        (0, 1) => 1.0 - lambda_home * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

pub fn score_prob_dc(home_goals: u32, away_goals: u32, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    poisson_pmf(home_goals, lambda_home)
        * poisson_pmf(away_goals, lambda_away)
        * dc_tau(home_goals, away_goals, lambda_home, lambda_away, rho)
}

/// P(total goals > line), summing the triangular grid `h + a <= floor(line)`.
pub fn over_prob_goals_dc(line: f64, lambda_home: f64, lambda_away: f64, rho: f64) -> f64 {
    let n = line.floor();
    if n < 0.0 {
        return 1.0;
    }
    let n = n as u32;
    let mut p_under = 0.0;
    for h in 0..=n {
        for a in 0..=(n - h) {
            p_under += score_prob_dc(h, a, lambda_home, lambda_away, rho);
        }
    }
    (1.0 - p_under).clamp(0.0, 1.0)
}

pub fn outcome_probs_dc(lambda_home: f64, lambda_away: f64, rho: f64, max_goals: u32) -> Prob3 {
    let mut p_home = 0.0_f64;
    let mut p_draw = 0.0_f64;
    let mut p_away = 0.0_f64;

    for h in 0..=max_goals {
        for a in 0..=max_goals {
            let p = score_prob_dc(h, a, lambda_home, lambda_away, rho).max(0.0);
            if h > a {
                p_home += p;
            } else if h == a {
                p_draw += p;
            } else {
                p_away += p;
            }
        }
    }

    let sum = (p_home + p_draw + p_away).max(1e-12);
    Prob3 {
        home: p_home / sum,
        draw: p_draw / sum,
        away: p_away / sum,
    }
}

/// Method-of-moments dispersion from `Var = mu + alpha * mu^2`.
pub fn estimate_alpha(mu: f64, var: f64) -> f64 {
    if mu <= 0.0 {
        return 0.0;
    }
    ((var - mu) / (mu * mu)).max(0.0)
}

/// `(r, p)` in the "number of successes" parameterization.
pub fn nb_params(mu: f64, alpha: f64) -> (f64, f64) {
    let p = 1.0 / (1.0 + alpha * mu);
    let r = mu * p / (1.0 - p);
    (r, p)
}

pub fn negbin_cdf(n: i64, r: f64, p: f64) -> f64 {
    if n < 0 || r <= 0.0 || p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let mut pmf = (r * p.ln()).exp();
    let mut cdf = pmf;
    for k in 0..n {
        let k = k as f64;
        pmf *= (k + r) / (k + 1.0) * (1.0 - p);
        cdf += pmf;
    }
    cdf.clamp(0.0, 1.0)
}

pub fn over_prob_negbin(line: f64, mu: f64, alpha: f64) -> f64 {
    let n = line.floor() as i64;
    if mu <= 0.0 {
        return if n < 0 { 1.0 } else { 0.0 };
    }
    let under = if alpha <= MIN_ALPHA {
        poisson_cdf(n, mu)
    } else {
        let (r, p) = nb_params(mu, alpha);
        negbin_cdf(n, r, p)
    };
    (1.0 - under).clamp(0.0, 1.0)
}
