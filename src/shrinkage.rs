/// Bayesian shrinkage of an observed mean toward a prior, with `strength`
/// acting as a pseudo-count of prior observations.
pub fn shrink(observed: f64, n: usize, prior: f64, strength: f64) -> f64 {
    let k = strength.max(0.0);
    if k <= 0.0 {
        return observed;
    }
    if n == 0 {
        return prior;
    }
    let n = n as f64;
    (n * observed + k * prior) / (n + k)
}
