/// Candidate Over/Under lines around `mu`: half-step lines bracketing the
/// expectation, never below `step / 2`, ascending and de-duplicated.
pub fn generate_lines(mu: f64, step: f64, max_lines: usize) -> Vec<f64> {
    let step = if step > 0.0 && step.is_finite() { step } else { 1.0 };
    let mu = if mu.is_finite() { mu.max(0.0) } else { 0.0 };
    let floor = step / 2.0;
    let center = (mu / step).floor() * step + floor;

    let mut lines: Vec<f64> = Vec::with_capacity(max_lines);
    for k in -1..=2 {
        push_unique(&mut lines, (center + k as f64 * step).max(floor));
    }
    // Clamping at the floor can collapse candidates; extend upward.
    while lines.len() < max_lines {
        let next = lines.last().copied().unwrap_or(floor) + step;
        push_unique(&mut lines, next);
    }
    lines.truncate(max_lines);
    lines
}

fn push_unique(lines: &mut Vec<f64>, line: f64) {
    let line = (line * 10.0).round() / 10.0;
    if !lines.iter().any(|l| (l - line).abs() < 1e-9) {
        lines.push(line);
    }
}
