use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::HomeAwayFactor;
use crate::distribution::{Prob3, outcome_probs_dc};
use crate::metric::MetricFamily;

/// Per-competition calibration constants. Totals are per match (both teams);
/// priors per side are half of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueParams {
    pub name: String,
    pub sample_matches: usize,
    pub goals_mean_total: f64,
    pub corners_mean_total: f64,
    pub cards_mean_total: f64,
    pub red_cards_mean_total: f64,
    pub fouls_mean_total: f64,
    pub shots_mean_total: f64,
    pub shots_on_target_mean_total: f64,
    // Dixon-Coles rho (typically negative to increase low-score draws).
    pub dc_rho: f64,
    pub home_advantage_factor: f64,
    pub teams_count: u32,
    /// Per-family overrides of the engine's home/away multipliers.
    pub home_factors: BTreeMap<MetricFamily, HomeAwayFactor>,
}

impl Default for LeagueParams {
    fn default() -> Self {
        Self::defaults("default")
    }
}

impl LeagueParams {
    pub fn defaults(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sample_matches: 0,
            goals_mean_total: 2.7,
            corners_mean_total: 9.5,
            cards_mean_total: 4.2,
            red_cards_mean_total: 0.2,
            fouls_mean_total: 24.0,
            shots_mean_total: 24.0,
            shots_on_target_mean_total: 8.0,
            dc_rho: -0.13,
            home_advantage_factor: 1.08,
            teams_count: 20,
            home_factors: BTreeMap::new(),
        }
    }

    fn preset(
        name: &str,
        goals: f64,
        corners: f64,
        cards: f64,
        rho: f64,
        home_adv: f64,
        teams: u32,
    ) -> Self {
        Self {
            goals_mean_total: goals,
            corners_mean_total: corners,
            cards_mean_total: cards,
            dc_rho: rho,
            home_advantage_factor: home_adv,
            teams_count: teams,
            ..Self::defaults(name)
        }
    }

    pub fn mean_total(&self, family: MetricFamily) -> f64 {
        match family {
            MetricFamily::Goals => self.goals_mean_total,
            MetricFamily::Corners => self.corners_mean_total,
            MetricFamily::Shots => self.shots_mean_total,
            MetricFamily::ShotsOnTarget => self.shots_on_target_mean_total,
            MetricFamily::YellowCards => self.cards_mean_total,
            MetricFamily::Fouls => self.fouls_mean_total,
            MetricFamily::RedCards => self.red_cards_mean_total,
        }
    }

    /// Shrinkage prior for one team's expectation.
    pub fn prior_per_side(&self, family: MetricFamily) -> f64 {
        self.mean_total(family) / 2.0
    }

    pub fn goals_per_side(&self) -> f64 {
        if self.goals_mean_total > 0.0 {
            self.goals_mean_total / 2.0
        } else {
            1.35
        }
    }
}

static BUILTIN: Lazy<Vec<LeagueParams>> = Lazy::new(|| {
    vec![
        LeagueParams::preset("Premier League", 2.65, 9.8, 3.8, -0.12, 1.07, 20),
        LeagueParams::preset("La Liga", 2.48, 8.9, 4.5, -0.14, 1.06, 20),
        LeagueParams::preset("Serie A", 2.72, 9.2, 4.8, -0.11, 1.08, 20),
        LeagueParams::preset("Bundesliga", 2.95, 10.1, 4.0, -0.10, 1.09, 18),
        LeagueParams::preset("Ligue 1", 2.58, 9.0, 4.2, -0.13, 1.07, 18),
        LeagueParams::preset("Brasileirão", 2.35, 10.5, 5.2, -0.15, 1.10, 20),
    ]
});

/// Known competitions plus the fallback used for anything unrecognized.
#[derive(Debug, Clone)]
pub struct LeagueTable {
    pub default: LeagueParams,
    pub leagues: Vec<LeagueParams>,
}

impl LeagueTable {
    pub fn builtin() -> Self {
        Self {
            default: LeagueParams::default(),
            leagues: BUILTIN.clone(),
        }
    }

    /// Entries replace leagues with the same name (case-insensitive); an entry
    /// named "default" replaces the fallback.
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = LeagueParams>) -> Self {
        for params in overrides {
            if params.name.eq_ignore_ascii_case("default") {
                self.default = params;
                continue;
            }
            match self
                .leagues
                .iter_mut()
                .find(|l| l.name.eq_ignore_ascii_case(&params.name))
            {
                Some(slot) => *slot = params,
                None => self.leagues.push(params),
            }
        }
        self
    }

    /// Case-insensitive substring match on the competition name; the longest
    /// matching league name wins.
    pub fn lookup(&self, competition: Option<&str>) -> &LeagueParams {
        let Some(comp) = competition.map(|c| c.trim().to_lowercase()) else {
            return &self.default;
        };
        if comp.is_empty() {
            return &self.default;
        }
        self.leagues
            .iter()
            .filter(|l| !l.name.is_empty() && comp.contains(&l.name.to_lowercase()))
            .max_by_key(|l| l.name.len())
            .unwrap_or(&self.default)
    }
}

impl Default for LeagueTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One finished league match, as used to refit a league's constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompletedMatch {
    pub home_goals: u8,
    pub away_goals: u8,
    #[serde(default)]
    pub corners: Option<f64>,
    #[serde(default)]
    pub yellow_cards: Option<f64>,
}

/// Refits goal/corner/card means, home advantage and rho from finished
/// matches, shrinking small samples toward `base`.
pub fn fit_league_params(base: &LeagueParams, matches: &[CompletedMatch]) -> LeagueParams {
    let mut out = base.clone();
    let n = matches.len();
    out.sample_matches = n;
    if n == 0 {
        return out;
    }

    let total_goals: f64 = matches
        .iter()
        .map(|m| m.home_goals as f64 + m.away_goals as f64)
        .sum();
    let home_goals: f64 = matches.iter().map(|m| m.home_goals as f64).sum();
    let goals_mean = total_goals / n as f64;
    let home_adv = if total_goals > 0.0 {
        (home_goals / n as f64) / (goals_mean / 2.0)
    } else {
        base.home_advantage_factor
    };

    // Shrink small samples toward the base to avoid wild swings.
    const MIN_N: f64 = 200.0;
    let w = (n as f64 / MIN_N).clamp(0.0, 1.0);
    out.goals_mean_total = (1.0 - w) * base.goals_mean_total + w * goals_mean;
    out.home_advantage_factor = (1.0 - w) * base.home_advantage_factor + w * home_adv;

    if let Some(corners) = mean_of(matches.iter().filter_map(|m| m.corners)) {
        out.corners_mean_total = (1.0 - w) * base.corners_mean_total + w * corners;
    }
    if let Some(cards) = mean_of(matches.iter().filter_map(|m| m.yellow_cards)) {
        out.cards_mean_total = (1.0 - w) * base.cards_mean_total + w * cards;
    }

    out.dc_rho = fit_dc_rho(matches, out.goals_mean_total, out.home_advantage_factor);
    out
}

/// Grid search over rho in [-0.25, 0.05] minimizing the Brier score of the
/// league-average H/D/A probabilities.
pub fn fit_dc_rho(matches: &[CompletedMatch], goals_mean_total: f64, home_advantage_factor: f64) -> f64 {
    if matches.is_empty() {
        return -0.10;
    }
    let side = goals_mean_total / 2.0;
    let lambda_home = (side * home_advantage_factor).clamp(0.20, 3.80);
    let lambda_away = (goals_mean_total - side * home_advantage_factor).clamp(0.20, 3.80);

    let mut best_rho = -0.10;
    let mut best_brier = f64::INFINITY;
    for rho_steps in -25..=5 {
        let rho = rho_steps as f64 / 100.0;
        let p = outcome_probs_dc(lambda_home, lambda_away, rho, 10);
        let brier = matches.iter().map(|m| brier(p, m)).sum::<f64>() / matches.len() as f64;
        if brier < best_brier {
            best_brier = brier;
            best_rho = rho;
        }
    }
    best_rho
}

fn brier(p: Prob3, m: &CompletedMatch) -> f64 {
    let (h, d, a) = if m.home_goals > m.away_goals {
        (1.0, 0.0, 0.0)
    } else if m.home_goals < m.away_goals {
        (0.0, 0.0, 1.0)
    } else {
        (0.0, 1.0, 0.0)
    };
    (p.home - h).powi(2) + (p.draw - d).powi(2) + (p.away - a).powi(2)
}

fn mean_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .filter(|v| v.is_finite() && *v >= 0.0)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_competition_uses_default() {
        let table = LeagueTable::builtin();
        assert_eq!(table.lookup(Some("Liga Teste")).name, "default");
        assert_eq!(table.lookup(None).name, "default");
        assert_eq!(table.lookup(Some("  ")).name, "default");
    }

    #[test]
    fn lookup_is_case_insensitive_substring() {
        let table = LeagueTable::builtin();
        let pl = table.lookup(Some("ENGLISH premier league 2025/26"));
        assert_eq!(pl.name, "Premier League");
        assert_eq!(pl.dc_rho, -0.12);
    }

    #[test]
    fn overrides_replace_by_name() {
        let mut custom = LeagueParams::defaults("premier league");
        custom.goals_mean_total = 3.1;
        let table = LeagueTable::builtin().with_overrides([custom, LeagueParams::defaults("Eredivisie")]);
        assert_eq!(table.lookup(Some("Premier League")).goals_mean_total, 3.1);
        assert_eq!(table.lookup(Some("Eredivisie")).name, "Eredivisie");
        assert_eq!(table.leagues.len(), 7);
    }

    #[test]
    fn fitting_without_matches_keeps_base() {
        let base = LeagueParams::defaults("x");
        let fit = fit_league_params(&base, &[]);
        assert_eq!(fit.goals_mean_total, base.goals_mean_total);
        assert_eq!(fit.sample_matches, 0);
    }

    #[test]
    fn fitting_moves_toward_observed_goals() {
        let base = LeagueParams::defaults("x");
        let matches: Vec<CompletedMatch> = (0..400)
            .map(|i| CompletedMatch {
                home_goals: if i % 2 == 0 { 3 } else { 2 },
                away_goals: 1,
                corners: Some(11.0),
                yellow_cards: None,
            })
            .collect();
        let fit = fit_league_params(&base, &matches);
        assert!((fit.goals_mean_total - 3.5).abs() < 1e-9);
        assert!((fit.corners_mean_total - 11.0).abs() < 1e-9);
        assert_eq!(fit.cards_mean_total, base.cards_mean_total);
        assert!(fit.home_advantage_factor > 1.0);
        assert!((-0.25..=0.05).contains(&fit.dc_rho));
    }
}
