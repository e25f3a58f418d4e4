use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence::{ConfidenceLabel, confidence_from_cv, confidence_label};
use crate::config::{EngineConfig, FatigueConfig, HomeAwayFactor};
use crate::context::{FormResult, MatchContext, TeamContext};
use crate::league_params::LeagueParams;
use crate::metric::MetricFamily;
use crate::shrinkage::shrink;
use crate::stability::WeightedStat;

/// Optional adjustments that actually changed a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    HomeAdvantage,
    Form,
    Rest,
    Standings,
    HeadToHead,
    Referee,
    #[serde(rename = "seasonstats_fallback")]
    SeasonStatsFallback,
}

/// One team's stats for one metric family: what it produced and what it allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideStats {
    pub scored: WeightedStat,
    pub conceded: WeightedStat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyStats {
    pub family: MetricFamily,
    pub home: SideStats,
    pub away: SideStats,
    /// At least one side came from a season aggregate rather than matches.
    pub aggregate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionValue {
    pub value: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyResult {
    pub home: PredictionValue,
    pub away: PredictionValue,
    pub total: PredictionValue,
}

/// Expectancy plus the unrounded quantities the distribution stage needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectancy {
    pub family: MetricFamily,
    pub result: ExpectancyResult,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub cv_home: f64,
    pub cv_away: f64,
    pub n_home: usize,
    pub n_away: usize,
    pub adjustments: Vec<Adjustment>,
}

impl Expectancy {
    /// Effective sample size: the thinner of the two sides.
    pub fn n(&self) -> usize {
        self.n_home.min(self.n_away)
    }

    pub fn cv_total(&self) -> f64 {
        (self.cv_home + self.cv_away) / 2.0
    }

    /// Home side of `home_view`, away side of `away_view`, with the total
    /// and its confidence recomputed from the merged halves.
    pub fn merge(home_view: &Expectancy, away_view: &Expectancy, cfg: &EngineConfig) -> Expectancy {
        let mut adjustments: Vec<Adjustment> = home_view
            .adjustments
            .iter()
            .chain(&away_view.adjustments)
            .copied()
            .collect();
        adjustments.sort_unstable();
        adjustments.dedup();

        let home = home_view.result.home;
        let away = away_view.result.away;
        let n = home_view.n_home.min(away_view.n_away);
        let cv_total = (home_view.cv_home + away_view.cv_away) / 2.0;
        Expectancy {
            family: home_view.family,
            result: ExpectancyResult {
                home,
                away,
                total: prediction(round1(home.value + away.value), cv_total, n, cfg),
            },
            lambda_home: home_view.lambda_home,
            lambda_away: away_view.lambda_away,
            cv_home: home_view.cv_home,
            cv_away: away_view.cv_away,
            n_home: home_view.n_home,
            n_away: away_view.n_away,
            adjustments,
        }
    }
}

/// Home/away estimate for one side before any multiplicative factor.
#[derive(Debug, Clone, Copy)]
struct Estimate {
    mean: f64,
    cv: f64,
    n: usize,
}

struct Ledger(Vec<Adjustment>);

impl Ledger {
    fn mark(&mut self, adj: Adjustment) {
        if !self.0.contains(&adj) {
            self.0.push(adj);
        }
    }
}

pub fn build_expectancy(
    stats: &FamilyStats,
    ctx: &MatchContext,
    league: &LeagueParams,
    cfg: &EngineConfig,
) -> Expectancy {
    let family = stats.family;
    let mut ledger = Ledger(Vec::new());
    if stats.aggregate {
        ledger.mark(Adjustment::SeasonStatsFallback);
    }

    let (home, away) = match family {
        MetricFamily::Goals => goal_estimates(stats, ctx, league, cfg, &mut ledger),
        f if f.uses_conceded() => (
            blend(&stats.home.scored, &stats.away.conceded),
            blend(&stats.away.scored, &stats.home.conceded),
        ),
        _ => (single(&stats.home.scored), single(&stats.away.scored)),
    };

    let prior = league.prior_per_side(family);
    let mut lambda_home = shrink(home.mean, home.n, prior, cfg.shrinkage_strength);
    let mut lambda_away = shrink(away.mean, away.n, prior, cfg.shrinkage_strength);

    if ctx.home_advantage_applies() {
        let f = home_away_factor(family, league, cfg);
        lambda_home *= f.home;
        lambda_away *= f.away;
        if f != HomeAwayFactor::NEUTRAL {
            ledger.mark(Adjustment::HomeAdvantage);
        }
    } else {
        debug!(?family, "mando filter active, skipping home advantage");
    }

    if family == MetricFamily::YellowCards {
        if let Some(factor) = referee_factor(ctx, league, cfg) {
            lambda_home *= factor;
            lambda_away *= factor;
            ledger.mark(Adjustment::Referee);
        }
    }

    let form_home = form_factor(&ctx.home.recent_form, cfg.form_window, cfg.form_range);
    let form_away = form_factor(&ctx.away.recent_form, cfg.form_window, cfg.form_range);
    lambda_home *= form_home;
    lambda_away *= form_away;
    if form_home != 1.0 || form_away != 1.0 {
        ledger.mark(Adjustment::Form);
    }

    if family.is_volume() {
        let fatigue_home = fatigue_multiplier(&ctx.home, &cfg.fatigue);
        let fatigue_away = fatigue_multiplier(&ctx.away, &cfg.fatigue);
        lambda_home *= fatigue_home;
        lambda_away *= fatigue_away;
        if fatigue_home < 1.0 || fatigue_away < 1.0 {
            ledger.mark(Adjustment::Rest);
        }
    }

    if family == MetricFamily::Goals {
        if let Some(total) = head_to_head_total(lambda_home + lambda_away, ctx, cfg) {
            let sum = lambda_home + lambda_away;
            let ratio = if sum > 0.0 { lambda_home / sum } else { 0.5 };
            lambda_home = total * ratio;
            lambda_away = total * (1.0 - ratio);
            ledger.mark(Adjustment::HeadToHead);
        }
    }

    let lambda_home = lambda_home.max(0.0);
    let lambda_away = lambda_away.max(0.0);
    let n_total = home.n.min(away.n);
    let cv_total = (home.cv + away.cv) / 2.0;

    let home_value = prediction(round1(lambda_home), home.cv, home.n, cfg);
    let away_value = prediction(round1(lambda_away), away.cv, away.n, cfg);
    let total_value = prediction(round1(home_value.value + away_value.value), cv_total, n_total, cfg);

    Expectancy {
        family,
        result: ExpectancyResult {
            home: home_value,
            away: away_value,
            total: total_value,
        },
        lambda_home,
        lambda_away,
        cv_home: home.cv,
        cv_away: away.cv,
        n_home: home.n,
        n_away: away.n,
        adjustments: ledger.0,
    }
}

/// Attack/defense ratio model: each side's strength is relative to the
/// league's goals per side, with a light nudge from the table when both
/// positions are known.
fn goal_estimates(
    stats: &FamilyStats,
    ctx: &MatchContext,
    league: &LeagueParams,
    cfg: &EngineConfig,
    ledger: &mut Ledger,
) -> (Estimate, Estimate) {
    let side = league.goals_per_side();
    let ratio = |s: &WeightedStat| if s.samples > 0 { s.mean / side } else { 1.0 };

    let mut home_attack = ratio(&stats.home.scored);
    let mut home_defense = ratio(&stats.home.conceded);
    let mut away_attack = ratio(&stats.away.scored);
    let mut away_defense = ratio(&stats.away.conceded);

    if let (Some(pos_h), Some(pos_a)) = (ctx.home.table_position, ctx.away.table_position) {
        let teams = league.teams_count.max(2) as f64;
        let range = cfg.standings_range;
        let strength = |pos: u32| (1.0 - (pos.max(1) as f64 - 1.0) / (teams - 1.0)).clamp(0.0, 1.0);
        let (sh, sa) = (strength(pos_h), strength(pos_a));

        home_attack *= 1.0 - range / 2.0 + range * sh;
        away_attack *= 1.0 - range / 2.0 + range * sa;
        home_defense *= 1.0 + range / 2.0 - range * sh;
        away_defense *= 1.0 + range / 2.0 - range * sa;
        ledger.mark(Adjustment::Standings);
    } else {
        debug!("standings missing, skipping table adjustment");
    }

    let home = blend(&stats.home.scored, &stats.away.conceded);
    let away = blend(&stats.away.scored, &stats.home.conceded);
    (
        Estimate {
            mean: side * home_attack * away_defense,
            ..home
        },
        Estimate {
            mean: side * away_attack * home_defense,
            ..away
        },
    )
}

/// Average of a team's "scored" stat and the opponent's "conceded" stat.
/// A side with no samples defers to the other one.
fn blend(scored: &WeightedStat, conceded: &WeightedStat) -> Estimate {
    match (scored.samples, conceded.samples) {
        (0, 0) => Estimate {
            mean: 0.0,
            cv: 1.0,
            n: 0,
        },
        (_, 0) => single(scored),
        (0, _) => single(conceded),
        (ns, nc) => Estimate {
            mean: (scored.mean + conceded.mean) / 2.0,
            cv: (scored.cv + conceded.cv) / 2.0,
            n: ns.min(nc),
        },
    }
}

fn single(stat: &WeightedStat) -> Estimate {
    Estimate {
        mean: stat.mean,
        cv: stat.cv,
        n: stat.samples,
    }
}

pub fn home_away_factor(family: MetricFamily, league: &LeagueParams, cfg: &EngineConfig) -> HomeAwayFactor {
    if let Some(f) = league.home_factors.get(&family) {
        return *f;
    }
    if family == MetricFamily::Goals {
        if let Some(f) = cfg.home_factors.get(&family) {
            return *f;
        }
        // Home gets `side * haf`, away keeps whatever is left of the total.
        let side = league.goals_per_side();
        let home = league.home_advantage_factor;
        let away = (2.0 * side - side * home).max(0.1) / side;
        return HomeAwayFactor::new(home, away);
    }
    cfg.home_factor(family)
}

/// Points ratio over the last `window` results mapped linearly onto
/// `[1 - range, 1 + range]`. No form data is neutral.
pub fn form_factor(form: &[FormResult], window: usize, range: f64) -> f64 {
    let recent = &form[..form.len().min(window)];
    if recent.is_empty() {
        return 1.0;
    }
    let points: u32 = recent.iter().map(|r| r.points()).sum();
    let ratio = points as f64 / (recent.len() * 3) as f64;
    (1.0 - range) + ratio * 2.0 * range
}

pub fn fatigue_multiplier(team: &TeamContext, cfg: &FatigueConfig) -> f64 {
    let mut penalty = 0.0;
    if let Some(days) = team.rest_days {
        if days <= cfg.short_rest_days {
            penalty += cfg.short_rest_penalty;
        } else if days <= cfg.medium_rest_days {
            penalty += cfg.medium_rest_penalty;
        }
    }
    if team
        .matches_14d
        .is_some_and(|m| m >= cfg.congestion_matches_14d)
    {
        penalty += cfg.congestion_penalty;
    }
    1.0 - penalty.clamp(0.0, cfg.max_penalty)
}

fn referee_factor(ctx: &MatchContext, league: &LeagueParams, cfg: &EngineConfig) -> Option<f64> {
    let Some(referee) = ctx.referee else {
        debug!("no referee stats, skipping referee adjustment");
        return None;
    };
    if referee.matches < cfg.referee.min_matches
        || !(referee.avg_yellow_cards > 0.0)
        || league.cards_mean_total <= 0.0
    {
        debug!(matches = referee.matches, "referee sample too thin, skipping");
        return None;
    }
    Some((referee.avg_yellow_cards / league.cards_mean_total).clamp(cfg.referee.min_factor, cfg.referee.max_factor))
}

fn head_to_head_total(projected: f64, ctx: &MatchContext, cfg: &EngineConfig) -> Option<f64> {
    let h2h = ctx.head_to_head?;
    let c = &cfg.head_to_head;
    if h2h.total_matches < c.min_matches || !(h2h.avg_goals_per_match > 0.0) {
        debug!(meetings = h2h.total_matches, "too few meetings, skipping head-to-head blend");
        return None;
    }
    let w = if h2h.total_matches >= c.strong_matches {
        c.strong_weight
    } else {
        c.weight
    };
    Some((1.0 - w) * projected + w * h2h.avg_goals_per_match)
}

fn prediction(value: f64, cv: f64, n: usize, cfg: &EngineConfig) -> PredictionValue {
    let confidence = confidence_from_cv(cv, n, &cfg.confidence);
    PredictionValue {
        value,
        confidence: round2(confidence),
        confidence_label: confidence_label(confidence, &cfg.confidence),
    }
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
