use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::context::{MatchContext, compute_rest_context};
use crate::decay::WeightedSeries;
use crate::error::{ForecastError, Result};
use crate::expectancy::{Adjustment, Expectancy, FamilyStats, SideStats, build_expectancy};
use crate::league_params::{LeagueParams, LeagueTable};
use crate::metric::{MetricFamily, MetricSample};
use crate::over_under::{OverUnderResult, build_over_under};
use crate::stability::{WeightedStat, series_stat};

/// Either per-match samples or a season total when match detail is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleSource {
    Aggregate { total: f64, matches: usize },
    Matches(Vec<MetricSample>),
}

impl Default for SampleSource {
    fn default() -> Self {
        SampleSource::Matches(Vec::new())
    }
}

impl SampleSource {
    pub fn usable(&self) -> usize {
        match self {
            SampleSource::Matches(samples) => samples.iter().filter(|s| s.is_usable()).count(),
            SampleSource::Aggregate { total, matches } => {
                if total.is_finite() && *total >= 0.0 { *matches } else { 0 }
            }
        }
    }

    fn latest_date(&self) -> Option<NaiveDate> {
        match self {
            SampleSource::Matches(samples) => samples.iter().filter_map(|s| s.date).max(),
            SampleSource::Aggregate { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilySamples {
    /// What the team produced (or committed, for discipline metrics).
    pub scored: SampleSource,
    /// What the team allowed its opponents.
    pub conceded: SampleSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSamples {
    pub name: Option<String>,
    pub metrics: BTreeMap<MetricFamily, FamilySamples>,
    /// Dates of previous matches, used to derive rest and congestion when
    /// the context does not carry them.
    pub played_dates: Vec<NaiveDate>,
}

impl TeamSamples {
    pub fn usable_samples(&self) -> usize {
        MetricFamily::FORECAST
            .iter()
            .filter_map(|f| self.metrics.get(f))
            .map(|s| s.scored.usable() + s.conceded.usable())
            .sum()
    }

    fn latest_date(&self) -> Option<NaiveDate> {
        self.metrics
            .values()
            .flat_map(|s| [s.scored.latest_date(), s.conceded.latest_date()])
            .flatten()
            .max()
    }
}

/// Everything the engine needs for one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchInputs {
    pub competition: Option<String>,
    /// Reference day for recency weights. Defaults to the newest sample date.
    pub match_date: Option<NaiveDate>,
    pub home: TeamSamples,
    pub away: TeamSamples,
    pub context: MatchContext,
}

impl MatchInputs {
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.match_date
            .or_else(|| self.home.latest_date().max(self.away.latest_date()))
    }

    /// The supplied context with rest fields derived from `played_dates`
    /// wherever they were left out. Needs a match date.
    pub fn effective_context(&self) -> MatchContext {
        let mut ctx = self.context.clone();
        if let Some(day) = self.match_date {
            if !self.home.played_dates.is_empty() {
                ctx.home = ctx.home.with_rest(compute_rest_context(&self.home.played_dates, day));
            }
            if !self.away.played_dates.is_empty() {
                ctx.away = ctx.away.with_rest(compute_rest_context(&self.away.played_dates, day));
            }
        }
        ctx
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub home: SideStats,
    pub away: SideStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyForecast {
    pub family: MetricFamily,
    pub stability: StabilityReport,
    pub expectancy: Expectancy,
    pub over_under: OverUnderResult,
}

impl FamilyForecast {
    pub fn seasonstats_fallback(&self) -> bool {
        self.expectancy
            .adjustments
            .contains(&Adjustment::SeasonStatsFallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchForecast {
    pub competition: Option<String>,
    pub league: String,
    pub as_of: Option<NaiveDate>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub families: Vec<FamilyForecast>,
    /// Stability only: too rare to forecast.
    pub red_cards: Option<StabilityReport>,
}

impl MatchForecast {
    pub fn family(&self, family: MetricFamily) -> Option<&FamilyForecast> {
        self.families.iter().find(|f| f.family == family)
    }
}

pub fn read_inputs(path: &Path) -> Result<MatchInputs> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Full forecast for one match. Families are independent and run in
/// parallel; the output keeps the fixed family order.
pub fn forecast_match(inputs: &MatchInputs, leagues: &LeagueTable, cfg: &EngineConfig) -> Result<MatchForecast> {
    let home_samples = inputs.home.usable_samples();
    let away_samples = inputs.away.usable_samples();
    if home_samples == 0 && away_samples == 0 {
        warn!(competition = ?inputs.competition, "no usable samples for either team");
        return Err(ForecastError::InsufficientData {
            home_samples,
            away_samples,
        });
    }

    let league = leagues.lookup(inputs.competition.as_deref());
    let as_of = inputs.as_of();
    let context = inputs.effective_context();
    debug!(league = %league.name, ?as_of, home_samples, away_samples, "forecasting match");

    let families: Vec<FamilyForecast> = MetricFamily::FORECAST
        .par_iter()
        .map(|family| forecast_family(*family, inputs, &context, as_of, league, cfg))
        .collect();

    let red_cards = has_family(inputs, MetricFamily::RedCards).then(|| {
        let stats = family_stats(MetricFamily::RedCards, inputs, as_of, cfg);
        StabilityReport {
            home: stats.home,
            away: stats.away,
        }
    });

    Ok(MatchForecast {
        competition: inputs.competition.clone(),
        league: league.name.clone(),
        as_of,
        home_team: inputs.home.name.clone(),
        away_team: inputs.away.name.clone(),
        families,
        red_cards,
    })
}

pub fn forecast_family(
    family: MetricFamily,
    inputs: &MatchInputs,
    context: &MatchContext,
    as_of: Option<NaiveDate>,
    league: &LeagueParams,
    cfg: &EngineConfig,
) -> FamilyForecast {
    let stats = family_stats(family, inputs, as_of, cfg);
    if stats.aggregate {
        warn!(?family, "using season aggregate instead of per-match samples");
    }
    let expectancy = build_expectancy(&stats, context, league, cfg);
    let over_under = build_over_under(&expectancy, league, cfg);
    FamilyForecast {
        family,
        stability: StabilityReport {
            home: stats.home,
            away: stats.away,
        },
        expectancy,
        over_under,
    }
}

/// Combines two mando-filtered forecasts of the same match: the home side
/// of `home_view` and the away side of `away_view`. Over/Under is refit
/// from the merged expectancies.
pub fn compose_split_forecast(
    home_view: &MatchForecast,
    away_view: &MatchForecast,
    league: &LeagueParams,
    cfg: &EngineConfig,
) -> MatchForecast {
    let families = home_view
        .families
        .iter()
        .filter_map(|h| away_view.family(h.family).map(|a| (h, a)))
        .map(|(h, a)| {
            let expectancy = Expectancy::merge(&h.expectancy, &a.expectancy, cfg);
            let over_under = build_over_under(&expectancy, league, cfg);
            FamilyForecast {
                family: h.family,
                stability: StabilityReport {
                    home: h.stability.home,
                    away: a.stability.away,
                },
                expectancy,
                over_under,
            }
        })
        .collect();

    let red_cards = match (&home_view.red_cards, &away_view.red_cards) {
        (Some(h), Some(a)) => Some(StabilityReport {
            home: h.home,
            away: a.away,
        }),
        _ => None,
    };

    MatchForecast {
        competition: home_view.competition.clone(),
        league: league.name.clone(),
        as_of: home_view.as_of.max(away_view.as_of),
        home_team: home_view.home_team.clone(),
        away_team: away_view.away_team.clone(),
        families,
        red_cards,
    }
}

fn has_family(inputs: &MatchInputs, family: MetricFamily) -> bool {
    inputs.home.metrics.contains_key(&family) || inputs.away.metrics.contains_key(&family)
}

pub fn family_stats(family: MetricFamily, inputs: &MatchInputs, as_of: Option<NaiveDate>, cfg: &EngineConfig) -> FamilyStats {
    let empty = FamilySamples::default();
    let home = inputs.home.metrics.get(&family).unwrap_or(&empty);
    let away = inputs.away.metrics.get(&family).unwrap_or(&empty);

    let (home_scored, a1) = source_stat(&home.scored, family, as_of, cfg);
    let (home_conceded, a2) = source_stat(&home.conceded, family, as_of, cfg);
    let (away_scored, a3) = source_stat(&away.scored, family, as_of, cfg);
    let (away_conceded, a4) = source_stat(&away.conceded, family, as_of, cfg);

    FamilyStats {
        family,
        home: SideStats {
            scored: home_scored,
            conceded: home_conceded,
        },
        away: SideStats {
            scored: away_scored,
            conceded: away_conceded,
        },
        aggregate: a1 || a2 || a3 || a4,
    }
}

/// The stat for one source, and whether it came from an aggregate.
fn source_stat(
    source: &SampleSource,
    family: MetricFamily,
    as_of: Option<NaiveDate>,
    cfg: &EngineConfig,
) -> (WeightedStat, bool) {
    match source {
        SampleSource::Matches(samples) => {
            let series = WeightedSeries::from_samples(samples, as_of, cfg.decay_rate);
            (series_stat(&series, family, cfg), false)
        }
        SampleSource::Aggregate { total, matches } => {
            if *matches == 0 || !total.is_finite() || *total < 0.0 {
                return (WeightedStat::not_available(0.0, 0), false);
            }
            let mean = total / *matches as f64;
            let stat = WeightedStat::from_aggregate(mean, cfg.fallback_cv(family), *matches, family, cfg);
            (stat, true)
        }
    }
}
