use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::league_params::{LeagueParams, LeagueTable};
use crate::metric::MetricFamily;

/// Multipliers applied to the home and away expectation of one metric family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomeAwayFactor {
    pub home: f64,
    pub away: f64,
}

impl HomeAwayFactor {
    pub const NEUTRAL: HomeAwayFactor = HomeAwayFactor {
        home: 1.0,
        away: 1.0,
    };

    pub fn new(home: f64, away: f64) -> Self {
        Self { home, away }
    }
}

/// Upper bounds of the Very Stable, Stable, Moderate and Unstable buckets.
/// Anything at or above the last bound is Very Unstable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvThresholds(pub [f64; 4]);

impl CvThresholds {
    pub fn instability(&self) -> f64 {
        self.0[3]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    pub short_rest_days: i64,
    pub short_rest_penalty: f64,
    pub medium_rest_days: i64,
    pub medium_rest_penalty: f64,
    pub congestion_matches_14d: u32,
    pub congestion_penalty: f64,
    pub max_penalty: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            short_rest_days: 2,
            short_rest_penalty: 0.06,
            medium_rest_days: 3,
            medium_rest_penalty: 0.03,
            congestion_matches_14d: 4,
            congestion_penalty: 0.04,
            max_penalty: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadToHeadConfig {
    pub min_matches: u32,
    pub strong_matches: u32,
    pub weight: f64,
    pub strong_weight: f64,
}

impl Default for HeadToHeadConfig {
    fn default() -> Self {
        Self {
            min_matches: 5,
            strong_matches: 10,
            weight: 0.15,
            strong_weight: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeConfig {
    pub min_matches: u32,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            min_matches: 5,
            min_factor: 0.5,
            max_factor: 1.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub floor: f64,
    pub ceiling: f64,
    pub small_sample: usize,
    pub small_sample_factor: f64,
    pub medium_sample: usize,
    pub medium_sample_factor: f64,
    pub large_sample: usize,
    pub large_sample_factor: f64,
    pub high_label: f64,
    pub medium_label: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            floor: 0.30,
            ceiling: 0.95,
            small_sample: 5,
            small_sample_factor: 0.8,
            medium_sample: 10,
            medium_sample_factor: 1.10,
            large_sample: 15,
            large_sample_factor: 1.15,
            high_label: 0.70,
            medium_label: 0.50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub draws: usize,
    pub min_draws: usize,
    pub min_mean: f64,
    pub seed: u64,
    pub probability_cutoff: f64,
    pub max_lines: usize,
    // z for a central 90% interval under a normal approximation.
    pub interval_z: f64,
    pub interval_level: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            draws: 3000,
            min_draws: 100,
            min_mean: 0.1,
            seed: 0x5EED_0F_57A7_11E5,
            probability_cutoff: 0.98,
            max_lines: 4,
            interval_z: 1.644_853_626_951_472_2,
            interval_level: 0.9,
        }
    }
}

/// Every tunable literal used by the engine. Missing keys in a config file
/// fall back to these defaults; per-family tables fall back family by family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub decay_rate: f64,
    pub shrinkage_strength: f64,
    pub form_window: usize,
    pub form_range: f64,
    pub standings_range: f64,
    pub stability: BTreeMap<MetricFamily, CvThresholds>,
    pub home_factors: BTreeMap<MetricFamily, HomeAwayFactor>,
    pub line_steps: BTreeMap<MetricFamily, f64>,
    pub fallback_cv: BTreeMap<MetricFamily, f64>,
    pub fatigue: FatigueConfig,
    pub head_to_head: HeadToHeadConfig,
    pub referee: RefereeConfig,
    pub confidence: ConfidenceConfig,
    pub simulation: SimulationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let stability = MetricFamily::FORECAST
            .iter()
            .filter_map(|f| default_thresholds(*f).map(|t| (*f, t)))
            .collect();
        // Goals are split from the league's home_advantage_factor unless a
        // config file sets them here explicitly.
        let home_factors = MetricFamily::FORECAST
            .iter()
            .filter(|f| **f != MetricFamily::Goals)
            .map(|f| (*f, default_home_factor(*f)))
            .collect();
        let line_steps = MetricFamily::FORECAST
            .iter()
            .map(|f| (*f, default_line_step(*f)))
            .collect();
        let fallback_cv = [
            MetricFamily::Goals,
            MetricFamily::Corners,
            MetricFamily::Shots,
            MetricFamily::ShotsOnTarget,
            MetricFamily::YellowCards,
            MetricFamily::Fouls,
            MetricFamily::RedCards,
        ]
        .iter()
        .map(|f| (*f, default_fallback_cv(*f)))
        .collect();

        Self {
            decay_rate: 0.0065,
            shrinkage_strength: 3.0,
            form_window: 5,
            form_range: 0.05,
            standings_range: 0.12,
            stability,
            home_factors,
            line_steps,
            fallback_cv,
            fatigue: FatigueConfig::default(),
            head_to_head: HeadToHeadConfig::default(),
            referee: RefereeConfig::default(),
            confidence: ConfidenceConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// `None` means the family has no meaningful CV and always classifies as N/A.
    pub fn thresholds(&self, family: MetricFamily) -> Option<CvThresholds> {
        if family == MetricFamily::RedCards {
            return None;
        }
        self.stability
            .get(&family)
            .copied()
            .or_else(|| default_thresholds(family))
    }

    pub fn home_factor(&self, family: MetricFamily) -> HomeAwayFactor {
        self.home_factors
            .get(&family)
            .copied()
            .unwrap_or_else(|| default_home_factor(family))
    }

    pub fn line_step(&self, family: MetricFamily) -> f64 {
        self.line_steps
            .get(&family)
            .copied()
            .filter(|s| *s > 0.0)
            .unwrap_or_else(|| default_line_step(family))
    }

    pub fn fallback_cv(&self, family: MetricFamily) -> f64 {
        self.fallback_cv
            .get(&family)
            .copied()
            .unwrap_or_else(|| default_fallback_cv(family))
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.decay_rate >= 0.0) {
            return Err(invalid("decay_rate must be >= 0"));
        }
        if !(self.shrinkage_strength >= 0.0) {
            return Err(invalid("shrinkage_strength must be >= 0"));
        }
        let c = &self.confidence;
        if !(c.floor > 0.0 && c.floor <= c.ceiling && c.ceiling <= 1.0) {
            return Err(invalid("confidence bounds must satisfy 0 < floor <= ceiling <= 1"));
        }
        let s = &self.simulation;
        if s.max_lines == 0 {
            return Err(invalid("simulation.max_lines must be > 0"));
        }
        if !(s.probability_cutoff > 0.5 && s.probability_cutoff <= 1.0) {
            return Err(invalid("simulation.probability_cutoff must be in (0.5, 1]"));
        }
        for (family, t) in &self.stability {
            if t.0.windows(2).any(|w| w[0] >= w[1]) || t.0[0] <= 0.0 {
                return Err(invalid(&format!(
                    "stability thresholds for {family:?} must be positive and increasing"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ForecastError {
    ForecastError::InvalidConfig(msg.to_string())
}

pub fn default_thresholds(family: MetricFamily) -> Option<CvThresholds> {
    let t = match family {
        MetricFamily::Goals => [0.50, 0.70, 0.90, 1.10],
        MetricFamily::Corners => [0.25, 0.40, 0.55, 0.75],
        MetricFamily::Shots | MetricFamily::Fouls => [0.15, 0.25, 0.40, 0.55],
        MetricFamily::ShotsOnTarget => [0.25, 0.40, 0.60, 0.80],
        MetricFamily::YellowCards => [0.45, 0.65, 0.85, 1.05],
        MetricFamily::RedCards => return None,
    };
    Some(CvThresholds(t))
}

pub fn default_home_factor(family: MetricFamily) -> HomeAwayFactor {
    match family {
        MetricFamily::Goals => HomeAwayFactor::new(1.08, 0.92),
        MetricFamily::Corners => HomeAwayFactor::new(1.05, 0.97),
        MetricFamily::Shots | MetricFamily::ShotsOnTarget => HomeAwayFactor::new(1.06, 0.95),
        MetricFamily::YellowCards => HomeAwayFactor::new(0.95, 1.08),
        MetricFamily::Fouls => HomeAwayFactor::new(0.96, 1.05),
        MetricFamily::RedCards => HomeAwayFactor::NEUTRAL,
    }
}

pub fn default_line_step(family: MetricFamily) -> f64 {
    match family {
        MetricFamily::Shots | MetricFamily::Fouls => 2.0,
        _ => 1.0,
    }
}

pub fn default_fallback_cv(family: MetricFamily) -> f64 {
    match family {
        MetricFamily::YellowCards => 0.55,
        MetricFamily::Fouls => 0.40,
        MetricFamily::RedCards => 0.85,
        _ => 0.35,
    }
}

/// Engine tunables plus per-league calibration, as read from a TOML file:
///
/// ```toml
/// [engine]
/// shrinkage_strength = 4.0
///
/// [[leagues]]
/// name = "Premier League"
/// goals_mean_total = 2.80
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub leagues: Vec<LeagueParams>,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, ForecastError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.engine.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    /// Built-in leagues with any configured entries layered on top.
    pub fn league_table(&self) -> LeagueTable {
        LeagueTable::builtin().with_overrides(self.leagues.iter().cloned())
    }
}
