use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormResult {
    #[serde(rename = "W", alias = "w")]
    Win,
    #[serde(rename = "D", alias = "d")]
    Draw,
    #[serde(rename = "L", alias = "l")]
    Loss,
}

impl FormResult {
    pub fn points(self) -> u32 {
        match self {
            FormResult::Win => 3,
            FormResult::Draw => 1,
            FormResult::Loss => 0,
        }
    }
}

/// Parses "WDLWW" or "W,D,L". Unknown characters are skipped.
pub fn parse_form(raw: &str) -> Vec<FormResult> {
    raw.chars()
        .filter_map(|c| match c.to_ascii_uppercase() {
            'W' => Some(FormResult::Win),
            'D' => Some(FormResult::Draw),
            'L' => Some(FormResult::Loss),
            _ => None,
        })
        .collect()
}

/// Home/away sub-filter applied upstream to a team's sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandoFilter {
    Home,
    Away,
}

/// Pre-match context for one team. Every field is optional; a missing field
/// only skips the adjustment that needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamContext {
    pub rest_days: Option<i64>,
    pub matches_7d: Option<u32>,
    pub matches_14d: Option<u32>,
    pub table_position: Option<u32>,
    /// Most recent first. Accepts `"WDLWW"` or `["W", "D", ...]`.
    #[serde(deserialize_with = "deserialize_form")]
    pub recent_form: Vec<FormResult>,
}

impl TeamContext {
    /// Fills rest fields that were not supplied explicitly.
    pub fn with_rest(mut self, rest: RestContext) -> Self {
        self.rest_days = self.rest_days.or(rest.rest_days);
        self.matches_7d = self.matches_7d.or(rest.matches_7d);
        self.matches_14d = self.matches_14d.or(rest.matches_14d);
        self
    }
}

fn deserialize_form<'de, D>(de: D) -> Result<Vec<FormResult>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(de)? {
        Value::String(s) => parse_form(&s),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .flat_map(parse_form)
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefereeStats {
    pub matches: u32,
    pub avg_yellow_cards: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub total_matches: u32,
    pub avg_goals_per_match: f64,
    #[serde(default)]
    pub home_wins: u32,
    #[serde(default)]
    pub away_wins: u32,
    #[serde(default)]
    pub draws: u32,
}

impl HeadToHead {
    /// Summary of previous meetings; `None` when the teams never met.
    pub fn from_counts(home_wins: u32, away_wins: u32, draws: u32, home_goals: u32, away_goals: u32) -> Option<Self> {
        let total = home_wins + away_wins + draws;
        if total == 0 {
            return None;
        }
        Some(Self {
            total_matches: total,
            avg_goals_per_match: (home_goals + away_goals) as f64 / total as f64,
            home_wins,
            away_wins,
            draws,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchContext {
    pub home: TeamContext,
    pub away: TeamContext,
    pub head_to_head: Option<HeadToHead>,
    pub referee: Option<RefereeStats>,
    pub home_mando: Option<MandoFilter>,
    pub away_mando: Option<MandoFilter>,
}

impl MatchContext {
    /// A filtered sample already carries the home/away bias, so the
    /// home-advantage multiplier must not be applied on top of it.
    pub fn home_advantage_applies(&self) -> bool {
        self.home_mando.is_none() && self.away_mando.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestContext {
    pub rest_days: Option<i64>,
    pub matches_7d: Option<u32>,
    pub matches_14d: Option<u32>,
}

/// Days since the last match before `match_date` and the number of matches
/// played in the 7 and 14 days before it (window `[match_date - n, match_date)`).
pub fn compute_rest_context(played: &[NaiveDate], match_date: NaiveDate) -> RestContext {
    let mut before: Vec<NaiveDate> = played.iter().copied().filter(|d| *d < match_date).collect();
    if before.is_empty() {
        return RestContext::default();
    }
    before.sort_unstable_by(|a, b| b.cmp(a));
    let last = before[0];

    let count_window = |days: i64| -> u32 {
        before
            .iter()
            .filter(|d| (match_date - **d).num_days() <= days)
            .count() as u32
    };

    RestContext {
        rest_days: Some((match_date - last).num_days().max(0)),
        matches_7d: Some(count_window(7)),
        matches_14d: Some(count_window(14)),
    }
}
