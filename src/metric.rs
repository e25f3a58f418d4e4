use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Goals,
    Corners,
    Shots,
    ShotsOnTarget,
    YellowCards,
    Fouls,
    RedCards,
}

impl MetricFamily {
    /// Families that get an expectancy and an Over/Under block in every forecast.
    pub const FORECAST: [MetricFamily; 6] = [
        MetricFamily::Goals,
        MetricFamily::Corners,
        MetricFamily::Shots,
        MetricFamily::ShotsOnTarget,
        MetricFamily::YellowCards,
        MetricFamily::Fouls,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricFamily::Goals => "Goals",
            MetricFamily::Corners => "Corners",
            MetricFamily::Shots => "Shots",
            MetricFamily::ShotsOnTarget => "Shots on Target",
            MetricFamily::YellowCards => "Yellow Cards",
            MetricFamily::Fouls => "Fouls",
            MetricFamily::RedCards => "Red Cards",
        }
    }

    /// Volume metrics are affected by fatigue; discipline metrics are not.
    pub fn is_volume(self) -> bool {
        matches!(
            self,
            MetricFamily::Goals
                | MetricFamily::Corners
                | MetricFamily::Shots
                | MetricFamily::ShotsOnTarget
        )
    }

    /// Whether the expectancy blends a team's "scored" sample with the
    /// opponent's "conceded" sample. Discipline metrics only use what the
    /// team itself committed.
    pub fn uses_conceded(self) -> bool {
        self.is_volume()
    }

    pub fn index(self) -> usize {
        match self {
            MetricFamily::Goals => 0,
            MetricFamily::Corners => 1,
            MetricFamily::Shots => 2,
            MetricFamily::ShotsOnTarget => 3,
            MetricFamily::YellowCards => 4,
            MetricFamily::Fouls => 5,
            MetricFamily::RedCards => 6,
        }
    }
}

/// One match's observed count for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    #[serde(default = "missing_value", deserialize_with = "deserialize_sample_value")]
    pub value: f64,
    #[serde(default, deserialize_with = "deserialize_sample_date")]
    pub date: Option<NaiveDate>,
}

impl MetricSample {
    pub fn new(value: f64, date: Option<NaiveDate>) -> Self {
        Self { value, date }
    }

    pub fn undated(value: f64) -> Self {
        Self { value, date: None }
    }

    pub fn is_usable(&self) -> bool {
        is_valid_count(self.value)
    }
}

pub fn is_valid_count(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Drops samples whose value is negative or not a number.
pub fn clean_samples(samples: &[MetricSample]) -> Vec<MetricSample> {
    samples.iter().copied().filter(|s| s.is_usable()).collect()
}

/// Reads a raw count from a provider payload. Numbers and numeric strings
/// are accepted; anything else (including negatives) is treated as missing.
pub fn parse_sample_value(raw: &Value) -> Option<f64> {
    let v = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_stat_cell(s)?,
        _ => return None,
    };
    is_valid_count(v).then_some(v)
}

pub fn parse_stat_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let s = s.trim_end_matches('%').replace(',', "");
    s.parse::<f64>().ok()
}

/// Accepts `YYYY-MM-DD` or an ISO timestamp; only the date part is kept.
pub fn parse_sample_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let day = s.split('T').next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn missing_value() -> f64 {
    f64::NAN
}

fn deserialize_sample_value<'de, D>(de: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(de)?;
    // Unreadable values become NaN so `clean_samples` drops them instead of
    // failing the whole payload.
    Ok(parse_sample_value(&raw).unwrap_or(f64::NAN))
}

fn deserialize_sample_date<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(de)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(parse_sample_date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_stat_cell_handles_percent_and_numbers() {
        assert_eq!(parse_stat_cell("58%").unwrap(), 58.0);
        assert_eq!(parse_stat_cell("1,204").unwrap(), 1204.0);
        assert_eq!(parse_stat_cell("14").unwrap(), 14.0);
        assert!(parse_stat_cell("-").is_none());
        assert!(parse_stat_cell("").is_none());
    }

    #[test]
    fn sample_values_reject_negative_and_garbage() {
        assert_eq!(parse_sample_value(&json!(3)), Some(3.0));
        assert_eq!(parse_sample_value(&json!("4.5")), Some(4.5));
        assert_eq!(parse_sample_value(&json!(-1)), None);
        assert_eq!(parse_sample_value(&json!("abc")), None);
        assert_eq!(parse_sample_value(&json!(null)), None);
    }

    #[test]
    fn sample_dates_accept_timestamps() {
        let d = parse_sample_date("2025-11-02T15:00:00Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 11, 2).unwrap());
        assert!(parse_sample_date("02/11/2025").is_none());
    }

    #[test]
    fn garbage_samples_are_filtered_after_deserialize() {
        let raw = r#"[{"value": 2, "date": "2025-10-01"}, {"value": "n/a"}, {"value": -3}]"#;
        let samples: Vec<MetricSample> = serde_json::from_str(raw).unwrap();
        assert_eq!(samples.len(), 3);
        let clean = clean_samples(&samples);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].value, 2.0);
        assert!(clean[0].date.is_some());
    }

    #[test]
    fn samples_without_a_value_are_filtered_not_rejected() {
        let raw = r#"[{"date": "2025-10-01"}, {"value": null}, {"value": 5, "date": "2025-10-08"}]"#;
        let samples: Vec<MetricSample> = serde_json::from_str(raw).unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples[0].value.is_nan());
        let clean = clean_samples(&samples);
        assert_eq!(clean.len(), 1);
        assert_eq!(clean[0].value, 5.0);
    }
}
