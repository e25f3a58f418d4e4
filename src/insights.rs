use serde::{Deserialize, Serialize};

use crate::confidence::{ConfidenceLabel, adjusted_chance};
use crate::forecast::MatchForecast;
use crate::metric::MetricFamily;
use crate::over_under::{OverUnderLine, OverUnderResult};

const MAX_INSIGHTS: usize = 6;
const AVOID_UNCERTAINTY: f64 = 0.40;
const HIGH_UNCERTAINTY: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Opportunity,
    Avoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    Over,
    Under,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub family: MetricFamily,
    pub label: String,
    pub market: String,
    pub pick: Pick,
    pub line: f64,
    pub model_chance: f64,
    pub adjusted_chance: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub uncertainty: f64,
    pub reason: String,
}

/// Best line per family by adjusted chance, opportunities first.
pub fn build_insights(forecast: &MatchForecast) -> Vec<Insight> {
    let mut out: Vec<Insight> = forecast
        .families
        .iter()
        .filter_map(|f| family_insight(f.family, &f.over_under))
        .collect();

    out.sort_by(|a, b| {
        let rank = |k: InsightKind| matches!(k, InsightKind::Avoid) as u8;
        rank(a.kind)
            .cmp(&rank(b.kind))
            .then(b.adjusted_chance.total_cmp(&a.adjusted_chance))
    });
    out.truncate(MAX_INSIGHTS);
    out
}

fn family_insight(family: MetricFamily, ou: &OverUnderResult) -> Option<Insight> {
    let (line, pick, adjusted) = ou
        .lines
        .iter()
        .map(|l| {
            let over = adjusted_chance(l.over_prob, ou.confidence, l.uncertainty);
            if over >= 1.0 - over {
                (l, Pick::Over, over)
            } else {
                (l, Pick::Under, 1.0 - over)
            }
        })
        .max_by(|a, b| a.2.total_cmp(&b.2))?;

    let kind = if ou.confidence_label == ConfidenceLabel::Low || line.uncertainty >= AVOID_UNCERTAINTY {
        InsightKind::Avoid
    } else {
        InsightKind::Opportunity
    };
    let side = match pick {
        Pick::Over => "Over",
        Pick::Under => "Under",
    };

    Some(Insight {
        kind,
        family,
        label: family.label().to_string(),
        market: format!("{side} {}", line.line),
        pick,
        line: line.line,
        model_chance: line.over_prob.max(line.under_prob),
        adjusted_chance: adjusted,
        confidence: ou.confidence,
        confidence_label: ou.confidence_label,
        uncertainty: line.uncertainty,
        reason: reason(ou.confidence_label, line).to_string(),
    })
}

fn reason(label: ConfidenceLabel, line: &OverUnderLine) -> &'static str {
    let uncertain = line.uncertainty >= HIGH_UNCERTAINTY;
    match (label, uncertain) {
        (ConfidenceLabel::High, _) => "High model confidence for this statistic.",
        (ConfidenceLabel::Medium, true) => "Medium confidence, but the line carries high uncertainty.",
        (ConfidenceLabel::Medium, false) => "Medium confidence; size stakes accordingly.",
        (ConfidenceLabel::Low, true) => "Low confidence and high uncertainty: avoid.",
        (ConfidenceLabel::Low, false) => "Low model confidence: avoid.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::distribution::DistributionSpec;
    use crate::forecast::{FamilyForecast, StabilityReport};
    use crate::expectancy::{Expectancy, ExpectancyResult, PredictionValue, SideStats};
    use crate::stability::WeightedStat;

    fn line(line: f64, over: f64, uncertainty: f64) -> OverUnderLine {
        OverUnderLine {
            line,
            over_prob: over,
            under_prob: 1.0 - over,
            ci_lower: None,
            ci_upper: None,
            uncertainty,
        }
    }

    fn family(family: MetricFamily, confidence: f64, label: ConfidenceLabel, lines: Vec<OverUnderLine>) -> FamilyForecast {
        let stat = WeightedStat::not_available(1.0, 0);
        let side = SideStats {
            scored: stat,
            conceded: stat,
        };
        let pv = PredictionValue {
            value: 1.0,
            confidence,
            confidence_label: label,
        };
        FamilyForecast {
            family,
            stability: StabilityReport { home: side, away: side },
            expectancy: Expectancy {
                family,
                result: ExpectancyResult {
                    home: pv,
                    away: pv,
                    total: pv,
                },
                lambda_home: 1.0,
                lambda_away: 1.0,
                cv_home: 0.3,
                cv_away: 0.3,
                n_home: 10,
                n_away: 10,
                adjustments: Vec::new(),
            },
            over_under: OverUnderResult {
                family,
                mu_total: 2.0,
                lambda_home: 1.0,
                lambda_away: 1.0,
                pred_min: 1.0,
                pred_max: 3.0,
                interval_level: EngineConfig::default().simulation.interval_level,
                distribution: DistributionSpec::goals(1.0, 1.0, 0.0),
                lines,
                confidence,
                confidence_label: label,
            },
        }
    }

    fn forecast(families: Vec<FamilyForecast>) -> MatchForecast {
        MatchForecast {
            competition: None,
            league: "default".into(),
            as_of: None,
            home_team: None,
            away_team: None,
            families,
            red_cards: None,
        }
    }

    #[test]
    fn picks_the_strongest_side_of_the_best_line() {
        let f = forecast(vec![family(
            MetricFamily::Goals,
            0.8,
            ConfidenceLabel::High,
            vec![line(1.5, 0.75, 0.1), line(2.5, 0.52, 0.1), line(3.5, 0.15, 0.1)],
        )]);
        let insights = build_insights(&f);
        assert_eq!(insights.len(), 1);
        let i = &insights[0];
        assert_eq!(i.pick, Pick::Under);
        assert_eq!(i.line, 3.5);
        assert_eq!(i.market, "Under 3.5");
        assert_eq!(i.label, "Goals");
        assert_eq!(i.kind, InsightKind::Opportunity);
        assert!((i.model_chance - 0.85).abs() < 1e-12);
        assert!((i.adjusted_chance - (0.5 + 0.35 * 0.8 * 0.9)).abs() < 1e-12);
    }

    #[test]
    fn low_confidence_or_wide_interval_is_avoid() {
        let f = forecast(vec![
            family(MetricFamily::Corners, 0.35, ConfidenceLabel::Low, vec![line(9.5, 0.6, 0.1)]),
            family(MetricFamily::Shots, 0.8, ConfidenceLabel::High, vec![line(23.0, 0.6, 0.45)]),
            family(MetricFamily::Fouls, 0.6, ConfidenceLabel::Medium, vec![line(23.0, 0.58, 0.1)]),
        ]);
        let insights = build_insights(&f);
        assert_eq!(insights[0].family, MetricFamily::Fouls);
        assert_eq!(insights[0].kind, InsightKind::Opportunity);
        assert!(insights[1..].iter().all(|i| i.kind == InsightKind::Avoid));
    }

    #[test]
    fn families_without_lines_are_skipped() {
        let f = forecast(vec![family(MetricFamily::Goals, 0.8, ConfidenceLabel::High, Vec::new())]);
        assert!(build_insights(&f).is_empty());
    }
}
