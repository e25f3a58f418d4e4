use std::path::PathBuf;

use statline::config::EngineConfig;
use statline::context::MandoFilter;
use statline::error::ForecastError;
use statline::expectancy::Adjustment;
use statline::forecast::{MatchInputs, compose_split_forecast, forecast_match, read_inputs};
use statline::insights::{InsightKind, build_insights};
use statline::league_params::LeagueTable;
use statline::metric::MetricFamily;
use statline::stability::Classification;

fn fixture() -> MatchInputs {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/match_input.json");
    read_inputs(&path).expect("fixture parses")
}

#[test]
fn fixture_forecast_is_complete_and_consistent() {
    let cfg = EngineConfig::default();
    let forecast = forecast_match(&fixture(), &LeagueTable::builtin(), &cfg).expect("forecast");

    assert_eq!(forecast.league, "Premier League");
    assert_eq!(forecast.home_team.as_deref(), Some("Riverside FC"));
    assert_eq!(forecast.families.len(), 6);

    for f in &forecast.families {
        let r = f.expectancy.result;
        assert!((r.total.value - ((r.home.value + r.away.value) * 10.0).round() / 10.0).abs() < 1e-9);
        for v in [r.home, r.away, r.total] {
            assert!((0.30..=0.95).contains(&v.confidence), "{:?}", f.family);
        }

        let ou = &f.over_under;
        assert!(ou.pred_min <= ou.mu_total && ou.mu_total <= ou.pred_max);
        assert!(!ou.lines.is_empty() && ou.lines.len() <= 4);
        assert!(ou.lines.windows(2).all(|w| w[0].line < w[1].line));
        assert!((0.30..=0.95).contains(&ou.confidence));
        for l in &ou.lines {
            assert!((l.over_prob + l.under_prob - 1.0).abs() < 1e-9);
            if let (Some(lo), Some(hi)) = (l.ci_lower, l.ci_upper) {
                assert!(lo <= l.over_prob && l.over_prob <= hi);
            }
        }
    }
}

#[test]
fn fixture_applies_context_adjustments() {
    let cfg = EngineConfig::default();
    let forecast = forecast_match(&fixture(), &LeagueTable::builtin(), &cfg).unwrap();

    let goals = forecast.family(MetricFamily::Goals).unwrap();
    for adj in [
        Adjustment::HomeAdvantage,
        Adjustment::Form,
        Adjustment::Standings,
        Adjustment::HeadToHead,
        Adjustment::Rest,
    ] {
        assert!(goals.expectancy.adjustments.contains(&adj), "{adj:?}");
    }

    let cards = forecast.family(MetricFamily::YellowCards).unwrap();
    assert!(cards.expectancy.adjustments.contains(&Adjustment::Referee));
    assert!(cards.seasonstats_fallback());
    assert!(!cards.expectancy.adjustments.contains(&Adjustment::Rest));

    let red = forecast.red_cards.as_ref().unwrap();
    assert_eq!(red.home.scored.classification, Classification::NotAvailable);
}

#[test]
fn same_inputs_same_forecast() {
    let cfg = EngineConfig::default();
    let table = LeagueTable::builtin();
    let inputs = fixture();
    let a = forecast_match(&inputs, &table, &cfg).unwrap();
    let b = forecast_match(&inputs, &table, &cfg).unwrap();
    assert_eq!(a, b);
}

#[test]
fn mando_filter_switches_off_home_advantage() {
    let cfg = EngineConfig::default();
    let mut inputs = fixture();
    inputs.context.home_mando = Some(MandoFilter::Home);
    let forecast = forecast_match(&inputs, &LeagueTable::builtin(), &cfg).unwrap();
    for f in &forecast.families {
        assert!(!f.expectancy.adjustments.contains(&Adjustment::HomeAdvantage));
    }
}

#[test]
fn empty_match_is_insufficient_data() {
    let err = forecast_match(&MatchInputs::default(), &LeagueTable::builtin(), &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { .. }));
}

#[test]
fn split_views_compose_into_one_forecast() {
    let cfg = EngineConfig::default();
    let table = LeagueTable::builtin();

    let mut home_view = fixture();
    home_view.context.home_mando = Some(MandoFilter::Home);
    let mut away_view = fixture();
    away_view.context.away_mando = Some(MandoFilter::Away);
    // Thinner away sample: the composed n must follow it.
    for samples in away_view.away.metrics.values_mut() {
        if let statline::forecast::SampleSource::Matches(v) = &mut samples.scored {
            v.truncate(4);
        }
        if let statline::forecast::SampleSource::Matches(v) = &mut samples.conceded {
            v.truncate(4);
        }
    }

    let h = forecast_match(&home_view, &table, &cfg).unwrap();
    let a = forecast_match(&away_view, &table, &cfg).unwrap();
    let league = table.lookup(h.competition.as_deref());
    let merged = compose_split_forecast(&h, &a, league, &cfg);

    assert_eq!(merged.families.len(), 6);
    let goals_h = h.family(MetricFamily::Goals).unwrap();
    let goals_a = a.family(MetricFamily::Goals).unwrap();
    let goals = merged.family(MetricFamily::Goals).unwrap();
    assert_eq!(goals.expectancy.lambda_home, goals_h.expectancy.lambda_home);
    assert_eq!(goals.expectancy.lambda_away, goals_a.expectancy.lambda_away);
    assert_eq!(goals.expectancy.n(), goals_h.expectancy.n_home.min(goals_a.expectancy.n_away));
    assert!(goals.expectancy.n() <= 4);
    assert!(goals.over_under.pred_min <= goals.over_under.mu_total);
}

#[test]
fn insights_rank_opportunities_first() {
    let cfg = EngineConfig::default();
    let forecast = forecast_match(&fixture(), &LeagueTable::builtin(), &cfg).unwrap();
    let insights = build_insights(&forecast);
    assert!(!insights.is_empty() && insights.len() <= 6);
    let first_avoid = insights
        .iter()
        .position(|i| i.kind == InsightKind::Avoid)
        .unwrap_or(insights.len());
    assert!(insights[first_avoid..].iter().all(|i| i.kind == InsightKind::Avoid));
    for pair in insights[..first_avoid].windows(2) {
        assert!(pair[0].adjusted_chance >= pair[1].adjusted_chance);
    }
    for i in &insights {
        assert!(i.adjusted_chance >= 0.5 && i.adjusted_chance <= 1.0);
    }
}
