use statline::config::{EngineConfig, Settings};
use statline::confidence::confidence_from_cv;
use statline::distribution::{DistributionSpec, dc_tau, over_prob_goals_dc, poisson_pmf, score_prob_dc};
use statline::lines::generate_lines;
use statline::metric::MetricFamily;
use statline::over_under::over_under_from_spec;
use statline::shrinkage::shrink;
use statline::stability::{Classification, weighted_stat};

#[test]
fn flat_series_is_fully_stable() {
    let s = weighted_stat(&[2.0, 2.0, 2.0, 2.0, 2.0], None, MetricFamily::Goals, &EngineConfig::default());
    assert_eq!(s.mean, 2.0);
    assert_eq!(s.cv, 0.0);
    assert_eq!(s.classification, Classification::VeryStable);
    assert_eq!(s.stability_pct, 100);
}

#[test]
fn thin_or_empty_series_is_not_available() {
    let cfg = EngineConfig::default();
    for values in [&[][..], &[4.0][..], &[0.0, 0.0, 0.0][..]] {
        let s = weighted_stat(values, None, MetricFamily::Corners, &cfg);
        assert_eq!(s.classification, Classification::NotAvailable);
        assert_eq!(s.cv, 1.0);
        assert_eq!(s.stability_pct, 0);
    }
}

#[test]
fn shrinkage_limits() {
    assert_eq!(shrink(3.4, 0, 1.35, 3.0), 1.35);
    assert!((shrink(3.4, 1000, 1.35, 3.0) - 3.4).abs() < 0.01);
}

#[test]
fn zero_rho_is_independent_poisson() {
    for h in 0..6 {
        for a in 0..6 {
            assert_eq!(dc_tau(h, a, 1.4, 1.1, 0.0), 1.0);
            let p = score_prob_dc(h, a, 1.4, 1.1, 0.0);
            assert!((p - poisson_pmf(h, 1.4) * poisson_pmf(a, 1.1)).abs() < 1e-15);
        }
    }
    // Outside the four corrected cells tau is 1 for any rho.
    assert_eq!(dc_tau(2, 0, 1.4, 1.1, -0.13), 1.0);
    assert_eq!(dc_tau(1, 2, 1.4, 1.1, -0.13), 1.0);
}

#[test]
fn goals_scenario_over_probabilities_are_monotonic() {
    let cfg = EngineConfig::default();
    let spec = DistributionSpec::goals(1.8, 1.0, -0.13);
    let r = over_under_from_spec(MetricFamily::Goals, spec, 0.45, 10, &cfg);
    assert!((r.mu_total - 2.8).abs() < 1e-9);
    assert!(r.lines.iter().any(|l| l.line == 2.5));

    let over = |line| over_prob_goals_dc(line, 1.8, 1.0, -0.13);
    let under_15 = 1.0 - over(1.5);
    let under_35 = 1.0 - over(3.5);
    assert!(under_15 < over(2.5) && over(2.5) < under_35);
    assert!(over(1.5) > over(2.5) && over(2.5) > over(3.5));
}

#[test]
fn prediction_interval_widens_as_n_falls() {
    let cfg = EngineConfig::default();
    let spec = DistributionSpec::negative_binomial(5.3, 4.4, 0.3, 0.35);
    let widths: Vec<f64> = [30, 15, 8, 4, 2]
        .iter()
        .map(|n| {
            let r = over_under_from_spec(MetricFamily::Corners, spec, 0.325, *n, &cfg);
            r.pred_max - r.pred_min
        })
        .collect();
    assert!(widths.windows(2).all(|w| w[0] < w[1]), "{widths:?}");
}

#[test]
fn confidence_never_leaves_its_band() {
    let cfg = EngineConfig::default();
    for cv in [0.0, 0.05, 0.3, 0.9, 3.0, f64::INFINITY] {
        for n in [0, 2, 6, 12, 50] {
            let c = confidence_from_cv(cv, n, &cfg.confidence);
            assert!((0.30..=0.95).contains(&c));
        }
    }
}

#[test]
fn lines_never_go_below_half_step() {
    for family in MetricFamily::FORECAST {
        let step = EngineConfig::default().line_step(family);
        let lines = generate_lines(0.05, step, 4);
        assert!(lines.iter().all(|l| *l >= step / 2.0));
    }
}

#[test]
fn config_file_overrides_leagues_and_engine() {
    let raw = r#"
        [engine]
        decay_rate = 0.01

        [engine.simulation]
        draws = 800
        seed = 99

        [[leagues]]
        name = "Eredivisie"
        goals_mean_total = 3.15
        dc_rho = -0.08

        [[leagues]]
        name = "default"
        goals_mean_total = 2.6
    "#;
    let settings = Settings::from_toml_str(raw).unwrap();
    assert_eq!(settings.engine.decay_rate, 0.01);
    assert_eq!(settings.engine.simulation.draws, 800);
    assert_eq!(settings.engine.simulation.seed, 99);

    let table = settings.league_table();
    let ere = table.lookup(Some("Eredivisie 2025/26"));
    assert_eq!(ere.goals_mean_total, 3.15);
    assert_eq!(ere.corners_mean_total, 9.5);
    assert_eq!(table.lookup(Some("Some Cup")).goals_mean_total, 2.6);
}
