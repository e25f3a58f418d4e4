use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::info;

use statline::config::Settings;
use statline::forecast::{MatchForecast, forecast_match, read_inputs};
use statline::insights::{Insight, build_insights};
use statline::league_params::{CompletedMatch, LeagueTable, fit_league_params};

const USAGE: &str = "usage: statline <match.json> [--config <path>]\n       statline --fit-league <results.json> --league <name> [--config <path>]";

// Flags that take a value; their values are not positional arguments.
const VALUE_FLAGS: [&str; 3] = ["--config", "--fit-league", "--league"];

#[derive(Serialize)]
struct Payload {
    forecast: MatchForecast,
    insights: Vec<Insight>,
}

#[derive(Serialize)]
struct FittedLeagues {
    leagues: Vec<statline::league_params::LeagueParams>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings()?;
    let table = settings.league_table();

    if let Some(results) = parse_path_arg("--fit-league") {
        let league = parse_string_arg("--league").context("--fit-league needs --league <name>")?;
        return fit_league(&results, &league, &table);
    }

    let input = positional_arg().ok_or_else(|| anyhow!(USAGE))?;
    let inputs = read_inputs(&input).with_context(|| format!("read match inputs {}", input.display()))?;
    let forecast = forecast_match(&inputs, &table, &settings.engine)?;
    info!(
        league = %forecast.league,
        families = forecast.families.len(),
        "forecast ready"
    );

    let insights = build_insights(&forecast);
    println!("{}", serde_json::to_string_pretty(&Payload { forecast, insights })?);
    Ok(())
}

fn load_settings() -> Result<Settings> {
    let path = parse_path_arg("--config").or_else(|| {
        std::env::var("STATLINE_CONFIG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    });
    match path {
        Some(path) => {
            info!(config = %path.display(), "loading config");
            Settings::load(&path)
        }
        None => Ok(Settings::default()),
    }
}

/// Refits one league from finished results and prints it as a `[[leagues]]`
/// entry ready to paste into a config file.
fn fit_league(results: &Path, league: &str, table: &LeagueTable) -> Result<()> {
    let raw = fs::read_to_string(results).with_context(|| format!("read results {}", results.display()))?;
    let matches: Vec<CompletedMatch> = serde_json::from_str(&raw).context("parse results")?;

    let mut base = table.lookup(Some(league)).clone();
    if base.name == table.default.name {
        base.name = league.to_string();
    }
    let fitted = fit_league_params(&base, &matches);
    info!(
        league = %fitted.name,
        matches = fitted.sample_matches,
        goals = fitted.goals_mean_total,
        rho = fitted.dc_rho,
        "league refit"
    );

    print!("{}", toml::to_string(&FittedLeagues { leagues: vec![fitted] })?);
    Ok(())
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_string_arg(name).map(PathBuf::from)
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}="))
            && !raw.trim().is_empty()
        {
            return Some(raw.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn positional_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}
