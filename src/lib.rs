pub mod confidence;
pub mod config;
pub mod context;
pub mod decay;
pub mod distribution;
pub mod error;
pub mod expectancy;
pub mod forecast;
pub mod insights;
pub mod league_params;
pub mod lines;
pub mod metric;
pub mod over_under;
pub mod shrinkage;
pub mod stability;
pub mod uncertainty;

pub use config::{EngineConfig, Settings};
pub use error::ForecastError;
pub use forecast::{MatchForecast, MatchInputs, compose_split_forecast, forecast_match};
