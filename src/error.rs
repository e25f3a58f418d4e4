use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("insufficient data: home has {home_samples} usable samples, away has {away_samples}")]
    InsufficientData {
        home_samples: usize,
        away_samples: usize,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
