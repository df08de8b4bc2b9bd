use crate::errors::ConfigError;
use crate::streak::DEFAULT_BADGE_THRESHOLDS;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_PATH: &str = "data/store.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub badge_thresholds: Vec<u32>,
}

impl Config {
    /// Reads `PORT`, `HABIT_DATA_PATH` and `HABIT_BADGE_THRESHOLDS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let data_path = lookup("HABIT_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));

        let badge_thresholds = match lookup("HABIT_BADGE_THRESHOLDS") {
            Some(raw) => parse_thresholds(&raw)?,
            None => DEFAULT_BADGE_THRESHOLDS.to_vec(),
        };

        Ok(Self {
            port,
            data_path,
            badge_thresholds,
        })
    }
}

pub fn parse_thresholds(raw: &str) -> Result<Vec<u32>, ConfigError> {
    let mut thresholds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.parse::<u32>() {
            Ok(value) if value > 0 => thresholds.push(value),
            _ => return Err(ConfigError::InvalidThreshold(part.to_string())),
        }
    }
    if thresholds.is_empty() {
        return Err(ConfigError::NoThresholds);
    }
    Ok(thresholds)
}
