use std::env;
use std::path::PathBuf;

use crate::models::Units;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: String,
    pub language: String,
    pub units: Units,
    pub geoip_base_url: String,
    pub geolocation_enabled: bool,
    pub storage_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            api_base_url: env::var("WEATHER_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org/data/2.5".to_string()),
            api_key: env::var("WEATHER_API_KEY")?,
            language: env::var("WEATHER_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            units: env::var("WEATHER_UNITS")
                .unwrap_or_else(|_| "metric".to_string())
                .parse()
                .unwrap_or(Units::Metric),
            geoip_base_url: env::var("GEOIP_BASE_URL")
                .unwrap_or_else(|_| "http://ip-api.com".to_string()),
            geolocation_enabled: env::var("GEOLOCATION_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            storage_dir: env::var("WEATHER_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_storage_dir()),
        })
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weather-tracker")
}
