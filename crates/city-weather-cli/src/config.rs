use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::DEFAULT_CITY_ID;
use crate::providers::open_meteo::FORECAST_ENDPOINT;

pub const CITY_WEATHER_DATA_DIR_ENV: &str = "CITY_WEATHER_DATA_DIR";
pub const CITY_WEATHER_FORECAST_ENDPOINT_ENV: &str = "CITY_WEATHER_FORECAST_ENDPOINT";
pub const CITY_WEATHER_DEFAULT_CITY_ENV: &str = "CITY_WEATHER_DEFAULT_CITY";
pub const CITY_WEATHER_LOG_ENV: &str = "CITY_WEATHER_LOG";
const ALFRED_WORKFLOW_DATA_ENV: &str = "ALFRED_WORKFLOW_DATA";
const HOME_ENV: &str = "HOME";

pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub forecast_endpoint: String,
    pub default_city_id: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data_dir: resolve_data_dir(&map),
            forecast_endpoint: non_empty(&map, CITY_WEATHER_FORECAST_ENDPOINT_ENV)
                .unwrap_or(FORECAST_ENDPOINT)
                .to_string(),
            default_city_id: non_empty(&map, CITY_WEATHER_DEFAULT_CITY_ENV)
                .unwrap_or(DEFAULT_CITY_ID)
                .to_ascii_lowercase(),
        }
    }
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn resolve_data_dir(env_map: &HashMap<String, String>) -> PathBuf {
    let home = env_map.get(HOME_ENV).map(String::as_str);
    non_empty(env_map, CITY_WEATHER_DATA_DIR_ENV)
        .or_else(|| non_empty(env_map, ALFRED_WORKFLOW_DATA_ENV))
        .map(|value| expand_home_path(value, home))
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("city-weather-data"))
}

fn expand_home_path(raw: &str, home: Option<&str>) -> String {
    let trimmed = raw.trim();
    let Some(home) = home.map(str::trim).filter(|value| !value.is_empty()) else {
        return trimmed.to_string();
    };

    let home = home.trim_end_matches('/');
    let mut expanded = trimmed.replace("$HOME", home);

    if expanded == "~" {
        expanded = home.to_string();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{home}/{rest}");
    }

    expanded
}
