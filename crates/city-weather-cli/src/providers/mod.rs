use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use thiserror::Error;

pub mod open_meteo;

/// Current conditions as reported by a forecast provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub weather_code: i32,
    pub fetched_at: DateTime<Utc>,
}

pub trait WeatherApi {
    fn fetch_current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpWeatherApi {
    client: Client,
    endpoint: String,
}

impl HttpWeatherApi {
    /// Client against `endpoint`, keeping the transport's default timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl WeatherApi for HttpWeatherApi {
    fn fetch_current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, ProviderError> {
        open_meteo::fetch_current(&self.client, &self.endpoint, lat, lon)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
