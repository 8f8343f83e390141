//! Per-widget weather fetch lifecycle.
//!
//! `Idle -> Loading -> {Success | Failure}`, re-entering `Loading` for every
//! new target. Each `begin` hands out a [`FetchTicket`] stamped with the
//! panel's generation; `complete` only applies a result whose ticket is
//! still current, so a late answer for a previous city is dropped.

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::City;
use crate::providers::{CurrentConditions, ProviderError, WeatherApi};

pub const UNAVAILABLE_REASON: &str = "weather unavailable";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub temperature_celsius: f64,
    pub weather_code: i32,
    pub fetched_for_city_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchState {
    Idle,
    Loading { city_id: String },
    Success(WeatherSnapshot),
    Failure { city_id: String, reason: String },
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading { .. } => "loading",
            Self::Success(_) => "success",
            Self::Failure { .. } => "failure",
        }
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            Self::Success(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Handle for one in-flight request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub generation: u64,
    pub city_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPanel {
    generation: u64,
    state: FetchState,
}

impl Default for WeatherPanel {
    fn default() -> Self {
        Self {
            generation: 0,
            state: FetchState::Idle,
        }
    }
}

impl WeatherPanel {
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a fetch for `city`, invalidating any earlier ticket.
    pub fn begin(&mut self, city: &City) -> FetchTicket {
        self.generation = self.generation.wrapping_add(1);
        self.state = FetchState::Loading {
            city_id: city.id.to_string(),
        };

        FetchTicket {
            generation: self.generation,
            city_id: city.id.to_string(),
            latitude: city.latitude,
            longitude: city.longitude,
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Apply the outcome of `ticket`'s request. Returns `false` when the
    /// ticket is stale and the state was left untouched.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: Result<CurrentConditions, ProviderError>,
    ) -> bool {
        if !self.is_current(ticket) {
            debug!(
                city_id = %ticket.city_id,
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "discarding stale weather result"
            );
            return false;
        }

        self.state = match result {
            Ok(current) => FetchState::Success(WeatherSnapshot {
                temperature_celsius: current.temperature_c,
                weather_code: current.weather_code,
                fetched_for_city_id: ticket.city_id.clone(),
            }),
            Err(error) => {
                warn!(city_id = %ticket.city_id, %error, "weather fetch failed");
                FetchState::Failure {
                    city_id: ticket.city_id.clone(),
                    reason: UNAVAILABLE_REASON.to_string(),
                }
            }
        };
        true
    }

    /// Drop the display state and orphan any in-flight ticket.
    pub fn teardown(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.state = FetchState::Idle;
    }
}

/// Run the provider call for `ticket`.
pub fn run_ticket<A: WeatherApi + ?Sized>(
    api: &A,
    ticket: &FetchTicket,
) -> Result<CurrentConditions, ProviderError> {
    debug!(
        city_id = %ticket.city_id,
        lat = ticket.latitude,
        lon = ticket.longitude,
        "fetching current weather"
    );
    api.fetch_current(ticket.latitude, ticket.longitude)
}

/// One full fetch cycle for `city` on `panel`.
pub fn fetch_weather<'p, A: WeatherApi + ?Sized>(
    api: &A,
    panel: &'p mut WeatherPanel,
    city: &City,
) -> &'p FetchState {
    let ticket = panel.begin(city);
    let result = run_ticket(api, &ticket);
    panel.complete(&ticket, result);
    panel.state()
}
