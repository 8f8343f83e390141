//! Application state and its update function.
//!
//! `App` is the single owner of everything the display needs. Callers
//! send [`Message`]s; `update` mutates the state and returns the side
//! effects to run, keeping I/O out of the state transitions. [`Dispatcher`]
//! runs those effects and feeds their results back in as messages.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::catalog::{City, CityCatalog};
use crate::fetch::{FetchState, FetchTicket, WeatherPanel, run_ticket};
use crate::filter::filter_cities;
use crate::providers::{CurrentConditions, ProviderError, WeatherApi};
use crate::storage::CityPreference;

/// Accent colors cycled by [`Message::CycleAccent`].
pub const ACCENT_PALETTE: &[&str] = &["#646cff", "#e8590c", "#2f9e44", "#d6336c", "#1c7ed6"];

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The display became visible; fetch for the selected city.
    Mount,
    /// The display went away; in-flight results must not land.
    Unmount,
    SelectCity(String),
    FilterChanged(String),
    CycleAccent,
    WeatherDidLoad {
        ticket: FetchTicket,
        result: Result<CurrentConditions, ProviderError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchWeather(FetchTicket),
    PersistSelection(String),
}

#[derive(Debug, Clone)]
pub struct App {
    catalog: CityCatalog,
    selected: &'static City,
    query: String,
    accent_index: usize,
    panel: WeatherPanel,
}

impl App {
    pub fn new(catalog: CityCatalog, selected: &'static City) -> Self {
        Self {
            catalog,
            selected,
            query: String::new(),
            accent_index: 0,
            panel: WeatherPanel::default(),
        }
    }

    /// Startup: selected city comes from the saved preference or the default.
    pub fn start(catalog: CityCatalog, preference: &CityPreference<'_>) -> Self {
        let selected = catalog.resolve_selected_city(preference);
        Self::new(catalog, selected)
    }

    pub fn catalog(&self) -> &CityCatalog {
        &self.catalog
    }

    pub fn selected_city(&self) -> &'static City {
        self.selected
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn weather(&self) -> &FetchState {
        self.panel.state()
    }

    pub fn accent(&self) -> &'static str {
        ACCENT_PALETTE[self.accent_index % ACCENT_PALETTE.len()]
    }

    pub fn visible_cities(&self) -> Vec<&'static City> {
        filter_cities(self.catalog.cities(), &self.query)
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match message {
            Message::Mount => vec![Effect::FetchWeather(self.panel.begin(self.selected))],
            Message::Unmount => {
                self.panel.teardown();
                Vec::new()
            }
            Message::SelectCity(id) => {
                let Some(city) = self.catalog.find_by_id(&id) else {
                    warn!(city_id = %id, "ignoring selection of unknown city");
                    return Vec::new();
                };

                let mut effects = vec![Effect::PersistSelection(city.id.to_string())];
                let changed = city.id != self.selected.id;
                self.selected = city;
                if changed || matches!(self.panel.state(), FetchState::Idle) {
                    effects.push(Effect::FetchWeather(self.panel.begin(city)));
                }
                effects
            }
            Message::FilterChanged(query) => {
                self.query = query;
                Vec::new()
            }
            Message::CycleAccent => {
                self.accent_index = (self.accent_index + 1) % ACCENT_PALETTE.len();
                Vec::new()
            }
            Message::WeatherDidLoad { ticket, result } => {
                self.panel.complete(&ticket, result);
                Vec::new()
            }
        }
    }
}

/// Runs effects against the weather provider and the saved preference.
pub struct Dispatcher<'a> {
    api: &'a dyn WeatherApi,
    preference: CityPreference<'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(api: &'a dyn WeatherApi, preference: CityPreference<'a>) -> Self {
        Self { api, preference }
    }

    /// Apply `message` and every effect it causes, in order.
    pub fn dispatch(&self, app: &mut App, message: Message) {
        let mut queue: VecDeque<Effect> = app.update(message).into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::PersistSelection(city_id) => {
                    if !self.preference.save(&city_id) {
                        debug!(%city_id, "selection kept in memory only");
                    }
                }
                Effect::FetchWeather(ticket) => {
                    let result = run_ticket(self.api, &ticket);
                    queue.extend(app.update(Message::WeatherDidLoad { ticket, result }));
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("preference", &self.preference)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::storage::{MemoryStore, StorageError};

    fn conditions(temperature_c: f64, weather_code: i32) -> CurrentConditions {
        CurrentConditions {
            temperature_c,
            weather_code,
            fetched_at: Utc
                .with_ymd_and_hms(2026, 10, 16, 9, 0, 0)
                .single()
                .expect("time"),
        }
    }

    fn app_at(id: &str) -> App {
        let catalog = CityCatalog::default();
        App::new(catalog, catalog.find_by_id(id).expect("city"))
    }

    fn fetch_ticket(effects: &[Effect]) -> FetchTicket {
        effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchWeather(ticket) => Some(ticket.clone()),
                Effect::PersistSelection(_) => None,
            })
            .expect("fetch effect")
    }

    /// Answers by latitude and records every call.
    #[derive(Default)]
    struct RecordingApi {
        calls: RefCell<Vec<(f64, f64)>>,
    }

    impl WeatherApi for RecordingApi {
        fn fetch_current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, ProviderError> {
            self.calls.borrow_mut().push((lat, lon));
            Ok(conditions(lat.round(), 2))
        }
    }

    struct DownApi;

    impl WeatherApi for DownApi {
        fn fetch_current(&self, _lat: f64, _lon: f64) -> Result<CurrentConditions, ProviderError> {
            Err(ProviderError::Http {
                status: 503,
                message: "maintenance".to_string(),
            })
        }
    }

    #[test]
    fn start_resolves_saved_city() {
        let store = MemoryStore::default();
        let preference = CityPreference::new(&store);
        assert!(preference.save("berlin"));

        let app = App::start(CityCatalog::default(), &preference);
        assert_eq!(app.selected_city().id, "berlin");
        assert_eq!(app.weather(), &FetchState::Idle);
    }

    #[test]
    fn start_uses_default_when_storage_is_broken() {
        let store = MemoryStore::failing(StorageError::Unavailable("disabled".to_string()));
        let app = App::start(CityCatalog::default(), &CityPreference::new(&store));
        assert_eq!(app.selected_city().id, "geneva");
    }

    #[test]
    fn mount_enters_loading_and_requests_fetch() {
        let mut app = app_at("paris");
        let effects = app.update(Message::Mount);

        let ticket = fetch_ticket(&effects);
        assert_eq!(ticket.city_id, "paris");
        assert_eq!(app.weather().as_str(), "loading");
    }

    #[test]
    fn select_city_persists_and_refetches() {
        let mut app = app_at("paris");
        app.update(Message::Mount);

        let effects = app.update(Message::SelectCity("tokyo".to_string()));
        assert_eq!(effects[0], Effect::PersistSelection("tokyo".to_string()));
        assert_eq!(fetch_ticket(&effects).city_id, "tokyo");
        assert_eq!(app.selected_city().id, "tokyo");
    }

    #[test]
    fn select_unknown_city_is_ignored() {
        let mut app = app_at("paris");
        let effects = app.update(Message::SelectCity("atlantis".to_string()));

        assert!(effects.is_empty());
        assert_eq!(app.selected_city().id, "paris");
    }

    #[test]
    fn reselecting_current_city_persists_without_refetch() {
        let mut app = app_at("paris");
        let ticket = fetch_ticket(&app.update(Message::Mount));
        app.update(Message::WeatherDidLoad {
            ticket,
            result: Ok(conditions(18.0, 0)),
        });

        let effects = app.update(Message::SelectCity("paris".to_string()));
        assert_eq!(effects, vec![Effect::PersistSelection("paris".to_string())]);
        assert_eq!(app.weather().as_str(), "success");
    }

    #[test]
    fn late_result_for_previous_city_keeps_new_city_snapshot() {
        let mut app = app_at("london");
        let ticket_a = fetch_ticket(&app.update(Message::Mount));
        let ticket_b = fetch_ticket(&app.update(Message::SelectCity("sydney".to_string())));

        app.update(Message::WeatherDidLoad {
            ticket: ticket_b,
            result: Ok(conditions(24.0, 1)),
        });
        app.update(Message::WeatherDidLoad {
            ticket: ticket_a,
            result: Ok(conditions(8.0, 63)),
        });

        let snapshot = app.weather().snapshot().expect("snapshot");
        assert_eq!(snapshot.fetched_for_city_id, "sydney");
        assert_eq!(snapshot.fetched_for_city_id, app.selected_city().id);
        assert_eq!(snapshot.weather_code, 1);
    }

    #[test]
    fn unmount_discards_in_flight_result() {
        let mut app = app_at("cairo");
        let ticket = fetch_ticket(&app.update(Message::Mount));
        app.update(Message::Unmount);
        app.update(Message::WeatherDidLoad {
            ticket,
            result: Ok(conditions(31.0, 0)),
        });

        assert_eq!(app.weather(), &FetchState::Idle);
    }

    #[test]
    fn filter_changes_visible_cities_only() {
        let mut app = app_at("paris");
        app.update(Message::FilterChanged("AUSTRALIA".to_string()));

        let ids: Vec<&str> = app.visible_cities().iter().map(|city| city.id).collect();
        assert_eq!(ids, vec!["melbourne", "sydney"]);
        assert_eq!(app.selected_city().id, "paris");

        app.update(Message::FilterChanged(String::new()));
        assert_eq!(app.visible_cities().len(), app.catalog().cities().len());
    }

    #[test]
    fn accent_cycles_through_palette() {
        let mut app = app_at("paris");
        let first = app.accent();
        for _ in 0..ACCENT_PALETTE.len() {
            app.update(Message::CycleAccent);
        }
        assert_eq!(app.accent(), first);

        app.update(Message::CycleAccent);
        assert_eq!(app.accent(), ACCENT_PALETTE[1]);
    }

    #[test]
    fn dispatcher_runs_fetch_and_persist_effects() {
        let store = MemoryStore::default();
        let api = RecordingApi::default();
        let dispatcher = Dispatcher::new(&api, CityPreference::new(&store));
        let mut app = app_at("paris");

        dispatcher.dispatch(&mut app, Message::Mount);
        dispatcher.dispatch(&mut app, Message::SelectCity("singapore".to_string()));

        assert_eq!(api.calls.borrow().len(), 2);
        assert_eq!(
            CityPreference::new(&store).load(),
            Some("singapore".to_string())
        );
        let snapshot = app.weather().snapshot().expect("snapshot");
        assert_eq!(snapshot.fetched_for_city_id, "singapore");
        assert_eq!(snapshot.temperature_celsius, 1.0);
    }

    #[test]
    fn dispatcher_reports_generic_failure_and_survives_storage_errors() {
        let store = MemoryStore::failing(StorageError::QuotaExceeded("full".to_string()));
        let dispatcher = Dispatcher::new(&DownApi, CityPreference::new(&store));
        let mut app = app_at("paris");

        dispatcher.dispatch(&mut app, Message::SelectCity("rome".to_string()));

        assert_eq!(
            app.weather(),
            &FetchState::Failure {
                city_id: "rome".to_string(),
                reason: "weather unavailable".to_string(),
            }
        );
        assert_eq!(app.selected_city().id, "rome");
    }
}
