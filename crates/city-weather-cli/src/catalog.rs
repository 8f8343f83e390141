use serde::Serialize;
use tracing::debug;

use crate::storage::CityPreference;

pub const DEFAULT_CITY_ID: &str = "geneva";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct City {
    pub id: &'static str,
    pub name: &'static str,
    pub country: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const fn city(
    id: &'static str,
    name: &'static str,
    country: &'static str,
    latitude: f64,
    longitude: f64,
) -> City {
    City {
        id,
        name,
        country,
        latitude,
        longitude,
    }
}

/// Preset cities, sorted by id.
pub static CITIES: &[City] = &[
    city("amsterdam", "Amsterdam", "Netherlands", 52.3676, 4.9041),
    city("beijing", "Beijing", "China", 39.9042, 116.4074),
    city("berlin", "Berlin", "Germany", 52.5200, 13.4050),
    city("buenos-aires", "Buenos Aires", "Argentina", -34.6037, -58.3816),
    city("cairo", "Cairo", "Egypt", 30.0444, 31.2357),
    city("chicago", "Chicago", "United States", 41.8781, -87.6298),
    city("dubai", "Dubai", "United Arab Emirates", 25.2048, 55.2708),
    city("geneva", "Geneva", "Switzerland", 46.2044, 6.1432),
    city("hong-kong", "Hong Kong", "China", 22.3193, 114.1694),
    city("johannesburg", "Johannesburg", "South Africa", -26.2041, 28.0473),
    city("london", "London", "United Kingdom", 51.5074, -0.1278),
    city("los-angeles", "Los Angeles", "United States", 34.0522, -118.2437),
    city("madrid", "Madrid", "Spain", 40.4168, -3.7038),
    city("melbourne", "Melbourne", "Australia", -37.8136, 144.9631),
    city("mexico-city", "Mexico City", "Mexico", 19.4326, -99.1332),
    city("mumbai", "Mumbai", "India", 19.0760, 72.8777),
    city("new-york", "New York", "United States", 40.7128, -74.0060),
    city("paris", "Paris", "France", 48.8566, 2.3522),
    city("rome", "Rome", "Italy", 41.9028, 12.4964),
    city("sao-paulo", "São Paulo", "Brazil", -23.5505, -46.6333),
    city("shanghai", "Shanghai", "China", 31.2304, 121.4737),
    city("singapore", "Singapore", "Singapore", 1.3521, 103.8198),
    city("sydney", "Sydney", "Australia", -33.8688, 151.2093),
    city("tokyo", "Tokyo", "Japan", 35.6762, 139.6503),
    city("toronto", "Toronto", "Canada", 43.6532, -79.3832),
];

impl City {
    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.country)
    }
}

/// Read-only view over a city list with a designated default entry.
#[derive(Debug, Clone, Copy)]
pub struct CityCatalog {
    cities: &'static [City],
    default_index: usize,
}

impl CityCatalog {
    /// Built-in catalog with the default city taken from `default_id`.
    ///
    /// An id that is not in the catalog falls back to [`DEFAULT_CITY_ID`],
    /// and then to the first entry.
    pub fn builtin(default_id: &str) -> Self {
        Self {
            cities: CITIES,
            default_index: default_index(CITIES, default_id),
        }
    }

    /// Catalog over a custom list; `None` when the list is empty.
    pub fn with_cities(cities: &'static [City], default_id: &str) -> Option<Self> {
        if cities.is_empty() {
            return None;
        }
        Some(Self {
            cities,
            default_index: default_index(cities, default_id),
        })
    }

    pub fn cities(&self) -> &'static [City] {
        self.cities
    }

    pub fn default_city(&self) -> &'static City {
        &self.cities[self.default_index]
    }

    pub fn find_by_id(&self, id: &str) -> Option<&'static City> {
        self.cities.iter().find(|city| city.id == id)
    }

    /// City saved in `preference`, or the default when nothing usable is saved.
    pub fn resolve_selected_city(&self, preference: &CityPreference<'_>) -> &'static City {
        match preference.load() {
            Some(id) => match self.find_by_id(&id) {
                Some(city) => city,
                None => {
                    debug!(city_id = %id, "saved city is not in the catalog, using default");
                    self.default_city()
                }
            },
            None => self.default_city(),
        }
    }
}

fn default_index(cities: &[City], default_id: &str) -> usize {
    let position = |id: &str| cities.iter().position(|city| city.id == id);
    position(default_id)
        .or_else(|| position(DEFAULT_CITY_ID))
        .unwrap_or(0)
}

impl Default for CityCatalog {
    fn default() -> Self {
        Self::builtin(DEFAULT_CITY_ID)
    }
}
