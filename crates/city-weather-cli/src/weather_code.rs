use std::ops::RangeInclusive;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCategory {
    Clear,
    MainlyClear,
    PartlyCloudy,
    Overcast,
    Fog,
    Drizzle,
    Rain,
    Snow,
    HeavySnow,
    RainShowers,
    SnowShowers,
    Thunderstorm,
    Cloudy,
}

// Evaluated top to bottom; the 71..=73 / 74..=77 split is intentional.
const CATEGORY_TABLE: &[(RangeInclusive<i32>, WeatherCategory)] = &[
    (0..=0, WeatherCategory::Clear),
    (1..=1, WeatherCategory::MainlyClear),
    (2..=2, WeatherCategory::PartlyCloudy),
    (3..=3, WeatherCategory::Overcast),
    (45..=45, WeatherCategory::Fog),
    (48..=48, WeatherCategory::Fog),
    (51..=55, WeatherCategory::Drizzle),
    (61..=67, WeatherCategory::Rain),
    (71..=73, WeatherCategory::Snow),
    (74..=77, WeatherCategory::HeavySnow),
    (80..=82, WeatherCategory::RainShowers),
    (85..=86, WeatherCategory::SnowShowers),
    (95..=99, WeatherCategory::Thunderstorm),
];

pub fn classify(code: i32) -> WeatherCategory {
    CATEGORY_TABLE
        .iter()
        .find(|(range, _)| range.contains(&code))
        .map(|(_, category)| *category)
        .unwrap_or(WeatherCategory::Cloudy)
}

impl WeatherCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::MainlyClear => "mainly_clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Overcast => "overcast",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::HeavySnow => "heavy_snow",
            Self::RainShowers => "rain_showers",
            Self::SnowShowers => "snow_showers",
            Self::Thunderstorm => "thunderstorm",
            Self::Cloudy => "cloudy",
        }
    }

    /// Icon slug, matching the `wi-*` weather icon set names.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Clear => "day-sunny",
            Self::MainlyClear | Self::Cloudy => "cloud",
            Self::PartlyCloudy | Self::Overcast => "cloudy",
            Self::Fog => "fog",
            Self::Drizzle | Self::RainShowers => "showers",
            Self::Rain => "rain",
            Self::Snow | Self::SnowShowers => "snow",
            Self::HeavySnow => "snowflake-cold",
            Self::Thunderstorm => "thunderstorm",
        }
    }
}

/// WMO interpretation text for `code`.
pub fn describe(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
