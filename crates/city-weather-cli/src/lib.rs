//! Date and current-weather display for a persisted city selection.
//!
//! - `catalog`: static city list, lookup, default resolution.
//! - `storage`: fault-tolerant persistence of the selected city id.
//! - `filter`: case-insensitive name/country search.
//! - `fetch`: weather fetch lifecycle with a staleness guard.
//! - `app`: state record, messages, and effect dispatch.

pub mod app;
pub mod catalog;
pub mod config;
pub mod date;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod map;
pub mod providers;
pub mod storage;
pub mod weather_code;
