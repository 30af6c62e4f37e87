//! Core library for the `cwa-weather` dashboard.
//!
//! This crate defines:
//! - The supported-location table and its resolver
//! - The CWA client and the concurrent fetch-and-merge of a weather snapshot
//! - The store that applies fetch results and tracks loading/failure state
//! - Day/night classification from sunrise and sunset times
//! - Configuration persisted between runs
//!
//! It is used by `cwa-weather-cli`, but can also back other front-ends.

pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;
pub mod sun;

pub use config::Config;
pub use error::{Endpoint, FetchError, FetchErrorKind, LocationError, SunError};
pub use location::{LocationRecord, available_locations, resolve};
pub use model::{CurrentObservation, ForecastSummary, WeatherSnapshot};
pub use provider::{CwaProvider, WeatherProvider, fetch_snapshot};
pub use store::{FetchFailure, WeatherState, WeatherStore};
pub use sun::{
    Moment, SolarCalculator, SunSchedule, SunTimes, SunriseTable, classify, classify_or_day,
    format_hm,
};
