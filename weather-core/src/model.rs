use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

const TAIWAN_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Taiwan standard time (UTC+8, no DST), the zone every CWA timestamp uses.
pub fn taiwan_offset() -> FixedOffset {
    FixedOffset::east_opt(TAIWAN_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Fields taken from the current-observation dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentObservation {
    pub observation_time: DateTime<FixedOffset>,
    pub location_name: String,
    pub temperature: f64,
    pub wind_speed: f64,
}

/// Fields taken from the first time bucket of the county forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub description: String,
    pub weather_code: u8,
    pub rain_possibility: u8,
    pub comfortability: String,
}

/// Everything the dashboard card shows, replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub observation_time: DateTime<FixedOffset>,
    pub location_name: String,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Metres per second.
    pub wind_speed: f64,
    pub description: String,
    pub weather_code: u8,
    /// Probability of precipitation, percent.
    pub rain_possibility: u8,
    pub comfortability: String,
    pub is_loading: bool,
}

impl WeatherSnapshot {
    /// Empty values shown before the first fetch completes.
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            observation_time: now.with_timezone(&taiwan_offset()),
            location_name: String::new(),
            temperature: 0.0,
            wind_speed: 0.0,
            description: String::new(),
            weather_code: 0,
            rain_possibility: 0,
            comfortability: String::new(),
            is_loading: false,
        }
    }

    /// Combine both halves of a fetch cycle into a settled snapshot.
    pub fn merge(current: CurrentObservation, forecast: ForecastSummary) -> Self {
        Self {
            observation_time: current.observation_time,
            location_name: current.location_name,
            temperature: current.temperature,
            wind_speed: current.wind_speed,
            description: forecast.description,
            weather_code: forecast.weather_code,
            rain_possibility: forecast.rain_possibility,
            comfortability: forecast.comfortability,
            is_loading: false,
        }
    }
}
