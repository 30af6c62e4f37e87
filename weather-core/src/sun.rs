//! Day/night classification from sunrise and sunset times.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use solar_positioning::{Horizon, SunriseResult, spa};
use std::{collections::HashMap, fmt, fs, path::Path};
use tracing::{debug, warn};

use crate::{error::SunError, location, model::taiwan_offset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Moment {
    Day,
    Night,
}

impl Moment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Moment::Day => "day",
            Moment::Night => "night",
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local (Taiwan) sunrise and sunset for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

/// Source of sunrise/sunset times keyed by sunrise city name.
pub trait SunSchedule: Send + Sync + fmt::Debug {
    fn sun_times(&self, sunrise_city_name: &str, date: NaiveDate) -> Result<SunTimes, SunError>;
}

/// Classify `now` as day or night for the given city.
///
/// Sunrise and sunset themselves count as day.
pub fn classify<Tz: TimeZone>(
    schedule: &dyn SunSchedule,
    sunrise_city_name: &str,
    now: DateTime<Tz>,
) -> Result<Moment, SunError> {
    let local = now.with_timezone(&taiwan_offset()).naive_local();
    let times = schedule.sun_times(sunrise_city_name, local.date())?;

    let time = local.time();
    if times.sunrise <= time && time <= times.sunset {
        Ok(Moment::Day)
    } else {
        Ok(Moment::Night)
    }
}

/// Like [`classify`], but falls back to [`Moment::Day`] when no sun times are
/// available.
pub fn classify_or_day<Tz: TimeZone>(
    schedule: &dyn SunSchedule,
    sunrise_city_name: &str,
    now: DateTime<Tz>,
) -> Moment {
    classify(schedule, sunrise_city_name, now).unwrap_or_else(|err| {
        warn!(error = %err, "day/night unknown, assuming day");
        Moment::Day
    })
}

/// Sunrise/sunset table loaded from the CWA sunrise dataset export.
///
/// ```json
/// { "locations": [ { "locationName": "臺北市",
///     "time": [ { "dataTime": "2024-06-21", "sunrise": "05:04", "sunset": "18:47" } ] } ] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SunriseTable {
    entries: HashMap<String, HashMap<NaiveDate, SunTimes>>,
}

#[derive(Debug, Deserialize)]
struct TableFile {
    locations: Vec<TableLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableLocation {
    location_name: String,
    time: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableEntry {
    data_time: String,
    sunrise: String,
    sunset: String,
}

impl SunriseTable {
    pub fn load(path: &Path) -> Result<Self, SunError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, SunError> {
        let file: TableFile =
            serde_json::from_str(json).map_err(|e| SunError::Invalid(e.to_string()))?;

        let mut entries: HashMap<String, HashMap<NaiveDate, SunTimes>> = HashMap::new();
        for location in file.locations {
            let days = entries.entry(location.location_name).or_default();
            for entry in location.time {
                let date = NaiveDate::parse_from_str(&entry.data_time, "%Y-%m-%d")
                    .map_err(|_| SunError::Invalid(format!("bad date '{}'", entry.data_time)))?;
                let times = SunTimes {
                    sunrise: parse_hm(&entry.sunrise)?,
                    sunset: parse_hm(&entry.sunset)?,
                };
                days.insert(date, times);
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SunSchedule for SunriseTable {
    fn sun_times(&self, sunrise_city_name: &str, date: NaiveDate) -> Result<SunTimes, SunError> {
        self.entries
            .get(sunrise_city_name)
            .and_then(|days| days.get(&date))
            .copied()
            .ok_or_else(|| SunError::DataUnavailable {
                city: sunrise_city_name.to_string(),
                date,
            })
    }
}

fn parse_hm(raw: &str) -> Result<NaiveTime, SunError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| SunError::Invalid(format!("bad time '{raw}'")))
}

/// Computes sunrise/sunset from the coordinates in the location table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolarCalculator;

/// Estimated TT - UT for the 2020s, in seconds.
const DELTA_T_SECS: f64 = 69.0;

impl SunSchedule for SolarCalculator {
    fn sun_times(&self, sunrise_city_name: &str, date: NaiveDate) -> Result<SunTimes, SunError> {
        let unavailable = || SunError::DataUnavailable {
            city: sunrise_city_name.to_string(),
            date,
        };

        let loc = location::find_by_sunrise_city(sunrise_city_name).ok_or_else(unavailable)?;
        let result = spa::sunrise_sunset_utc_for_horizon(
            date.year(),
            date.month(),
            date.day(),
            loc.latitude,
            loc.longitude,
            DELTA_T_SECS,
            Horizon::SunriseSunset,
        )
        .map_err(|err| {
            debug!(error = %err, city = sunrise_city_name, "solar position failed");
            unavailable()
        })?;

        match result {
            SunriseResult::RegularDay { sunrise, sunset, .. } => Ok(SunTimes {
                sunrise: utc_hours_to_local(date, sunrise.hours()),
                sunset: utc_hours_to_local(date, sunset.hours()),
            }),
            SunriseResult::AllDay { .. } | SunriseResult::AllNight { .. } => Err(unavailable()),
        }
    }
}

/// Turn hours after UTC midnight of `date` (possibly negative or past 24)
/// into Taiwan wall-clock time.
fn utc_hours_to_local(date: NaiveDate, hours: f64) -> NaiveTime {
    let millis = (hours * 3_600_000.0).round() as i64;
    let instant = date.and_time(NaiveTime::MIN).and_utc() + TimeDelta::milliseconds(millis);
    instant.with_timezone(&taiwan_offset()).time()
}

/// Hour/minute view used by the front-end.
pub fn format_hm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}
