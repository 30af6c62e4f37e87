use anyhow::Result;
use cwa_weather_core::{LocationRecord, Moment, SunTimes, WeatherSnapshot, WeatherState, format_hm};
use std::fmt::Write as _;

/// Human-readable weather card.
pub fn card(
    location: &LocationRecord,
    state: &WeatherState,
    moment: Moment,
    sun: Option<SunTimes>,
) -> String {
    let snap = &state.snapshot;
    let mut out = String::new();

    let _ = writeln!(out, "{}  ({})", location.city_name, moment);
    if snap.location_name.is_empty() {
        let _ = writeln!(out, "  No data yet");
    } else {
        let _ = writeln!(out, "  {}", snap.description);
        let _ = writeln!(out, "  {:.0}°C", snap.temperature);
        let _ = writeln!(out, "  Wind     {:.1} m/s", snap.wind_speed);
        let _ = writeln!(out, "  Rain     {}%", snap.rain_possibility);
        let _ = writeln!(out, "  Comfort  {}", snap.comfortability);
        let _ = writeln!(
            out,
            "  Observed {} at {}",
            snap.observation_time.format("%m/%d %H:%M"),
            snap.location_name
        );
    }
    if let Some(sun) = sun {
        let _ = writeln!(
            out,
            "  Sunrise  {}  Sunset {}",
            format_hm(sun.sunrise),
            format_hm(sun.sunset)
        );
    }

    if snap.is_loading {
        let _ = writeln!(out, "  Refreshing...");
    }
    if let Some(failure) = &state.last_failure {
        let _ = writeln!(out, "  ! Last refresh failed: {}", failure.message);
    }
    out
}

pub fn json(
    location: &LocationRecord,
    snapshot: &WeatherSnapshot,
    moment: Moment,
) -> Result<String> {
    let value = serde_json::json!({
        "city": location.city_name,
        "moment": moment,
        "snapshot": snapshot,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn locations(records: &[LocationRecord]) -> String {
    let mut out = String::new();
    for loc in records {
        let _ = writeln!(
            out,
            "{}\tstation {}\t({:.4}, {:.4})",
            loc.city_name, loc.location_name, loc.latitude, loc.longitude
        );
    }
    out
}
