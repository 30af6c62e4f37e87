//! Static table of supported cities and the identifiers each upstream
//! dataset expects for them.

use serde::Serialize;

use crate::error::LocationError;

/// Identifiers for one supported city.
///
/// `city_name` keys the county forecast, `location_name` keys the observation
/// station and `sunrise_city_name` keys the sunrise/sunset table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationRecord {
    pub city_name: &'static str,
    pub location_name: &'static str,
    pub sunrise_city_name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

/// City used when nothing has been persisted yet.
pub const DEFAULT_CITY: &str = "臺北市";

const fn record(
    city_name: &'static str,
    location_name: &'static str,
    sunrise_city_name: &'static str,
    latitude: f64,
    longitude: f64,
) -> LocationRecord {
    LocationRecord {
        city_name,
        location_name,
        sunrise_city_name,
        latitude,
        longitude,
    }
}

static LOCATIONS: [LocationRecord; 22] = [
    record("宜蘭縣", "宜蘭", "宜蘭縣", 24.7640, 121.7565),
    record("嘉義市", "嘉義", "嘉義市", 23.4959, 120.4329),
    record("屏東縣", "恆春", "屏東縣", 22.0039, 120.7463),
    record("雲林縣", "古坑", "雲林縣", 23.6391, 120.5628),
    record("臺東縣", "臺東", "臺東縣", 22.7522, 121.1546),
    record("臺北市", "臺北", "臺北市", 25.0377, 121.5149),
    record("金門縣", "金門", "金門縣", 24.4075, 118.2893),
    record("新北市", "板橋", "新北市", 24.9976, 121.4420),
    record("花蓮縣", "花蓮", "花蓮縣", 23.9773, 121.6132),
    record("高雄市", "高雄", "高雄市", 22.5660, 120.3157),
    record("新竹市", "新竹", "新竹市", 24.8279, 121.0142),
    record("新竹縣", "新竹", "新竹縣", 24.8279, 121.0142),
    record("澎湖縣", "澎湖", "澎湖縣", 23.5654, 119.5631),
    record("基隆市", "基隆", "基隆市", 25.1333, 121.7405),
    record("臺中市", "臺中", "臺中市", 24.1457, 120.6840),
    record("連江縣", "馬祖", "連江縣", 26.1693, 119.9233),
    record("桃園市", "新屋", "桃園市", 25.0067, 121.0475),
    record("臺南市", "臺南", "臺南市", 22.9932, 120.2047),
    record("彰化縣", "田中", "彰化縣", 23.8594, 120.5901),
    record("南投縣", "日月潭", "南投縣", 23.8813, 120.9080),
    record("苗栗縣", "後龍", "苗栗縣", 24.6386, 120.7839),
    record("嘉義縣", "阿里山", "嘉義縣", 23.5082, 120.8132),
];

/// All supported locations, in display order.
pub fn available_locations() -> &'static [LocationRecord] {
    &LOCATIONS
}

/// Resolve a city name to its identifiers.
pub fn resolve(city_name: &str) -> Result<&'static LocationRecord, LocationError> {
    let wanted = city_name.trim();
    LOCATIONS
        .iter()
        .find(|loc| loc.city_name == wanted)
        .ok_or_else(|| LocationError::NotFound(city_name.to_string()))
}

pub fn find_by_sunrise_city(sunrise_city_name: &str) -> Option<&'static LocationRecord> {
    LOCATIONS.iter().find(|loc| loc.sunrise_city_name == sunrise_city_name)
}
