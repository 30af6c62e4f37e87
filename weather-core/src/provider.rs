use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::FetchError,
    location::LocationRecord,
    model::{CurrentObservation, ForecastSummary, WeatherSnapshot},
};

pub mod cwa;

pub use cwa::CwaProvider;

/// Upstream source of the two halves of a snapshot.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current readings for an observation station.
    async fn current_observation(&self, location_name: &str)
    -> Result<CurrentObservation, FetchError>;

    /// First forecast bucket for a county/city.
    async fn forecast(&self, city_name: &str) -> Result<ForecastSummary, FetchError>;
}

/// Request both endpoints concurrently and merge them into one snapshot.
///
/// Fails as a whole if either request fails; a partial snapshot is never
/// produced.
pub async fn fetch_snapshot(
    provider: &dyn WeatherProvider,
    location: &LocationRecord,
) -> Result<WeatherSnapshot, FetchError> {
    let (current, forecast) = tokio::try_join!(
        provider.current_observation(location.location_name),
        provider.forecast(location.city_name),
    )?;

    Ok(WeatherSnapshot::merge(current, forecast))
}
