//! Holds the dashboard's snapshot and applies fetch results to it.
//!
//! Every refresh takes a generation ticket. Only the newest generation may
//! replace the snapshot or clear the loading flag, so overlapping refreshes
//! resolve to the most recently started one and observers never see fields
//! from two different fetch cycles.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    error::{Endpoint, FetchError},
    location::LocationRecord,
    model::WeatherSnapshot,
    provider::{WeatherProvider, fetch_snapshot},
};

/// A failed refresh, kept for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub endpoint: Endpoint,
    pub message: String,
}

impl From<&FetchError> for FetchFailure {
    fn from(err: &FetchError) -> Self {
        Self {
            endpoint: err.endpoint,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherState {
    pub snapshot: WeatherSnapshot,
    /// Set when the newest refresh failed; cleared by the next success.
    pub last_failure: Option<FetchFailure>,
    pub generation: u64,
}

#[derive(Debug)]
pub struct WeatherStore {
    tx: watch::Sender<WeatherState>,
}

impl Default for WeatherStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherStore {
    pub fn new() -> Self {
        let initial = WeatherState {
            snapshot: WeatherSnapshot::placeholder(Utc::now()),
            last_failure: None,
            generation: 0,
        };
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current state, cloned out of the store.
    pub fn state(&self) -> WeatherState {
        self.tx.borrow().clone()
    }

    pub fn snapshot(&self) -> WeatherSnapshot {
        self.tx.borrow().snapshot.clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.tx.subscribe()
    }

    /// Start a fetch cycle: mark loading and hand out its ticket.
    pub fn begin_refresh(&self) -> u64 {
        let mut ticket = 0;
        self.tx.send_modify(|state| {
            state.generation += 1;
            state.snapshot.is_loading = true;
            ticket = state.generation;
        });
        ticket
    }

    /// Apply the outcome of the fetch cycle identified by `ticket`.
    ///
    /// Returns `false` when a newer cycle has started since, in which case
    /// the outcome is dropped and the newer cycle keeps ownership of the
    /// loading flag.
    pub fn finish_refresh(
        &self,
        ticket: u64,
        outcome: &Result<WeatherSnapshot, FetchError>,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if state.generation != ticket {
                warn!(ticket, current = state.generation, "discarding stale weather result");
                return false;
            }

            match outcome {
                Ok(snapshot) => {
                    state.snapshot = WeatherSnapshot {
                        is_loading: false,
                        ..snapshot.clone()
                    };
                    state.last_failure = None;
                }
                Err(err) => {
                    warn!(error = %err, "weather refresh failed, keeping previous snapshot");
                    state.snapshot.is_loading = false;
                    state.last_failure = Some(FetchFailure::from(err));
                }
            }
            true
        })
    }

    /// Run one full fetch cycle for `location` and apply it.
    pub async fn refresh(
        &self,
        provider: &dyn WeatherProvider,
        location: &LocationRecord,
    ) -> Result<WeatherSnapshot, FetchError> {
        let ticket = self.begin_refresh();
        let outcome = fetch_snapshot(provider, location).await;

        if self.finish_refresh(ticket, &outcome) && outcome.is_ok() {
            info!(city = location.city_name, ticket, "weather snapshot updated");
        }
        outcome
    }
}
