use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Which upstream endpoint a fetch error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Observation,
    Forecast,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Observation => "observation",
            Endpoint::Forecast => "forecast",
        }
    }

    /// Dataset id appended to the datastore base URL.
    pub fn dataset_id(&self) -> &'static str {
        match self {
            Endpoint::Observation => "O-A0003-001",
            Endpoint::Forecast => "F-C0032-001",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchErrorKind {
    #[error("request could not be completed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed response: {0}")]
    Parse(String),
}

/// A failed request against one of the two upstream endpoints.
#[derive(Debug, Error)]
#[error("{endpoint} request failed: {kind}")]
pub struct FetchError {
    pub endpoint: Endpoint,
    #[source]
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn network(endpoint: Endpoint, err: reqwest::Error) -> Self {
        Self {
            endpoint,
            kind: FetchErrorKind::Network(err),
        }
    }

    pub fn http_status(endpoint: Endpoint, status: u16, body: String) -> Self {
        Self {
            endpoint,
            kind: FetchErrorKind::HttpStatus { status, body },
        }
    }

    pub fn parse(endpoint: Endpoint, detail: impl Into<String>) -> Self {
        Self {
            endpoint,
            kind: FetchErrorKind::Parse(detail.into()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Unsupported city '{0}'. Run `cwa-weather locations` to list supported cities.")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum SunError {
    #[error("no sunrise/sunset data for '{city}' on {date}")]
    DataUnavailable { city: String, date: NaiveDate },

    #[error("failed to read sunrise table: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid sunrise table: {0}")]
    Invalid(String),
}
