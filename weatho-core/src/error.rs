use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use crate::{model::Moment, provider::ProviderId, transport::TransportError};

pub type Result<T, E = WeatherError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid location ({lat}, {lon}): latitude must be in [-90, 90], longitude in [-180, 180]")]
    InvalidLocation { lat: f64, lon: f64 },

    #[error("Invalid day span: {0}")]
    InvalidSpan(String),

    #[error("Download from {provider} failed for {moment}")]
    FetchFailed {
        provider: ProviderId,
        moment: Moment,
        #[source]
        source: FetchError,
    },

    #[error("No cached data at '{0}'")]
    NotFound(PathBuf),

    #[error("Cached document '{path}' is unreadable")]
    CorruptDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed {provider} payload: {reason}")]
    MalformedPayload { provider: ProviderId, reason: String },

    #[error("Download incomplete, {} day(s) still missing: {}", .missing.len(), join_dates(.missing))]
    PartialDownload { missing: Vec<NaiveDate> },

    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Why a single fetch did not produce a [`RawDay`](crate::model::RawDay).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Response was not valid JSON")]
    Parse(#[from] serde_json::Error),

    #[error("Response was JSON but not an object")]
    NotAnObject,

    #[error("No response within {0:?}")]
    Timeout(std::time::Duration),
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
}
