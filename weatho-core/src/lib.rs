//! Core library for the `weatho` CLI.
//!
//! This crate defines:
//! - Request addresses and cache file names for DarkSky and OpenWeatherMap
//! - Fetching, storing and backfilling whole days of raw provider data
//! - Normalization of both payload shapes into one canonical schema
//! - Configuration & credentials handling
//!
//! [`WeatherSeries`] is the entry point; the other modules are public so the
//! individual steps can be reused on their own.

pub mod address;
pub mod batch;
pub mod cache_key;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod series;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

pub use batch::{BatchCoordinator, BatchOptions, DownloadReport};
pub use config::{Config, DownloadConfig, ProviderConfig};
pub use error::{FetchError, WeatherError};
pub use model::{
    CanonicalField, CanonicalPoint, CanonicalSeries, DaySeries, DaySpan, Location, Moment, MultiDaySeries, RawDay,
};
pub use provider::{ProviderId, ProviderSpec};
pub use series::WeatherSeries;
pub use store::AcquisitionStore;
pub use transport::{HttpTransport, Transport, TransportError};
