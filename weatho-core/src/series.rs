//! High-level access to normalized weather for one location and provider.

use chrono::NaiveDate;
use std::{fmt, path::Path, sync::Arc, time::Duration};
use tracing::info;

use crate::{
    address::build_address,
    batch::{BatchCoordinator, BatchOptions, DownloadReport},
    cache_key::cache_key,
    error::Result,
    model::{CanonicalPoint, DaySeries, DaySpan, Location, Moment, MultiDaySeries, RawDay},
    normalize::{normalize_current, normalize_hourly},
    provider::ProviderId,
    store::{AcquisitionStore, DEFAULT_FETCH_TIMEOUT},
    transport::{HttpTransport, Transport},
};

/// Weather for a fixed location from a fixed provider.
///
/// Reads either go to the network or, when a cache root is given, to files
/// previously written by [`WeatherSeries::download`].
#[derive(Clone)]
pub struct WeatherSeries {
    location: Location,
    provider: ProviderId,
    credential: String,
    store: AcquisitionStore,
    batch: BatchCoordinator,
}

impl fmt::Debug for WeatherSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherSeries")
            .field("location", &self.location)
            .field("provider", &self.provider)
            .field("credential", &"***")
            .field("batch", &self.batch.options())
            .finish()
    }
}

impl WeatherSeries {
    /// Uses an HTTP transport with the default per-fetch timeout.
    pub fn new(location: Location, provider: ProviderId, credential: impl Into<String>) -> Self {
        let transport = HttpTransport::new(DEFAULT_FETCH_TIMEOUT);
        Self::with_transport(location, provider, credential, Arc::new(transport))
    }

    pub fn with_transport(
        location: Location,
        provider: ProviderId,
        credential: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let store = AcquisitionStore::new(transport);
        let batch = BatchCoordinator::new(store.clone(), BatchOptions::default());
        Self {
            location,
            provider,
            credential: credential.into(),
            store,
            batch,
        }
    }

    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.batch = BatchCoordinator::new(self.store.clone(), options);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.store = self.store.with_fetch_timeout(timeout);
        self.batch = BatchCoordinator::new(self.store.clone(), self.batch.options());
        self
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Address that would be requested for `moment`; can be opened in a
    /// browser.
    pub fn address(&self, moment: Moment) -> String {
        build_address(&self.location, moment, self.provider, &self.credential)
    }

    /// Raw provider data for `moment`, from the network.
    pub async fn fetch(&self, moment: Moment) -> Result<RawDay> {
        self.store
            .fetch_day(&self.location, moment, self.provider, &self.credential)
            .await
    }

    /// Raw data of `date`, from the store under `root`.
    pub async fn load(&self, date: NaiveDate, root: &Path) -> Result<RawDay> {
        self.store.load(&self.key(date), root).await
    }

    /// Stores `raw` as the data of `date` under `root`.
    pub async fn save(&self, raw: &RawDay, date: NaiveDate, root: &Path) -> Result<()> {
        self.store.persist(raw, &self.key(date), root).await
    }

    /// Normalized conditions at `moment`, from the network.
    pub async fn point(&self, moment: Moment) -> Result<CanonicalPoint> {
        let raw = self.fetch(moment).await?;
        normalize_current(&raw, self.provider.spec())
    }

    /// Normalized current conditions.
    pub async fn current(&self) -> Result<CanonicalPoint> {
        self.point(Moment::Current).await
    }

    /// Hourly series of one day, from the network when `cache_root` is
    /// `None`, otherwise from the store.
    pub async fn day(&self, date: NaiveDate, cache_root: Option<&Path>) -> Result<DaySeries> {
        let raw = match cache_root {
            None => {
                self.store
                    .fetch_date(&self.location, self.provider, &self.credential, date)
                    .await?
            }
            Some(root) => self.load(date, root).await?,
        };

        Ok(match normalize_hourly(&raw, self.provider.spec())? {
            Some(series) => DaySeries::Hourly(series),
            None => DaySeries::NoHourlyData { date },
        })
    }

    /// `count` consecutive days starting at `start`, concatenated in date
    /// order. Days without hourly data add no rows.
    pub async fn days(&self, start: NaiveDate, count: u32, cache_root: Option<&Path>) -> Result<MultiDaySeries> {
        self.hourly(&DaySpan::days(start, count), cache_root).await
    }

    /// Like [`WeatherSeries::days`], for an arbitrary span.
    pub async fn hourly(&self, span: &DaySpan, cache_root: Option<&Path>) -> Result<MultiDaySeries> {
        let mut out = MultiDaySeries::default();

        for &date in span.dates() {
            match self.day(date, cache_root).await? {
                DaySeries::Hourly(series) => out.series.append(series),
                DaySeries::NoHourlyData { date } => out.days_without_hourly.push(date),
            }
        }

        Ok(out)
    }

    /// Downloads every day of `span` into `root`, retrying missing days.
    pub async fn download(&self, span: &DaySpan, root: &Path) -> Result<DownloadReport> {
        self.batch
            .fetch_and_cache_range(&self.location, self.provider, &self.credential, span.dates(), root)
            .await
    }

    /// Days of `span` that have no file under `root`.
    pub async fn missing_days(&self, span: &DaySpan, root: &Path) -> Result<Vec<NaiveDate>> {
        let missing = self
            .store
            .list_missing(&self.location, self.provider, span.dates(), root)
            .await?;

        if let (Some(first), Some(last)) = (span.first(), span.last()) {
            if missing.is_empty() {
                info!("No missing days in {} between {first} and {last}", root.display());
            } else {
                info!(
                    "{} missing days found in {} between {first} and {last}",
                    missing.len(),
                    root.display()
                );
            }
        }

        Ok(missing)
    }

    /// Downloads only the days of `span` not yet stored under `root`.
    pub async fn download_missing_days(&self, span: &DaySpan, root: &Path) -> Result<DownloadReport> {
        let missing = self.missing_days(span, root).await?;
        self.batch
            .fetch_and_cache_range(&self.location, self.provider, &self.credential, &missing, root)
            .await
    }

    fn key(&self, date: NaiveDate) -> String {
        cache_key(&self.location, date, self.provider)
    }
}
