//! Network fetch and on-disk persistence of [`RawDay`] documents.

use chrono::NaiveDate;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::NamedTempFile;
use tokio::{fs, task};
use tracing::{debug, warn};

use crate::{
    address::{build_address, redact},
    cache_key::cache_key,
    error::{FetchError, Result, WeatherError},
    model::{Location, Moment, RawDay},
    normalize::{local_date, timezone},
    provider::ProviderId,
    transport::Transport,
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches days over the network and keeps them as JSON files under a root
/// directory chosen per call.
#[derive(Debug, Clone)]
pub struct AcquisitionStore {
    transport: Arc<dyn Transport>,
    fetch_timeout: Duration,
}

impl AcquisitionStore {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// One request for `moment`, parsed into a [`RawDay`].
    ///
    /// Every failure is reported as [`WeatherError::FetchFailed`].
    pub async fn fetch_day(
        &self,
        location: &Location,
        moment: Moment,
        provider: ProviderId,
        credential: &str,
    ) -> Result<RawDay> {
        let address = build_address(location, moment, provider, credential);
        debug!(address = %redact(&address, credential), "Fetching");

        self.request(&address).await.map_err(|source| {
            warn!(%provider, %moment, error = %source, "Download error");
            WeatherError::FetchFailed { provider, moment, source }
        })
    }

    async fn request(&self, address: &str) -> Result<RawDay, FetchError> {
        let body = tokio::time::timeout(self.fetch_timeout, self.transport.get(address))
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        let value: serde_json::Value = serde_json::from_str(&body)?;
        RawDay::from_value(value).ok_or(FetchError::NotAnObject)
    }

    /// The provider's local calendar day `date`.
    ///
    /// The first request is made at noon UTC. Zones at UTC+12 and beyond see
    /// that instant on the next local day, so the day is requested again at
    /// local noon in the zone the payload declares. A payload that still
    /// covers another day is rejected as [`WeatherError::MalformedPayload`].
    pub async fn fetch_date(
        &self,
        location: &Location,
        provider: ProviderId,
        credential: &str,
        date: NaiveDate,
    ) -> Result<RawDay> {
        let spec = provider.spec();
        let raw = self.fetch_day(location, Moment::day(date), provider, credential).await?;
        if local_date(&raw, spec)? == date {
            return Ok(raw);
        }

        let tz = timezone(&raw, spec)?;
        debug!(%provider, %date, %tz, "Payload covers another local day, requesting local noon");
        let raw = self
            .fetch_day(location, Moment::local_noon(date, tz), provider, credential)
            .await?;

        let covered = local_date(&raw, spec)?;
        if covered != date {
            warn!(%provider, %date, %covered, "Provider returned the wrong day");
            return Err(WeatherError::MalformedPayload {
                provider,
                reason: format!("requested {date}, got data for {covered}"),
            });
        }
        Ok(raw)
    }

    /// Writes `raw` under `key`, replacing any previous document atomically.
    pub async fn persist(&self, raw: &RawDay, key: &str, root: &Path) -> Result<()> {
        fs::create_dir_all(root)
            .await
            .map_err(|e| WeatherError::Io(root.to_path_buf(), e))?;

        let bytes = serde_json::to_vec_pretty(raw).map_err(|e| {
            WeatherError::Io(root.join(key), io::Error::new(io::ErrorKind::InvalidData, e))
        })?;

        let root = root.to_path_buf();
        let target = root.join(key);
        task::spawn_blocking(move || -> Result<()> {
            let mut tmp =
                NamedTempFile::new_in(&root).map_err(|e| WeatherError::Io(root.clone(), e))?;
            tmp.write_all(&bytes)
                .and_then(|_| tmp.as_file().sync_all())
                .map_err(|e| WeatherError::Io(tmp.path().to_path_buf(), e))?;
            tmp.persist(&target)
                .map_err(|e| WeatherError::Io(target.clone(), e.error))?;
            debug!(path = %target.display(), "Saved");
            Ok(())
        })
        .await?
    }

    /// Reads the document stored under `key`.
    pub async fn load(&self, key: &str, root: &Path) -> Result<RawDay> {
        let path = root.join(key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(WeatherError::NotFound(path)),
            Err(e) => return Err(WeatherError::Io(path, e)),
        };

        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|source| WeatherError::CorruptDocument { path: path.clone(), source })?;

        RawDay::from_value(value).ok_or_else(|| WeatherError::CorruptDocument {
            path,
            source: <serde_json::Error as serde::de::Error>::custom("document is not a JSON object"),
        })
    }

    /// Dates of `dates` with no document under `root`, ascending and without
    /// duplicates.
    pub async fn list_missing(
        &self,
        location: &Location,
        provider: ProviderId,
        dates: &[NaiveDate],
        root: &Path,
    ) -> Result<Vec<NaiveDate>> {
        let mut sorted = dates.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut missing = Vec::new();
        for date in sorted {
            let path = root.join(cache_key(location, date, provider));
            let exists = fs::try_exists(&path)
                .await
                .map_err(|e| WeatherError::Io(path.clone(), e))?;
            if !exists {
                missing.push(date);
            }
        }

        Ok(missing)
    }

    /// Fetch then persist one calendar day, as a single unit of work.
    pub async fn download_day(
        &self,
        location: &Location,
        provider: ProviderId,
        credential: &str,
        date: NaiveDate,
        root: &Path,
    ) -> Result<()> {
        let raw = self.fetch_date(location, provider, credential, date).await?;
        self.persist(&raw, &cache_key(location, date, provider), root).await
    }

    pub fn cache_path(&self, location: &Location, date: NaiveDate, provider: ProviderId, root: &Path) -> PathBuf {
        root.join(cache_key(location, date, provider))
    }
}
