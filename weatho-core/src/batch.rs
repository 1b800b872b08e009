//! Concurrent download of date ranges with bounded backfill of missing days.

use chrono::NaiveDate;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Instant};
use tracing::{info, warn};

use crate::{
    error::{Result, WeatherError},
    model::Location,
    provider::ProviderId,
    store::AcquisitionStore,
};

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Knobs for [`BatchCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Maximum number of days fetched at the same time.
    pub concurrency: usize,
    /// Extra passes over still-missing days after the first one.
    pub max_retries: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Outcome of [`BatchCoordinator::fetch_and_cache_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub requested: Vec<NaiveDate>,
    /// Days still absent from the store once retries ran out.
    pub missing: Vec<NaiveDate>,
    /// Number of fetch passes that were run, the first one included.
    pub passes: usize,
    /// Last failure message for each day that failed at least once.
    pub failures: Vec<(NaiveDate, String)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// `Err(PartialDownload)` naming the missing days, if any.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(WeatherError::PartialDownload { missing: self.missing })
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    store: AcquisitionStore,
    options: BatchOptions,
}

impl BatchCoordinator {
    pub fn new(store: AcquisitionStore, options: BatchOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    /// Fetches and stores every day of `dates`, then re-checks the store and
    /// retries exactly the missing subset up to `max_retries` times.
    ///
    /// A day that keeps failing never aborts the others; it ends up in
    /// [`DownloadReport::missing`].
    pub async fn fetch_and_cache_range(
        &self,
        location: &Location,
        provider: ProviderId,
        credential: &str,
        dates: &[NaiveDate],
        root: &Path,
    ) -> Result<DownloadReport> {
        let mut requested = dates.to_vec();
        requested.sort_unstable();
        requested.dedup();

        let mut report = DownloadReport {
            requested: requested.clone(),
            missing: Vec::new(),
            passes: 0,
            failures: Vec::new(),
        };

        if requested.is_empty() {
            return Ok(report);
        }

        let started = Instant::now();
        info!(
            days = requested.len(),
            folder = %root.display(),
            concurrency = self.options.concurrency,
            "Download started"
        );

        let mut pending = requested.clone();
        loop {
            let failed = self.run_pass(location, provider, credential, &pending, root).await;
            report.passes += 1;
            for (date, message) in failed {
                match report.failures.iter_mut().find(|(d, _)| *d == date) {
                    Some(entry) => entry.1 = message,
                    None => report.failures.push((date, message)),
                }
            }

            pending = self.store.list_missing(location, provider, &requested, root).await?;
            if pending.is_empty() || report.passes > self.options.max_retries {
                break;
            }
            warn!(missing = pending.len(), pass = report.passes, "Retrying missing days");
        }

        report.failures.sort_by_key(|(date, _)| *date);
        report.missing = pending;

        if report.is_complete() {
            info!(
                days = requested.len(),
                elapsed = ?started.elapsed(),
                "Download finished"
            );
        } else {
            warn!(
                missing = report.missing.len(),
                passes = report.passes,
                "Download incomplete"
            );
        }

        Ok(report)
    }

    /// One concurrent pass; returns once every unit has finished.
    async fn run_pass(
        &self,
        location: &Location,
        provider: ProviderId,
        credential: &str,
        dates: &[NaiveDate],
        root: &Path,
    ) -> Vec<(NaiveDate, String)> {
        let concurrency = self.options.concurrency.max(1);

        stream::iter(dates.iter().copied())
            .map(|date| async move {
                let outcome = self
                    .store
                    .download_day(location, provider, credential, date, root)
                    .await;
                (date, outcome)
            })
            .buffer_unordered(concurrency)
            .filter_map(|(date, outcome)| async move { outcome.err().map(|e| (date, e.to_string())) })
            .collect()
            .await
    }
}
