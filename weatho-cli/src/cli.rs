use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use weatho_core::{Config, DaySpan, HttpTransport, Location, Moment, ProviderId, WeatherSeries};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatho", version, about = "Download, cache and inspect DarkSky / OpenWeatherMap data")]
pub struct Cli {
    /// Log debug details (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and from whom.
#[derive(Debug, Args)]
pub struct Target {
    /// Place name from the [places] table of the config file.
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    place: Option<String>,

    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Provider short name, "darksky" or "owm"; defaults to the configured one.
    #[arg(long)]
    provider: Option<String>,
}

/// Which days.
#[derive(Debug, Args)]
pub struct Days {
    /// First day, YYYY-MM-DD.
    #[arg(long)]
    date: NaiveDate,

    /// Last day, included.
    #[arg(long, conflicts_with = "ndays")]
    until: Option<NaiveDate>,

    /// Number of days starting at --date.
    #[arg(long)]
    ndays: Option<u32>,
}

impl Days {
    fn span(&self) -> anyhow::Result<DaySpan> {
        Ok(DaySpan::from_options(self.date, self.until, self.ndays)?)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "darksky" or "owm".
        provider: String,

        /// Make this provider the default one.
        #[arg(long)]
        default: bool,
    },

    /// Print the request address (open it in a browser to see the raw JSON).
    Url {
        #[command(flatten)]
        target: Target,

        /// Day to request; if absent, current conditions.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show current conditions.
    Current {
        #[command(flatten)]
        target: Target,

        #[arg(long)]
        json: bool,
    },

    /// Show hourly data for one or more days.
    Hourly {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        days: Days,

        /// Read from the cache instead of the network; without a value, the
        /// configured cache folder.
        #[arg(long, num_args = 0..=1)]
        cache: Option<Option<PathBuf>>,

        #[arg(long)]
        json: bool,
    },

    /// Download days into the cache, retrying the ones that fail.
    Download {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        days: Days,

        /// Cache folder; defaults to the configured one.
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Only fetch the days not in the cache yet.
        #[arg(long)]
        missing_only: bool,
    },

    /// List days absent from the cache.
    Missing {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        days: Days,

        /// Cache folder; defaults to the configured one.
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure { provider, default } => configure(&mut config, &provider, default)?,
            Command::Url { target, date } => {
                let series = target.series(&config, false)?;
                let moment = date.map(Moment::day).unwrap_or(Moment::Current);
                println!("{}", series.address(moment));
            }
            Command::Current { target, json } => {
                let series = target.series(&config, true)?;
                let point = series.current().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&point)?);
                } else {
                    output::print_point(&point);
                }
            }
            Command::Hourly { target, days, cache, json } => {
                let series = target.series(&config, cache.is_none())?;
                let root = match cache {
                    None => None,
                    Some(Some(dir)) => Some(dir),
                    Some(None) => Some(config.cache_dir()?),
                };

                let out = series.hourly(&days.span()?, root.as_deref()).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&out.series)?);
                } else {
                    output::print_series(&out.series);
                }
                output::print_days_without_hourly(&out.days_without_hourly);
            }
            Command::Download { target, days, cache, missing_only } => {
                let series = target.series(&config, true)?;
                let root = resolve_cache(&config, cache)?;
                let span = days.span()?;

                let report = if missing_only {
                    series.download_missing_days(&span, &root).await?
                } else {
                    series.download(&span, &root).await?
                };
                output::print_report(&report, &root);
                report.into_result()?;
            }
            Command::Missing { target, days, cache } => {
                let series = target.series(&config, false)?;
                let root = resolve_cache(&config, cache)?;

                for date in series.missing_days(&days.span()?, &root).await? {
                    println!("{date}");
                }
            }
        }

        Ok(())
    }
}

impl Target {
    fn location(&self, config: &Config) -> anyhow::Result<Location> {
        match (&self.place, self.lat, self.lon) {
            (Some(name), _, _) => config.place(name),
            (None, Some(lat), Some(lon)) => Ok(Location::new(lat, lon)?),
            _ => anyhow::bail!("Give a location with --place NAME or --lat LAT --lon LON."),
        }
    }

    fn provider(&self, config: &Config) -> anyhow::Result<ProviderId> {
        match &self.provider {
            Some(name) => ProviderId::try_from(name.as_str()),
            None => config.default_provider_id(),
        }
    }

    /// Builds the series; without `needs_key` a missing API key is tolerated
    /// (cache reads and address printing do not talk to the provider).
    fn series(&self, config: &Config, needs_key: bool) -> anyhow::Result<WeatherSeries> {
        let provider = self.provider(config)?;
        let location = self.location(config)?;
        let api_key = if needs_key {
            config.require_api_key(provider)?
        } else {
            config.provider_api_key(provider).unwrap_or_default()
        };

        let transport = HttpTransport::new(config.download.fetch_timeout());

        Ok(
            WeatherSeries::with_transport(location, provider, api_key, Arc::new(transport))
                .with_fetch_timeout(config.download.fetch_timeout())
                .with_batch_options(config.download.batch_options()),
        )
    }
}

fn resolve_cache(config: &Config, cache: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match cache {
        Some(dir) => Ok(dir),
        None => config.cache_dir(),
    }
}

fn configure(config: &mut Config, provider: &str, make_default: bool) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key);
    if make_default {
        config.set_default_provider(id);
    }
    config.save()?;

    info!(
        provider = %id,
        path = %Config::config_file_path()?.display(),
        "Saved credentials"
    );
    Ok(())
}
