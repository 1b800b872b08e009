use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::PathBuf, time::Duration};

use crate::{batch::BatchOptions, model::Location, provider::ProviderId};

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
}

/// Download tuning, stored under `[download]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub concurrency: usize,
    pub max_retries: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let batch = BatchOptions::default();
        Self {
            concurrency: batch.concurrency,
            max_retries: batch.max_retries,
            fetch_timeout_secs: 30,
        }
    }
}

impl DownloadConfig {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency.max(1),
            max_retries: self.max_retries,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Optional default provider id, e.g. "darksky" or "owm".
    pub default_provider: Option<String>,

    /// Folder used when a command is asked to read or write the cache
    /// without naming one.
    pub cache_dir: Option<PathBuf>,

    /// Example TOML:
    /// [providers.owm]
    /// api_key = "..."
    pub providers: BTreeMap<String, ProviderConfig>,

    pub download: DownloadConfig,

    /// Named coordinates, e.g. `Lyon = [45.7578, 4.8320]`.
    pub places: BTreeMap<String, [f64; 2]>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `weatho configure <provider>` (e.g. `weatho configure owm`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatho", "weatho")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Platform cache folder, used when `cache_dir` is not set.
    pub fn default_cache_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatho", "weatho")
            .ok_or_else(|| anyhow!("Could not determine platform cache directory"))?;

        Ok(dirs.cache_dir().to_path_buf())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_cache_dir(),
        }
    }

    /// Convenience helper: set/replace a provider API key and optionally set default provider.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers.insert(provider_id.as_str().to_string(), ProviderConfig { api_key });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// API key for `provider_id`, or an error telling the user how to set it.
    pub fn require_api_key(&self, provider_id: ProviderId) -> Result<&str> {
        self.provider_api_key(provider_id).ok_or_else(|| {
            anyhow!(
                "No API key configured for provider '{provider_id}'.\n\
                 Hint: run `weatho configure {provider_id}` and enter your API key."
            )
        })
    }

    /// Looks up a named place, ignoring case.
    pub fn place(&self, name: &str) -> Result<Location> {
        let [lat, lon] = self
            .places
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, coords)| *coords)
            .ok_or_else(|| {
                anyhow!("Unknown place '{name}'. Add it under [places] in the config file.")
            })?;

        Location::new(lat, lon).with_context(|| format!("Invalid coordinates for place '{name}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenWeather);

        let key = cfg.provider_api_key(ProviderId::OpenWeather);
        assert_eq!(key, Some("OPEN_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::DarkSky, "DS_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OPEN_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");

        assert_eq!(default, ProviderId::DarkSky);
        assert!(cfg.is_provider_configured(ProviderId::OpenWeather));

        cfg.set_default_provider(ProviderId::OpenWeather);
        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::OpenWeather);
    }

    #[test]
    fn require_api_key_hints_configure_command() {
        let cfg = Config::default();
        let err = cfg.require_api_key(ProviderId::DarkSky).unwrap_err();
        assert!(err.to_string().contains("weatho configure darksky"));
    }

    #[test]
    fn parses_full_file() {
        let cfg = Config::from_toml(
            r#"
            default_provider = "owm"
            cache_dir = "/tmp/weather"

            [providers.owm]
            api_key = "abc"

            [download]
            concurrency = 4

            [places]
            Lyon = [45.7578, 4.832]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::OpenWeather);
        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeather), Some("abc"));
        assert_eq!(cfg.cache_dir().unwrap(), PathBuf::from("/tmp/weather"));
        assert_eq!(cfg.download.concurrency, 4);
        assert_eq!(cfg.download.max_retries, 3);
        assert_eq!(cfg.download.batch_options().concurrency, 4);

        let lyon = cfg.place("lyon").unwrap();
        assert_eq!(lyon.lat(), 45.7578);
        assert!(cfg.place("Paris").is_err());
    }

    #[test]
    fn empty_file_is_default() {
        let cfg = Config::from_toml("").unwrap();
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.download, DownloadConfig::default());
    }
}
