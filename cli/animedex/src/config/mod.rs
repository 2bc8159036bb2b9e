use std::collections::HashMap;
use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use animedex_catalog::{
    CatalogClientConfig,
    DEFAULT_CATALOG_URL,
    DEFAULT_PAGE_SIZE,
    DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BASE_DELAY,
    RetryPolicy,
};
use animedex_core::SessionSettings;
use animedex_core::debounce::DEFAULT_DEBOUNCE;
use animedex_core::session::DEFAULT_LATENCY_FLOOR;
use anyhow::{Context, Result, ensure};
use config::{Config as HierarchicalConfig, Environment, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the animedex config directory
const ANIMEDEX_DIR_NAME: &str = "animedex";
const ANIMEDEX_CONFIG_DIR_VAR: &str = "ANIMEDEX_CONFIG_DIR";
const ANIMEDEX_ENV_PREFIX: &str = "ANIMEDEX_";
pub const ANIMEDEX_CONFIG_FILE: &str = "animedex.toml";

/// The catalog refuses listing pages larger than this.
const MAX_PAGE_SIZE: u32 = 25;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the catalog API
    pub api_url: String,
    /// User agent sent with catalog requests (default: `animedex/<version>`)
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Records per listing page
    pub page_size: u32,
    /// Attempts per request, including the first one
    pub retry_attempts: NonZeroU32,
    /// Backoff after the first failed attempt, grows linearly
    pub retry_base_delay_ms: u64,
    /// How long search input has to be stable before it is applied
    pub debounce_ms: u64,
    /// Minimum delay before a listing request is sent
    pub latency_floor_ms: u64,
    /// Abort requests that take longer than this (default: never)
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl Config {
    /// Creates a [Config] from the config files and the environment
    ///
    /// Later sources override earlier ones:
    /// built-in defaults, `/etc/animedex.toml`,
    /// `$ANIMEDEX_CONFIG_DIR/animedex.toml` (default: `$XDG_CONFIG_HOME/animedex`),
    /// `ANIMEDEX_*` environment variables.
    pub fn parse() -> Result<Config> {
        let mut files = vec![PathBuf::from("/etc").join(ANIMEDEX_CONFIG_FILE)];
        match config_dir() {
            Some(dir) => files.push(dir.join(ANIMEDEX_CONFIG_FILE)),
            None => debug!("no user config directory, skipping user config file"),
        }

        let vars = env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ANIMEDEX_ENV_PREFIX)
                    .map(|k| (k.to_owned(), v))
            })
            .collect();

        Self::from_sources(&files, vars)
    }

    pub(crate) fn from_sources(files: &[PathBuf], vars: HashMap<String, String>) -> Result<Config> {
        let mut builder = HierarchicalConfig::builder()
            .set_default("api_url", DEFAULT_CATALOG_URL)?
            .set_default("page_size", i64::from(DEFAULT_PAGE_SIZE))?
            .set_default("retry_attempts", i64::from(DEFAULT_RETRY_ATTEMPTS.get()))?
            .set_default("retry_base_delay_ms", millis(DEFAULT_RETRY_BASE_DELAY))?
            .set_default("debounce_ms", millis(DEFAULT_DEBOUNCE))?
            .set_default("latency_floor_ms", millis(DEFAULT_LATENCY_FLOOR))?;

        for file in files {
            debug!(file = %file.display(), "adding config file");
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config: Config = builder
            .add_source(Environment::default().source(Some(vars)).try_parsing(true))
            .build()
            .context("Could not read config")?
            .try_deserialize()
            .context("Could not parse config")?;

        ensure!(
            (1..=MAX_PAGE_SIZE).contains(&config.page_size),
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
            config.page_size
        );
        Ok(config)
    }

    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        let defaults = CatalogClientConfig::default();
        CatalogClientConfig {
            catalog_url: self.api_url.clone(),
            user_agent: self.user_agent.clone().or(defaults.user_agent),
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                base_delay: Duration::from_millis(self.retry_base_delay_ms),
            },
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            ..defaults
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            page_size: self.page_size,
            debounce: Duration::from_millis(self.debounce_ms),
            latency_floor: Duration::from_millis(self.latency_floor_ms),
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    match env::var(ANIMEDEX_CONFIG_DIR_VAR) {
        Ok(dir) => {
            debug!("`${ANIMEDEX_CONFIG_DIR_VAR}` set: {dir}");
            Some(PathBuf::from(dir))
        },
        Err(_) => dirs::config_dir().map(|dir| dir.join(ANIMEDEX_DIR_NAME)),
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn write_config_file(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join(ANIMEDEX_CONFIG_FILE);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn vars<const N: usize>(pairs: [(&str, &str); N]) -> HashMap<String, String> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_files_or_env() {
        let tempdir = tempfile::tempdir().unwrap();
        let missing = tempdir.path().join("missing.toml");

        let config = Config::from_sources(&[missing], HashMap::new()).unwrap();

        assert_eq!(config, Config {
            api_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: None,
            page_size: 24,
            retry_attempts: NonZeroU32::new(3).unwrap(),
            retry_base_delay_ms: 1000,
            debounce_ms: 500,
            latency_floor_ms: 200,
            request_timeout_ms: None,
        });
        assert_eq!(config.session_settings(), SessionSettings::default());
        assert_eq!(
            config.catalog_client_config(),
            CatalogClientConfig::default()
        );
    }

    #[test]
    fn later_files_override_earlier_ones() {
        let system = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        let system_file = write_config_file(system.path(), indoc! {r#"
            api_url = "https://catalog.example.com/v4"
            page_size = 12
        "#});
        let user_file = write_config_file(user.path(), indoc! {"
            page_size = 20
            request_timeout_ms = 5000
        "});

        let config = Config::from_sources(&[system_file, user_file], HashMap::new()).unwrap();

        assert_eq!(config.api_url, "https://catalog.example.com/v4");
        assert_eq!(config.page_size, 20);
        assert_eq!(
            config.catalog_client_config().request_timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn environment_overrides_files() {
        let user = tempfile::tempdir().unwrap();
        let user_file = write_config_file(user.path(), indoc! {"
            debounce_ms = 250
            retry_attempts = 5
        "});

        let config = Config::from_sources(
            &[user_file],
            vars([("DEBOUNCE_MS", "100"), ("USER_AGENT", "tests/1.0")]),
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.retry_attempts.get(), 5);
        assert_eq!(
            config.catalog_client_config().user_agent.as_deref(),
            Some("tests/1.0")
        );
    }

    #[test]
    fn unrelated_variables_are_ignored() {
        let config = Config::from_sources(
            &[],
            vars([("CATALOG_MOCK_DATA", "/tmp/mock.json"), ("CONFIG_DIR", "/tmp")]),
        )
        .unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_sources(&[], vars([("PAGE_SIZE", "0")])).is_err());
        assert!(Config::from_sources(&[], vars([("PAGE_SIZE", "26")])).is_err());
        assert!(Config::from_sources(&[], vars([("RETRY_ATTEMPTS", "0")])).is_err());
        assert!(Config::from_sources(&[], vars([("DEBOUNCE_MS", "soon")])).is_err());
    }
}
