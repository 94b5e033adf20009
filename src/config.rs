//! Application configuration, read from `audience-segments.toml` and the
//! environment (environment wins).

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use fundu::DurationParser;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;

use crate::odp::DEFAULT_API_HOST;
use crate::segments::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TIMEOUT};

const CONFIG_FILE: &str = "audience-segments.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Level for this crate's log target; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// ODP public API key. Required to resolve segments from the CLI.
    #[serde(default)]
    pub odp_api_key: Option<String>,
    #[serde(default = "default_api_host")]
    pub odp_api_host: String,
    #[serde(default = "default_cache_size")]
    pub segments_cache_size: usize,
    /// Accepts seconds (`600`) or a duration string (`"10m"`).
    #[serde(
        default = "default_cache_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub segments_cache_timeout: Duration,
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub odp_request_timeout: Duration,
}

impl Config {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw())
    }

    pub fn load() -> Result<Self> {
        Self::figment().extract().context("Failed to load config")
    }

    /// The configured API key, or an error naming the variable to set.
    pub fn api_key(&self) -> Result<&str> {
        self.odp_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context("ODP_API_KEY is not set")
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_cache_timeout() -> Duration {
    DEFAULT_CACHE_TIMEOUT
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl serde::de::Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number of seconds or a duration string like \"10m\"")
        }

        fn visit_u64<E: serde::de::Error>(self, secs: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(secs))
        }

        fn visit_i64<E: serde::de::Error>(self, secs: i64) -> Result<Duration, E> {
            u64::try_from(secs)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }

        fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Duration, E> {
            let parsed = DurationParser::with_all_time_units()
                .parse(value.trim())
                .map_err(|e| E::custom(format!("invalid duration `{value}`: {e}")))?;
            Duration::try_from(parsed)
                .map_err(|e| E::custom(format!("invalid duration `{value}`: {e}")))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
