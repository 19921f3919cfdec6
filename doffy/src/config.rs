//! Application configuration

use crate::Limit;
use doffy_di::{EncapsulationMode, Error};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr, time::Duration};

const ENV_ENCAPSULATION: &str = "DOFFY_ENCAPSULATION";
const ENV_MAX_CONCURRENCY: &str = "DOFFY_MAX_CONCURRENCY";
const ENV_ASYNC_TIMEOUT_MS: &str = "DOFFY_ASYNC_TIMEOUT_MS";

/// Startup and resolution settings.
///
/// Can be built with the `with_*` methods, deserialized with `serde`,
/// or read from `DOFFY_*` environment variables.
///
/// # Example
/// ```no_run
/// use doffy::{Config, Limit};
/// use doffy::di::EncapsulationMode;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .with_encapsulation(EncapsulationMode::Warn)
///     .with_max_concurrency(Limit::Limited(4))
///     .with_async_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Treatment of unexported cross-module accesses
    ///
    /// Default: [`EncapsulationMode::Disabled`]
    pub encapsulation: EncapsulationMode,

    /// Maximum number of asynchronous providers constructed in parallel at startup
    ///
    /// Default: 10
    pub max_concurrency: Limit<usize>,

    /// Ceiling for the whole asynchronous pre-warm pass.
    /// Each provider is still bounded by its own timeout.
    ///
    /// Default: `None`
    pub async_timeout: Option<Duration>,
}

impl Config {
    /// Creates a default configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encapsulation mode
    pub fn with_encapsulation(mut self, mode: EncapsulationMode) -> Self {
        self.encapsulation = mode;
        self
    }

    /// Sets the parallelism of the asynchronous pre-warm
    pub fn with_max_concurrency(mut self, limit: Limit<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Sets the ceiling for the asynchronous pre-warm
    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }

    /// Reads overrides from `DOFFY_ENCAPSULATION`, `DOFFY_MAX_CONCURRENCY`
    /// and `DOFFY_ASYNC_TIMEOUT_MS` on top of the defaults
    pub fn from_env() -> Result<Self, Error> {
        Self::default().with_vars(std::env::vars())
    }

    /// Applies `DOFFY_*` overrides from a list of key/value pairs.
    ///
    /// Unrelated keys are ignored. `DOFFY_MAX_CONCURRENCY=unlimited` disables the limit.
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                ENV_ENCAPSULATION => self.encapsulation = value.parse()?,
                ENV_MAX_CONCURRENCY => {
                    self.max_concurrency = if value.eq_ignore_ascii_case("unlimited") {
                        Limit::Unlimited
                    } else {
                        Limit::Limited(parse_number(ENV_MAX_CONCURRENCY, value)?)
                    };
                }
                ENV_ASYNC_TIMEOUT_MS => {
                    let millis = parse_number(ENV_ASYNC_TIMEOUT_MS, value)?;
                    self.async_timeout = Some(Duration::from_millis(millis));
                }
                _ => {}
            }
        }
        Ok(self)
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|err| Error::other(format!("invalid {key} value '{value}': {err}")))
}
