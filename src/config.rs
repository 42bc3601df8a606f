use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_KARMA_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SUBMIT_DELAY_MS: u64 = 2000;
pub const DEFAULT_LOGIN_DELAY_MS: u64 = 1500;

pub const KARMA_API_URL_VAR: &str = "KARMA_API_URL";
pub const SUBMIT_DELAY_VAR: &str = "ACTISATHI_SUBMIT_DELAY_MS";
pub const LOGIN_DELAY_VAR: &str = "ACTISATHI_LOGIN_DELAY_MS";

pub trait Configuration {
    fn karma_api_url(&self) -> &str;
    /// Simulated round trip before a registration is recorded.
    fn submit_delay(&self) -> Duration;
    fn login_delay(&self) -> Duration;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub karma_api_url: String,
    pub submit_delay_ms: u64,
    pub login_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            karma_api_url: DEFAULT_KARMA_API_URL.to_string(),
            submit_delay_ms: DEFAULT_SUBMIT_DELAY_MS,
            login_delay_ms: DEFAULT_LOGIN_DELAY_MS,
        }
    }
}

impl ClientConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup, falling back to the
    /// defaults for anything missing or unparseable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(KARMA_API_URL_VAR).filter(|url| !url.trim().is_empty()) {
            config.karma_api_url = url.trim().to_string();
        }
        if let Some(ms) = parse_millis(&lookup, SUBMIT_DELAY_VAR) {
            config.submit_delay_ms = ms;
        }
        if let Some(ms) = parse_millis(&lookup, LOGIN_DELAY_VAR) {
            config.login_delay_ms = ms;
        }
        config
    }

    /// A config with no simulated latency, pointed at `url`.
    pub fn immediate(url: impl Into<String>) -> Self {
        Self {
            karma_api_url: url.into(),
            submit_delay_ms: 0,
            login_delay_ms: 0,
        }
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(e) => {
            log::warn!("ignoring {key}={raw:?}: {e}");
            None
        }
    }
}

impl Configuration for ClientConfig {
    fn karma_api_url(&self) -> &str {
        &self.karma_api_url
    }

    fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    fn login_delay(&self) -> Duration {
        Duration::from_millis(self.login_delay_ms)
    }
}
