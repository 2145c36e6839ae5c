//! Application configuration

use serde::Deserialize;
use std::env;
use std::time::Duration;

pub const TESTING_ENV: &str = "TESSERA_TESTING";
pub const INIT_TIMEOUT_ENV: &str = "TESSERA_INIT_TIMEOUT_MS";
pub const DESTROY_TIMEOUT_ENV: &str = "TESSERA_DESTROY_TIMEOUT_MS";

/// Options of an [`Application`](crate::Application).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApplicationOptions {
    /// Skip app init in `start()`; the caller runs `init()` itself.
    pub testing: bool,
    pub init_timeout: Option<Duration>,
    /// Applied to app destroy and to module destroy separately.
    pub destroy_timeout: Option<Duration>,
}

impl ApplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options from `TESSERA_*` environment variables; unset or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            let value = lookup(key)?;
            match value.trim().parse::<u64>() {
                Ok(ms) => Some(Duration::from_millis(ms)),
                Err(e) => {
                    tracing::warn!("Ignoring {}={:?}: {}", key, value, e);
                    None
                }
            }
        };

        Self {
            testing: lookup(TESTING_ENV)
                .is_some_and(|value| matches!(value.trim(), "1" | "true" | "yes")),
            init_timeout: millis(INIT_TIMEOUT_ENV),
            destroy_timeout: millis(DESTROY_TIMEOUT_ENV),
        }
    }

    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = Some(timeout);
        self
    }

    pub fn destroy_timeout(mut self, timeout: Duration) -> Self {
        self.destroy_timeout = Some(timeout);
        self
    }
}
