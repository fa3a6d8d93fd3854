// src/config.rs
// Runtime settings, read from the environment with sensible defaults.
// `.env` loading happens in main via dotenvy before this runs.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::feed::DEFAULT_WINDOW_CAPACITY;
use crate::reconnect::ReconnectConfig;

const ENV_WS_URL: &str = "FEED_WS_URL";
const ENV_BIND_ADDR: &str = "FEED_BIND_ADDR";
const ENV_WINDOW_CAPACITY: &str = "FEED_WINDOW_CAPACITY";
const ENV_RECONNECT_INITIAL_MS: &str = "FEED_RECONNECT_INITIAL_MS";
const ENV_RECONNECT_MAX_MS: &str = "FEED_RECONNECT_MAX_MS";
const ENV_RECONNECT_MAX_ATTEMPTS: &str = "FEED_RECONNECT_MAX_ATTEMPTS";

#[derive(Debug, Clone)]
pub struct Settings {
    /// WebSocket URL of the event source.
    pub ws_url: String,
    /// Address the HTTP query/control surface binds to.
    pub bind_addr: String,
    /// Feed window capacity (events, newest first).
    pub window_capacity: usize,
    pub reconnect: ReconnectConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = ReconnectConfig::default();
        let reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(env_parse(
                ENV_RECONNECT_INITIAL_MS,
                defaults.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(env_parse(
                ENV_RECONNECT_MAX_MS,
                defaults.max_delay.as_millis() as u64,
            )?),
            max_attempts: env_parse(ENV_RECONNECT_MAX_ATTEMPTS, defaults.max_attempts)?,
            ..defaults
        };

        Ok(Self {
            ws_url: env_or(ENV_WS_URL, "ws://127.0.0.1:8081/ws"),
            bind_addr: env_or(ENV_BIND_ADDR, "0.0.0.0:8000"),
            window_capacity: env_parse(ENV_WINDOW_CAPACITY, DEFAULT_WINDOW_CAPACITY)?,
            reconnect,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {key}={raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[serial_test::serial]
    #[test]
    fn defaults_apply_without_env() {
        for key in [
            ENV_WS_URL,
            ENV_BIND_ADDR,
            ENV_WINDOW_CAPACITY,
            ENV_RECONNECT_INITIAL_MS,
            ENV_RECONNECT_MAX_MS,
            ENV_RECONNECT_MAX_ATTEMPTS,
        ] {
            env::remove_var(key);
        }
        let s = Settings::from_env().unwrap();
        assert_eq!(s.window_capacity, DEFAULT_WINDOW_CAPACITY);
        assert_eq!(s.bind_addr, "0.0.0.0:8000");
        assert_eq!(s.reconnect.max_attempts, 10);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_bad_values_error() {
        env::set_var(ENV_WINDOW_CAPACITY, "250");
        env::set_var(ENV_RECONNECT_MAX_ATTEMPTS, "3");
        let s = Settings::from_env().unwrap();
        assert_eq!(s.window_capacity, 250);
        assert_eq!(s.reconnect.max_attempts, 3);

        env::set_var(ENV_WINDOW_CAPACITY, "lots");
        assert!(Settings::from_env().is_err());

        env::remove_var(ENV_WINDOW_CAPACITY);
        env::remove_var(ENV_RECONNECT_MAX_ATTEMPTS);
    }
}
