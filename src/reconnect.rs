// src/reconnect.rs
// Bounded exponential backoff for the event-source connection.

use std::time::Duration;

use rand::Rng;

/// Reconnection settings. `max_attempts` is the budget of consecutive failed
/// attempts before the manager gives up; a successful connection resets it.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Backoff multiplier applied after each attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 10,
        }
    }
}

/// Tracks the backoff state across reconnection attempts.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = self.with_jitter(self.current_delay);

        let scaled = self.current_delay.mul_f64(self.config.multiplier.max(1.0));
        self.current_delay = scaled.min(self.config.max_delay);

        Some(delay)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }
        let base = delay.as_secs_f64();
        let spread = base * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-spread..=spread);
        Duration::from_secs_f64((base + jitter).max(0.001))
    }
}
