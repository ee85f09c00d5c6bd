use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Regular wait before the next connection attempt
    Backoff(Duration),
    /// Too many consecutive failures, wait for the cooldown
    CircuitOpen(Duration),
}

impl Delay {
    pub fn duration(&self) -> Duration {
        match self {
            Delay::Backoff(d) | Delay::CircuitOpen(d) => *d,
        }
    }
}

/// Exponential backoff with jitter and a circuit breaker
///
/// Every failure doubles the delay ceiling up to `max_backoff`; the actual
/// delay is drawn from the upper half of the ceiling. After `max_attempts`
/// consecutive failures the circuit opens once for `circuit_cooldown` and
/// the count starts over.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        ReconnectPolicy {
            config,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn next_delay(&mut self) -> Delay {
        self.failures += 1;
        if self.failures >= self.config.max_attempts {
            self.failures = 0;
            return Delay::CircuitOpen(self.config.circuit_cooldown);
        }

        let ceiling = self.ceiling(self.failures).as_millis() as u64;
        let delay = if ceiling < 2 {
            ceiling
        } else {
            rand::thread_rng().gen_range(ceiling / 2..=ceiling)
        };
        Delay::Backoff(Duration::from_millis(delay))
    }

    fn ceiling(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(20);
        self.config
            .initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.config.max_backoff)
    }
}
