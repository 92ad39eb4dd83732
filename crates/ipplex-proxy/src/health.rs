// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Circuit breaker over the upstream infrastructure printer connection. The
// proxy loop's own 30 s connect timeout and 1 s idle sleep already bound how
// often it retries; this sits on top to stop hammering an upstream that is
// clearly down, the same shape the device-side health tracker uses for
// local printers.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub opened_at: Option<Instant>,
    pub last_error: Option<String>,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_error: None,
        }
    }
}

/// Tracks one upstream infrastructure printer's connection health.
pub struct CircuitBreaker {
    health: ConnectionHealth,
    failure_threshold: u32,
    infra_printer_uri: String,
}

impl CircuitBreaker {
    pub fn new(infra_printer_uri: String) -> Self {
        Self {
            health: ConnectionHealth::default(),
            failure_threshold: 3,
            infra_printer_uri,
        }
    }

    /// Whether a loop iteration should attempt to connect right now.
    pub fn allow_connect(&mut self) -> bool {
        match self.health.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let Some(opened_at) = self.health.opened_at else {
                    self.health.state = CircuitState::Closed;
                    return true;
                };
                let cooldown = cooldown_duration(self.health.consecutive_failures);
                if opened_at.elapsed() >= cooldown {
                    info!(uri = %self.infra_printer_uri, "circuit half-open, allowing probe connect");
                    self.health.state = CircuitState::HalfOpen;
                    true
                } else {
                    debug!(uri = %self.infra_printer_uri, "circuit open, skipping connect attempt");
                    false
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    pub fn record_success(&mut self) {
        if self.health.state != CircuitState::Closed {
            info!(uri = %self.infra_printer_uri, "upstream connection recovered");
        }
        self.health.state = CircuitState::Closed;
        self.health.consecutive_failures = 0;
        self.health.opened_at = None;
        self.health.last_error = None;
    }

    pub fn record_failure(&mut self, error: &str) {
        self.health.consecutive_failures += 1;
        self.health.last_error = Some(error.to_string());
        if self.health.consecutive_failures >= self.failure_threshold
            || self.health.state == CircuitState::HalfOpen
        {
            warn!(uri = %self.infra_printer_uri, failures = self.health.consecutive_failures, "opening circuit to upstream");
            self.health.state = CircuitState::Open;
            self.health.opened_at = Some(Instant::now());
        }
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }
}

fn cooldown_duration(failures: u32) -> Duration {
    if failures >= 10 {
        Duration::from_secs(300)
    } else if failures >= 5 {
        Duration::from_secs(120)
    } else {
        Duration::from_secs(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let mut cb = CircuitBreaker::new("ipp://infra/printer".into());
        assert!(cb.allow_connect());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let mut cb = CircuitBreaker::new("ipp://infra/printer".into());
        cb.record_failure("timeout");
        cb.record_failure("timeout");
        assert!(cb.allow_connect());
        cb.record_failure("timeout");
        assert!(!cb.allow_connect());
    }

    #[test]
    fn success_closes_circuit() {
        let mut cb = CircuitBreaker::new("ipp://infra/printer".into());
        for _ in 0..5 {
            cb.record_failure("down");
        }
        cb.record_success();
        assert!(cb.allow_connect());
        assert_eq!(cb.health().consecutive_failures, 0);
    }
}
