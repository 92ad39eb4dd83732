// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Exponential backoff with jitter for the proxy's outbound IPP calls, on top
// of the literal 1 s idle / 30 s connect-timeout rules.

use std::time::Duration;

/// Compute the delay before the next connect retry: `base * 2^attempt`,
/// jittered, capped at `max_delay`.
pub fn connect_backoff(attempt: u32, base: Duration, max_delay: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let jitter_ms = jitter(base_ms, attempt);
    let total_ms = exp_ms.saturating_add(jitter_ms).min(max_delay.as_millis() as u64);
    Duration::from_millis(total_ms)
}

/// Deterministic spread-out jitter keyed on the attempt number — the proxy
/// has no dependency on `rand`, so this mirrors the same fallback the
/// teacher's retry engine documents for when that crate isn't available.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempts() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        let d0 = connect_backoff(0, base, max);
        let d3 = connect_backoff(3, base, max);
        assert!(d3 > d0);
    }

    #[test]
    fn backoff_is_capped() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(10);
        let d = connect_backoff(20, base, max);
        assert!(d <= max);
    }
}
