// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subscription and Event records for the pull-model notification bus.
// Lease defaults and the 100-entry ring are owned here; the enqueue/read
// logic lives in ipplex-events so this crate stays data-only.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, PrinterId, SequenceNumber, StableUuid, SubscriptionId};
use crate::notify::NotifyEvents;

/// Default subscription lease, in seconds, applied when the client omits
/// `notify-lease-duration`.
pub const DEFAULT_LEASE_SECS: i64 = 3600;
/// Maximum lease a client may request; longer requests are clamped.
pub const MAX_LEASE_SECS: i64 = 86_400;
/// Capacity of each subscription's event ring.
pub const EVENT_RING_CAPACITY: usize = 100;

/// A single notification event, queued per-subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence_number: SequenceNumber,
    pub event: NotifyEvents,
    pub printer_id: PrinterId,
    pub job_id: Option<JobId>,
    pub occurred_at: DateTime<Utc>,
    /// Free-form human text carried in `notify-text`.
    pub text: String,
}

/// A subscription to a subset of a printer's (or the whole system's)
/// events, with a bounded lease and a 100-entry pull-model event ring.
#[derive(Debug)]
pub struct Subscription {
    pub subscription_id: SubscriptionId,
    pub uuid: StableUuid,
    pub printer_id: Option<PrinterId>,
    pub job_id: Option<JobId>,
    pub owner: String,
    pub natural_language: String,
    pub mask: NotifyEvents,

    pub created_at: DateTime<Utc>,
    pub lease_seconds: i64,
    /// `notify-get-interval`, the minimum seconds between two
    /// Get-Notifications polls a client is asked to honor.
    pub interval_seconds: i64,

    pub first_sequence: SequenceNumber,
    pub last_sequence: SequenceNumber,
    pub events: VecDeque<Event>,

    pub is_canceled: bool,
}

impl Subscription {
    pub fn new(
        subscription_id: SubscriptionId,
        printer_id: Option<PrinterId>,
        job_id: Option<JobId>,
        owner: String,
        mask: NotifyEvents,
        requested_lease_secs: Option<i64>,
    ) -> Self {
        let lease_seconds = clamp_lease(requested_lease_secs);
        Self {
            subscription_id,
            uuid: StableUuid::new(),
            printer_id,
            job_id,
            owner,
            natural_language: "en".to_string(),
            mask,
            created_at: Utc::now(),
            lease_seconds,
            interval_seconds: 0,
            first_sequence: SequenceNumber(0),
            last_sequence: SequenceNumber(0),
            events: VecDeque::with_capacity(EVENT_RING_CAPACITY),
            is_canceled: false,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.lease_seconds)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_canceled || (self.lease_seconds > 0 && now >= self.expires_at())
    }

    /// Push a new event onto the ring, evicting the oldest entry and
    /// advancing `first_sequence` immediately when the ring is full.
    ///
    /// This resolves the open question of whether `first_sequence` should
    /// advance immediately on overflow or only once a client reads: a
    /// subscriber that never polls must not be able to pin memory by
    /// letting the ring grow unbounded, so eviction (and the sequence
    /// advance that announces it) happens at enqueue time.
    pub fn push_event(&mut self, event: Event) {
        self.last_sequence = event.sequence_number;
        if self.events.len() >= EVENT_RING_CAPACITY {
            self.events.pop_front();
            if let Some(oldest) = self.events.front() {
                self.first_sequence = oldest.sequence_number;
            }
        } else if self.events.is_empty() {
            self.first_sequence = event.sequence_number;
        }
        self.events.push_back(event);
    }

    /// Events with `sequence_number > after`, i.e. the Get-Notifications
    /// contract's `notify-sequence-numbers` filter.
    pub fn events_after(&self, after: SequenceNumber) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.sequence_number > after)
            .collect()
    }
}

fn clamp_lease(requested: Option<i64>) -> i64 {
    match requested {
        None => DEFAULT_LEASE_SECS,
        Some(0) => 0, // 0 means "no expiration" per RFC 3995
        Some(secs) if secs > MAX_LEASE_SECS => MAX_LEASE_SECS,
        Some(secs) if secs < 0 => DEFAULT_LEASE_SECS,
        Some(secs) => secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(seq: i32) -> Event {
        Event {
            sequence_number: SequenceNumber(seq),
            event: NotifyEvents::JOB_CREATED,
            printer_id: PrinterId(1),
            job_id: None,
            occurred_at: Utc::now(),
            text: String::new(),
        }
    }

    #[test]
    fn lease_defaults_when_unspecified() {
        assert_eq!(clamp_lease(None), DEFAULT_LEASE_SECS);
    }

    #[test]
    fn lease_clamps_to_maximum() {
        assert_eq!(clamp_lease(Some(999_999)), MAX_LEASE_SECS);
    }

    #[test]
    fn lease_zero_means_no_expiration() {
        assert_eq!(clamp_lease(Some(0)), 0);
    }

    #[test]
    fn ring_evicts_and_advances_first_sequence_immediately() {
        let mut sub = Subscription::new(
            SubscriptionId(1),
            Some(PrinterId(1)),
            None,
            "alice".into(),
            NotifyEvents::all(),
            None,
        );
        for i in 1..=(EVENT_RING_CAPACITY as i32 + 5) {
            sub.push_event(event(i));
        }
        assert_eq!(sub.events.len(), EVENT_RING_CAPACITY);
        // first five were evicted immediately, not lazily
        assert_eq!(sub.first_sequence, SequenceNumber(6));
        assert_eq!(sub.last_sequence, SequenceNumber(EVENT_RING_CAPACITY as i32 + 5));
    }

    #[test]
    fn events_after_filters_by_sequence() {
        let mut sub = Subscription::new(
            SubscriptionId(1),
            None,
            None,
            "alice".into(),
            NotifyEvents::all(),
            None,
        );
        sub.push_event(event(1));
        sub.push_event(event(2));
        sub.push_event(event(3));
        assert_eq!(sub.events_after(SequenceNumber(1)).len(), 2);
    }
}
