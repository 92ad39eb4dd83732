// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The event bus: the subscription table plus the operations a caller
// (local printer or proxy loop) drives against it. `Subscription`/`Event`
// themselves live in `ipplex-core` since the job layer also touches them
// when emitting job-lifecycle events.

use std::sync::RwLock;

use chrono::Utc;
use tracing::{debug, info};

use ipplex_core::{
    Event, IpplexError, JobId, NotifyEvents, PrinterId, Result, SequenceNumber, Subscription,
    SubscriptionId,
};

/// The subscription table for one printer (or the whole system, when
/// `printer_id` filtering is not applied by the caller).
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_subscription_id: RwLock<i32>,
    next_sequence: RwLock<i32>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_subscription_id: RwLock::new(1),
            next_sequence: RwLock::new(1),
        }
    }

    /// `Create-*-Subscriptions`: register a new subscription with a
    /// clamped lease.
    pub fn create(
        &self,
        printer_id: Option<PrinterId>,
        job_id: Option<JobId>,
        owner: String,
        mask: NotifyEvents,
        requested_lease_secs: Option<i64>,
    ) -> SubscriptionId {
        let mut next_id = self.next_subscription_id.write().unwrap();
        let id = SubscriptionId(*next_id);
        *next_id += 1;
        drop(next_id);

        let sub = Subscription::new(id, printer_id, job_id, owner, mask, requested_lease_secs);
        info!(subscription_id = %id, lease_secs = sub.lease_seconds, "subscription created");
        self.subscriptions.write().unwrap().push(sub);
        id
    }

    /// `Renew-Subscription`: re-evaluate lease clamping the same way
    /// `create` does and reset the creation clock.
    pub fn renew(&self, id: SubscriptionId, requested_lease_secs: Option<i64>) -> Result<()> {
        let mut subs = self.subscriptions.write().unwrap();
        let sub = find_mut(&mut subs, id)?;
        let clamped = Subscription::new(
            id,
            sub.printer_id,
            sub.job_id,
            sub.owner.clone(),
            sub.mask,
            requested_lease_secs,
        );
        sub.lease_seconds = clamped.lease_seconds;
        sub.created_at = Utc::now();
        info!(subscription_id = %id, lease_secs = sub.lease_seconds, "subscription renewed");
        Ok(())
    }

    /// `Cancel-Subscription`.
    pub fn cancel(&self, id: SubscriptionId) -> Result<()> {
        let mut subs = self.subscriptions.write().unwrap();
        let sub = find_mut(&mut subs, id)?;
        sub.is_canceled = true;
        info!(subscription_id = %id, "subscription canceled");
        Ok(())
    }

    /// `Get-Subscription-Attributes`: a read-only projection, `None` if
    /// unknown or expired (an expired subscription is treated as absent
    /// from the caller's perspective, matching "no such subscription").
    pub fn get(&self, id: SubscriptionId) -> Option<SubscriptionSnapshot> {
        let subs = self.subscriptions.read().unwrap();
        let now = Utc::now();
        subs.iter()
            .find(|s| s.subscription_id == id && !s.is_expired(now))
            .map(SubscriptionSnapshot::from)
    }

    /// `List-Subscriptions`, optionally filtered to one printer.
    pub fn list(&self, printer_id: Option<PrinterId>) -> Vec<SubscriptionSnapshot> {
        let subs = self.subscriptions.read().unwrap();
        let now = Utc::now();
        subs.iter()
            .filter(|s| !s.is_expired(now))
            .filter(|s| printer_id.is_none() || s.printer_id == printer_id)
            .map(SubscriptionSnapshot::from)
            .collect()
    }

    /// Publish one event to every non-expired subscription whose mask and
    /// printer/job filter matches. Assigns the next global sequence number.
    pub fn publish(
        &self,
        event_kind: NotifyEvents,
        printer_id: PrinterId,
        job_id: Option<JobId>,
        text: String,
    ) {
        let mut next_seq = self.next_sequence.write().unwrap();
        let seq = SequenceNumber(*next_seq);
        *next_seq += 1;
        drop(next_seq);

        let event = Event {
            sequence_number: seq,
            event: event_kind,
            printer_id,
            job_id,
            occurred_at: Utc::now(),
            text,
        };

        let mut subs = self.subscriptions.write().unwrap();
        let now = Utc::now();
        for sub in subs.iter_mut() {
            if sub.is_expired(now) {
                continue;
            }
            if !sub.mask.intersects(event_kind) {
                continue;
            }
            if let Some(pid) = sub.printer_id {
                if pid != printer_id {
                    continue;
                }
            }
            if let (Some(filter_job), Some(event_job)) = (sub.job_id, job_id) {
                if filter_job != event_job {
                    continue;
                }
            }
            debug!(subscription_id = %sub.subscription_id, sequence = seq.0, "event queued");
            sub.push_event(event.clone());
        }
    }

    /// `Get-Notifications`: events after the subscription's client-provided
    /// watermark, advancing nothing server-side — the client's next poll
    /// supplies its own watermark.
    pub fn notifications_since(
        &self,
        id: SubscriptionId,
        after: SequenceNumber,
    ) -> Result<Vec<Event>> {
        let subs = self.subscriptions.read().unwrap();
        let sub = subs
            .iter()
            .find(|s| s.subscription_id == id)
            .ok_or(IpplexError::NoSuchSubscription(id.0))?;
        Ok(sub.events_after(after).into_iter().cloned().collect())
    }

    /// Drop expired/canceled subscriptions. Called periodically by the
    /// printer's housekeeping loop.
    pub fn sweep_expired(&self) -> usize {
        let mut subs = self.subscriptions.write().unwrap();
        let now = Utc::now();
        let before = subs.len();
        subs.retain(|s| !s.is_expired(now));
        before - subs.len()
    }
}

fn find_mut(subs: &mut [Subscription], id: SubscriptionId) -> Result<&mut Subscription> {
    subs.iter_mut()
        .find(|s| s.subscription_id == id)
        .ok_or(IpplexError::NoSuchSubscription(id.0))
}

/// A read-only view of a subscription for `Get-Subscription-Attributes`/
/// `List-Subscriptions`, decoupled from the mutable table so callers can't
/// reach back into internal locking.
#[derive(Debug, Clone)]
pub struct SubscriptionSnapshot {
    pub subscription_id: SubscriptionId,
    pub printer_id: Option<PrinterId>,
    pub job_id: Option<JobId>,
    pub owner: String,
    pub mask: NotifyEvents,
    pub lease_seconds: i64,
    pub last_sequence: SequenceNumber,
}

impl From<&Subscription> for SubscriptionSnapshot {
    fn from(s: &Subscription) -> Self {
        Self {
            subscription_id: s.subscription_id,
            printer_id: s.printer_id,
            job_id: s.job_id,
            owner: s.owner.clone(),
            mask: s.mask,
            lease_seconds: s.lease_seconds,
            last_sequence: s.last_sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_matching_subscription_only() {
        let bus = EventBus::new();
        let sub_id = bus.create(Some(PrinterId(1)), None, "alice".into(), NotifyEvents::JOB_CREATED, None);
        let other_printer = bus.create(Some(PrinterId(2)), None, "bob".into(), NotifyEvents::JOB_CREATED, None);

        bus.publish(NotifyEvents::JOB_CREATED, PrinterId(1), Some(JobId(7)), "job 7 created".into());

        let events = bus.notifications_since(sub_id, SequenceNumber(0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].job_id, Some(JobId(7)));

        let other_events = bus.notifications_since(other_printer, SequenceNumber(0)).unwrap();
        assert!(other_events.is_empty());
    }

    #[test]
    fn mask_filters_event_kind() {
        let bus = EventBus::new();
        let sub_id = bus.create(None, None, "alice".into(), NotifyEvents::PRINTER_STATE_CHANGED, None);
        bus.publish(NotifyEvents::JOB_CREATED, PrinterId(1), None, String::new());
        let events = bus.notifications_since(sub_id, SequenceNumber(0)).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn cancel_then_get_returns_none() {
        let bus = EventBus::new();
        let id = bus.create(None, None, "alice".into(), NotifyEvents::all(), None);
        bus.cancel(id).unwrap();
        assert!(bus.get(id).is_none());
    }

    #[test]
    fn renew_resets_lease_clock() {
        let bus = EventBus::new();
        let id = bus.create(None, None, "alice".into(), NotifyEvents::all(), Some(10));
        bus.renew(id, Some(999_999)).unwrap();
        let snap = bus.get(id).unwrap();
        assert_eq!(snap.lease_seconds, ipplex_core::subscription::MAX_LEASE_SECS);
    }

    #[test]
    fn unknown_subscription_is_an_error() {
        let bus = EventBus::new();
        assert!(matches!(
            bus.notifications_since(SubscriptionId(99), SequenceNumber(0)),
            Err(IpplexError::NoSuchSubscription(99))
        ));
    }
}
