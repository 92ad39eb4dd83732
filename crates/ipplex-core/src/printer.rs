// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The Printer record: one per local printer object, holding its device
// binding, queue state, and the three job-id-descending-sorted job views.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device_id::DeviceId;
use crate::ids::{JobId, PrinterId, StableUuid};
use crate::job::Job;
use crate::status::DeviceStatusReason;

/// Printer lifecycle state (IPP `printer-state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
}

impl PrinterState {
    /// IPP `printer-state` enum value (RFC 8011 §5.4.12).
    pub fn ipp_enum_value(self) -> i32 {
        match self {
            Self::Idle => 3,
            Self::Processing => 4,
            Self::Stopped => 5,
        }
    }
}

/// A single supply level reading (toner, ink, staples, waste).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyLevel {
    pub name: String,
    pub level_percent: Option<u8>,
    pub is_consumable: bool,
}

/// A linked resource reference (driver data, filter, or downstream printer
/// in a load-balancing group). Opaque beyond its name and URI, matching the
/// scope of the printer/resource/filter tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterLink {
    pub name: String,
    pub uri: String,
}

/// Configuration needed to bind a proxy loop to this printer, present only
/// when the printer is fronting an upstream infrastructure printer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyBinding {
    pub infra_printer_uri: String,
    pub proxy_device_uuid: StableUuid,
}

/// A local printer object: device binding, admission policy, and the three
/// job views (`active`, `completed`, `all`), each sorted by `job_id`
/// descending per the job-table ordering rule.
#[derive(Debug)]
pub struct Printer {
    pub printer_id: PrinterId,
    pub uuid: StableUuid,
    pub name: String,
    /// Path segment identifying this printer's resource URI, e.g. `ipp/print`.
    pub uri_slug: String,
    pub device_uri: String,
    pub device_id: Option<DeviceId>,
    /// Opaque per-driver configuration blob (format dispatch, dither tables).
    pub driver_data: serde_json::Value,

    pub state: RwLock<PrinterState>,
    pub reasons: RwLock<DeviceStatusReason>,
    pub supplies: RwLock<Vec<SupplyLevel>>,
    pub links: Vec<PrinterLink>,

    pub created_at: DateTime<Utc>,
    pub state_changed_at: RwLock<DateTime<Utc>>,

    /// Counters persisted across job completions.
    pub total_jobs_completed: RwLock<u64>,
    pub total_impressions_completed: RwLock<u64>,

    /// Next `job_id` to assign; monotonically increasing, never reused.
    pub next_job_id: RwLock<i32>,

    pub active_jobs: RwLock<Vec<JobId>>,
    pub completed_jobs: RwLock<Vec<JobId>>,
    pub all_jobs: RwLock<Vec<JobId>>,

    pub is_accepting: RwLock<bool>,
    pub hold_new_jobs: RwLock<bool>,
    pub is_deleted: RwLock<bool>,
    pub is_stopped: RwLock<bool>,

    pub dns_sd_advertise: bool,

    pub proxy: Option<ProxyBinding>,
}

impl Printer {
    pub fn new(printer_id: PrinterId, name: String, uri_slug: String, device_uri: String) -> Self {
        let now = Utc::now();
        Self {
            printer_id,
            uuid: StableUuid::new(),
            name,
            uri_slug,
            device_uri,
            device_id: None,
            driver_data: serde_json::Value::Null,
            state: RwLock::new(PrinterState::Idle),
            reasons: RwLock::new(DeviceStatusReason::NONE),
            supplies: RwLock::new(Vec::new()),
            links: Vec::new(),
            created_at: now,
            state_changed_at: RwLock::new(now),
            total_jobs_completed: RwLock::new(0),
            total_impressions_completed: RwLock::new(0),
            next_job_id: RwLock::new(1),
            active_jobs: RwLock::new(Vec::new()),
            completed_jobs: RwLock::new(Vec::new()),
            all_jobs: RwLock::new(Vec::new()),
            is_accepting: RwLock::new(true),
            hold_new_jobs: RwLock::new(false),
            is_deleted: RwLock::new(false),
            is_stopped: RwLock::new(false),
            dns_sd_advertise: true,
            proxy: None,
        }
    }

    /// Allocate the next job id for this printer and record it in `all_jobs`
    /// and `active_jobs` (both sorted descending, new ids always largest so
    /// the insert point is always index 0).
    pub fn allocate_job_id(&self) -> JobId {
        let mut next = self.next_job_id.write().unwrap();
        let id = JobId(*next);
        *next += 1;
        drop(next);
        self.all_jobs.write().unwrap().insert(0, id);
        self.active_jobs.write().unwrap().insert(0, id);
        id
    }

    /// Move a job from `active_jobs` to `completed_jobs`, preserving the
    /// descending sort in both collections.
    pub fn retire_job(&self, job_id: JobId) {
        self.active_jobs.write().unwrap().retain(|j| *j != job_id);
        let mut completed = self.completed_jobs.write().unwrap();
        if !completed.contains(&job_id) {
            let pos = completed.partition_point(|j| *j > job_id);
            completed.insert(pos, job_id);
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.reasons.read().unwrap().is_blocking()
            || *self.is_stopped.read().unwrap()
            || *self.hold_new_jobs.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer() -> Printer {
        Printer::new(PrinterId(1), "office".into(), "ipp/print".into(), "usb://Acme/X1".into())
    }

    #[test]
    fn job_ids_allocate_ascending_but_stay_sorted_descending() {
        let p = printer();
        let a = p.allocate_job_id();
        let b = p.allocate_job_id();
        assert!(b.0 > a.0);
        assert_eq!(*p.all_jobs.read().unwrap(), vec![b, a]);
        assert_eq!(*p.active_jobs.read().unwrap(), vec![b, a]);
    }

    #[test]
    fn retiring_moves_job_to_completed() {
        let p = printer();
        let a = p.allocate_job_id();
        p.retire_job(a);
        assert!(p.active_jobs.read().unwrap().is_empty());
        assert_eq!(*p.completed_jobs.read().unwrap(), vec![a]);
    }

    #[test]
    fn blocking_reason_blocks_new_jobs() {
        let p = printer();
        assert!(!p.is_blocked());
        *p.reasons.write().unwrap() = DeviceStatusReason::MEDIA_EMPTY;
        assert!(p.is_blocked());
    }
}
