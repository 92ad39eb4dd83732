// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The Job and Document records.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{JobId, PrinterId, StableUuid};
use crate::status::DeviceStatusReason;

/// Job lifecycle state (IPP `job-state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Held,
    Processing,
    Canceled,
    Aborted,
    Completed,
}

impl JobState {
    /// IPP `job-state` enum value (RFC 8011 §5.3.7).
    pub fn ipp_enum_value(self) -> i32 {
        match self {
            Self::Pending => 3,
            Self::Held => 4,
            Self::Processing => 5,
            // 6 is "processing-stopped", unused here — a job in that
            // condition is represented as Processing with a reason set.
            Self::Canceled => 7,
            Self::Aborted => 8,
            Self::Completed => 9,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Aborted | Self::Completed)
    }
}

/// A single document within a job (most jobs carry exactly one; multi-file
/// jobs use Send-Document to append more before Close-Job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub number: u32,
    pub format: String,
    pub name: Option<String>,
    pub is_last: bool,
    pub impressions: u32,
    pub bytes_received: u64,
    pub created_at: DateTime<Utc>,
}

/// A connection handle to the owning proxy, present only for jobs created
/// via the infrastructure-proxy's job-fetch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConnection {
    pub parent_job_id: i32,
    pub parent_job_uuid: StableUuid,
}

/// A print job.
#[derive(Debug)]
pub struct Job {
    pub job_id: JobId,
    pub printer_id: PrinterId,
    pub uuid: StableUuid,

    pub job_name: String,
    pub user_name: String,

    pub state: RwLock<JobState>,
    pub state_reasons: RwLock<DeviceStatusReason>,

    pub created_at: DateTime<Utc>,
    pub processing_started_at: RwLock<Option<DateTime<Utc>>>,
    pub completed_at: RwLock<Option<DateTime<Utc>>>,

    pub documents: RwLock<Vec<Document>>,
    pub is_streaming: RwLock<bool>,
    pub impressions_completed: RwLock<u32>,

    /// Raw IPP job-template/job-description attributes carried with the
    /// job, keyed by attribute name. Kept opaque here; the server crate
    /// interprets them against the Printer's capability set.
    pub attributes: RwLock<HashMap<String, String>>,

    /// Opaque per-driver scratch state for the raster/format pipeline.
    pub driver_data: RwLock<serde_json::Value>,

    pub proxy: Option<ProxyConnection>,

    pub hold_until: RwLock<Option<DateTime<Utc>>>,
    pub retain_until: RwLock<Option<DateTime<Utc>>>,
}

impl Job {
    pub fn new(job_id: JobId, printer_id: PrinterId, job_name: String, user_name: String) -> Self {
        Self {
            job_id,
            printer_id,
            uuid: StableUuid::new(),
            job_name,
            user_name,
            state: RwLock::new(JobState::Pending),
            state_reasons: RwLock::new(DeviceStatusReason::NONE),
            created_at: Utc::now(),
            processing_started_at: RwLock::new(None),
            completed_at: RwLock::new(None),
            documents: RwLock::new(Vec::new()),
            is_streaming: RwLock::new(false),
            impressions_completed: RwLock::new(0),
            attributes: RwLock::new(HashMap::new()),
            driver_data: RwLock::new(serde_json::Value::Null),
            proxy: None,
            hold_until: RwLock::new(None),
            retain_until: RwLock::new(None),
        }
    }

    /// Move into `Processing`, recording the transition time. No-op (but
    /// not an error) if already processing — a driver may call this at the
    /// start of every page for a streaming job.
    pub fn start_processing(&self) {
        let mut state = self.state.write().unwrap();
        if *state == JobState::Processing {
            return;
        }
        *state = JobState::Processing;
        *self.processing_started_at.write().unwrap() = Some(Utc::now());
    }

    pub fn finish(&self, final_state: JobState) {
        debug_assert!(final_state.is_terminal());
        *self.state.write().unwrap() = final_state;
        *self.completed_at.write().unwrap() = Some(Utc::now());
    }

    pub fn is_canceled(&self) -> bool {
        *self.state.read().unwrap() == JobState::Canceled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobId(1), PrinterId(1), "report.pdf".into(), "alice".into())
    }

    #[test]
    fn new_job_is_pending() {
        assert_eq!(*job().state.read().unwrap(), JobState::Pending);
    }

    #[test]
    fn starting_twice_keeps_first_timestamp() {
        let j = job();
        j.start_processing();
        let first = *j.processing_started_at.read().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        j.start_processing();
        assert_eq!(*j.processing_started_at.read().unwrap(), first);
    }

    #[test]
    fn finish_sets_terminal_state_and_timestamp() {
        let j = job();
        j.finish(JobState::Completed);
        assert_eq!(*j.state.read().unwrap(), JobState::Completed);
        assert!(j.completed_at.read().unwrap().is_some());
    }

    #[test]
    fn terminal_states_classified_correctly() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Canceled.is_terminal());
        assert!(JobState::Aborted.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }
}
