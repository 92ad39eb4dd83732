// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The per-printer `proxy_jobs` correlation table and the cancel/release
// reconciliation rule applied whenever `Update-Active-Jobs` reports a
// remote job's state.

use std::sync::Mutex;

use ipplex_core::{Job, JobId, JobState};
pub use ipplex_core::proxy::{insert_sorted, ProxyJob};

/// Mutex-guarded `proxy_jobs` array, held only for search/insert/remove per
/// the lock-discipline rule — never across an outbound IPP call.
#[derive(Default)]
pub struct ProxyJobTable {
    rows: Mutex<Vec<ProxyJob>>,
}

impl ProxyJobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: ProxyJob) {
        let mut rows = self.rows.lock().unwrap();
        insert_sorted(&mut rows, row);
    }

    pub fn find_by_local(&self, local_job: JobId) -> Option<ProxyJob> {
        self.rows.lock().unwrap().iter().find(|r| r.local_job == local_job).cloned()
    }

    pub fn find_by_parent(&self, parent_job_id: i32) -> Option<ProxyJob> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.parent_job_id == parent_job_id)
            .cloned()
    }

    pub fn remove_by_local(&self, local_job: JobId) {
        self.rows.lock().unwrap().retain(|r| r.local_job != local_job);
    }

    pub fn mark_status_pushed(&self, local_job: JobId) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.local_job == local_job) {
            row.last_status_pushed_at = Some(chrono::Utc::now());
        }
    }

    pub fn mark_document_status_pushed(&self, local_job: JobId) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.local_job == local_job) {
            row.last_document_status_pushed_at = Some(chrono::Utc::now());
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decide what the `Update-Active-Jobs` reconciliation rule should force a
/// local job into, given its remote counterpart's reported state: a remote
/// state at or past `canceled` while the local job hasn't reached that point
/// yet forces a local cancel; a remote `pending` while the local job is
/// `held` releases it. Returns `None` when the local job needs no change.
pub fn reconcile_decision(remote_state: JobState, local_state: JobState) -> Option<JobState> {
    let canceled_rank = JobState::Canceled.ipp_enum_value();
    let remote_rank = remote_state.ipp_enum_value();
    let local_rank = local_state.ipp_enum_value();

    if remote_rank >= canceled_rank && local_rank < canceled_rank {
        return Some(JobState::Canceled);
    }
    if remote_state == JobState::Pending && local_state == JobState::Held {
        return Some(JobState::Pending);
    }
    None
}

/// Apply `reconcile_decision` directly to a `Job` handle, for callers that
/// hold one (the engine, which only sees jobs through `JobSink`, goes
/// through `apply_remote_state` instead).
pub fn reconcile(remote_state: JobState, job: &Job) {
    let local_state = *job.state.read().unwrap();
    match reconcile_decision(remote_state, local_state) {
        Some(JobState::Canceled) => job.finish(JobState::Canceled),
        Some(new_state) => *job.state.write().unwrap() = new_state,
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::{PrinterId, StableUuid};

    fn job(state: JobState) -> Job {
        let j = Job::new(JobId(1), PrinterId(1), "x".into(), "alice".into());
        if state != JobState::Pending {
            if state.is_terminal() {
                j.finish(state);
            } else {
                *j.state.write().unwrap() = state;
            }
        }
        j
    }

    #[test]
    fn remote_canceled_cancels_local_processing_job() {
        let j = job(JobState::Processing);
        reconcile(JobState::Canceled, &j);
        assert_eq!(*j.state.read().unwrap(), JobState::Canceled);
    }

    #[test]
    fn remote_pending_releases_held_job() {
        let j = job(JobState::Held);
        reconcile(JobState::Pending, &j);
        assert_eq!(*j.state.read().unwrap(), JobState::Pending);
    }

    #[test]
    fn remote_completed_does_not_touch_already_completed_local_job() {
        let j = job(JobState::Completed);
        reconcile(JobState::Completed, &j);
        assert_eq!(*j.state.read().unwrap(), JobState::Completed);
    }

    #[test]
    fn table_insert_and_lookup_round_trips() {
        let table = ProxyJobTable::new();
        table.insert(ProxyJob::new(JobId(1), 42, StableUuid::new()));
        assert!(table.find_by_local(JobId(1)).is_some());
        assert!(table.find_by_parent(42).is_some());
        table.remove_by_local(JobId(1));
        assert!(table.find_by_local(JobId(1)).is_none());
    }
}
