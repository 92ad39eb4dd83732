// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Admission, hold, and retention rules for a printer's job collections, and
// the start/finish lifecycle a worker thread drives a job through.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use ipplex_core::{IpplexError, Job, JobId, JobState, Printer, Result};

/// Decide whether a new job may be admitted right now.
///
/// A printer rejects admission outright when stopped, deleted, or blocked by
/// a reported device condition; it accepts but holds when `hold_new_jobs` is
/// set or `max_active_jobs` has been reached, leaving the caller to enqueue
/// the job in `Held` state instead of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    AcceptHeld,
    Reject,
}

pub fn admit(printer: &Printer, max_active_jobs: u32) -> Admission {
    if *printer.is_deleted.read().unwrap() || *printer.is_stopped.read().unwrap() {
        return Admission::Reject;
    }
    if !*printer.is_accepting.read().unwrap() {
        return Admission::Reject;
    }
    if printer.reasons.read().unwrap().is_blocking() {
        return Admission::AcceptHeld;
    }
    if *printer.hold_new_jobs.read().unwrap() {
        return Admission::AcceptHeld;
    }
    if max_active_jobs > 0 && printer.active_jobs.read().unwrap().len() as u32 >= max_active_jobs {
        return Admission::AcceptHeld;
    }
    Admission::Accept
}

/// Trim `completed_jobs` (and drop the corresponding entries from
/// `all_jobs`) down to `max_completed_jobs`, discarding the oldest — lowest
/// `job_id` — entries first since both collections are sorted descending.
pub fn trim_completed(printer: &Printer, max_completed_jobs: u32) -> Vec<JobId> {
    if max_completed_jobs == 0 {
        return Vec::new();
    }
    let mut completed = printer.completed_jobs.write().unwrap();
    if completed.len() as u32 <= max_completed_jobs {
        return Vec::new();
    }
    let keep = max_completed_jobs as usize;
    let dropped: Vec<JobId> = completed.split_off(keep);
    drop(completed);
    if !dropped.is_empty() {
        let mut all = printer.all_jobs.write().unwrap();
        all.retain(|id| !dropped.contains(id));
    }
    dropped
}

/// Whether a held job's `retain_until` deadline has passed and it should be
/// purged from the job table entirely (as opposed to merely completed).
pub fn is_past_retention(job: &Job, now: DateTime<Utc>) -> bool {
    match *job.retain_until.read().unwrap() {
        Some(deadline) => now >= deadline,
        None => false,
    }
}

/// Default retention window applied to a job when none is requested
/// explicitly: 24 hours past completion, long enough for `Get-Job-Attributes`
/// polling clients to observe the terminal state.
pub fn default_retention(completed_at: DateTime<Utc>) -> DateTime<Utc> {
    completed_at + Duration::hours(24)
}

/// Begin processing a held or pending job: flip printer and job state.
/// Callers hold the printer lock only long enough to read admission state
/// before calling this — the device write itself happens with no lock held,
/// per the bracketing pattern `start_job`/`finish_job` are meant to enforce.
#[instrument(skip(printer, job), fields(job_id = %job.job_id, printer_id = %printer.printer_id))]
pub fn start_job(printer: &Printer, job: &Job) -> Result<()> {
    if job.is_canceled() {
        return Err(IpplexError::Busy(format!(
            "job {} was canceled before processing began",
            job.job_id
        )));
    }
    job.start_processing();
    *printer.state.write().unwrap() = ipplex_core::PrinterState::Processing;
    *printer.state_changed_at.write().unwrap() = Utc::now();
    info!("job processing started");
    Ok(())
}

/// Complete a job: move it from `active_jobs` to `completed_jobs`, bump the
/// printer's lifetime counters, and restore `Idle` if nothing else is
/// active. Called after the device transport has been closed and with no
/// device lock held — only the printer's own internal locks are taken here.
#[instrument(skip(printer, job), fields(job_id = %job.job_id, printer_id = %printer.printer_id))]
pub fn finish_job(printer: &Printer, job: &Job, final_state: JobState) {
    job.finish(final_state);
    printer.retire_job(job.job_id);
    *job.retain_until.write().unwrap() = Some(default_retention(Utc::now()));

    if final_state == JobState::Completed {
        *printer.total_jobs_completed.write().unwrap() += 1;
        *printer.total_impressions_completed.write().unwrap() +=
            *job.impressions_completed.read().unwrap() as u64;
    }

    if printer.active_jobs.read().unwrap().is_empty() {
        *printer.state.write().unwrap() = ipplex_core::PrinterState::Idle;
        *printer.state_changed_at.write().unwrap() = Utc::now();
    }

    if final_state != JobState::Completed {
        warn!(?final_state, "job finished in non-completed state");
    } else {
        info!("job completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::PrinterId;

    fn printer() -> Printer {
        Printer::new(PrinterId(1), "office".into(), "ipp/print".into(), "file:///tmp/x".into())
    }

    #[test]
    fn admits_when_idle_and_accepting() {
        assert_eq!(admit(&printer(), 0), Admission::Accept);
    }

    #[test]
    fn rejects_when_stopped() {
        let p = printer();
        *p.is_stopped.write().unwrap() = true;
        assert_eq!(admit(&p, 0), Admission::Reject);
    }

    #[test]
    fn holds_when_at_active_job_limit() {
        let p = printer();
        p.allocate_job_id();
        assert_eq!(admit(&p, 1), Admission::AcceptHeld);
    }

    #[test]
    fn holds_when_explicit_hold_flag_set() {
        let p = printer();
        *p.hold_new_jobs.write().unwrap() = true;
        assert_eq!(admit(&p, 0), Admission::AcceptHeld);
    }

    #[test]
    fn trim_completed_drops_oldest_first() {
        let p = printer();
        for _ in 0..5 {
            p.allocate_job_id();
        }
        // All five active; retire them all into completed_jobs descending.
        let ids: Vec<_> = p.active_jobs.read().unwrap().clone();
        for id in &ids {
            p.retire_job(*id);
        }
        let dropped = trim_completed(&p, 2);
        assert_eq!(dropped.len(), 3);
        assert_eq!(p.completed_jobs.read().unwrap().len(), 2);
        // The two retained are the newest (highest ids).
        let retained = p.completed_jobs.read().unwrap().clone();
        assert!(retained.iter().all(|id| !dropped.contains(id)));
    }

    #[test]
    fn finish_job_restores_idle_when_queue_empties() {
        let p = printer();
        let id = p.allocate_job_id();
        let j = Job::new(id, p.printer_id, "x".into(), "alice".into());
        start_job(&p, &j).unwrap();
        assert_eq!(*p.state.read().unwrap(), ipplex_core::PrinterState::Processing);
        finish_job(&p, &j, JobState::Completed);
        assert_eq!(*p.state.read().unwrap(), ipplex_core::PrinterState::Idle);
        assert_eq!(*p.total_jobs_completed.read().unwrap(), 1);
    }

    #[test]
    fn starting_a_canceled_job_is_rejected() {
        let p = printer();
        let id = p.allocate_job_id();
        let j = Job::new(id, p.printer_id, "x".into(), "alice".into());
        j.finish(JobState::Canceled);
        assert!(start_job(&p, &j).is_err());
    }
}
