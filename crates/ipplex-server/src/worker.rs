// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-job dispatch: opens the printer's device, drives the job's documents
// through format dispatch, and closes it again. Runs on its own thread so a
// blocking `DeviceOpen`/write never stalls the accept loop or another
// printer's jobs, matching the lock-drop-around-blocking-open pattern: the
// printer lock is only taken to read state, never held while the device is
// open.

use std::sync::Arc;

use tracing::{error, info, warn};

use ipplex_core::{DeviceStatusReason, IpplexError, Job, JobState, Printer};
use ipplex_events::EventBus;
use ipplex_jobs::{
    dispatch_format, finish_job, start_job, unsupported_format_error, Driver, FilterTable, FormatDecision,
    JobOptions, PassthroughDriver,
};

use ipplex_core::notify::NotifyEvents;

/// The format the always-present `PassthroughDriver` accepts natively. A
/// document declared in any other format needs either a registered filter
/// or the `image/pwg-raster` fallback to reach the device.
const PASSTHROUGH_DRIVER_FORMAT: &str = "application/octet-stream";

/// Run one job to completion on the calling thread. Spawn this on its own
/// `std::thread` per accepted job — a simple thread-per-job model rather
/// than a fixed pool, since the per-job lock discipline (§5) makes
/// cross-job contention impossible beyond the printer's own active-job
/// limit, which `queue::admit` already enforces before a job reaches here.
pub fn run_job(printer: Arc<Printer>, job: Arc<Job>, filters: Arc<FilterTable>, events: Arc<EventBus>) {
    if let Err(e) = start_job(&printer, &job) {
        warn!(job_id = %job.job_id, error = %e, "job did not start");
        return;
    }

    let driver: &dyn Driver = &PassthroughDriver;
    let result = run_documents(&printer, &job, &filters, driver);

    let final_state = match result {
        Ok(()) if job.is_canceled() => JobState::Canceled,
        Ok(()) => JobState::Completed,
        Err(e) => {
            error!(job_id = %job.job_id, error = %e, "job aborted");
            *job.state_reasons.write().unwrap() |= DeviceStatusReason::OFFLINE;
            JobState::Aborted
        }
    };

    finish_job(&printer, &job, final_state);

    let event_kind = match final_state {
        JobState::Completed => NotifyEvents::JOB_COMPLETED,
        _ => NotifyEvents::JOB_STOPPED,
    };
    events.publish(event_kind, printer.printer_id, Some(job.job_id), format!("job {} finished", job.job_id));
    info!(job_id = %job.job_id, ?final_state, "job dispatch complete");
}

fn run_documents(printer: &Printer, job: &Job, filters: &FilterTable, driver: &dyn Driver) -> ipplex_core::Result<()> {
    let mut device = ipplex_device::open(&printer.device_uri, 8192)?;
    let opts = job_options(job);

    let docs = job.documents.read().unwrap().clone();
    for doc in &docs {
        if job.is_canceled() {
            break;
        }
        match dispatch_format(filters, &doc.format, PASSTHROUGH_DRIVER_FORMAT) {
            FormatDecision::RawPassthrough | FormatDecision::Filter { .. } => {
                driver.rstartjob(device.as_mut(), &opts)?;
                let bytes = doc_bytes(job, doc.number);
                driver.rwriteline(device.as_mut(), &opts, 0, &bytes)?;
                driver.rendjob(device.as_mut(), &opts)?;
            }
            FormatDecision::PwgRasterFallback => {
                return Err(IpplexError::UnsupportedFormat(
                    "pwg-raster decode path requires a registered raster-consuming driver".to_string(),
                ));
            }
            FormatDecision::Unsupported => {
                return Err(unsupported_format_error(&doc.format, &doc.format));
            }
        }
    }

    device.flush()?;
    device.close()
}

/// Read back the bytes `operations::spool_document` wrote to disk for this
/// document. Spooling happens at admission time, off the connection-handler
/// thread's lifetime, so the worker can run arbitrarily long after the
/// client that submitted the job has disconnected.
fn doc_bytes(job: &Job, number: u32) -> Vec<u8> {
    let path = job
        .driver_data
        .read()
        .unwrap()
        .get("spool_paths")
        .and_then(|v| v.get(number.to_string()))
        .and_then(|v| v.as_str())
        .map(std::path::PathBuf::from);
    match path {
        Some(p) => std::fs::read(&p).unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Spool one document's bytes to a per-job temp file and record the path
/// under `driver_data.spool_paths[number]`, so the worker thread (which may
/// run long after the submitting connection has closed) can read it back.
pub fn spool_document(job: &Job, number: u32, bytes: &[u8]) -> ipplex_core::Result<()> {
    let dir = std::env::temp_dir().join("ipplex-spool");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}-{number}", job.uuid.0));
    std::fs::write(&path, bytes)?;

    let mut data = job.driver_data.write().unwrap();
    if !data.is_object() {
        *data = serde_json::json!({});
    }
    data["spool_paths"][number.to_string()] = serde_json::Value::String(path.to_string_lossy().into_owned());
    Ok(())
}

fn job_options(job: &Job) -> JobOptions {
    let attrs = job.attributes.read().unwrap();
    JobOptions {
        copies: attrs.get("copies").and_then(|v| v.parse().ok()).unwrap_or(1),
        media: attrs.get("media").cloned(),
        orientation: attrs.get("orientation-requested").cloned(),
        sides: attrs.get("sides").cloned(),
        print_quality: attrs.get("print-quality").cloned(),
        color_mode: attrs.get("print-color-mode").cloned(),
        ..JobOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::{Document, JobId, PrinterId};

    fn job_with_document(format: &str) -> Job {
        let job = Job::new(JobId(1), PrinterId(1), "x".into(), "alice".into());
        job.documents.write().unwrap().push(Document {
            number: 1,
            format: format.into(),
            name: None,
            is_last: true,
            impressions: 0,
            bytes_received: 0,
            created_at: chrono::Utc::now(),
        });
        job
    }

    #[test]
    fn unregistered_format_is_rejected_with_no_filters() {
        let printer = Printer::new(PrinterId(1), "office".into(), "ipp/print".into(), "file:///dev/null".into());
        let job = job_with_document("application/pdf");
        let filters = FilterTable::new();
        assert!(run_documents(&printer, &job, &filters, &PassthroughDriver).is_err());
    }

    #[test]
    fn native_octet_stream_format_passes_through() {
        let printer = Printer::new(PrinterId(1), "office".into(), "ipp/print".into(), "file:///dev/null".into());
        let job = job_with_document(PASSTHROUGH_DRIVER_FORMAT);
        let filters = FilterTable::new();
        assert!(run_documents(&printer, &job, &filters, &PassthroughDriver).is_ok());
    }
}
