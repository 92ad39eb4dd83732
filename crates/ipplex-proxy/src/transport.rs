// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The outbound IPP operations the proxy loop issues against an upstream
// infrastructure printer, collected behind a trait so the engine itself is
// testable against a mock without a real network round-trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ipplex_core::{IpplexError, JobState, Result, StableUuid};

/// One remote job's reported state, as returned by `Update-Active-Jobs`.
#[derive(Debug, Clone)]
pub struct RemoteJobState {
    pub parent_job_id: i32,
    pub state: JobState,
}

/// One fetchable job as listed by `Get-Jobs which-jobs=fetchable`.
#[derive(Debug, Clone)]
pub struct FetchableJob {
    pub parent_job_id: i32,
    pub parent_job_uuid: StableUuid,
    pub job_name: String,
}

/// A document descriptor returned by `Fetch-Document`.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub number: u32,
    pub format: String,
    pub is_last: bool,
    pub bytes: Vec<u8>,
}

/// A notification as returned by `Get-Notifications`.
#[derive(Debug, Clone)]
pub struct RemoteNotification {
    pub sequence_number: i32,
    pub event: String,
    pub parent_job_id: Option<i32>,
}

/// The driver capability summary sent via `Update-Output-Device-Attributes`.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    pub document_format_supported: Vec<String>,
    pub color_supported: bool,
    pub sides_supported: Vec<String>,
}

/// Outbound operations issued against one infrastructure printer, shaped as
/// an async request/response call per operation so a concrete
/// implementation can build each as a raw IPP request over the binary codec
/// `ipplex-server` already carries — including the infra-specific operations
/// (`Create-Printer-Subscriptions`, `Fetch-Job`, `Acknowledge-Document`,
/// etc.) that have no equivalent in RFC 8011's base operation set.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;

    async fn update_active_jobs(&self, job_ids: &[i32]) -> Result<Vec<RemoteJobState>>;

    async fn update_output_device_attributes(&self, caps: &DeviceCapabilities) -> Result<()>;

    async fn create_printer_subscriptions(&self) -> Result<i32>;

    async fn cancel_subscription(&self, subscription_id: i32) -> Result<()>;

    async fn get_notifications(
        &self,
        subscription_id: i32,
        last_sequence: i32,
    ) -> Result<(Vec<RemoteNotification>, Option<u32>)>;

    async fn get_fetchable_jobs(&self) -> Result<Vec<FetchableJob>>;

    async fn fetch_job(&self, parent_job_id: i32) -> Result<()>;

    async fn acknowledge_job(&self, parent_job_id: i32) -> Result<()>;

    async fn fetch_document(&self, parent_job_id: i32, document_number: u32) -> Result<FetchedDocument>;

    async fn acknowledge_document(&self, parent_job_id: i32, document_number: u32) -> Result<()>;

    async fn update_job_status(&self, parent_job_id: i32, state: JobState) -> Result<()>;

    async fn update_document_status(
        &self,
        parent_job_id: i32,
        document_number: u32,
        state: &str,
    ) -> Result<()>;
}

/// Whether an error from a remote call indicates "no such resource" rather
/// than a real failure — used by the `Get-Notifications` logging rule in
/// §9: log only when the error is not this.
pub fn is_not_found(err: &IpplexError) -> bool {
    matches!(err, IpplexError::NoSuchSubscription(_) | IpplexError::NoSuchJob(_) | IpplexError::NoSuchPrinter(_))
}

/// Clamp a proxy-reported `notify-get-interval` into the accepted [5, 60]s
/// range, defaulting to 5s when absent or out of range.
pub fn clamp_notify_interval(reported: Option<u32>) -> std::time::Duration {
    match reported {
        Some(secs) if (5..=60).contains(&secs) => std::time::Duration::from_secs(secs as u64),
        _ => std::time::Duration::from_secs(5),
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_interval_honors_in_range_value() {
        assert_eq!(clamp_notify_interval(Some(30)), std::time::Duration::from_secs(30));
    }

    #[test]
    fn notify_interval_defaults_when_out_of_range() {
        assert_eq!(clamp_notify_interval(Some(1)), std::time::Duration::from_secs(5));
        assert_eq!(clamp_notify_interval(Some(120)), std::time::Duration::from_secs(5));
        assert_eq!(clamp_notify_interval(None), std::time::Duration::from_secs(5));
    }

    #[test]
    fn not_found_classification() {
        assert!(is_not_found(&IpplexError::NoSuchSubscription(1)));
        assert!(!is_not_found(&IpplexError::TransientIo("timeout".into())));
    }
}
