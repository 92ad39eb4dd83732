// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attribute-group builders: project a Printer/Job/SubscriptionSnapshot into
// the IPP attribute groups an operation response carries. Generalized from
// the teacher's single hardcoded printer-attributes block into one that
// reads every field from the live record.

use ipplex_core::{AppConfig, Job, JobState, Printer};
use ipplex_events::SubscriptionSnapshot;

use crate::codec::{IppResponseBuilder, TAG_JOB_ATTRIBUTES, TAG_PRINTER_ATTRIBUTES, TAG_SUBSCRIPTION_ATTRIBUTES};

const DOCUMENT_FORMATS: &[&str] = &[
    "application/pdf",
    "image/pwg-raster",
    "image/jpeg",
    "image/urf",
    "application/octet-stream",
];

pub fn printer_uri(base: &str, slug: &str) -> String {
    format!("{base}/{slug}")
}

/// Append one `printer-attributes-tag` group describing `printer` as of the
/// current read of its state.
pub fn write_printer_attributes(resp: &mut IppResponseBuilder, printer: &Printer, base_uri: &str) {
    let uri = printer_uri(base_uri, &printer.uri_slug);
    let state = *printer.state.read().unwrap();
    let reasons = printer.reasons.read().unwrap().to_keywords();

    resp.begin_group(TAG_PRINTER_ATTRIBUTES)
        .uri("printer-uri-supported", &uri)
        .name_attr("printer-name", &printer.name)
        .text("printer-info", &printer.name)
        .uri("printer-icons", &format!("{uri}/icon.png"))
        .text("printer-make-and-model", "ipplex embedded printer")
        .enum_attr("printer-state", state.ipp_enum_value())
        .boolean("printer-is-accepting-jobs", *printer.is_accepting.read().unwrap());

    if reasons.is_empty() {
        resp.keyword("printer-state-reasons", "none");
    } else {
        let mut iter = reasons.iter();
        if let Some(first) = iter.next() {
            resp.keyword("printer-state-reasons", first);
        }
        for kw in iter {
            resp.keyword_additional(kw);
        }
    }

    resp.keyword("ipp-versions-supported", "1.1")
        .keyword("operations-supported", "Print-Job")
        .keyword_additional("Validate-Job")
        .keyword_additional("Create-Job")
        .keyword_additional("Send-Document")
        .keyword_additional("Cancel-Job")
        .keyword_additional("Get-Job-Attributes")
        .keyword_additional("Get-Jobs")
        .keyword_additional("Get-Printer-Attributes")
        .keyword_additional("Pause-Printer")
        .keyword_additional("Resume-Printer")
        .keyword_additional("Set-Printer-Attributes")
        .keyword_additional("Cancel-My-Jobs")
        .keyword_additional("Close-Job")
        .keyword_additional("Create-Printer-Subscriptions")
        .keyword_additional("Get-Notifications")
        .keyword_additional("Cancel-Subscription")
        .keyword_additional("Renew-Subscription")
        .keyword_additional("Get-Subscription-Attributes")
        .keyword_additional("List-Subscriptions");

    let mut formats = DOCUMENT_FORMATS.iter();
    if let Some(first) = formats.next() {
        resp.mime_media_type("document-format-supported", first);
    }
    for fmt in formats {
        resp.mime_media_type_additional(fmt);
    }
    resp.mime_media_type("document-format-default", "application/octet-stream")
        .boolean("color-supported", true)
        .keyword("sides-supported", "one-sided")
        .keyword_additional("two-sided-long-edge")
        .keyword("sides-default", "one-sided")
        .charset("charset-configured", "utf-8")
        .charset("charset-supported", "utf-8")
        .natural_language("natural-language-configured", "en")
        .natural_language("generated-natural-language-supported", "en")
        .integer("queued-job-count", printer.active_jobs.read().unwrap().len() as i32)
        .integer("printer-up-time", printer.created_at.timestamp().max(0) as i32);
}

/// Append one `job-attributes-tag` group for `job`.
pub fn write_job_attributes(resp: &mut IppResponseBuilder, job: &Job, base_uri: &str, printer: &Printer) {
    let uri = printer_uri(base_uri, &printer.uri_slug);
    let state = *job.state.read().unwrap();
    let reasons = job.state_reasons.read().unwrap().to_keywords();

    resp.begin_group(TAG_JOB_ATTRIBUTES)
        .integer("job-id", job.job_id.0)
        .uri("job-uri", &format!("{uri}/jobs/{}", job.job_id))
        .uri("job-printer-uri", &uri)
        .name_attr("job-name", &job.job_name)
        .name_attr("job-originating-user-name", &job.user_name)
        .enum_attr("job-state", state.ipp_enum_value())
        .integer("job-impressions-completed", *job.impressions_completed.read().unwrap() as i32);

    if reasons.is_empty() {
        resp.keyword("job-state-reasons", "none");
    } else {
        let mut iter = reasons.iter();
        if let Some(first) = iter.next() {
            resp.keyword("job-state-reasons", first);
        }
        for kw in iter {
            resp.keyword_additional(kw);
        }
    }

    if let Some(completed) = *job.completed_at.read().unwrap() {
        resp.integer("time-at-completed", completed.timestamp() as i32);
    } else {
        resp.no_value("time-at-completed");
    }
}

/// Append one `subscription-attributes-tag` group from a read-only
/// subscription projection.
pub fn write_subscription_attributes(resp: &mut IppResponseBuilder, sub: &SubscriptionSnapshot) {
    resp.begin_group(TAG_SUBSCRIPTION_ATTRIBUTES)
        .integer("notify-subscription-id", sub.subscription_id.0)
        .name_attr("notify-subscriber-user-name", &sub.owner)
        .integer("notify-lease-duration", sub.lease_seconds as i32)
        .integer("notify-sequence-number", sub.last_sequence.0);

    if let Some(printer_id) = sub.printer_id {
        resp.integer("notify-printer-id", printer_id.0);
    }
    if let Some(job_id) = sub.job_id {
        resp.integer("notify-job-id", job_id.0);
    }

    let mut kinds = sub.mask.to_keywords().into_iter();
    if let Some(first) = kinds.next() {
        resp.keyword("notify-events", first);
    }
    for kw in kinds {
        resp.keyword_additional(kw);
    }
}

/// Whether the job's state means a subsequent `Send-Document` is still
/// legal (i.e. the job isn't terminal and hasn't been explicitly closed).
pub fn accepts_more_documents(job: &Job) -> bool {
    !matches!(*job.state.read().unwrap(), JobState::Canceled | JobState::Aborted | JobState::Completed)
        && !job.documents.read().unwrap().last().is_some_and(|d| d.is_last)
}

pub fn default_app_config() -> AppConfig {
    AppConfig::default()
}
