// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation dispatch: routes a parsed request to the handler for each
// operation in the accepted (local printer) surface and builds its
// response. Generalized from the teacher's five-operation, single-printer
// switch into the full accepted-operations list against the multi-printer
// registry.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use ipplex_core::notify::NotifyEvents;
use ipplex_core::{Document, IpplexError, Job, JobState, PrinterId, Result, SequenceNumber, SubscriptionId};
use ipplex_jobs::{admit, cancel_my_jobs, close_job, get_job_attributes, get_jobs, Admission, WhichJobs};

use crate::attributes::{accepts_more_documents, write_job_attributes, write_printer_attributes, write_subscription_attributes};
use crate::codec::{
    IppAttributeGroup, IppRequest, IppResponseBuilder, STATUS_CLIENT_ERROR_BAD_REQUEST,
    STATUS_CLIENT_ERROR_NOT_FOUND, STATUS_CLIENT_ERROR_NOT_POSSIBLE, STATUS_OK, STATUS_SERVER_ERROR_BUSY,
    STATUS_SERVER_ERROR_INTERNAL, STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED, TAG_OPERATION_ATTRIBUTES,
};
use crate::registry::{PrinterEntry, Registry};
use crate::worker;

// RFC 8011 / RFC 3995 / PWG5100.11 operation-id assignments this surface
// accepts. `CANCEL_MY_JOBS` sits in the vendor-extension range (RFC 8010
// SS4.4: 0x4000-0xFFFF) since PWG's "cancel jobs by owner" extension isn't
// part of the base registry.
pub const OP_PRINT_JOB: u16 = 0x0002;
pub const OP_VALIDATE_JOB: u16 = 0x0004;
pub const OP_CREATE_JOB: u16 = 0x0005;
pub const OP_SEND_DOCUMENT: u16 = 0x0006;
pub const OP_CANCEL_JOB: u16 = 0x0008;
pub const OP_GET_JOB_ATTRIBUTES: u16 = 0x0009;
pub const OP_GET_JOBS: u16 = 0x000A;
pub const OP_GET_PRINTER_ATTRIBUTES: u16 = 0x000B;
pub const OP_PAUSE_PRINTER: u16 = 0x0010;
pub const OP_RESUME_PRINTER: u16 = 0x0011;
pub const OP_SET_PRINTER_ATTRIBUTES: u16 = 0x0013;
pub const OP_CREATE_PRINTER_SUBSCRIPTIONS: u16 = 0x0016;
pub const OP_GET_SUBSCRIPTION_ATTRIBUTES: u16 = 0x0018;
pub const OP_LIST_SUBSCRIPTIONS: u16 = 0x0019;
pub const OP_RENEW_SUBSCRIPTION: u16 = 0x001A;
pub const OP_CANCEL_SUBSCRIPTION: u16 = 0x001B;
pub const OP_GET_NOTIFICATIONS: u16 = 0x001C;
pub const OP_CLOSE_JOB: u16 = 0x003B;
pub const OP_CANCEL_MY_JOBS: u16 = 0x4001;

/// Shared state every connection handler dispatches against: the printer
/// table and the base URI (`scheme://host:port`) requests are resolved
/// relative to.
pub struct ServerContext {
    pub registry: Registry,
    pub base_uri: String,
}

/// Route one parsed request to its handler, building either a success or
/// error response. Never panics on a malformed-but-parseable request —
/// every handler returns a client-error response instead.
pub fn dispatch(request: &IppRequest, peer: SocketAddr, ctx: &ServerContext) -> Vec<u8> {
    debug!(peer = %peer, operation_id = format!("0x{:04X}", request.operation_id), "dispatching IPP request");
    match request.operation_id {
        OP_PRINT_JOB => handle_print_job(request, ctx),
        OP_VALIDATE_JOB => handle_validate_job(request),
        OP_CREATE_JOB => handle_create_job(request, ctx),
        OP_SEND_DOCUMENT => handle_send_document(request, ctx),
        OP_CANCEL_JOB => handle_cancel_job(request, ctx),
        OP_GET_JOB_ATTRIBUTES => handle_get_job_attributes(request, ctx),
        OP_GET_JOBS => handle_get_jobs(request, ctx),
        OP_GET_PRINTER_ATTRIBUTES => handle_get_printer_attributes(request, ctx),
        OP_PAUSE_PRINTER => handle_pause_printer(request, ctx),
        OP_RESUME_PRINTER => handle_resume_printer(request, ctx),
        OP_SET_PRINTER_ATTRIBUTES => handle_set_printer_attributes(request, ctx),
        OP_CANCEL_MY_JOBS => handle_cancel_my_jobs(request, ctx),
        OP_CLOSE_JOB => handle_close_job(request, ctx),
        OP_CREATE_PRINTER_SUBSCRIPTIONS => handle_create_subscriptions(request, ctx),
        OP_GET_NOTIFICATIONS => handle_get_notifications(request, ctx),
        OP_CANCEL_SUBSCRIPTION => handle_cancel_subscription(request, ctx),
        OP_RENEW_SUBSCRIPTION => handle_renew_subscription(request, ctx),
        OP_GET_SUBSCRIPTION_ATTRIBUTES => handle_get_subscription_attributes(request, ctx),
        OP_LIST_SUBSCRIPTIONS => handle_list_subscriptions(request, ctx),
        other => {
            warn!(operation_id = format!("0x{other:04X}"), "unsupported IPP operation");
            error_response(
                STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED,
                request.request_id,
                &format!("operation 0x{other:04X} is not supported"),
            )
        }
    }
}

fn error_response(status: u16, request_id: u32, message: &str) -> Vec<u8> {
    let mut resp = IppResponseBuilder::new(status, request_id);
    resp.begin_group(TAG_OPERATION_ATTRIBUTES)
        .charset("attributes-charset", "utf-8")
        .natural_language("attributes-natural-language", "en")
        .text("status-message", message);
    resp.build()
}

fn success_header(request_id: u32) -> IppResponseBuilder {
    let mut resp = IppResponseBuilder::new(STATUS_OK, request_id);
    resp.begin_group(TAG_OPERATION_ATTRIBUTES)
        .charset("attributes-charset", "utf-8")
        .natural_language("attributes-natural-language", "en")
        .text("status-message", "successful-ok");
    resp
}

/// Pull the target printer out of a request's `printer-uri` operation
/// attribute, stripping the server's own base URI to recover the slug.
fn resolve_printer(op: Option<&IppAttributeGroup>, ctx: &ServerContext) -> Result<Arc<PrinterEntry>> {
    let uri = op
        .and_then(|g| g.get_string("printer-uri"))
        .ok_or_else(|| IpplexError::InvalidArgument("missing printer-uri".to_string()))?;
    let slug = uri
        .strip_prefix(&ctx.base_uri)
        .map(|s| s.trim_start_matches('/'))
        .unwrap_or(uri.trim_start_matches('/'));
    ctx.registry.by_uri_slug(slug)
}

fn resolve_job_id(op: Option<&IppAttributeGroup>) -> Result<ipplex_core::JobId> {
    op.and_then(|g| g.get_integer("job-id"))
        .map(ipplex_core::JobId)
        .ok_or_else(|| IpplexError::InvalidArgument("missing job-id".to_string()))
}

fn requesting_user(op: Option<&IppAttributeGroup>) -> Option<String> {
    op.and_then(|g| g.get_string("requesting-user-name"))
}

// ---------------------------------------------------------------------------
// Job submission
// ---------------------------------------------------------------------------

fn handle_print_job(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };

    let job = match admit_and_create(&entry, op, request.request_id) {
        Ok(j) => j,
        Err(resp) => return resp,
    };

    let format = job.documents.read().unwrap()[0].format.clone();
    if let Err(e) = worker::spool_document(&job, 1, &request.document_data) {
        return error_response(STATUS_SERVER_ERROR_INTERNAL, request.request_id, &format!("spool failed: {e}"));
    }
    close_job(&job).ok();
    spawn_worker(entry.clone(), job.clone());

    info!(job_id = %job.job_id, format = %format, "Print-Job accepted");
    let mut resp = success_header(request.request_id);
    write_job_attributes(&mut resp, &job, &ctx.base_uri, &entry.printer);
    resp.build()
}

fn handle_validate_job(request: &IppRequest) -> Vec<u8> {
    success_header(request.request_id).build()
}

fn handle_create_job(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };

    let (job, _) = match admit_and_create_without_document(&entry, op, request.request_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    info!(job_id = %job.job_id, "Create-Job accepted, awaiting Send-Document");
    let mut resp = success_header(request.request_id);
    write_job_attributes(&mut resp, &job, &ctx.base_uri, &entry.printer);
    resp.build()
}

fn handle_send_document(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let job_id = match resolve_job_id(op) {
        Ok(id) => id,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, &e.to_string()),
    };
    let job = match entry.job(job_id) {
        Some(j) => j,
        None => {
            return error_response(
                STATUS_CLIENT_ERROR_NOT_FOUND,
                request.request_id,
                &format!("no such job: {job_id}"),
            )
        }
    };

    if !accepts_more_documents(&job) {
        return error_response(
            STATUS_CLIENT_ERROR_NOT_POSSIBLE,
            request.request_id,
            "job is closed to further documents",
        );
    }

    let is_last = op.and_then(|g| g.get_boolean("last-document")).unwrap_or(true);
    let format = op
        .and_then(|g| g.get_string("document-format"))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let number = job.documents.read().unwrap().len() as u32 + 1;

    job.documents.write().unwrap().push(Document {
        number,
        format,
        name: op.and_then(|g| g.get_string("document-name")),
        is_last,
        impressions: 0,
        bytes_received: request.document_data.len() as u64,
        created_at: chrono::Utc::now(),
    });

    if let Err(e) = worker::spool_document(&job, number, &request.document_data) {
        return error_response(STATUS_SERVER_ERROR_INTERNAL, request.request_id, &format!("spool failed: {e}"));
    }

    if is_last {
        spawn_worker(entry.clone(), job.clone());
    }

    info!(job_id = %job.job_id, document = number, is_last, "Send-Document accepted");
    let mut resp = success_header(request.request_id);
    write_job_attributes(&mut resp, &job, &ctx.base_uri, &entry.printer);
    resp.build()
}

fn admit_and_create(
    entry: &Arc<PrinterEntry>,
    op: Option<&IppAttributeGroup>,
    request_id: u32,
) -> std::result::Result<Arc<Job>, Vec<u8>> {
    let (job, _) = admit_and_create_without_document(entry, op, request_id)?;
    let format = op
        .and_then(|g| g.get_string("document-format"))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    job.documents.write().unwrap().push(Document {
        number: 1,
        format,
        name: op.and_then(|g| g.get_string("document-name")),
        is_last: true,
        impressions: 0,
        bytes_received: 0,
        created_at: chrono::Utc::now(),
    });
    Ok(job)
}

fn admit_and_create_without_document(
    entry: &Arc<PrinterEntry>,
    op: Option<&IppAttributeGroup>,
    request_id: u32,
) -> std::result::Result<(Arc<Job>, Admission), Vec<u8>> {
    let admission = admit(&entry.printer, crate::attributes::default_app_config().max_active_jobs);
    if admission == Admission::Reject {
        return Err(error_response(
            STATUS_SERVER_ERROR_BUSY,
            request_id,
            "printer is not accepting jobs",
        ));
    }

    let job_name = op
        .and_then(|g| g.get_string("job-name"))
        .unwrap_or_else(|| "untitled".to_string());
    let user = requesting_user(op).unwrap_or_else(|| "anonymous".to_string());

    let job_id = entry.printer.allocate_job_id();
    let job = Arc::new(Job::new(job_id, entry.printer.printer_id, job_name, user));
    if admission == Admission::AcceptHeld {
        *job.state.write().unwrap() = JobState::Held;
    }
    if let Some(group) = op {
        let mut attrs = job.attributes.write().unwrap();
        for name in ["copies", "media", "orientation-requested", "sides", "print-quality", "print-color-mode"] {
            if let Some(v) = group.get_string(name) {
                attrs.insert(name.to_string(), v);
            }
        }
    }
    entry.jobs.write().unwrap().push(job.clone());
    entry
        .events
        .publish(NotifyEvents::JOB_CREATED, entry.printer.printer_id, Some(job_id), "job created".to_string());
    Ok((job, admission))
}

fn spawn_worker(entry: Arc<PrinterEntry>, job: Arc<Job>) {
    if *job.state.read().unwrap() == JobState::Held {
        return;
    }
    let printer = entry.printer.clone();
    let filters = entry.filters.clone();
    let events = entry.events.clone();
    std::thread::spawn(move || {
        worker::run_job(printer, job, filters, events);
    });
}

// ---------------------------------------------------------------------------
// Job management
// ---------------------------------------------------------------------------

fn handle_cancel_job(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let job_id = match resolve_job_id(op) {
        Ok(id) => id,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, &e.to_string()),
    };
    let job = match entry.job(job_id) {
        Some(j) => j,
        None => {
            return error_response(
                STATUS_CLIENT_ERROR_NOT_FOUND,
                request.request_id,
                &format!("no such job: {job_id}"),
            )
        }
    };

    let mut state = job.state.write().unwrap();
    match *state {
        JobState::Pending | JobState::Held => {
            *state = JobState::Canceled;
            drop(state);
            *job.completed_at.write().unwrap() = Some(chrono::Utc::now());
            entry.printer.retire_job(job_id);
        }
        JobState::Processing => drop(state),
        JobState::Canceled | JobState::Aborted | JobState::Completed => {
            drop(state);
            return error_response(STATUS_CLIENT_ERROR_NOT_POSSIBLE, request.request_id, "job already finished");
        }
    }

    info!(job_id = %job_id, "Cancel-Job");
    success_header(request.request_id).build()
}

fn handle_get_job_attributes(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let job_id = match resolve_job_id(op) {
        Ok(id) => id,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, &e.to_string()),
    };
    let jobs = entry.jobs.read().unwrap().clone();
    match get_job_attributes(&entry.printer, job_id, &jobs) {
        Ok(job) => {
            let mut resp = success_header(request.request_id);
            write_job_attributes(&mut resp, &job, &ctx.base_uri, &entry.printer);
            resp.build()
        }
        Err(e) => error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    }
}

fn handle_get_jobs(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let which = match op.and_then(|g| g.get_string("which-jobs")).as_deref() {
        Some("completed") => WhichJobs::Completed,
        Some("not-completed") => WhichJobs::NotCompleted,
        Some("fetchable") => WhichJobs::Fetchable,
        _ => WhichJobs::All,
    };
    let my_jobs = op.and_then(|g| g.get_boolean("my-jobs")).unwrap_or(false);
    let user = if my_jobs { requesting_user(op) } else { None };

    let jobs = entry.jobs.read().unwrap().clone();
    let result = get_jobs(&entry.printer, &jobs, which, user.as_deref());

    let mut resp = success_header(request.request_id);
    for job in &result {
        write_job_attributes(&mut resp, job, &ctx.base_uri, &entry.printer);
    }
    debug!(count = result.len(), "Get-Jobs");
    resp.build()
}

fn handle_cancel_my_jobs(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let user = match requesting_user(op) {
        Some(u) => u,
        None => {
            return error_response(
                STATUS_CLIENT_ERROR_BAD_REQUEST,
                request.request_id,
                "missing requesting-user-name",
            )
        }
    };
    let jobs = entry.jobs.read().unwrap().clone();
    let canceled = cancel_my_jobs(&entry.printer, &jobs, &user);
    info!(user = %user, count = canceled.len(), "Cancel-My-Jobs");
    success_header(request.request_id).build()
}

fn handle_close_job(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let job_id = match resolve_job_id(op) {
        Ok(id) => id,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, &e.to_string()),
    };
    let job = match entry.job(job_id) {
        Some(j) => j,
        None => {
            return error_response(
                STATUS_CLIENT_ERROR_NOT_FOUND,
                request.request_id,
                &format!("no such job: {job_id}"),
            )
        }
    };
    if close_job(&job).is_ok() {
        spawn_worker(entry.clone(), job.clone());
    }
    success_header(request.request_id).build()
}

// ---------------------------------------------------------------------------
// Printer management
// ---------------------------------------------------------------------------

fn handle_get_printer_attributes(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    let mut resp = success_header(request.request_id);
    write_printer_attributes(&mut resp, &entry.printer, &ctx.base_uri);
    resp.build()
}

fn handle_pause_printer(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    *entry.printer.is_stopped.write().unwrap() = true;
    *entry.printer.state_changed_at.write().unwrap() = chrono::Utc::now();
    entry.events.publish(
        NotifyEvents::PRINTER_STOPPED,
        entry.printer.printer_id,
        None,
        "printer paused".to_string(),
    );
    info!(printer_id = %entry.printer.printer_id, "Pause-Printer");
    success_header(request.request_id).build()
}

fn handle_resume_printer(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    *entry.printer.is_stopped.write().unwrap() = false;
    *entry.printer.state_changed_at.write().unwrap() = chrono::Utc::now();
    entry.events.publish(
        NotifyEvents::PRINTER_RESTARTED,
        entry.printer.printer_id,
        None,
        "printer resumed".to_string(),
    );
    info!(printer_id = %entry.printer.printer_id, "Resume-Printer");
    success_header(request.request_id).build()
}

fn handle_set_printer_attributes(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };
    if let Some(hold) = op.and_then(|g| g.get_boolean("printer-hold-new-jobs")) {
        *entry.printer.hold_new_jobs.write().unwrap() = hold;
    }
    if let Some(accepting) = op.and_then(|g| g.get_boolean("printer-is-accepting-jobs")) {
        *entry.printer.is_accepting.write().unwrap() = accepting;
    }
    entry.events.publish(
        NotifyEvents::PRINTER_CONFIG_CHANGED,
        entry.printer.printer_id,
        None,
        "printer attributes updated".to_string(),
    );
    info!(printer_id = %entry.printer.printer_id, "Set-Printer-Attributes");
    success_header(request.request_id).build()
}

// ---------------------------------------------------------------------------
// Subscriptions (RFC 3995)
// ---------------------------------------------------------------------------

fn handle_create_subscriptions(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let entry = match resolve_printer(op, ctx) {
        Ok(e) => e,
        Err(e) => return error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &e.to_string()),
    };

    let mask = request
        .attribute_groups
        .iter()
        .find(|g| g.delimiter == crate::codec::TAG_SUBSCRIPTION_ATTRIBUTES)
        .map(|g| g.get_all_strings("notify-events"))
        .unwrap_or_default()
        .iter()
        .filter_map(|kw| NotifyEvents::from_keyword(kw))
        .fold(NotifyEvents::empty(), |acc, e| acc | e);
    let mask = if mask.is_empty() { NotifyEvents::all() } else { mask };

    let lease = op.and_then(|g| g.get_integer("notify-lease-duration")).map(i64::from);
    let owner = requesting_user(op).unwrap_or_else(|| "anonymous".to_string());
    let job_id = op.and_then(|g| g.get_integer("notify-job-id")).map(ipplex_core::JobId);

    let sub_id = entry.events.create(Some(entry.printer.printer_id), job_id, owner, mask, lease);
    info!(subscription_id = %sub_id, "Create-Printer-Subscriptions");

    let mut resp = success_header(request.request_id);
    if let Some(snap) = entry.events.get(sub_id) {
        write_subscription_attributes(&mut resp, &snap);
    }
    resp.build()
}

fn handle_get_notifications(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let sub_id = match op.and_then(|g| g.get_integer("notify-subscription-ids")) {
        Some(id) => SubscriptionId(id),
        None => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, "missing notify-subscription-ids"),
    };
    let after = SequenceNumber(op.and_then(|g| g.get_integer("notify-sequence-numbers")).unwrap_or(0));

    // The subscription isn't tied to a single printer on this read path, so
    // every printer's bus is searched for the id rather than resolving one
    // via `printer-uri` (a client may poll without knowing which printer a
    // subscription lives on if it was created against the whole system).
    for entry in ctx.registry.all() {
        if let Ok(events) = entry.events.notifications_since(sub_id, after) {
            let mut resp = success_header(request.request_id);
            for event in &events {
                resp.begin_group(crate::codec::TAG_EVENT_NOTIFICATION_ATTRIBUTES)
                    .integer("notify-subscription-id", sub_id.0)
                    .integer("notify-sequence-number", event.sequence_number.0)
                    .keyword("notify-subscribed-event", event.event.to_keywords().first().copied().unwrap_or("none"))
                    .text("notify-text", &event.text);
            }
            return resp.build();
        }
    }
    error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &format!("no such subscription: {}", sub_id.0))
}

fn handle_cancel_subscription(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    with_subscription_id(request, ctx, |entry, id| entry.events.cancel(id))
}

fn handle_renew_subscription(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let lease = op.and_then(|g| g.get_integer("notify-lease-duration")).map(i64::from);
    with_subscription_id(request, ctx, |entry, id| entry.events.renew(id, lease))
}

fn handle_get_subscription_attributes(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let sub_id = match op.and_then(|g| g.get_integer("notify-subscription-id")) {
        Some(id) => SubscriptionId(id),
        None => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, "missing notify-subscription-id"),
    };
    for entry in ctx.registry.all() {
        if let Some(snap) = entry.events.get(sub_id) {
            let mut resp = success_header(request.request_id);
            write_subscription_attributes(&mut resp, &snap);
            return resp.build();
        }
    }
    error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &format!("no such subscription: {}", sub_id.0))
}

fn handle_list_subscriptions(request: &IppRequest, ctx: &ServerContext) -> Vec<u8> {
    let op = request.operation_attributes();
    let printer_id = op.and_then(|g| g.get_integer("notify-printer-id")).map(PrinterId);
    let mut resp = success_header(request.request_id);
    for entry in ctx.registry.all() {
        for snap in entry.events.list(printer_id) {
            write_subscription_attributes(&mut resp, &snap);
        }
    }
    resp.build()
}

fn with_subscription_id(
    request: &IppRequest,
    ctx: &ServerContext,
    action: impl Fn(&PrinterEntry, SubscriptionId) -> Result<()>,
) -> Vec<u8> {
    let op = request.operation_attributes();
    let sub_id = match op.and_then(|g| g.get_integer("notify-subscription-id")) {
        Some(id) => SubscriptionId(id),
        None => return error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, request.request_id, "missing notify-subscription-id"),
    };
    for entry in ctx.registry.all() {
        match action(&entry, sub_id) {
            Ok(()) => return success_header(request.request_id).build(),
            Err(IpplexError::NoSuchSubscription(_)) => continue,
            Err(e) => return error_response(STATUS_SERVER_ERROR_INTERNAL, request.request_id, &e.to_string()),
        }
    }
    error_response(STATUS_CLIENT_ERROR_NOT_FOUND, request.request_id, &format!("no such subscription: {}", sub_id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::Printer;

    fn ctx() -> ServerContext {
        let registry = Registry::new();
        registry.register(Printer::new(PrinterId(1), "office".into(), "ipp/print".into(), "file:///dev/null".into()));
        ServerContext { registry, base_uri: "ipp://localhost:631".to_string() }
    }

    fn request(op_id: u16, attrs: Vec<(u8, &str, Vec<u8>)>) -> IppRequest {
        IppRequest {
            version_major: 1,
            version_minor: 1,
            operation_id: op_id,
            request_id: 1,
            attribute_groups: vec![crate::codec::IppAttributeGroup {
                delimiter: TAG_OPERATION_ATTRIBUTES,
                attributes: attrs
                    .into_iter()
                    .map(|(tag, name, value)| crate::codec::IppAttribute { value_tag: tag, name: name.to_string(), value })
                    .collect(),
            }],
            document_data: Vec::new(),
        }
    }

    #[test]
    fn get_printer_attributes_finds_registered_printer() {
        let c = ctx();
        let req = request(
            OP_GET_PRINTER_ATTRIBUTES,
            vec![(crate::codec::VALUE_TAG_URI, "printer-uri", b"ipp://localhost:631/ipp/print".to_vec())],
        );
        let resp = dispatch(&req, "127.0.0.1:1".parse().unwrap(), &c);
        assert_eq!(resp[2..4], STATUS_OK.to_be_bytes());
    }

    #[test]
    fn unknown_printer_uri_is_not_found() {
        let c = ctx();
        let req = request(
            OP_GET_PRINTER_ATTRIBUTES,
            vec![(crate::codec::VALUE_TAG_URI, "printer-uri", b"ipp://localhost:631/nope".to_vec())],
        );
        let resp = dispatch(&req, "127.0.0.1:1".parse().unwrap(), &c);
        assert_eq!(resp[2..4], STATUS_CLIENT_ERROR_NOT_FOUND.to_be_bytes());
    }

    #[test]
    fn unsupported_operation_reports_server_error() {
        let c = ctx();
        let req = request(0x9999, vec![]);
        let resp = dispatch(&req, "127.0.0.1:1".parse().unwrap(), &c);
        assert_eq!(resp[2..4], STATUS_SERVER_ERROR_OPERATION_NOT_SUPPORTED.to_be_bytes());
    }

    #[test]
    fn pause_then_get_printer_attributes_reports_stopped() {
        let c = ctx();
        let req = request(
            OP_PAUSE_PRINTER,
            vec![(crate::codec::VALUE_TAG_URI, "printer-uri", b"ipp://localhost:631/ipp/print".to_vec())],
        );
        dispatch(&req, "127.0.0.1:1".parse().unwrap(), &c);
        assert!(*c.registry.by_uri_slug("ipp/print").unwrap().printer.is_stopped.read().unwrap());
    }
}
