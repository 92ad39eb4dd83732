// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The system-wide printer table, behind one RW lock per §5's lock
// discipline. Each entry owns its own job collection (a further RW lock,
// acquired only after the system table lock is released) plus the event
// bus and filter table a printer-scoped operation needs.

use std::sync::{Arc, RwLock};

use ipplex_core::{IpplexError, Job, JobId, Printer, PrinterId, Result};
use ipplex_events::EventBus;
use ipplex_jobs::FilterTable;

/// One local printer and everything a local operation handler needs to
/// serve it: the printer record itself, its job table, its event bus, and
/// the format filters registered against it.
pub struct PrinterEntry {
    pub printer: Arc<Printer>,
    pub jobs: RwLock<Vec<Arc<Job>>>,
    pub events: Arc<EventBus>,
    pub filters: Arc<FilterTable>,
}

impl PrinterEntry {
    pub fn new(printer: Printer) -> Self {
        Self {
            printer: Arc::new(printer),
            jobs: RwLock::new(Vec::new()),
            events: Arc::new(EventBus::new()),
            filters: Arc::new(FilterTable::new()),
        }
    }

    pub fn job(&self, id: JobId) -> Option<Arc<Job>> {
        self.jobs.read().unwrap().iter().find(|j| j.job_id == id).cloned()
    }
}

/// The system-wide printer table. Readers look a printer up by id or uri
/// slug under the shared lock; registration (not part of the accepted
/// local-printer operation surface, driven only by the daemon at startup)
/// takes the writer.
#[derive(Default)]
pub struct Registry {
    printers: RwLock<Vec<Arc<PrinterEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, printer: Printer) -> Arc<PrinterEntry> {
        let entry = Arc::new(PrinterEntry::new(printer));
        self.printers.write().unwrap().push(entry.clone());
        entry
    }

    pub fn by_id(&self, id: PrinterId) -> Result<Arc<PrinterEntry>> {
        self.printers
            .read()
            .unwrap()
            .iter()
            .find(|e| e.printer.printer_id == id)
            .cloned()
            .ok_or(IpplexError::NoSuchPrinter(id.0))
    }

    /// Look a printer up by the resource path segment a client's request
    /// URI carries, e.g. `ipp/print`.
    pub fn by_uri_slug(&self, slug: &str) -> Result<Arc<PrinterEntry>> {
        self.printers
            .read()
            .unwrap()
            .iter()
            .find(|e| e.printer.uri_slug == slug)
            .cloned()
            .ok_or_else(|| IpplexError::InvalidArgument(format!("no printer at /{slug}")))
    }

    pub fn all(&self) -> Vec<Arc<PrinterEntry>> {
        self.printers.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipplex_core::PrinterId;

    fn printer(id: i32, slug: &str) -> Printer {
        Printer::new(PrinterId(id), "office".into(), slug.into(), "file:///tmp".into())
    }

    #[test]
    fn registers_and_finds_by_id() {
        let reg = Registry::new();
        reg.register(printer(1, "ipp/print"));
        assert!(reg.by_id(PrinterId(1)).is_ok());
        assert!(matches!(reg.by_id(PrinterId(2)), Err(IpplexError::NoSuchPrinter(2))));
    }

    #[test]
    fn finds_by_uri_slug() {
        let reg = Registry::new();
        reg.register(printer(1, "ipp/print"));
        assert!(reg.by_uri_slug("ipp/print").is_ok());
        assert!(reg.by_uri_slug("ipp/other").is_err());
    }
}
