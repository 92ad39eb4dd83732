// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The notify-events keyword set (IPP Notification, RFC 3995/8011 plus the
// INFRA proxy extensions) as a 31-bit flag register, so a subscription's
// event mask and an event's kind live in the same compact type.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyEvents: u32 {
        const JOB_COMPLETED               = 1 << 0;
        const JOB_CONFIG_CHANGED          = 1 << 1;
        const JOB_CREATED                 = 1 << 2;
        const JOB_PROGRESS                = 1 << 3;
        const JOB_STATE_CHANGED           = 1 << 4;
        const JOB_STOPPED                 = 1 << 5;
        const JOB_FETCHABLE               = 1 << 6;
        const DOCUMENT_COMPLETED          = 1 << 7;
        const DOCUMENT_CONFIG_CHANGED     = 1 << 8;
        const DOCUMENT_CREATED            = 1 << 9;
        const DOCUMENT_STATE_CHANGED      = 1 << 10;
        const DOCUMENT_STOPPED            = 1 << 11;
        const PRINTER_CONFIG_CHANGED      = 1 << 12;
        const PRINTER_FINISHINGS_CHANGED  = 1 << 13;
        const PRINTER_MEDIA_CHANGED       = 1 << 14;
        const PRINTER_QUEUE_ORDER_CHANGED = 1 << 15;
        const PRINTER_RESTARTED           = 1 << 16;
        const PRINTER_SHUTDOWN            = 1 << 17;
        const PRINTER_STATE_CHANGED       = 1 << 18;
        const PRINTER_STOPPED             = 1 << 19;
        const PRINTER_STATE_REASONS_CHANGED = 1 << 20;
        const RESOURCE_CANCELED           = 1 << 21;
        const RESOURCE_CONFIG_CHANGED     = 1 << 22;
        const RESOURCE_CREATED            = 1 << 23;
        const RESOURCE_INSTALLED          = 1 << 24;
        const RESOURCE_CHANGED            = 1 << 25;
        const SUBSCRIPTION_CANCELED       = 1 << 26;
        const PROXY_JOB_UPDATED           = 1 << 27;
        const SERVER_AUDIT                = 1 << 28;
        const SERVER_RESTARTED            = 1 << 29;
        const SERVER_STARTED              = 1 << 30;
        const SERVER_STOPPED              = 1 << 31;
    }
}

impl NotifyEvents {
    /// Parse a single IPP `notify-events` keyword. Unknown keywords are
    /// rejected by the caller (invalid-argument), not silently dropped here.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "job-completed" => Self::JOB_COMPLETED,
            "job-config-changed" => Self::JOB_CONFIG_CHANGED,
            "job-created" => Self::JOB_CREATED,
            "job-progress" => Self::JOB_PROGRESS,
            "job-state-changed" => Self::JOB_STATE_CHANGED,
            "job-stopped" => Self::JOB_STOPPED,
            "job-fetchable" => Self::JOB_FETCHABLE,
            "document-completed" => Self::DOCUMENT_COMPLETED,
            "document-config-changed" => Self::DOCUMENT_CONFIG_CHANGED,
            "document-created" => Self::DOCUMENT_CREATED,
            "document-state-changed" => Self::DOCUMENT_STATE_CHANGED,
            "document-stopped" => Self::DOCUMENT_STOPPED,
            "printer-config-changed" => Self::PRINTER_CONFIG_CHANGED,
            "printer-finishings-changed" => Self::PRINTER_FINISHINGS_CHANGED,
            "printer-media-changed" => Self::PRINTER_MEDIA_CHANGED,
            "printer-queue-order-changed" => Self::PRINTER_QUEUE_ORDER_CHANGED,
            "printer-restarted" => Self::PRINTER_RESTARTED,
            "printer-shutdown" => Self::PRINTER_SHUTDOWN,
            "printer-state-changed" => Self::PRINTER_STATE_CHANGED,
            "printer-stopped" => Self::PRINTER_STOPPED,
            "printer-state-reasons-changed" => Self::PRINTER_STATE_REASONS_CHANGED,
            "resource-canceled" => Self::RESOURCE_CANCELED,
            "resource-config-changed" => Self::RESOURCE_CONFIG_CHANGED,
            "resource-created" => Self::RESOURCE_CREATED,
            "resource-installed" => Self::RESOURCE_INSTALLED,
            "resource-changed" => Self::RESOURCE_CHANGED,
            "subscription-canceled" => Self::SUBSCRIPTION_CANCELED,
            "proxy-job-updated" => Self::PROXY_JOB_UPDATED,
            "server-audit" => Self::SERVER_AUDIT,
            "server-restarted" => Self::SERVER_RESTARTED,
            "server-started" => Self::SERVER_STARTED,
            "server-stopped" => Self::SERVER_STOPPED,
            "all" => Self::all(),
            _ => return None,
        })
    }

    /// Render as the set of IPP keywords a `notify-events` attribute carries.
    pub fn to_keywords(self) -> Vec<&'static str> {
        let table: &[(Self, &str)] = &[
            (Self::JOB_COMPLETED, "job-completed"),
            (Self::JOB_CONFIG_CHANGED, "job-config-changed"),
            (Self::JOB_CREATED, "job-created"),
            (Self::JOB_PROGRESS, "job-progress"),
            (Self::JOB_STATE_CHANGED, "job-state-changed"),
            (Self::JOB_STOPPED, "job-stopped"),
            (Self::JOB_FETCHABLE, "job-fetchable"),
            (Self::DOCUMENT_COMPLETED, "document-completed"),
            (Self::DOCUMENT_CONFIG_CHANGED, "document-config-changed"),
            (Self::DOCUMENT_CREATED, "document-created"),
            (Self::DOCUMENT_STATE_CHANGED, "document-state-changed"),
            (Self::DOCUMENT_STOPPED, "document-stopped"),
            (Self::PRINTER_CONFIG_CHANGED, "printer-config-changed"),
            (Self::PRINTER_FINISHINGS_CHANGED, "printer-finishings-changed"),
            (Self::PRINTER_MEDIA_CHANGED, "printer-media-changed"),
            (Self::PRINTER_QUEUE_ORDER_CHANGED, "printer-queue-order-changed"),
            (Self::PRINTER_RESTARTED, "printer-restarted"),
            (Self::PRINTER_SHUTDOWN, "printer-shutdown"),
            (Self::PRINTER_STATE_CHANGED, "printer-state-changed"),
            (Self::PRINTER_STOPPED, "printer-stopped"),
            (Self::PRINTER_STATE_REASONS_CHANGED, "printer-state-reasons-changed"),
            (Self::RESOURCE_CANCELED, "resource-canceled"),
            (Self::RESOURCE_CONFIG_CHANGED, "resource-config-changed"),
            (Self::RESOURCE_CREATED, "resource-created"),
            (Self::RESOURCE_INSTALLED, "resource-installed"),
            (Self::RESOURCE_CHANGED, "resource-changed"),
            (Self::SUBSCRIPTION_CANCELED, "subscription-canceled"),
            (Self::PROXY_JOB_UPDATED, "proxy-job-updated"),
            (Self::SERVER_AUDIT, "server-audit"),
            (Self::SERVER_RESTARTED, "server-restarted"),
            (Self::SERVER_STARTED, "server-started"),
            (Self::SERVER_STOPPED, "server-stopped"),
        ];
        table
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, kw)| *kw)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_single_keyword() {
        let e = NotifyEvents::from_keyword("job-state-changed").unwrap();
        assert_eq!(e.to_keywords(), vec!["job-state-changed"]);
    }

    #[test]
    fn all_expands_to_every_bit() {
        let e = NotifyEvents::from_keyword("all").unwrap();
        assert_eq!(e.to_keywords().len(), 31);
    }

    #[test]
    fn unknown_keyword_rejected() {
        assert!(NotifyEvents::from_keyword("not-a-real-event").is_none());
    }
}
