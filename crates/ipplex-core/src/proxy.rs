// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The proxy_jobs correlation table: one entry per local job fetched from an
// upstream infrastructure printer, keyed so the proxy loop can reconcile
// local state against the remote `parent_job_id`.

use chrono::{DateTime, Utc};

use crate::ids::{JobId, StableUuid};

/// One row of the `proxy_jobs` table, sorted by `parent_job_id` descending.
#[derive(Debug, Clone)]
pub struct ProxyJob {
    pub local_job: JobId,
    pub parent_job_id: i32,
    pub parent_job_uuid: StableUuid,
    pub last_status_pushed_at: Option<DateTime<Utc>>,
    pub last_document_status_pushed_at: Option<DateTime<Utc>>,
}

impl ProxyJob {
    pub fn new(local_job: JobId, parent_job_id: i32, parent_job_uuid: StableUuid) -> Self {
        Self {
            local_job,
            parent_job_id,
            parent_job_uuid,
            last_status_pushed_at: None,
            last_document_status_pushed_at: None,
        }
    }
}

/// Insert into a descending-sorted `proxy_jobs` vector, preserving order.
pub fn insert_sorted(table: &mut Vec<ProxyJob>, row: ProxyJob) {
    let pos = table.partition_point(|r| r.parent_job_id > row.parent_job_id);
    table.insert(pos, row);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sorted_keeps_descending_order() {
        let mut table = Vec::new();
        insert_sorted(&mut table, ProxyJob::new(JobId(1), 5, StableUuid::new()));
        insert_sorted(&mut table, ProxyJob::new(JobId(2), 9, StableUuid::new()));
        insert_sorted(&mut table, ProxyJob::new(JobId(3), 2, StableUuid::new()));
        let ids: Vec<i32> = table.iter().map(|r| r.parent_job_id).collect();
        assert_eq!(ids, vec![9, 5, 2]);
    }
}
