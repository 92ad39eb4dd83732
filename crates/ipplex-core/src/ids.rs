// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Identifier newtypes for the printer/job/subscription/event tables.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! int_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(v: i32) -> Self {
                Self(v)
            }
        }
    };
}

/// A printer's index into the system-wide printer table, also its
/// `printer-id` as presented over IPP.
int_id!(PrinterId);

/// A job's index, also its `job-id` as presented over IPP. Unique only
/// within the owning printer's tables, never reused after the printer's
/// `job_id` counter advances.
int_id!(JobId);

/// A subscription's index, also its `notify-subscription-id`.
int_id!(SubscriptionId);

/// A monotonically increasing per-subscription event sequence number.
int_id!(SequenceNumber);

/// Stable identity for a printer or job that survives process restarts,
/// used for `printer-uuid`/`job-uuid` and as the proxy's correlation key
/// between local and remote job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StableUuid(pub Uuid);

impl StableUuid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn urn(&self) -> String {
        format!("urn:uuid:{}", self.0)
    }
}

impl Default for StableUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StableUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.urn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_id_displays_bare_integer() {
        assert_eq!(PrinterId(3).to_string(), "3");
    }

    #[test]
    fn stable_uuid_urn_form() {
        let id = StableUuid::new();
        assert!(id.urn().starts_with("urn:uuid:"));
    }
}
