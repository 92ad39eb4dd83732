// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipplex-core — domain types, error handling, configuration, and logging
// shared across the workspace.

pub mod config;
pub mod device_id;
pub mod error;
pub mod ids;
pub mod job;
pub mod logging;
pub mod notify;
pub mod printer;
pub mod proxy;
pub mod status;
pub mod subscription;

pub use config::{AppConfig, PrinterConfig};
pub use device_id::DeviceId;
pub use error::{IpplexError, Result};
pub use ids::{JobId, PrinterId, SequenceNumber, StableUuid, SubscriptionId};
pub use job::{Document, Job, JobState, ProxyConnection};
pub use notify::NotifyEvents;
pub use printer::{Printer, PrinterLink, PrinterState, ProxyBinding, SupplyLevel};
pub use proxy::ProxyJob;
pub use status::DeviceStatusReason;
pub use subscription::{Event, Subscription};
