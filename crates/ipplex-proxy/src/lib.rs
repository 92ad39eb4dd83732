// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Infrastructure-proxy client: fetches and executes jobs pushed by an
// upstream IPP infrastructure printer, reporting status back as they run.

pub mod backoff;
pub mod engine;
pub mod health;
pub mod proxy_jobs;
pub mod transport;

pub use engine::{JobSink, ProxyEngine, ProxyEvent, ProxyState};
pub use health::{CircuitBreaker, CircuitState, ConnectionHealth};
pub use proxy_jobs::{reconcile, ProxyJobTable};
pub use transport::{
    clamp_notify_interval, is_not_found, DeviceCapabilities, FetchableJob, FetchedDocument, ProxyTransport,
    RemoteJobState, RemoteNotification,
};
