// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipplex-server — the IPP/1.1 operation surface for local printers: binary
// codec, attribute-group builders, the multi-printer registry, per-job
// dispatch, operation handlers, and the TCP/mDNS listener that ties them
// together.

pub mod attributes;
pub mod codec;
pub mod listener;
pub mod operations;
pub mod registry;
pub mod worker;

pub use listener::{Listener, ServerStatus};
pub use operations::{dispatch, ServerContext};
pub use registry::{PrinterEntry, Registry};
