// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ipplex-device — the device abstraction (scheme registry, transports) and
// discovery sweeps (DNS-SD, SNMP broadcast).

pub mod device;
pub mod discovery;
pub mod scheme;
pub mod transport;

pub use device::{BufferedSink, Device, SupplyReading};
pub use discovery::{list_dns_sd, list_snmp, DnsSdBrowseRecord, SnmpBrowseRecord};
pub use scheme::open;
