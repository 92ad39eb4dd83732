// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application and per-printer configuration. File/CLI loading is out of
// scope; these structs and their defaults are the ambient configuration
// layer every module reads from.

use serde::{Deserialize, Serialize};

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port the embedded IPP server listens on.
    pub server_port: u16,
    /// Maximum completed jobs retained per printer before the oldest is
    /// dropped from `completed_jobs` (0 = unbounded).
    pub max_completed_jobs: u32,
    /// Maximum simultaneously active jobs per printer (0 = unlimited).
    pub max_active_jobs: u32,
    /// Device write-buffer size in bytes.
    pub device_write_buffer: usize,
    /// Default subscription lease, seconds.
    pub default_lease_secs: i64,
    /// Maximum subscription lease a client may request, seconds.
    pub max_lease_secs: i64,
    /// Whether DNS-SD advertisement is enabled process-wide.
    pub dns_sd_enabled: bool,
    /// Whether SNMP broadcast discovery is enabled.
    pub snmp_discovery_enabled: bool,
    /// Worker threads in the per-job dispatch pool.
    pub worker_threads: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 631,
            max_completed_jobs: 1000,
            max_active_jobs: 0,
            device_write_buffer: 8192,
            default_lease_secs: crate::subscription::DEFAULT_LEASE_SECS,
            max_lease_secs: crate::subscription::MAX_LEASE_SECS,
            dns_sd_enabled: true,
            snmp_discovery_enabled: true,
            worker_threads: 4,
        }
    }
}

/// Configuration needed to stand up a single `Printer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub name: String,
    pub uri_slug: String,
    pub device_uri: String,
    pub dns_sd_advertise: bool,
    pub infra_printer_uri: Option<String>,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            name: "ipplex".to_string(),
            uri_slug: "ipp/print".to_string(),
            device_uri: "file:///dev/usb/lp0".to_string(),
            dns_sd_advertise: true,
            infra_printer_uri: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server_port, 631);
        assert_eq!(cfg.max_active_jobs, 0);
        assert_eq!(cfg.default_lease_secs, 3600);
        assert_eq!(cfg.max_lease_secs, 86_400);
        assert_eq!(cfg.device_write_buffer, 8192);
    }
}
