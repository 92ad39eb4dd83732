// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk configuration: process-wide settings plus the printers to stand
// up, persisted as one JSON file in the platform data directory.

use std::path::{Path, PathBuf};

use ipplex_core::config::{AppConfig, PrinterConfig};
use ipplex_core::{IpplexError, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub app: AppConfig,
    pub printers: Vec<PrinterConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            printers: vec![PrinterConfig::default()],
        }
    }
}

pub fn load() -> Result<DaemonConfig> {
    let path = data_dir().join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).map_err(|e| IpplexError::TransientIo(e.to_string()))?;
    serde_json::from_str(&data).map_err(|e| IpplexError::InvalidArgument(format!("malformed config: {e}")))
}

pub fn persist(config: &DaemonConfig) -> Result<()> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir).map_err(|e| IpplexError::TransientIo(e.to_string()))?;
    let json = serde_json::to_string_pretty(config).map_err(|e| IpplexError::InvalidArgument(e.to_string()))?;
    std::fs::write(dir.join(CONFIG_FILE), json).map_err(|e| IpplexError::TransientIo(e.to_string()))
}

/// Platform data directory, created on first use. Honors `XDG_DATA_HOME`
/// before falling back to `$HOME/.local/share`, matching the convention the
/// rest of the desktop-adjacent tooling in this codebase follows.
fn data_dir() -> PathBuf {
    let base = xdg_or_home();
    base.join("ipplex")
}

fn xdg_or_home() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home).join(".local").join("share");
    }
    PathBuf::from("/tmp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_printer() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.printers.len(), 1);
        assert_eq!(cfg.app.server_port, 631);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = DaemonConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DaemonConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.printers.len(), cfg.printers.len());
        assert_eq!(back.app.server_port, cfg.app.server_port);
    }
}
