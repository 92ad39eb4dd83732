// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless entry point: loads configuration, registers every configured
// printer, starts the IPP listener, and runs until interrupted.

mod config;

use std::sync::Arc;

use ipplex_core::{Printer, PrinterId};
use ipplex_server::{Listener, Registry, ServerContext};
use tracing::{error, info};

use config::DaemonConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = ipplex_core::logging::init(None, None) {
        eprintln!("failed to install logging: {e}");
    }

    info!("ipplex daemon starting");

    let daemon_config = config::load().unwrap_or_else(|e| {
        info!(error = %e, "no usable config on disk, starting from defaults");
        DaemonConfig::default()
    });

    if let Err(e) = config::persist(&daemon_config) {
        error!(error = %e, "failed to persist configuration");
    }

    let registry = Registry::new();
    for (index, printer_config) in daemon_config.printers.iter().enumerate() {
        let mut printer = Printer::new(
            PrinterId(index as i32 + 1),
            printer_config.name.clone(),
            printer_config.uri_slug.clone(),
            printer_config.device_uri.clone(),
        );
        printer.dns_sd_advertise = printer_config.dns_sd_advertise;
        let entry = registry.register(printer);
        info!(
            printer_id = %entry.printer.printer_id,
            name = %entry.printer.name,
            uri_slug = %entry.printer.uri_slug,
            "printer registered"
        );
    }

    if registry.all().is_empty() {
        error!("no printers configured, nothing to serve");
        std::process::exit(1);
    }

    let base_uri = format!("ipp://localhost:{}/", daemon_config.app.server_port);
    let ctx = Arc::new(ServerContext { registry, base_uri });

    let mut listener = Listener::new(daemon_config.app.server_port);
    if let Err(e) = listener.start(ctx.clone(), daemon_config.app.dns_sd_enabled).await {
        error!(error = %e, "failed to start IPP listener");
        std::process::exit(1);
    }

    info!(port = listener.port(), "ipplex daemon running, press ctrl-c to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }

    info!("shutdown signal received");
    if let Err(e) = listener.stop().await {
        error!(error = %e, "error stopping IPP listener");
    }
    info!("ipplex daemon stopped");
}
