// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `dns-sd://<service-name>` scheme: resolve a `_ipp._tcp.local.`/
// `_ipps._tcp.local.` service name to an address and port, then behave
// exactly like the `socket` transport against the resolved endpoint.

use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent};

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

use crate::device::{Device, SupplyReading};
use crate::transport::socket::SocketDevice;

const IPP_SERVICE: &str = "_ipp._tcp.local.";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DnsSdDevice {
    inner: SocketDevice,
}

impl DnsSdDevice {
    /// Resolve `service_name` (e.g. `"Front Office Printer._ipp._tcp.local."`)
    /// and open a socket connection to it.
    pub fn resolve_and_connect(service_name: &str, write_buffer: usize) -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| IpplexError::Discovery(format!("starting mDNS daemon: {e}")))?;
        let receiver = daemon
            .browse(IPP_SERVICE)
            .map_err(|e| IpplexError::Discovery(format!("browsing {IPP_SERVICE}: {e}")))?;

        let deadline = std::time::Instant::now() + RESOLVE_TIMEOUT;
        let resolved = loop {
            if std::time::Instant::now() >= deadline {
                break None;
            }
            match receiver.recv_timeout(Duration::from_millis(200)) {
                Ok(ServiceEvent::ServiceResolved(info)) if info.get_fullname() == service_name => {
                    break Some(info);
                }
                _ => continue,
            }
        };

        daemon.stop_browse(IPP_SERVICE).ok();
        let _ = daemon.shutdown();

        let info = resolved
            .ok_or_else(|| IpplexError::Discovery(format!("{service_name} did not resolve")))?;
        let address = info
            .get_addresses()
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| info.get_addresses().iter().next())
            .copied()
            .ok_or_else(|| IpplexError::Discovery(format!("no address for {service_name}")))?;

        Ok(Self {
            inner: SocketDevice::connect(&address.to_string(), info.get_port(), write_buffer)?,
        })
    }
}

impl Device for DnsSdDevice {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn status(&self) -> Result<DeviceStatusReason> {
        self.inner.status()
    }

    fn device_id(&self) -> Result<Option<DeviceId>> {
        self.inner.device_id()
    }

    fn supplies(&self) -> Result<Vec<SupplyReading>> {
        self.inner.supplies()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
