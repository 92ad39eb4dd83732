// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded, cancelable enumeration per scheme: DNS-SD browsing (via
// `mdns-sd`) and SNMPv1 broadcast sweeps (hand-rolled, see
// `transport::snmp`). Every `list()` call takes a callback that returns
// `true` to keep going and `false` to stop early, and always returns once
// its bound elapses even if the callback never asks to stop.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tracing::{debug, info, warn};

use ipplex_core::{DeviceId, IpplexError, Result};

const IPP_SERVICE: &str = "_ipp._tcp.local.";
const IPPS_SERVICE: &str = "_ipps._tcp.local.";

/// A printer found via DNS-SD.
#[derive(Debug, Clone)]
pub struct DnsSdBrowseRecord {
    pub fullname: String,
    pub uri: String,
    pub address: IpAddr,
    pub port: u16,
    pub tls: bool,
    pub make_and_model: Option<String>,
}

/// Browse `_ipp._tcp.local.` and `_ipps._tcp.local.` for up to `bound`,
/// calling `on_found` for each resolved service. Returns early if
/// `on_found` returns `false`.
pub fn list_dns_sd(
    bound: Duration,
    mut on_found: impl FnMut(DnsSdBrowseRecord) -> bool,
) -> Result<()> {
    let daemon = ServiceDaemon::new()
        .map_err(|e| IpplexError::Discovery(format!("starting mDNS daemon: {e}")))?;

    let ipp_rx = daemon
        .browse(IPP_SERVICE)
        .map_err(|e| IpplexError::Discovery(format!("browsing {IPP_SERVICE}: {e}")))?;
    let ipps_rx = daemon
        .browse(IPPS_SERVICE)
        .map_err(|e| IpplexError::Discovery(format!("browsing {IPPS_SERVICE}: {e}")))?;

    let deadline = Instant::now() + bound;
    let mut seen = HashMap::new();

    'outer: loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        for (rx, tls) in [(&ipp_rx, false), (&ipps_rx, true)] {
            match rx.recv_timeout(remaining.min(Duration::from_millis(200))) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    let fullname = info.get_fullname().to_string();
                    if seen.insert(fullname.clone(), ()).is_some() {
                        continue;
                    }
                    let Some(address) = info
                        .get_addresses()
                        .iter()
                        .find(|a| a.is_ipv4())
                        .or_else(|| info.get_addresses().iter().next())
                        .copied()
                    else {
                        continue;
                    };
                    let resource_path = info.get_property_val_str("rp").unwrap_or("ipp/print");
                    let scheme = if tls { "ipps" } else { "ipp" };
                    let record = DnsSdBrowseRecord {
                        fullname,
                        uri: format!("{scheme}://{address}:{}/{resource_path}", info.get_port()),
                        address,
                        port: info.get_port(),
                        tls,
                        make_and_model: info
                            .get_property_val_str("printer-make-and-model")
                            .map(String::from),
                    };
                    info!(uri = %record.uri, "discovered printer via DNS-SD");
                    if !on_found(record) {
                        break 'outer;
                    }
                }
                Ok(ServiceEvent::SearchStopped(_)) => {}
                Ok(_) => {}
                Err(_) => {}
            }
        }
    }

    daemon
        .stop_browse(IPP_SERVICE)
        .and_then(|_| daemon.stop_browse(IPPS_SERVICE))
        .ok();
    let _ = daemon.shutdown();
    Ok(())
}

/// A printer found via SNMPv1 broadcast.
#[derive(Debug, Clone)]
pub struct SnmpBrowseRecord {
    pub address: IpAddr,
    pub device_id: Option<DeviceId>,
}

/// Broadcast an SNMPv1 GetRequest for `sysDescr` (1.3.6.1.2.1.1.1) on the
/// local subnet's broadcast address and collect replies for up to `bound`.
pub fn list_snmp(
    broadcast_addr: IpAddr,
    bound: Duration,
    mut on_found: impl FnMut(SnmpBrowseRecord) -> bool,
) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| IpplexError::Discovery(format!("binding SNMP broadcast socket: {e}")))?;
    socket
        .set_broadcast(true)
        .map_err(|e| IpplexError::Discovery(e.to_string()))?;
    socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .ok();

    let request = crate::transport::snmp::build_get_request_for_discovery();
    socket
        .send_to(&request, SocketAddr::new(broadcast_addr, 161))
        .map_err(|e| IpplexError::Discovery(format!("SNMP broadcast send: {e}")))?;

    let deadline = Instant::now() + bound;
    let mut buf = [0u8; 1500];
    while Instant::now() < deadline {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                debug!(from = %from, bytes = n, "SNMP discovery reply");
                let record = SnmpBrowseRecord {
                    address: from.ip(),
                    device_id: None,
                };
                if !on_found(record) {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                warn!(error = %e, "SNMP discovery recv error");
                break;
            }
        }
    }
    Ok(())
}
