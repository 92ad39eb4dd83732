// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device scheme registry: maps a `device-uri` to the transport that opens
// it. Parsing here is intentionally forgiving about query parameters and
// strict about the scheme and authority, matching the invalid-argument vs.
// device-error split the error design draws.

use ipplex_core::{IpplexError, Result};

use crate::device::Device;
use crate::transport::dns_sd::DnsSdDevice;
use crate::transport::file::FileDevice;
use crate::transport::snmp::SnmpDevice;
use crate::transport::socket::SocketDevice;
use crate::transport::usb::UsbDevice;

/// Open a device by its `device-uri`. Supported schemes:
///
/// - `file:///path` — local path passthrough
/// - `socket://host:port` — raw TCP passthrough
/// - `dns-sd://<full-service-name>` — resolve via mDNS then behave as `socket`
/// - `snmp://host[?community=public]` — status/supply monitoring only
/// - `usb://<vendor-hex>:<product-hex>` or `usb://<vendor-hex>` — USB bulk transport
pub fn open(device_uri: &str, write_buffer: usize) -> Result<Box<dyn Device>> {
    let (scheme, rest) = device_uri
        .split_once("://")
        .ok_or_else(|| IpplexError::InvalidArgument(format!("not a URI: {device_uri}")))?;

    match scheme {
        "file" => Ok(Box::new(FileDevice::open(rest, write_buffer)?)),
        "socket" => {
            let (host, port) = split_host_port(rest)?;
            Ok(Box::new(SocketDevice::connect(host, port, write_buffer)?))
        }
        "dns-sd" => Ok(Box::new(DnsSdDevice::resolve_and_connect(rest, write_buffer)?)),
        "snmp" => {
            let (host, community) = match rest.split_once('?') {
                Some((h, query)) => (
                    h,
                    query
                        .split('&')
                        .find_map(|kv| kv.strip_prefix("community=")),
                ),
                None => (rest, None),
            };
            Ok(Box::new(SnmpDevice::connect(host, community)?))
        }
        "usb" => {
            let (vendor, product) = match rest.split_once(':') {
                Some((v, p)) => (v, Some(p)),
                None => (rest, None),
            };
            let vendor_id = parse_hex_u16(vendor)?;
            let product_id = product.map(parse_hex_u16).transpose()?;
            Ok(Box::new(UsbDevice::open(vendor_id, product_id, write_buffer)?))
        }
        other => Err(IpplexError::InvalidArgument(format!(
            "unsupported device-uri scheme: {other}"
        ))),
    }
}

fn split_host_port(rest: &str) -> Result<(&str, u16)> {
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| IpplexError::InvalidArgument(format!("missing port in {rest}")))?;
    let port: u16 = port
        .parse()
        .map_err(|_| IpplexError::InvalidArgument(format!("invalid port: {port}")))?;
    Ok((host, port))
}

fn parse_hex_u16(s: &str) -> Result<u16> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| IpplexError::InvalidArgument(format!("invalid hex id: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_scheme() {
        let err = open("ftp://host/path", 8192).unwrap_err();
        assert!(matches!(err, IpplexError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_malformed_uri() {
        let err = open("not-a-uri", 8192).unwrap_err();
        assert!(matches!(err, IpplexError::InvalidArgument(_)));
    }

    #[test]
    fn socket_scheme_requires_port() {
        let err = split_host_port("hostwithnoport").unwrap_err();
        assert!(matches!(err, IpplexError::InvalidArgument(_)));
    }

    #[test]
    fn parses_hex_vendor_id() {
        assert_eq!(parse_hex_u16("0A5F").unwrap(), 0x0A5F);
        assert_eq!(parse_hex_u16("0x0A5F").unwrap(), 0x0A5F);
    }
}
