// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `snmp://host` scheme: SNMPv1 GetRequest over UDP for Printer-MIB status
// and supply levels. No crate in the dependency set speaks SNMP, so this
// is a minimal hand-rolled BER encoder/decoder covering exactly the PDUs
// this transport needs — the same "wire protocol straight over a raw
// socket" approach used for the raw/LPR transports.
//
// This scheme is monitoring-only: a printer's SNMP agent does not accept
// print data, so `write`/`flush` report invalid-argument rather than
// silently discarding bytes.

use std::net::UdpSocket;
use std::time::Duration;

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

use crate::device::{Device, SupplyReading};

const SNMP_PORT: u16 = 161;
const DEFAULT_COMMUNITY: &str = "public";

// Printer-MIB (RFC 3805) OIDs used here.
const OID_PRT_GENERAL_PRINTER_NAME: &str = "1.3.6.1.2.1.43.5.1.1.16.1";
const OID_HR_DEVICE_STATUS: &str = "1.3.6.1.2.1.25.3.2.1.5.1";
const OID_PRT_MARKER_SUPPLIES_LEVEL: &str = "1.3.6.1.2.1.43.11.1.1.9.1.1";

/// BER/DER tag bytes used by the SNMPv1 PDUs this client needs.
mod ber {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const GET_REQUEST: u8 = 0xA0;
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
        let significant = &bytes[first_nonzero..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(content.len(), out);
    out.extend_from_slice(content);
}

fn encode_integer(value: i64, out: &mut Vec<u8>) {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    encode_tlv(ber::INTEGER, &bytes, out);
}

fn encode_oid(dotted: &str) -> Vec<u8> {
    let parts: Vec<u64> = dotted.split('.').filter_map(|p| p.parse().ok()).collect();
    let mut content = Vec::new();
    if parts.len() >= 2 {
        content.push((parts[0] * 40 + parts[1]) as u8);
        for &sub in &parts[2..] {
            if sub < 0x80 {
                content.push(sub as u8);
            } else {
                let mut chunks = Vec::new();
                let mut v = sub;
                chunks.push((v & 0x7f) as u8);
                v >>= 7;
                while v > 0 {
                    chunks.push((v & 0x7f) as u8 | 0x80);
                    v >>= 7;
                }
                chunks.reverse();
                content.extend_from_slice(&chunks);
            }
        }
    }
    content
}

/// Build a GetRequest for `sysDescr`, used to elicit a reply from any
/// SNMP agent on the subnet during a broadcast discovery sweep.
pub fn build_get_request_for_discovery() -> Vec<u8> {
    build_get_request(DEFAULT_COMMUNITY, "1.3.6.1.2.1.1.1", 1)
}

/// Build an SNMPv1 GetRequest PDU for a single OID.
fn build_get_request(community: &str, oid: &str, request_id: i32) -> Vec<u8> {
    let mut varbind_oid = Vec::new();
    encode_tlv(ber::OBJECT_IDENTIFIER, &encode_oid(oid), &mut varbind_oid);
    encode_tlv(ber::NULL, &[], &mut varbind_oid);
    let mut varbind = Vec::new();
    encode_tlv(ber::SEQUENCE, &varbind_oid, &mut varbind);

    let mut varbind_list = Vec::new();
    encode_tlv(ber::SEQUENCE, &varbind, &mut varbind_list);

    let mut pdu_body = Vec::new();
    encode_integer(request_id as i64, &mut pdu_body);
    encode_integer(0, &mut pdu_body); // error-status
    encode_integer(0, &mut pdu_body); // error-index
    pdu_body.extend_from_slice(&varbind_list);

    let mut pdu = Vec::new();
    encode_tlv(ber::GET_REQUEST, &pdu_body, &mut pdu);

    let mut message = Vec::new();
    encode_integer(0, &mut message); // version: SNMPv1
    encode_tlv(ber::OCTET_STRING, community.as_bytes(), &mut message);
    message.extend_from_slice(&pdu);

    let mut out = Vec::new();
    encode_tlv(ber::SEQUENCE, &message, &mut out);
    out
}

/// Parse the final varbind value out of a GetResponse PDU. Returns the raw
/// tag and content bytes rather than a typed value — callers interpret per
/// the OID they asked for.
fn parse_get_response(buf: &[u8]) -> Option<(u8, Vec<u8>)> {
    // This walks just deep enough to reach the last TLV in the message
    // without a general BER parser: SEQUENCE(message) -> skip version,
    // community -> PDU SEQUENCE -> skip request-id/error/error-index ->
    // varbind-list SEQUENCE -> varbind SEQUENCE -> OID, then the value.
    let mut pos = 0;
    let (_, _, content_start, content_end) = read_tlv(buf, pos)?;
    pos = content_start;
    let _ = content_end;

    let (_, _, _, end) = read_tlv(buf, pos)?; // version
    pos = end;
    let (_, _, _, end) = read_tlv(buf, pos)?; // community
    pos = end;
    let (_tag, _, pdu_start, _pdu_end) = read_tlv(buf, pos)?; // PDU
    pos = pdu_start;

    let (_, _, _, end) = read_tlv(buf, pos)?; // request-id
    pos = end;
    let (_, _, _, end) = read_tlv(buf, pos)?; // error-status
    pos = end;
    let (_, _, _, end) = read_tlv(buf, pos)?; // error-index
    pos = end;

    let (_, _, vbl_start, _) = read_tlv(buf, pos)?; // varbind-list
    pos = vbl_start;
    let (_, _, vb_start, _) = read_tlv(buf, pos)?; // varbind
    pos = vb_start;
    let (_, _, _, end) = read_tlv(buf, pos)?; // OID
    pos = end;
    let (tag, content, _, _) = read_tlv(buf, pos)?; // value
    Some((tag, content.to_vec()))
}

/// Read one TLV at `pos`, returning `(tag, content_slice, content_start, end)`.
fn read_tlv(buf: &[u8], pos: usize) -> Option<(u8, &[u8], usize, usize)> {
    let tag = *buf.get(pos)?;
    let len_byte = *buf.get(pos + 1)? as usize;
    let (len, header_len) = if len_byte < 0x80 {
        (len_byte, 2)
    } else {
        let n = len_byte & 0x7f;
        let mut len = 0usize;
        for i in 0..n {
            len = (len << 8) | *buf.get(pos + 2 + i)? as usize;
        }
        (len, 2 + n)
    };
    let content_start = pos + header_len;
    let content_end = content_start + len;
    let content = buf.get(content_start..content_end)?;
    Some((tag, content, content_start, content_end))
}

pub struct SnmpDevice {
    socket: UdpSocket,
    community: String,
    request_id: i32,
}

impl SnmpDevice {
    pub fn connect(host: &str, community: Option<&str>) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| IpplexError::Device(format!("binding SNMP socket: {e}")))?;
        socket
            .connect((host, SNMP_PORT))
            .map_err(|e| IpplexError::TransientIo(format!("connecting to {host}:{SNMP_PORT}: {e}")))?;
        socket
            .set_read_timeout(Some(Duration::from_secs(3)))
            .ok();
        Ok(Self {
            socket,
            community: community.unwrap_or(DEFAULT_COMMUNITY).to_string(),
            request_id: 1,
        })
    }

    fn get(&mut self, oid: &str) -> Result<(u8, Vec<u8>)> {
        let request = build_get_request(&self.community, oid, self.request_id);
        self.request_id = self.request_id.wrapping_add(1);
        self.socket
            .send(&request)
            .map_err(|e| IpplexError::TransientIo(format!("SNMP send: {e}")))?;
        let mut buf = [0u8; 1500];
        let n = self
            .socket
            .recv(&mut buf)
            .map_err(|e| IpplexError::TransientIo(format!("SNMP recv: {e}")))?;
        parse_get_response(&buf[..n])
            .ok_or_else(|| IpplexError::Device("malformed SNMP response".to_string()))
    }
}

impl Device for SnmpDevice {
    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(IpplexError::InvalidArgument(
            "snmp scheme is monitoring-only, not a print transport".to_string(),
        ))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> Result<DeviceStatusReason> {
        // hrDeviceStatus: 1=unknown,2=running,3=warning,4=testing,5=down.
        let mut this = SnmpDevice {
            socket: self.socket.try_clone().map_err(|e| IpplexError::Device(e.to_string()))?,
            community: self.community.clone(),
            request_id: self.request_id,
        };
        let (_, content) = this.get(OID_HR_DEVICE_STATUS)?;
        let value = content.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64);
        Ok(match value {
            5 => DeviceStatusReason::OFFLINE,
            3 => DeviceStatusReason::STOPPED_PARTLY,
            _ => DeviceStatusReason::NONE,
        })
    }

    fn device_id(&self) -> Result<Option<DeviceId>> {
        let mut this = SnmpDevice {
            socket: self.socket.try_clone().map_err(|e| IpplexError::Device(e.to_string()))?,
            community: self.community.clone(),
            request_id: self.request_id,
        };
        let (_, content) = this.get(OID_PRT_GENERAL_PRINTER_NAME)?;
        if content.is_empty() {
            return Ok(None);
        }
        Ok(Some(DeviceId::parse(&String::from_utf8_lossy(&content))))
    }

    fn supplies(&self) -> Result<Vec<SupplyReading>> {
        let mut this = SnmpDevice {
            socket: self.socket.try_clone().map_err(|e| IpplexError::Device(e.to_string()))?,
            community: self.community.clone(),
            request_id: self.request_id,
        };
        let (_, content) = this.get(OID_PRT_MARKER_SUPPLIES_LEVEL)?;
        let level = content.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64);
        if level < 0 {
            // -2 means "unknown level but present" per Printer-MIB.
            return Ok(vec![SupplyReading { name: "marker".into(), level_percent: None }]);
        }
        Ok(vec![SupplyReading {
            name: "marker".into(),
            level_percent: Some(level.clamp(0, 100) as u8),
        }])
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_short_form_length() {
        let mut out = Vec::new();
        encode_length(10, &mut out);
        assert_eq!(out, vec![10]);
    }

    #[test]
    fn encodes_long_form_length() {
        let mut out = Vec::new();
        encode_length(300, &mut out);
        assert_eq!(out, vec![0x82, 0x01, 0x2c]);
    }

    #[test]
    fn encodes_well_known_oid() {
        // 1.3.6.1.2.1.1.1 -> 2b 06 01 02 01 01 01
        let encoded = encode_oid("1.3.6.1.2.1.1.1");
        assert_eq!(encoded, vec![0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01]);
    }

    #[test]
    fn build_get_request_is_well_formed_sequence() {
        let pkt = build_get_request("public", "1.3.6.1.2.1.1.1", 42);
        assert_eq!(pkt[0], ber::SEQUENCE);
    }
}
