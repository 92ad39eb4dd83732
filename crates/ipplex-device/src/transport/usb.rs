// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `usb://vendor:product` scheme: bulk-transfer passthrough to a USB
// printer-class device, found by vendor/product id, USB printer class (7),
// subclass 1, and protocol 1 or 2.

use std::time::Duration;

use futures_lite::future::block_on;
use nusb::transfer::{ControlIn, ControlType, Direction, EndpointType, Recipient, RequestBuffer};

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

use crate::device::{Device, SupplyReading};

const USB_CLASS_PRINTER: u8 = 7;
const USB_SUBCLASS_PRINTER: u8 = 1;

/// Apple's vendor id — its USB devices never expose a 1284 printer-class
/// interface and are skipped during enumeration rather than probed.
const VENDOR_EXCLUDED: u16 = 0x05AC;

const GET_DEVICE_ID_TIMEOUT: Duration = Duration::from_secs(5);
const GET_DEVICE_ID_BUFFER: u16 = 1024;

pub struct UsbDevice {
    interface: nusb::Interface,
    ep_out: u8,
    ep_in: Option<u8>,
    write_buffer: Vec<u8>,
    capacity: usize,
    device_id: Option<DeviceId>,
    uri: String,
}

impl UsbDevice {
    /// Open the first attached printer-class device matching `vendor_id`
    /// and (optionally) `product_id`.
    pub fn open(vendor_id: u16, product_id: Option<u16>, write_buffer: usize) -> Result<Self> {
        let devices = nusb::list_devices()
            .map_err(|e| IpplexError::Device(format!("listing USB devices: {e}")))?;

        for dev_info in devices {
            if dev_info.vendor_id() == VENDOR_EXCLUDED {
                continue;
            }
            if dev_info.vendor_id() != vendor_id {
                continue;
            }
            if let Some(p) = product_id {
                if dev_info.product_id() != p {
                    continue;
                }
            }

            let Some(interface_number) = select_printer_interface(&dev_info) else {
                continue;
            };

            return Self::open_device(&dev_info, interface_number, write_buffer);
        }

        Err(IpplexError::Device("no matching USB printer found".to_string()))
    }

    /// Enumerate every attached printer-class device, regardless of vendor,
    /// claiming each long enough to read its 1284 device id and assemble a
    /// `usb://<mfg>/<mdl>[?serial=…]` URI.
    pub fn discover() -> Result<Vec<UsbPrinterInfo>> {
        let devices = nusb::list_devices()
            .map_err(|e| IpplexError::Device(format!("listing USB devices: {e}")))?;

        let mut found = Vec::new();
        for dev_info in devices {
            if dev_info.vendor_id() == VENDOR_EXCLUDED {
                continue;
            }
            let Some(interface_number) = select_printer_interface(&dev_info) else {
                continue;
            };
            let vendor_id = dev_info.vendor_id();
            let product_id = dev_info.product_id();
            match Self::open_device(&dev_info, interface_number, 0) {
                Ok(opened) => found.push(UsbPrinterInfo {
                    vendor_id,
                    product_id,
                    interface_number,
                    uri: opened.uri,
                    device_id: opened.device_id,
                }),
                Err(e) => {
                    tracing::debug!(vendor_id, product_id, error = %e, "skipping USB printer candidate");
                }
            }
        }
        Ok(found)
    }

    fn open_device(
        dev_info: &nusb::DeviceInfo,
        interface_number: u8,
        write_buffer: usize,
    ) -> Result<Self> {
        let device = dev_info
            .open()
            .map_err(|e| IpplexError::Device(format!("opening USB device: {e}")))?;

        let (ep_out, ep_in) = Self::discover_endpoints(&device, interface_number)?;

        // `usblp` (Linux) may already hold the interface; detach it first.
        let interface = device
            .detach_and_claim_interface(interface_number)
            .map_err(|e| {
                IpplexError::Device(format!("claiming USB interface {interface_number}: {e}"))
            })?;

        let device_id = match request_device_id(&interface, interface_number) {
            Ok(raw) => {
                let text = get_id(&raw);
                if text.is_empty() {
                    None
                } else {
                    Some(DeviceId::parse(&text))
                }
            }
            Err(e) => {
                tracing::debug!(interface_number, error = %e, "GET_DEVICE_ID failed");
                None
            }
        };
        let uri = device_id
            .as_ref()
            .map(device_uri)
            .unwrap_or_else(|| format!("usb://{:04x}/{:04x}", dev_info.vendor_id(), dev_info.product_id()));

        Ok(Self {
            interface,
            ep_out,
            ep_in,
            write_buffer: Vec::with_capacity(write_buffer),
            capacity: write_buffer,
            device_id,
            uri,
        })
    }

    fn discover_endpoints(
        device: &nusb::Device,
        interface_number: u8,
    ) -> Result<(u8, Option<u8>)> {
        let config = device
            .active_configuration()
            .map_err(|e| IpplexError::Device(format!("reading USB configuration: {e}")))?;

        let mut ep_out = None;
        let mut ep_in = None;

        for alt in config.interface_alt_settings() {
            if alt.interface_number() != interface_number || alt.alternate_setting() != 0 {
                continue;
            }
            for ep in alt.endpoints() {
                if ep.transfer_type() != EndpointType::Bulk {
                    continue;
                }
                match ep.direction() {
                    Direction::Out if ep_out.is_none() => ep_out = Some(ep.address()),
                    Direction::In if ep_in.is_none() => ep_in = Some(ep.address()),
                    _ => {}
                }
            }
            break;
        }

        let ep_out = ep_out
            .ok_or_else(|| IpplexError::Device("no bulk OUT endpoint on printer interface".to_string()))?;
        Ok((ep_out, ep_in))
    }

    fn bulk_write(&self, data: &[u8]) -> Result<()> {
        let completion = block_on(self.interface.bulk_out(self.ep_out, data.to_vec()));
        completion
            .status
            .map_err(|e| IpplexError::TransientIo(format!("USB bulk OUT: {e}")))
    }

    /// Read a single bulk-IN status packet, if the device exposes one.
    fn bulk_read(&self) -> Result<Option<Vec<u8>>> {
        let Some(ep_in) = self.ep_in else {
            return Ok(None);
        };
        let completion = block_on(self.interface.bulk_in(ep_in, RequestBuffer::new(512)));
        match completion.status {
            Ok(()) if completion.data.is_empty() => Ok(None),
            Ok(()) => Ok(Some(completion.data)),
            Err(e) => Err(IpplexError::TransientIo(format!("USB bulk IN: {e}"))),
        }
    }
}

impl Device for UsbDevice {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.write_buffer.extend_from_slice(buf);
        if self.write_buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.write_buffer);
        self.bulk_write(&chunk)
    }

    fn status(&self) -> Result<DeviceStatusReason> {
        // Bidirectional IEEE-1284.4 status parsing is driver-specific and
        // out of scope here; a present bulk-IN endpoint with no data read
        // is treated as healthy.
        self.bulk_read().map(|_| DeviceStatusReason::NONE)
    }

    fn device_id(&self) -> Result<Option<DeviceId>> {
        Ok(self.device_id.clone())
    }

    fn supplies(&self) -> Result<Vec<SupplyReading>> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// A printer-class device found during enumeration, with the 1284 id read
/// (if the device answered) and its synthesized URI.
#[derive(Debug, Clone)]
pub struct UsbPrinterInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: u8,
    pub uri: String,
    pub device_id: Option<DeviceId>,
}

/// Pick the printer-class interface to use: class 7, subclass 1, protocol 1
/// or 2, preferring protocol 2 (bidirectional) over protocol 1 when a device
/// exposes both.
fn select_printer_interface(dev_info: &nusb::DeviceInfo) -> Option<u8> {
    let mut best: Option<(u8, u8)> = None;
    for iface in dev_info.interfaces() {
        if iface.class() != USB_CLASS_PRINTER || iface.subclass() != USB_SUBCLASS_PRINTER {
            continue;
        }
        let protocol = iface.protocol();
        if protocol != 1 && protocol != 2 {
            continue;
        }
        if best.is_none_or(|(p, _)| protocol > p) {
            best = Some((protocol, iface.interface_number()));
        }
    }
    best.map(|(_, number)| number)
}

/// Issue the 1284 `GET_DEVICE_ID` class request (bmRequestType
/// `IN|Class|Interface`, bRequest 0) on the claimed interface.
fn request_device_id(interface: &nusb::Interface, interface_number: u8) -> Result<Vec<u8>> {
    let future = interface.control_in(
        ControlIn {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: 0,
            value: 0,
            index: interface_number as u16,
            length: GET_DEVICE_ID_BUFFER,
        },
        GET_DEVICE_ID_TIMEOUT,
    );
    block_on(future).map_err(|e| IpplexError::TransientIo(format!("GET_DEVICE_ID: {e}")))
}

/// Parse a raw 1284 `GET_DEVICE_ID` response: the first two bytes are a
/// length prefix, the remainder is the semicolon-delimited id string.
fn get_id(raw: &[u8]) -> String {
    if raw.len() <= 2 {
        return String::new();
    }
    String::from_utf8_lossy(&raw[2..]).into_owned()
}

/// Assemble `usb://<mfg>/<mdl>[?serial=…]` from a parsed device id, falling
/// back to "Unknown" for a missing manufacturer or model.
fn device_uri(id: &DeviceId) -> String {
    let mfg = id.manufacturer().unwrap_or("Unknown");
    let mdl = id.model().unwrap_or("Unknown");
    match id.serial_number() {
        Some(serial) => format!("usb://{mfg}/{mdl}?serial={serial}"),
        None => format!("usb://{mfg}/{mdl}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_id_strips_two_byte_length_prefix() {
        let raw = b"\x00\x05MFG:X;";
        assert_eq!(get_id(raw), "MFG:X;");
    }

    #[test]
    fn get_id_empty_on_short_payload() {
        assert_eq!(get_id(b"\x00"), "");
        assert_eq!(get_id(b""), "");
    }

    #[test]
    fn device_uri_falls_back_to_unknown_model() {
        let id = DeviceId::parse("MFG:X;");
        assert_eq!(device_uri(&id), "usb://X/Unknown");
    }

    #[test]
    fn device_uri_includes_serial_when_present() {
        let id = DeviceId::parse("MFG:Acme;MDL:Printer9000;SERN:12345;");
        assert_eq!(device_uri(&id), "usb://Acme/Printer9000?serial=12345");
    }
}
