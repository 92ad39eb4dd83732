// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The Device handle: every transport (file, socket, dns-sd-resolved, snmp,
// usb) implements this so the job pipeline never branches on scheme.

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

/// A supply level report from a transport that can query it (SNMP, USB).
#[derive(Debug, Clone)]
pub struct SupplyReading {
    pub name: String,
    pub level_percent: Option<u8>,
}

/// An open connection to a physical or virtual printer.
///
/// Implementations buffer writes up to the configured write-buffer size
/// before flushing to the underlying transport, and must retry on
/// `ErrorKind::Interrupted`/`WouldBlock` internally rather than surfacing
/// them to the caller — those are the EINTR/EAGAIN semantics the scheme
/// registry documents as non-negotiable for every transport.
pub trait Device: Send {
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn flush(&mut self) -> Result<()>;
    fn status(&self) -> Result<DeviceStatusReason>;
    fn device_id(&self) -> Result<Option<DeviceId>>;
    fn supplies(&self) -> Result<Vec<SupplyReading>> {
        Ok(Vec::new())
    }
    fn close(&mut self) -> Result<()>;
}

/// Coalesces small writes into buffer-sized chunks before handing them to
/// an inner writer, matching the 8 KiB default write-buffer the
/// configuration layer specifies.
pub struct BufferedSink<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
    capacity: usize,
}

impl<W: std::io::Write> BufferedSink<W> {
    pub fn new(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.capacity {
            self.flush()?;
        }
        Ok(buf.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        write_retrying(&mut self.inner, &self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

/// Write the full buffer to `w`, retrying internally on `Interrupted` and
/// `WouldBlock` rather than surfacing them as transient I/O errors.
pub fn write_retrying(w: &mut impl std::io::Write, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => {
                return Err(IpplexError::TransientIo(
                    "device accepted zero bytes".to_string(),
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(IpplexError::TransientIo(e.to_string())),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_sink_flushes_at_capacity() {
        let mut out = Vec::new();
        let mut sink = BufferedSink::new(&mut out, 4);
        sink.write(b"ab").unwrap();
        assert!(out.is_empty());
        sink.write(b"cd").unwrap();
        assert_eq!(out, b"abcd");
    }

    #[test]
    fn flush_pushes_partial_buffer() {
        let mut out = Vec::new();
        let mut sink = BufferedSink::new(&mut out, 100);
        sink.write(b"hi").unwrap();
        assert!(out.is_empty());
        sink.flush().unwrap();
        assert_eq!(out, b"hi");
    }
}
