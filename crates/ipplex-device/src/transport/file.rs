// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `file://` scheme: writes straight through to a local path (typically a
// USB-class character device such as `/dev/usb/lp0`, or a plain file for
// testing/spooling). Status and device-id are not discoverable over this
// scheme — a caller wanting either should use the `usb` scheme instead.

use std::fs::OpenOptions;

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

use crate::device::{BufferedSink, Device, SupplyReading};

pub struct FileDevice {
    sink: BufferedSink<std::fs::File>,
}

impl FileDevice {
    pub fn open(path: &str, write_buffer: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)
            .map_err(|e| IpplexError::Device(format!("opening {path}: {e}")))?;
        Ok(Self {
            sink: BufferedSink::new(file, write_buffer),
        })
    }
}

impl Device for FileDevice {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    fn status(&self) -> Result<DeviceStatusReason> {
        Ok(DeviceStatusReason::NONE)
    }

    fn device_id(&self) -> Result<Option<DeviceId>> {
        Ok(None)
    }

    fn supplies(&self) -> Result<Vec<SupplyReading>> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn writes_flush_to_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut dev = FileDevice::open(path.to_str().unwrap(), 8192).unwrap();
        dev.write(b"hello").unwrap();
        dev.close().unwrap();

        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
    }
}
