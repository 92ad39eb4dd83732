// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `socket://host:port` scheme: a raw TCP passthrough to a network printer's
// raw/9100 listener. No protocol negotiation happens here — that's the
// job layer's format dispatch; this transport only ever moves bytes.

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use ipplex_core::{DeviceId, DeviceStatusReason, IpplexError, Result};

use crate::device::{BufferedSink, Device, SupplyReading};

pub struct SocketDevice {
    sink: BufferedSink<TcpStream>,
    read_stream: TcpStream,
}

impl SocketDevice {
    pub fn connect(host: &str, port: u16, write_buffer: usize) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .map_err(|e| IpplexError::TransientIo(format!("connecting to {host}:{port}: {e}")))?;
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .ok();
        let read_stream = stream
            .try_clone()
            .map_err(|e| IpplexError::Device(e.to_string()))?;
        Ok(Self {
            sink: BufferedSink::new(stream, write_buffer),
            read_stream,
        })
    }
}

impl Device for SocketDevice {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.sink.flush()
    }

    fn status(&self) -> Result<DeviceStatusReason> {
        // Raw sockets carry no status channel; a live, non-erroring TCP
        // connection is the only signal available.
        let mut probe = [0u8; 1];
        match self.read_stream.try_clone() {
            Ok(mut s) => match s.read(&mut probe) {
                Ok(_) | Err(_) => Ok(DeviceStatusReason::NONE),
            },
            Err(_) => Ok(DeviceStatusReason::OFFLINE),
        }
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
