// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The TCP accept loop: binds one listener per server instance, strips the
// HTTP envelope IPP-over-HTTP clients wrap requests in, dispatches the
// parsed request, and advertises the printer table via mDNS-SD while
// running.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ipplex_core::{IpplexError, Result};

use crate::codec::{build_error_response, parse_ipp_request, STATUS_CLIENT_ERROR_BAD_REQUEST};
use crate::operations::{dispatch, ServerContext};

/// Maximum bytes read from one connection before it's rejected, bounding
/// memory use against a misbehaving or malicious client.
const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

const IPP_SERVICE_TYPE: &str = "_ipp._tcp.local.";

/// Lifecycle state of a [`Listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
}

/// The embedded IPP/1.1 server: one TCP listener plus mDNS advertisement for
/// every registered printer, dispatching against a shared [`ServerContext`].
pub struct Listener {
    port: u16,
    status: ServerStatus,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
    mdns_daemon: Option<mdns_sd::ServiceDaemon>,
    mdns_fullnames: Vec<String>,
}

impl Listener {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
            mdns_daemon: None,
            mdns_fullnames: Vec::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind the listener, register every printer in `ctx.registry` via
    /// mDNS-SD (best-effort: a failure here is logged and otherwise
    /// ignored, since the printer still works by direct IP), and spawn the
    /// accept loop.
    pub async fn start(&mut self, ctx: Arc<ServerContext>, advertise: bool) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(port = self.port, "IPP server already running");
            return Ok(());
        }
        self.status = ServerStatus::Starting;

        let bind_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| IpplexError::Fatal(format!("bind {bind_addr}: {e}")))?;
        info!(port = self.port, "IPP server listening");

        if advertise {
            self.register_mdns(&ctx);
        }

        let shutdown = self.shutdown_signal.clone();
        let connections = self.active_connections.clone();
        let handle = tokio::spawn(async move {
            accept_loop(listener, shutdown, connections, ctx).await;
        });
        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Signal the accept loop to exit, unregister mDNS, and wait for the
    /// task to finish. Existing in-flight connections run to completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }
        info!(port = self.port, "stopping IPP server");
        self.unregister_mdns();
        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| IpplexError::Fatal(format!("accept loop join: {e}")))?;
        }
        self.status = ServerStatus::Stopped;
        info!(port = self.port, "IPP server stopped");
        Ok(())
    }

    fn register_mdns(&mut self, ctx: &ServerContext) {
        let daemon = match mdns_sd::ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS daemon for advertisement");
                return;
            }
        };

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "ipplex".to_string());

        for entry in ctx.registry.all() {
            if !entry.printer.dns_sd_advertise {
                continue;
            }
            let resource_path = format!("/{}", entry.printer.uri_slug);
            let properties = [
                ("txtvers", "1"),
                ("qtotal", "1"),
                ("rp", resource_path.trim_start_matches('/')),
                ("ty", entry.printer.name.as_str()),
                ("pdl", "application/pdf,image/pwg-raster,image/jpeg,application/octet-stream"),
                ("Color", "T"),
                ("Duplex", "T"),
                ("URF", "none"),
            ];

            match mdns_sd::ServiceInfo::new(
                IPP_SERVICE_TYPE,
                &entry.printer.name,
                &format!("{hostname}.local."),
                "",
                self.port,
                &properties[..],
            ) {
                Ok(service_info) => {
                    let fullname = service_info.get_fullname().to_owned();
                    match daemon.register(service_info) {
                        Ok(()) => {
                            info!(printer_id = %entry.printer.printer_id, name = %entry.printer.name, "mDNS service registered");
                            self.mdns_fullnames.push(fullname);
                        }
                        Err(e) => warn!(error = %e, "failed to register mDNS service"),
                    }
                }
                Err(e) => warn!(error = %e, "failed to build mDNS ServiceInfo"),
            }
        }

        self.mdns_daemon = Some(daemon);
    }

    fn unregister_mdns(&mut self) {
        if let Some(daemon) = self.mdns_daemon.take() {
            for fullname in self.mdns_fullnames.drain(..) {
                if let Err(e) = daemon.unregister(&fullname) {
                    warn!(error = %e, name = %fullname, "failed to unregister mDNS service");
                }
            }
            if let Err(e) = daemon.shutdown() {
                warn!(error = %e, "failed to shut down mDNS daemon");
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<Notify>,
    connections: Arc<AtomicU32>,
    ctx: Arc<ServerContext>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("accept loop received shutdown signal");
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        info!(peer = %peer_addr, "incoming IPP connection");
                        let ctx = ctx.clone();
                        let connections = connections.clone();
                        tokio::spawn(async move {
                            connections.fetch_add(1, Ordering::Relaxed);
                            if let Err(e) = handle_connection(stream, peer_addr, &ctx).await {
                                warn!(peer = %peer_addr, error = %e, "connection handler error");
                            }
                            connections.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                }
            }
        }
    }
}

async fn handle_connection(mut stream: tokio::net::TcpStream, peer_addr: SocketAddr, ctx: &ServerContext) -> Result<()> {
    let mut buf = Vec::with_capacity(8192);
    let mut limited = (&mut stream).take(MAX_REQUEST_BYTES as u64);
    let bytes_read = limited
        .read_to_end(&mut buf)
        .await
        .map_err(|e| IpplexError::TransientIo(format!("read from {peer_addr}: {e}")))?;

    debug!(peer = %peer_addr, bytes = bytes_read, "received IPP request data");
    if bytes_read == 0 {
        debug!(peer = %peer_addr, "empty request, closing connection");
        return Ok(());
    }

    let ipp_body = match parse_http_envelope(&buf) {
        Some(http_req) => {
            debug!(peer = %peer_addr, body_offset = http_req.body_offset, "HTTP envelope detected");
            &buf[http_req.body_offset..]
        }
        None => {
            debug!(peer = %peer_addr, "no HTTP envelope, treating as raw IPP");
            &buf[..]
        }
    };

    let ipp_request = match parse_ipp_request(ipp_body) {
        Ok(req) => req,
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "malformed IPP request");
            let response = build_error_response(STATUS_CLIENT_ERROR_BAD_REQUEST, 0, &format!("malformed IPP request: {e}"));
            send_response(&mut stream, &response).await?;
            return Ok(());
        }
    };

    debug!(
        peer = %peer_addr,
        operation_id = %format!("0x{:04X}", ipp_request.operation_id),
        request_id = ipp_request.request_id,
        groups = ipp_request.attribute_groups.len(),
        doc_bytes = ipp_request.document_data.len(),
        "parsed IPP request"
    );

    let response_bytes = dispatch(&ipp_request, peer_addr, ctx);
    send_response(&mut stream, &response_bytes).await?;

    info!(peer = %peer_addr, response_bytes = response_bytes.len(), "IPP response sent");
    Ok(())
}

async fn send_response(stream: &mut tokio::net::TcpStream, ipp_body: &[u8]) -> Result<()> {
    let http_response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/ipp\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        ipp_body.len()
    );
    stream
        .write_all(http_response.as_bytes())
        .await
        .map_err(|e| IpplexError::TransientIo(format!("write HTTP headers: {e}")))?;
    stream
        .write_all(ipp_body)
        .await
        .map_err(|e| IpplexError::TransientIo(format!("write IPP body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| IpplexError::TransientIo(format!("flush: {e}")))
}

struct HttpRequest {
    body_offset: usize,
}

/// Parse the bare minimum of an HTTP/1.1 POST to find where the body
/// starts. Returns `None` when the payload doesn't look like HTTP framing,
/// in which case the whole buffer is treated as raw IPP.
fn parse_http_envelope(data: &[u8]) -> Option<HttpRequest> {
    let header_end = find_subsequence(data, b"\r\n\r\n")?;
    Some(HttpRequest { body_offset: header_end + 4 })
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_envelope_finds_body() {
        let http = b"POST /ipp/print HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello";
        let req = parse_http_envelope(http).unwrap();
        assert_eq!(&http[req.body_offset..], b"hello");
    }

    #[test]
    fn parse_http_envelope_returns_none_for_raw_ipp() {
        let raw = [0x01u8, 0x01, 0x00, 0x0B, 0, 0, 0, 1, 0x03];
        assert!(parse_http_envelope(&raw).is_none());
    }

    #[test]
    fn find_subsequence_basic() {
        assert_eq!(find_subsequence(b"hello world", b"world"), Some(6));
        assert_eq!(find_subsequence(b"hello world", b"xyz"), None);
    }
}
