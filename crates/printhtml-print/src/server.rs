// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded HTTP dispatcher -- accepts print and scan requests over plain TCP.
//
// The server listens on a configurable port (default 8080).  Each accepted
// connection is handled in its own task: read one request line, route it,
// write one response, close.  Headers and bodies are never read; only `GET`
// is understood.
//
// # Endpoints
//
//   GET /print?url=...      render and print a page
//   GET /scan               acquire from a scan device (detached)
//   GET /scan?url=...       render a page to an image file, optionally upload
//
// In-flight connections and jobs are tracked in registries owned by
// `SharedState`; stopping the server ends the accept loop but never aborts
// work already accepted.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use printhtml_core::config::ServerConfig;
use printhtml_core::error::{PrintHtmlError, Result};
use printhtml_core::types::ServerStatus;

use crate::registry::{ConnectionRegistry, JobRegistry};
use crate::request::{LineRead, parse_request_line, read_request_line};
use crate::response::{HttpResponse, Status, send_response};
use crate::router::Router;
use crate::services::JobServices;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything a connection handler needs, shared via `Arc`.
struct SharedState {
    router: Router,
    connections: ConnectionRegistry,
    max_request_line: usize,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct PrintServer {
    config: Arc<ServerConfig>,
    /// Current lifecycle state of the server.
    status: ServerStatus,
    /// Notification handle used to signal a graceful shutdown.
    shutdown_signal: Arc<Notify>,
    /// Handle to the Tokio task running the accept loop.
    task_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    shared: Arc<SharedState>,
}

impl PrintServer {
    /// Create a stopped server. Call [`start`](Self::start) or
    /// [`listen`](Self::listen) to begin accepting connections.
    pub fn new(config: ServerConfig, services: JobServices) -> Self {
        let config = Arc::new(config);
        let shared = Arc::new(SharedState {
            router: Router::new(Arc::clone(&config), services),
            connections: ConnectionRegistry::new(),
            max_request_line: config.max_request_line_bytes,
        });
        Self {
            config,
            status: ServerStatus::Stopped,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            local_addr: None,
            shared,
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// Configured port; `0` until bound if an ephemeral port was requested.
    pub fn port(&self) -> u16 {
        self.local_addr.map_or(self.config.port, |addr| addr.port())
    }

    /// Address actually bound, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> usize {
        self.shared.connections.active()
    }

    /// Registry of accepted jobs.
    pub fn jobs(&self) -> &JobRegistry {
        self.shared.router.jobs()
    }

    /// Bind to `port` on the configured interface and start accepting.
    ///
    /// Port `0` picks an ephemeral port; the bound address is returned.
    pub async fn listen(&mut self, port: u16) -> Result<SocketAddr> {
        let addr = SocketAddr::new(self.config.bind_address, port);
        self.start_on(addr).await
    }

    /// Bind to the configured address and port and start accepting.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        self.start_on(addr).await
    }

    async fn start_on(&mut self, bind_addr: SocketAddr) -> Result<SocketAddr> {
        if let (ServerStatus::Running, Some(addr)) = (self.status, self.local_addr) {
            debug!(%addr, "dispatcher already running");
            return Ok(addr);
        }

        self.status = ServerStatus::Starting;

        let listener = match bind_listener(bind_addr) {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Stopped;
                return Err(PrintHtmlError::Server(format!("bind {bind_addr}: {e}")));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| PrintHtmlError::Server(format!("local address: {e}")))?;

        info!(addr = %local_addr, "print dispatcher listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, shared).await;
        });

        self.task_handle = Some(handle);
        self.local_addr = Some(local_addr);
        self.status = ServerStatus::Running;
        Ok(local_addr)
    }

    /// Stop accepting connections.
    ///
    /// Connections already accepted and jobs already started run to
    /// completion.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }

        info!(port = self.port(), "stopping print dispatcher");
        self.shutdown_signal.notify_one();

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| PrintHtmlError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        self.local_addr = None;
        info!("print dispatcher stopped");
        Ok(())
    }

    /// Runs until the shutdown signal is received.
    async fn accept_loop(listener: TcpListener, shutdown: Arc<Notify>, shared: Arc<SharedState>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "incoming connection");
                            let state = Arc::clone(&shared);
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, peer_addr, state).await {
                                    warn!(peer = %peer_addr, error = %e, "connection handler error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one request line, then route it or reject it with 400.
    #[instrument(skip_all, fields(peer = %peer_addr))]
    async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        state: Arc<SharedState>,
    ) -> Result<()> {
        let guard = state.connections.register(peer_addr);
        let mut reader = BufReader::new(stream);

        let line = match read_request_line(&mut reader, state.max_request_line).await? {
            LineRead::Line(line) => line,
            LineRead::Closed => {
                debug!(conn = %guard.id(), "peer closed before sending a request line");
                return Ok(());
            }
            LineRead::TooLong => {
                warn!(conn = %guard.id(), limit = state.max_request_line, "request line too long");
                return Self::reject(reader.into_inner()).await;
            }
        };

        let request = match parse_request_line(&line) {
            Ok(request) if request.is_get() => request,
            Ok(request) => {
                warn!(conn = %guard.id(), method = %request.method, "unsupported method");
                return Self::reject(reader.into_inner()).await;
            }
            Err(e) => {
                warn!(conn = %guard.id(), error = %e, "malformed request line");
                return Self::reject(reader.into_inner()).await;
            }
        };

        let conn = guard.id();
        info!(conn = %conn, endpoint = %request.endpoint, "request");
        let route = state
            .router
            .dispatch(&request, Box::new(reader.into_inner()), Some(guard))
            .await?;
        debug!(conn = %conn, ?route, "request dispatched");
        Ok(())
    }

    async fn reject(mut stream: TcpStream) -> Result<()> {
        send_response(&mut stream, &HttpResponse::empty(Status::BadRequest).to_bytes()).await
    }
}

/// Pending-connection backlog of the listening socket.
const LISTEN_BACKLOG: i32 = 1024;

/// Bind a non-blocking listener on `addr`.
///
/// An IPv6 address is bound dual-stack, so `::` also accepts IPv4 clients.
/// On hosts without IPv6, `::` falls back to `0.0.0.0`.
fn bind_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    match bind_socket(addr) {
        Err(e)
            if addr.ip() == IpAddr::V6(Ipv6Addr::UNSPECIFIED)
                && e.kind() != ErrorKind::AddrInUse =>
        {
            warn!(error = %e, "IPv6 unavailable, listening on IPv4 only");
            bind_socket(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                addr.port(),
            ))
        }
        other => other,
    }
}

fn bind_socket(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

impl Drop for PrintServer {
    fn drop(&mut self) {
        // Ends a still-running accept loop.
        self.shutdown_signal.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use printhtml_core::config::PrintResponseMode;
    use printhtml_document::{DryRunEngine, SimulatedScanner};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::upload::HttpUploader;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..ServerConfig::default()
        }
    }

    fn test_services() -> JobServices {
        JobServices::new(
            Arc::new(SimulatedScanner::new(Duration::ZERO)),
            Arc::new(DryRunEngine),
            Arc::new(HttpUploader::new().unwrap()),
        )
    }

    async fn running_server(config: ServerConfig) -> (PrintServer, SocketAddr) {
        let mut server = PrintServer::new(config, test_services());
        let addr = server.start().await.expect("start");
        (server, addr)
    }

    /// Send `raw` and read until the server closes.
    async fn exchange(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
    }

    #[test]
    fn initial_status_is_stopped() {
        let server = PrintServer::new(ServerConfig::default(), test_services());
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert_eq!(server.port(), 8080);
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn start_and_stop() {
        let (mut server, addr) = running_server(test_config()).await;
        assert_eq!(server.status(), ServerStatus::Running);
        assert_ne!(addr.port(), 0);
        assert_eq!(server.port(), addr.port());

        server.stop().await.unwrap();
        assert_eq!(server.status(), ServerStatus::Stopped);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn default_bind_accepts_ipv4_clients() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.bind_address, IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        let (_server, addr) = running_server(config).await;
        let v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
        let response = exchange(v4, b"GET /badpath HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[tokio::test]
    async fn listen_fails_on_port_in_use() {
        let (_server, addr) = running_server(test_config()).await;
        let mut second = PrintServer::new(test_config(), test_services());
        let result = second.listen(addr.port()).await;
        assert!(matches!(result, Err(PrintHtmlError::Server(_))));
        assert_eq!(second.status(), ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn print_request_echoes_defaults() {
        let (server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"GET /print?url=http%3A%2F%2Fx HTTP/1.1\r\nHost: h\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Connection: close\r\n"));
        let echo: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(echo[0]["printer"], "Default");
        assert_eq!(echo[0]["urls"], serde_json::json!(["http://x"]));
        assert_eq!(echo[0]["left"], 0.5);
        assert_eq!(echo[0]["paper"], "A4");
        assert_eq!(echo[0]["orientation"], "portrait");

        server.jobs().wait_idle().await;
        assert_eq!(server.jobs().admitted(), 1);
    }

    #[tokio::test]
    async fn deferred_print_response_arrives_after_job() {
        let config = ServerConfig {
            print_response: PrintResponseMode::Deferred,
            ..test_config()
        };
        let (server, addr) = running_server(config).await;
        let response = exchange(addr, b"GET /print?url=http://x&a=105,148 HTTP/1.1\r\n\r\n").await;
        let echo: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(echo[0]["width"], 105.0);
        assert_eq!(echo[0]["height"], 148.0);
        server.jobs().wait_idle().await;
    }

    #[tokio::test]
    async fn unknown_path_is_404_without_job() {
        let (server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"GET /badpath HTTP/1.1\r\n\r\n").await;
        assert_eq!(
            response,
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        assert_eq!(server.jobs().admitted(), 0);
    }

    #[tokio::test]
    async fn print_without_url_is_404() {
        let (server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"GET /print?a=105 HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert_eq!(server.jobs().admitted(), 0);
    }

    #[tokio::test]
    async fn non_get_is_400() {
        let (server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"POST /print?url=x HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(server.jobs().admitted(), 0);
    }

    #[tokio::test]
    async fn line_without_path_is_400() {
        let (_server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"GET\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn oversized_request_line_is_400() {
        let config = ServerConfig {
            max_request_line_bytes: 64,
            ..test_config()
        };
        let (_server, addr) = running_server(config).await;
        let mut raw = b"GET /print?url=".to_vec();
        raw.extend(std::iter::repeat_n(b'x', 200));
        raw.extend_from_slice(b" HTTP/1.1\r\n\r\n");
        let response = exchange(addr, &raw).await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn request_line_split_across_packets() {
        let (_server, addr) = running_server(test_config()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /print?ur").await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stream.write_all(b"l=http://x HTTP/1.1\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn silent_peer_does_not_block_others() {
        let (server, addr) = running_server(test_config()).await;
        let _idle = TcpStream::connect(addr).await.unwrap();
        let response = exchange(addr, b"GET /badpath HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.active_connections(), 1);
    }

    #[tokio::test]
    async fn scan_request_is_accepted() {
        let (server, addr) = running_server(test_config()).await;
        let response = exchange(addr, b"GET /scan?scanner=Flatbed HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 202 Accepted\r\n"));
        let ack: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
        assert_eq!(ack["status"], "scan_initiated");
        assert_eq!(ack["scanner"], "Flatbed");
        server.jobs().wait_idle().await;
        assert_eq!(server.jobs().completed(), 1);
    }

    #[tokio::test]
    async fn concurrent_prints_get_their_own_echo() {
        let (server, addr) = running_server(test_config()).await;
        let requests = (0..16).map(|i| {
            tokio::spawn(async move {
                let raw = format!("GET /print?url=http://host/{i}&p=P{i} HTTP/1.1\r\n\r\n");
                (i, exchange(addr, raw.as_bytes()).await)
            })
        });
        for handle in requests.collect::<Vec<_>>() {
            let (i, response) = handle.await.unwrap();
            let echo: serde_json::Value = serde_json::from_str(body(&response)).unwrap();
            assert_eq!(echo[0]["urls"][0], format!("http://host/{i}"));
            assert_eq!(echo[0]["printer"], format!("P{i}"));
        }
        server.jobs().wait_idle().await;
        assert_eq!(server.jobs().admitted(), 16);
        assert_eq!(server.jobs().completed(), 16);
    }
}
