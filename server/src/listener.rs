use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use common::{Decoded, RecordDecoder};

use crate::config::ListenerConfig;
use crate::roster::Roster;

/// Largest datagram accepted on the UDP socket
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener is already running on {0}")]
    AlreadyRunning(SocketAddr),
    #[error("failed to bind {protocol} socket on {addr}")]
    Bind {
        protocol: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// UDP and TCP ingestion loops on one port, started and stopped as a unit.
///
/// Each parsed record lands in the [`Roster`]. Stopping cancels the token,
/// waits for both loops to exit (dropping their sockets) and clears the roster.
pub struct DualListener {
    roster: Roster,
    running: Arc<AtomicBool>,
    cancellation_token: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl DualListener {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            running: Arc::new(AtomicBool::new(false)),
            cancellation_token: None,
            handles: Vec::new(),
            local_addr: None,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address both sockets are bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind both sockets and spawn the ingestion loops. With port 0 the TCP
    /// listener picks a port and the UDP socket binds the same one.
    pub async fn start(&mut self, config: &ListenerConfig) -> Result<SocketAddr, ListenerError> {
        if let Some(addr) = self.local_addr.filter(|_| self.is_running()) {
            return Err(ListenerError::AlreadyRunning(addr));
        }

        let requested = config.socket_addr();
        let tcp = TcpListener::bind(requested)
            .await
            .map_err(|source| ListenerError::Bind {
                protocol: "TCP",
                addr: requested,
                source,
            })?;
        let addr = tcp.local_addr().map_err(|source| ListenerError::Bind {
            protocol: "TCP",
            addr: requested,
            source,
        })?;
        let udp = UdpSocket::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                protocol: "UDP",
                addr,
                source,
            })?;

        let token = CancellationToken::new();
        self.running.store(true, Ordering::SeqCst);

        self.handles.push(tokio::spawn(run_udp_loop(
            udp,
            self.roster.clone(),
            self.running.clone(),
            token.clone(),
        )));
        self.handles.push(tokio::spawn(run_tcp_loop(
            tcp,
            self.roster.clone(),
            self.running.clone(),
            token.clone(),
        )));

        self.cancellation_token = Some(token);
        self.local_addr = Some(addr);
        info!("Telemetry listener started on {} (UDP + TCP)", addr);
        Ok(addr)
    }

    /// Stop both loops and clear the roster. Safe to call when not running.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Listener task failed: {}", e);
            }
        }
        if self.local_addr.take().is_some() {
            self.roster.clear();
            info!("Telemetry listener stopped");
        }
    }
}

impl Drop for DualListener {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(token) = self.cancellation_token.take() {
            token.cancel();
        }
    }
}

/// Decode one line and store the result. Live snapshots without a timestamp
/// are stamped with the receive time.
fn ingest_line(decoder: &mut RecordDecoder, roster: &Roster, line: &str, origin: SocketAddr) {
    match decoder.decode_line(line) {
        Decoded::Record(mut snapshot) => {
            if snapshot.timestamp == 0.0 {
                snapshot.timestamp = now_seconds();
            }
            trace!(player = %snapshot.name, %origin, "Telemetry record");
            for kill in roster.apply(snapshot) {
                info!(killer = %kill.killer, victim = %kill.victim, weapon = %kill.weapon, "Kill");
            }
        }
        Decoded::Rejected => debug!(%origin, line, "Skipping malformed telemetry line"),
        Decoded::Header => debug!(%origin, "Telemetry header received"),
        Decoded::Blank => {}
    }
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn run_udp_loop(
    socket: UdpSocket,
    roster: Roster,
    running: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
) {
    // One schema for the socket's lifetime; datagrams have no connection to scope it to
    let mut decoder = RecordDecoder::new();
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("UDP listener shutting down");
                break;
            }
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, origin)) => {
                        let text = String::from_utf8_lossy(&buffer[..len]);
                        for line in text.lines() {
                            ingest_line(&mut decoder, &roster, line, origin);
                        }
                    }
                    Err(_) if !running.load(Ordering::SeqCst) => break,
                    Err(e) => warn!("UDP receive failed: {}", e),
                }
            }
        }
    }
}

async fn run_tcp_loop(
    listener: TcpListener,
    roster: Roster,
    running: Arc<AtomicBool>,
    cancellation_token: CancellationToken,
) {
    loop {
        let (stream, origin) = tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("TCP listener shutting down");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok(accepted) => accepted,
                    Err(_) if !running.load(Ordering::SeqCst) => break,
                    Err(e) => {
                        warn!("TCP accept failed: {}", e);
                        continue;
                    }
                }
            }
        };

        info!("Telemetry connection from {}", origin);
        if !read_connection(stream, origin, &roster, &cancellation_token).await {
            break;
        }
        info!("Telemetry connection from {} closed", origin);
    }
}

/// Read one connection line by line until it closes. Returns false when the
/// listener was cancelled meanwhile.
async fn read_connection(
    stream: TcpStream,
    origin: SocketAddr,
    roster: &Roster,
    cancellation_token: &CancellationToken,
) -> bool {
    let mut decoder = RecordDecoder::new();
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    loop {
        line.clear();
        tokio::select! {
            _ = cancellation_token.cancelled() => return false,
            result = reader.read_until(b'\n', &mut line) => {
                match result {
                    Ok(0) => return true,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line);
                        ingest_line(&mut decoder, roster, &text, origin);
                    }
                    Err(e) => {
                        warn!("Telemetry connection from {} failed: {}", origin, e);
                        return true;
                    }
                }
            }
        }
    }
}
