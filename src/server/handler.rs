//! Challenge/response server: the peer the probe measures against

use crate::protocol::{
    decode_word, encode_word, HANDSHAKE_ACK, HANDSHAKE_REQUEST, SHUTDOWN, WORD_SIZE,
};
use crate::server::monitor::ServerCounters;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The client sent the shutdown word
    Shutdown,
    /// The client closed the connection
    Closed,
    /// The first word was neither a handshake nor a shutdown
    Rejected(u32),
}

fn read_word<R: Read>(stream: &mut R) -> io::Result<Option<u32>> {
    let mut buf = [0u8; WORD_SIZE];
    match stream.read_exact(&mut buf) {
        Ok(()) => decode_word(&buf)
            .map(Some)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Serve one connection: acknowledge the handshake, then answer every
/// challenge `v` with `v + 1` until the client goes away.
pub fn serve_connection<S: Read + Write>(
    stream: &mut S,
    counters: &ServerCounters,
) -> io::Result<ConnectionOutcome> {
    match read_word(stream)? {
        None => return Ok(ConnectionOutcome::Closed),
        Some(SHUTDOWN) => return Ok(ConnectionOutcome::Shutdown),
        Some(HANDSHAKE_REQUEST) => {
            stream.write_all(&encode_word(HANDSHAKE_ACK))?;
            counters.increment_handshakes();
        }
        Some(other) => return Ok(ConnectionOutcome::Rejected(other)),
    }

    while let Some(challenge) = read_word(stream)? {
        stream.write_all(&encode_word(challenge.wrapping_add(1)))?;
        counters.increment_rounds();
    }
    Ok(ConnectionOutcome::Closed)
}

/// Accepts connections and serves each on its own thread until a client
/// sends the shutdown word.
pub struct ChallengeServer {
    listener: TcpListener,
    counters: Arc<ServerCounters>,
    shutdown: Arc<AtomicBool>,
}

impl ChallengeServer {
    pub fn bind(address: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        Ok(Self {
            listener,
            counters: Arc::new(ServerCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn counters(&self) -> Arc<ServerCounters> {
        Arc::clone(&self.counters)
    }

    /// Address a local client can connect to, even when bound to a wildcard address
    fn wake_address(&self) -> io::Result<SocketAddr> {
        let mut address = self.local_addr()?;
        if address.ip().is_unspecified() {
            match address {
                SocketAddr::V4(_) => address.set_ip(Ipv4Addr::LOCALHOST.into()),
                SocketAddr::V6(_) => address.set_ip(Ipv6Addr::LOCALHOST.into()),
            }
        }
        Ok(address)
    }

    /// Serve until shutdown. Connections still open at that point are left
    /// to finish on their own threads.
    pub fn run(self) -> io::Result<()> {
        let wake_address = self.wake_address()?;

        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    self.counters.increment_errors();
                    error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };
            let peer = stream.peer_addr().ok();
            debug!(peer = ?peer, "New client connected");
            self.counters.increment_connections();

            let counters = Arc::clone(&self.counters);
            let shutdown = Arc::clone(&self.shutdown);
            thread::spawn(move || {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(error = %e, "Failed to disable Nagle's algorithm");
                }
                match serve_connection(&mut stream, &counters) {
                    Ok(ConnectionOutcome::Shutdown) => {
                        info!(peer = ?peer, "Shutdown requested");
                        shutdown.store(true, Ordering::SeqCst);
                        // unblock the accept loop so it sees the flag
                        if let Err(e) = TcpStream::connect(wake_address) {
                            warn!(error = %e, "Failed to wake accept loop");
                        }
                    }
                    Ok(ConnectionOutcome::Closed) => debug!(peer = ?peer, "Client disconnected"),
                    Ok(ConnectionOutcome::Rejected(word)) => {
                        counters.increment_errors();
                        warn!(peer = ?peer, word, "Unexpected first word, closing connection");
                    }
                    Err(e) => {
                        counters.increment_errors();
                        error!(peer = ?peer, error = %e, "Connection failed");
                    }
                }
            });
        }

        info!("Server stopped");
        Ok(())
    }
}
