//! mio event loop for the multi-connection client.
//!
//! Readiness-based model: poll tells us when sockets are ready,
//! then we perform non-blocking read/write syscalls.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! Each connection is registered for read and write interest for its
//! whole lifetime; connect completion is indistinguishable from ordinary
//! write readiness, so no separate connecting state is tracked.

use crate::client::{Connection, Ready};
use bytes::Bytes;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

const EVENTS_CAPACITY: usize = 128;
const INTEREST: Interest = Interest::READABLE.add(Interest::WRITABLE);

/// A registered socket and its connection state.
struct Entry {
    stream: TcpStream,
    conn: Connection,
}

/// Outcome of servicing one readiness event.
enum ServiceOutcome {
    /// Connection stays registered.
    Continue,
    /// Closure condition met; unregister and close.
    Close,
}

/// Multi-connection client: registry of in-flight connections plus the
/// poller that drives them.
///
/// Single-threaded. All suspension happens inside [`Client::poll_once`];
/// socket reads and writes never block.
pub struct Client {
    poll: Poll,
    events: Events,
    connections: Slab<Entry>,
    /// Message payloads sent over every connection, in order.
    messages: Vec<Bytes>,
    /// Scratch buffer for reads, sized to the configured chunk size.
    scratch: Vec<u8>,
    next_conn_id: u32,
}

impl Client {
    /// Create a client that will send `messages` over each connection and
    /// read replies in chunks of up to `chunk_size` bytes.
    pub fn new(messages: Vec<Bytes>, chunk_size: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
            connections: Slab::new(),
            messages,
            scratch: vec![0u8; chunk_size],
            next_conn_id: 1,
        })
    }

    /// Open `count` non-blocking connections to `addr` and register them
    /// for read and write readiness.
    ///
    /// Connect completion (or failure) surfaces later as a readiness
    /// event. `count == 0` registers nothing and is not an error.
    pub fn start_connections(&mut self, addr: SocketAddr, count: usize) -> io::Result<()> {
        for _ in 0..count {
            let conn_id = self.next_conn_id;
            let stream = connect_stream(addr)?;
            let conn = Connection::new(conn_id, &self.messages);

            let key = self.connections.insert(Entry { stream, conn });
            let entry = &mut self.connections[key];
            self.poll
                .registry()
                .register(&mut entry.stream, Token(key), INTEREST)?;

            info!(
                conn_id,
                server = %addr,
                expected = entry.conn.expected_total(),
                "starting connection"
            );
            self.next_conn_id += 1;
        }
        Ok(())
    }

    /// Number of connections still registered.
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Drive all connections to completion.
    ///
    /// Returns once every connection has closed. With no registered
    /// connections this returns immediately.
    pub fn run(&mut self) -> io::Result<()> {
        while self.active_connections() > 0 {
            self.poll_once(None)?;
        }
        Ok(())
    }

    /// Block until at least one socket is ready (or the timeout elapses)
    /// and service every ready connection exactly once.
    pub fn poll_once(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.poll.poll(&mut self.events, timeout)?;

        for event in self.events.iter() {
            let key = event.token().0;

            // A connection closed earlier in this batch leaves stale events.
            let Some(entry) = self.connections.get_mut(key) else {
                continue;
            };

            // Error and hang-up conditions are routed through the read
            // branch, where the failed syscall triggers closure.
            let ready = Ready::new(
                event.is_readable() || event.is_error() || event.is_read_closed(),
                event.is_writable(),
            );
            match service_connection(&mut entry.stream, &mut entry.conn, ready, &mut self.scratch)
            {
                ServiceOutcome::Continue => {
                    // Poll is edge-triggered; re-arm so readiness that is
                    // still pending is reported on the next wait.
                    self.poll
                        .registry()
                        .reregister(&mut entry.stream, Token(key), INTEREST)?;
                }
                ServiceOutcome::Close => {
                    close_connection(&self.poll, &mut self.connections, key);
                }
            }
        }

        Ok(())
    }
}

/// Service one readiness event: at most one read attempt and at most one
/// write attempt, then decide whether to close.
///
/// Generic over the stream so the branch logic can be tested against
/// scripted streams.
fn service_connection<S: Read + Write>(
    stream: &mut S,
    conn: &mut Connection,
    ready: Ready,
    scratch: &mut [u8],
) -> ServiceOutcome {
    if ready.readable() {
        match stream.read(scratch) {
            Ok(0) => {
                debug!(conn_id = conn.conn_id(), "server closed connection");
                return ServiceOutcome::Close;
            }
            Ok(n) => {
                conn.record_received(&scratch[..n]);
                debug!(
                    conn_id = conn.conn_id(),
                    bytes = n,
                    total = conn.received_total(),
                    "received"
                );
                if conn.is_complete() {
                    return ServiceOutcome::Close;
                }
            }
            Err(ref e) if is_transient(e) => {}
            Err(e) => {
                warn!(conn_id = conn.conn_id(), error = %e, "read failed");
                return ServiceOutcome::Close;
            }
        }
    }

    if ready.writable() {
        conn.refill_outbound();
        if !conn.outbound().is_empty() {
            match stream.write(conn.outbound()) {
                Ok(n) => {
                    conn.advance_outbound(n);
                    debug!(conn_id = conn.conn_id(), bytes = n, "sent");
                }
                Err(ref e) if is_transient(e) => {}
                Err(e) => {
                    warn!(conn_id = conn.conn_id(), error = %e, "write failed");
                    return ServiceOutcome::Close;
                }
            }
        }
    }

    ServiceOutcome::Continue
}

/// A spurious wake or interrupted call is a no-op for that branch,
/// not a fault.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Unregister the socket, log the closure, and drop the stream.
///
/// Removal from the slab makes a second close for the same key a no-op.
fn close_connection(poll: &Poll, connections: &mut Slab<Entry>, key: usize) {
    if let Some(mut entry) = connections.try_remove(key) {
        let _ = poll.registry().deregister(&mut entry.stream);
        info!(
            conn_id = entry.conn.conn_id(),
            received = entry.conn.received_total(),
            "closing connection"
        );
    }
}

/// Create a non-blocking TCP socket and issue an asynchronous connect.
fn connect_stream(addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_nonblocking(true)?;

    // In-progress is the normal result for a non-blocking connect;
    // completion surfaces as write readiness. A synchronous failure
    // (loopback refusal on some platforms) is not fatal either: the
    // socket still gets registered and the fault surfaces as a
    // readiness event, closing only that connection.
    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(ref e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
        Err(e) => warn!(server = %addr, error = %e, "connect failed eagerly"),
    }

    Ok(TcpStream::from_std(socket.into()))
}
