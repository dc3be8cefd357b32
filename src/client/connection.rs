//! Per-connection state for the multi-connection client.
//!
//! Each connection tracks how many reply bytes it still expects,
//! the messages it has yet to send, and the bytes it has queued
//! but not fully written.

use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

/// Readiness flags reported for one wake-up of a registered socket.
///
/// Decoupled from the poller's event type so handler logic can be
/// exercised without a live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    readable: bool,
    writable: bool,
}

impl Ready {
    pub const fn new(readable: bool, writable: bool) -> Self {
        Self { readable, writable }
    }

    pub const fn readable(self) -> bool {
        self.readable
    }

    pub const fn writable(self) -> bool {
        self.writable
    }
}

/// State for a single client connection.
///
/// Created when the connection is registered with the poller, mutated
/// only while its own socket is being serviced, and destroyed when the
/// connection closes.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier, assigned sequentially starting at 1.
    conn_id: u32,
    /// Total reply bytes expected before the connection is complete.
    expected_total: usize,
    /// Reply bytes received so far.
    received_total: usize,
    /// Messages still to send, consumed front to back.
    pending: VecDeque<Bytes>,
    /// Bytes queued for sending but not yet accepted by the socket.
    outbound: BytesMut,
}

impl Connection {
    /// Create connection state with its own copy of the message queue.
    pub fn new(conn_id: u32, messages: &[Bytes]) -> Self {
        let expected_total = messages.iter().map(|m| m.len()).sum();
        Self {
            conn_id,
            expected_total,
            received_total: 0,
            pending: messages.iter().cloned().collect(),
            outbound: BytesMut::new(),
        }
    }

    pub fn conn_id(&self) -> u32 {
        self.conn_id
    }

    pub fn expected_total(&self) -> usize {
        self.expected_total
    }

    pub fn received_total(&self) -> usize {
        self.received_total
    }

    /// Record bytes received from the server.
    ///
    /// The received bytes are also appended to the outbound buffer,
    /// mirroring the reference client's echo-back behavior.
    pub fn record_received(&mut self, data: &[u8]) {
        self.outbound.extend_from_slice(data);
        self.received_total += data.len();
    }

    /// Whether all expected reply bytes have arrived.
    pub fn is_complete(&self) -> bool {
        self.received_total >= self.expected_total
    }

    /// Promote the next pending message into the outbound buffer.
    ///
    /// Only refills when the buffer is fully drained, so messages go
    /// out strictly in their original order.
    pub fn refill_outbound(&mut self) {
        if self.outbound.is_empty() {
            if let Some(msg) = self.pending.pop_front() {
                self.outbound.extend_from_slice(&msg);
            }
        }
    }

    /// Bytes currently queued for sending.
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Drop the first `n` outbound bytes after a (possibly partial) send,
    /// retaining the unsent suffix for the next write-ready event.
    pub fn advance_outbound(&mut self, n: usize) {
        self.outbound.advance(n);
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages() -> Vec<Bytes> {
        vec![Bytes::from_static(b"hello"), Bytes::from_static(b"world")]
    }

    #[test]
    fn test_new_connection() {
        let conn = Connection::new(1, &messages());
        assert_eq!(conn.conn_id(), 1);
        assert_eq!(conn.expected_total(), 10);
        assert_eq!(conn.received_total(), 0);
        assert_eq!(conn.pending_len(), 2);
        assert!(conn.outbound().is_empty());
        assert!(!conn.is_complete());
    }

    #[test]
    fn test_empty_message_list() {
        let conn = Connection::new(1, &[]);
        assert_eq!(conn.expected_total(), 0);
        assert!(conn.is_complete());
    }

    #[test]
    fn test_refill_is_fifo() {
        let mut conn = Connection::new(1, &messages());

        conn.refill_outbound();
        assert_eq!(conn.outbound(), b"hello");
        assert_eq!(conn.pending_len(), 1);

        // Refill with a non-empty buffer is a no-op
        conn.refill_outbound();
        assert_eq!(conn.outbound(), b"hello");
        assert_eq!(conn.pending_len(), 1);

        conn.advance_outbound(5);
        conn.refill_outbound();
        assert_eq!(conn.outbound(), b"world");
        assert_eq!(conn.pending_len(), 0);

        // Queue exhausted
        conn.advance_outbound(5);
        conn.refill_outbound();
        assert!(conn.outbound().is_empty());
    }

    #[test]
    fn test_partial_send_keeps_suffix() {
        let mut conn = Connection::new(1, &messages());
        conn.refill_outbound();

        conn.advance_outbound(2);
        assert_eq!(conn.outbound(), b"llo");

        conn.advance_outbound(3);
        assert!(conn.outbound().is_empty());
    }

    #[test]
    fn test_received_is_monotonic() {
        let mut conn = Connection::new(1, &messages());

        conn.record_received(b"abc");
        assert_eq!(conn.received_total(), 3);
        assert!(!conn.is_complete());

        conn.record_received(b"defghij");
        assert_eq!(conn.received_total(), 10);
        assert!(conn.is_complete());
    }

    #[test]
    fn test_overshoot_still_counts_as_complete() {
        let mut conn = Connection::new(1, &messages());

        conn.record_received(b"0123456789ab");
        assert_eq!(conn.received_total(), 12);
        assert!(conn.is_complete());
    }

    #[test]
    fn test_received_bytes_are_echoed_to_outbound() {
        let mut conn = Connection::new(1, &messages());

        conn.record_received(b"abc");
        assert_eq!(conn.outbound(), b"abc");

        // Echoed bytes do not block the message queue once drained
        conn.advance_outbound(3);
        conn.refill_outbound();
        assert_eq!(conn.outbound(), b"hello");
    }

    #[test]
    fn test_ready_flags() {
        let readable = Ready::new(true, false);
        assert!(readable.readable());
        assert!(!readable.writable());

        let writable = Ready::new(false, true);
        assert!(writable.writable());
        assert!(!writable.readable());

        assert_eq!(Ready::new(true, true), Ready::new(true, true));
    }
}
