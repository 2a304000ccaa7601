//! In-order, bounded-resend delivery over an unreliable link.
//!
//! Each side of a link owns one [`ReliableWindow`]. Outgoing payloads get a
//! `u16` sequence number; at most `window` of them are in flight at once and
//! the rest wait in a queue. Unacknowledged payloads are resent after the
//! resend timeout. Incoming payloads are delivered strictly in sequence
//! order: anything ahead of the next expected sequence (but inside the
//! window) is buffered, duplicates and stale sequences are dropped. Acks are
//! cumulative.
//!
//! A payload is resent at most `max_resends` times. Needing one more resend
//! than that marks the window as failed, and the driver drops the link.
//!
//! Sequence numbers wrap, so comparisons use the half-range rule.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// `true` if `s1` comes after `s2`, accounting for wraparound.
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// `true` if `s1` comes before `s2`, accounting for wraparound.
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

#[derive(Debug)]
struct InFlight {
    seq: u16,
    data: Bytes,
    sent_at: Option<Instant>,
    resends: u32,
}

#[derive(Debug)]
pub struct ReliableWindow {
    window: u16,
    resend_timeout: Duration,
    max_resends: u32,
    failed: bool,

    next_send_seq: u16,
    in_flight: VecDeque<InFlight>,
    queued: VecDeque<Bytes>,

    next_expected: u16,
    early: HashMap<u16, Vec<u8>>,
}

impl ReliableWindow {
    /// Resend cap used by [`ReliableWindow::new`].
    pub const DEFAULT_MAX_RESENDS: u32 = 50;

    /// Creates a window. A `window` of zero is treated as one.
    pub fn new(window: u16, resend_timeout: Duration) -> Self {
        Self {
            window: window.max(1),
            resend_timeout,
            max_resends: Self::DEFAULT_MAX_RESENDS,
            failed: false,
            next_send_seq: 0,
            in_flight: VecDeque::new(),
            queued: VecDeque::new(),
            next_expected: 0,
            early: HashMap::new(),
        }
    }

    pub fn with_max_resends(mut self, max_resends: u32) -> Self {
        self.max_resends = max_resends;
        self
    }

    /// Queues a payload for sending.
    pub fn push(&mut self, data: Bytes) {
        self.queued.push_back(data);
    }

    /// Returns the payloads due for (re)transmission at `now`, in sequence
    /// order, and marks them sent.
    ///
    /// Returns nothing once the window has failed.
    pub fn poll_transmit(&mut self, now: Instant) -> Vec<(u16, Bytes)> {
        if self.failed {
            return Vec::new();
        }
        while self.in_flight.len() < usize::from(self.window) {
            let Some(data) = self.queued.pop_front() else {
                break;
            };
            let seq = self.next_send_seq;
            self.next_send_seq = self.next_send_seq.wrapping_add(1);
            self.in_flight.push_back(InFlight {
                seq,
                data,
                sent_at: None,
                resends: 0,
            });
        }

        let mut due = Vec::new();
        for entry in &mut self.in_flight {
            match entry.sent_at {
                None => {}
                Some(at) if now.saturating_duration_since(at) < self.resend_timeout => continue,
                Some(_) if entry.resends >= self.max_resends => {
                    tracing::debug!(seq = entry.seq, resends = entry.resends, "resend cap reached");
                    self.failed = true;
                    return Vec::new();
                }
                Some(_) => entry.resends += 1,
            }
            entry.sent_at = Some(now);
            due.push((entry.seq, entry.data.clone()));
        }
        due
    }

    /// `true` once some payload ran out of resends. The link is dead.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Drops every in-flight payload before `next_expected`.
    pub fn on_ack(&mut self, next_expected: u16) {
        while let Some(front) = self.in_flight.front() {
            if sequence_less_than(front.seq, next_expected) {
                self.in_flight.pop_front();
            } else {
                break;
            }
        }
    }

    /// Accepts an incoming payload and returns every payload that is now
    /// deliverable, in order. Possibly empty.
    pub fn on_payload(&mut self, seq: u16, body: &[u8]) -> Vec<Vec<u8>> {
        if seq != self.next_expected {
            let ahead = seq.wrapping_sub(self.next_expected);
            if sequence_greater_than(seq, self.next_expected) && ahead < self.window {
                self.early.entry(seq).or_insert_with(|| body.to_vec());
            }
            return Vec::new();
        }

        let mut delivered = vec![body.to_vec()];
        self.next_expected = self.next_expected.wrapping_add(1);
        while let Some(next) = self.early.remove(&self.next_expected) {
            delivered.push(next);
            self.next_expected = self.next_expected.wrapping_add(1);
        }
        delivered
    }

    /// Sequence number the peer should send next; the value carried in acks.
    pub fn next_expected(&self) -> u16 {
        self.next_expected
    }

    /// Payloads sent or queued but not yet acknowledged.
    pub fn pending(&self) -> usize {
        self.in_flight.len() + self.queued.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(1, 1));
        assert!(sequence_greater_than(0, 65535));
        assert!(sequence_less_than(65535, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_caps_in_flight() {
        let mut w = ReliableWindow::new(2, TIMEOUT);
        for i in 0..5u8 {
            w.push(Bytes::from(vec![i]));
        }
        let sent = w.poll_transmit(Instant::now());
        assert_eq!(sent.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(w.pending(), 5);

        w.on_ack(1);
        let sent = w.poll_transmit(Instant::now());
        assert_eq!(sent.iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_payload_is_resent_after_timeout() {
        let mut w = ReliableWindow::new(32, TIMEOUT);
        w.push(Bytes::from_static(b"a"));
        let start = Instant::now();
        assert_eq!(w.poll_transmit(start).len(), 1);
        assert!(w.poll_transmit(start + TIMEOUT / 2).is_empty());
        assert_eq!(w.poll_transmit(start + TIMEOUT).len(), 1);

        w.on_ack(1);
        assert!(w.poll_transmit(start + TIMEOUT * 3).is_empty());
        assert_eq!(w.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_fails_after_resend_cap() {
        let mut w = ReliableWindow::new(32, TIMEOUT).with_max_resends(2);
        w.push(Bytes::from_static(b"a"));
        let start = Instant::now();
        assert_eq!(w.poll_transmit(start).len(), 1);
        assert_eq!(w.poll_transmit(start + TIMEOUT).len(), 1);
        assert_eq!(w.poll_transmit(start + TIMEOUT * 2).len(), 1);
        assert!(!w.has_failed());

        assert!(w.poll_transmit(start + TIMEOUT * 3).is_empty());
        assert!(w.has_failed());
        w.push(Bytes::from_static(b"b"));
        assert!(w.poll_transmit(start + TIMEOUT * 4).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acked_payload_never_counts_toward_cap() {
        let mut w = ReliableWindow::new(32, TIMEOUT).with_max_resends(1);
        let start = Instant::now();
        for i in 0..5u32 {
            w.push(Bytes::from(vec![i as u8]));
            let at = start + TIMEOUT * i;
            assert_eq!(w.poll_transmit(at).len(), 1);
            w.on_ack(w.next_send_seq);
        }
        assert!(!w.has_failed());
        assert_eq!(w.pending(), 0);
    }

    #[test]
    fn test_out_of_order_payloads_are_delivered_in_order() {
        let mut w = ReliableWindow::new(32, TIMEOUT);
        assert!(w.on_payload(1, b"b").is_empty());
        assert!(w.on_payload(2, b"c").is_empty());
        let delivered = w.on_payload(0, b"a");
        assert_eq!(delivered, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(w.next_expected(), 3);
    }

    #[test]
    fn test_duplicates_and_far_future_are_dropped() {
        let mut w = ReliableWindow::new(4, TIMEOUT);
        assert_eq!(w.on_payload(0, b"a").len(), 1);
        assert!(w.on_payload(0, b"a").is_empty(), "duplicate");
        assert!(w.on_payload(10, b"z").is_empty(), "outside window");
        assert_eq!(w.on_payload(1, b"b").len(), 1);
        assert_eq!(w.next_expected(), 2);
    }

    #[test]
    fn test_delivery_continues_across_wraparound() {
        let mut w = ReliableWindow::new(8, TIMEOUT);
        w.next_expected = 65535;
        assert!(w.on_payload(0, b"second").is_empty());
        let delivered = w.on_payload(65535, b"first");
        assert_eq!(delivered.len(), 2);
        assert_eq!(w.next_expected(), 1);
    }
}
