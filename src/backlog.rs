//! Bounded FIFO ring of recently transmitted audio packets, for resend.

use std::collections::VecDeque;

use bytes::Bytes;

/// Default ring size: ~8 seconds of audio at 352 frames/packet, 44.1 kHz.
pub const DEFAULT_BACKLOG_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct Slot {
    seq: u16,
    payload: Bytes,
}

/// Bounded ring of `(seq, payload)` pairs, keyed by RTP sequence number.
///
/// `store` evicts the oldest slot once the ring is full (strict FIFO by arrival, not by seq
/// value). `fetch` is a linear scan over the ring —
/// sequence-wraparound-safe, since it compares stored sequence numbers directly rather than
/// assuming a monotonic index.
#[derive(Debug)]
pub struct Backlog {
    slots: VecDeque<Slot>,
    capacity: usize,
}

impl Backlog {
    /// Create a backlog with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Store a freshly emitted packet, evicting the oldest entry if full.
    pub fn store(&mut self, seq: u16, payload: Bytes) {
        if self.slots.len() >= self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(Slot { seq, payload });
    }

    /// Fetch the stored payload for `seq`, if still present.
    #[must_use]
    pub fn fetch(&self, seq: u16) -> Option<Bytes> {
        self.slots
            .iter()
            .find(|slot| slot.seq == seq)
            .map(|slot| slot.payload.clone())
    }

    /// Fetch `count` consecutive payloads starting at `start_seq`, skipping any that have
    /// already fallen out of the ring. Used to answer a resend request.
    #[must_use]
    pub fn fetch_range(&self, start_seq: u16, count: u16) -> Vec<(u16, Bytes)> {
        (0..count)
            .filter_map(|offset| {
                let seq = start_seq.wrapping_add(offset);
                self.fetch(seq).map(|payload| (seq, payload))
            })
            .collect()
    }

    /// Number of packets currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the backlog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop all retained packets (called on TEARDOWN).
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: u8) -> Bytes {
        Bytes::from(vec![n])
    }

    #[test]
    fn all_packets_resendable_under_capacity() {
        let mut backlog = Backlog::new(1000);
        for seq in 0u16..10 {
            backlog.store(seq, payload(seq as u8));
        }
        assert_eq!(backlog.len(), 10);
        for seq in 0u16..10 {
            assert_eq!(backlog.fetch(seq), Some(payload(seq as u8)));
        }
    }

    #[test]
    fn eviction_is_strict_fifo_once_full() {
        let mut backlog = Backlog::new(4);
        for seq in 0u16..10 {
            backlog.store(seq, payload(seq as u8));
        }
        assert_eq!(backlog.len(), 4);
        // Only the most recent 4 (6,7,8,9) survive.
        for seq in 0u16..6 {
            assert_eq!(backlog.fetch(seq), None, "seq {seq} should have been evicted");
        }
        for seq in 6u16..10 {
            assert_eq!(backlog.fetch(seq), Some(payload(seq as u8)));
        }
    }

    #[test]
    fn resend_returns_byte_identical_payloads() {
        let mut backlog = Backlog::new(1000);
        for seq in 100u16..110 {
            backlog.store(seq, payload(seq as u8));
        }
        let resent = backlog.fetch_range(103, 2);
        assert_eq!(resent, vec![(103, payload(103)), (104, payload(104))]);
    }

    #[test]
    fn resend_skips_entries_already_evicted() {
        let mut backlog = Backlog::new(2);
        backlog.store(1, payload(1));
        backlog.store(2, payload(2));
        backlog.store(3, payload(3)); // evicts seq 1
        let resent = backlog.fetch_range(1, 3);
        assert_eq!(resent, vec![(2, payload(2)), (3, payload(3))]);
    }

    #[test]
    fn fetch_range_handles_seq_wraparound() {
        let mut backlog = Backlog::new(1000);
        backlog.store(u16::MAX - 1, payload(1));
        backlog.store(u16::MAX, payload(2));
        backlog.store(0, payload(3));
        backlog.store(1, payload(4));
        let resent = backlog.fetch_range(u16::MAX - 1, 4);
        assert_eq!(
            resent,
            vec![
                (u16::MAX - 1, payload(1)),
                (u16::MAX, payload(2)),
                (0, payload(3)),
                (1, payload(4)),
            ]
        );
    }
}
