//! Bounded FIFO of serialized datagrams
//!
//! Entries are move-owned while queued; a full ring drops the newest push
//! rather than overwriting queued packets.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;

use crate::constants::PACKET_RING_CAPACITY;

/// Multi-producer/multi-consumer packet queue with a hard capacity.
pub struct PacketRing {
    capacity: usize,
    inner: Mutex<VecDeque<Bytes>>,
}

impl PacketRing {
    /// Ring with the default capacity (about 1 s of 10 ms packets).
    pub fn new() -> Self {
        Self::with_capacity(PACKET_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Queue a packet. Returns false (dropping the packet) when full.
    pub fn push(&self, packet: Bytes) -> bool {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            return false;
        }
        queue.push_back(packet);
        true
    }

    /// Dequeue the oldest packet.
    pub fn pop(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Observe the head without removal.
    pub fn peek(&self) -> Option<Bytes> {
        self.inner.lock().unwrap().front().cloned()
    }

    /// Drop every queued packet.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().unwrap().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PacketRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let ring = PacketRing::with_capacity(4);
        assert!(ring.push(Bytes::from_static(b"one")));
        assert!(ring.push(Bytes::from_static(b"two")));
        assert_eq!(ring.size(), 2);

        assert_eq!(ring.pop().unwrap(), Bytes::from_static(b"one"));
        assert_eq!(ring.pop().unwrap(), Bytes::from_static(b"two"));
        assert!(ring.pop().is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_full_drops_newest() {
        let ring = PacketRing::with_capacity(2);
        assert!(ring.push(Bytes::from_static(b"a")));
        assert!(ring.push(Bytes::from_static(b"b")));
        assert!(ring.is_full());
        assert!(!ring.push(Bytes::from_static(b"c")));

        // Queued packets survived the rejected push
        assert_eq!(ring.pop().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(ring.pop().unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn test_peek_leaves_head() {
        let ring = PacketRing::with_capacity(2);
        ring.push(Bytes::from_static(b"head"));
        assert_eq!(ring.peek().unwrap(), Bytes::from_static(b"head"));
        assert_eq!(ring.size(), 1);
        assert_eq!(ring.pop().unwrap(), Bytes::from_static(b"head"));
    }

    #[test]
    fn test_clear_restores_capacity() {
        let ring = PacketRing::with_capacity(2);
        ring.push(Bytes::from_static(b"a"));
        ring.push(Bytes::from_static(b"b"));
        ring.clear();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert!(ring.push(Bytes::from_static(b"c")));
        assert!(ring.push(Bytes::from_static(b"d")));
    }

    #[test]
    fn test_default_capacity() {
        let ring = PacketRing::new();
        assert_eq!(ring.capacity(), 100);
    }

    #[test]
    fn test_concurrent_producers_respect_capacity() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(PacketRing::with_capacity(50));
        let accepted: usize = (0..4)
            .map(|_| {
                let ring = ring.clone();
                thread::spawn(move || {
                    (0..100)
                        .filter(|_| ring.push(Bytes::from_static(b"pkt")))
                        .count()
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum();

        assert_eq!(accepted, 50);
        assert_eq!(ring.size(), 50);
        assert!(ring.is_full());
    }
}
