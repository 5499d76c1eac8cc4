// crates/player-pipeline/src/packet_queue.rs
//
// Bounded FIFO of compressed packets with serial-tagged flush. Mutex +
// Condvar shape grounded in dariusbakunas-audio-bridge's `SharedAudio`
// (queue.rs): one mutex guarding a small inner struct, one condvar as a
// general "state changed" signal, `done`/`abort_request` stored under the
// same lock as the queue so no observer ever sees them race the data.
//
// Unlike `SharedAudio`, this queue is unbounded-by-item-count (the Reader
// enforces the 15 MiB backpressure cap itself by watching `size` — see
// reader.rs) and carries the serial/flush machinery spec.md §3–§4.1 needs.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use player_core::{Packet, PacketItem, Serial, SerialCell};

struct Inner {
    items: VecDeque<PacketItem>,
    nb_packets: usize,
    size: usize,
    serial: Serial,
    abort_request: bool,
}

/// One stream's queue of packets between the Reader and that stream's
/// Decoder. `serial_cell` is handed out to the stream's Clock so it can
/// detect "my source queue was flushed since I last anchored" without a
/// back-reference into this struct.
pub struct PacketQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
    serial_cell: SerialCell,
}

pub enum GetResult {
    Ok(Packet, Serial),
    Empty,
    Aborted,
}

impl PacketQueue {
    pub fn new() -> Self {
        let serial_cell = SerialCell::new();
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                nb_packets: 0,
                size: 0,
                serial: Serial::ZERO,
                abort_request: false,
            }),
            cv: Condvar::new(),
            serial_cell,
        }
    }

    pub fn serial_cell(&self) -> SerialCell {
        self.serial_cell.clone()
    }

    pub fn serial(&self) -> Serial {
        self.inner.lock().unwrap().serial
    }

    pub fn nb_packets(&self) -> usize {
        self.inner.lock().unwrap().nb_packets
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.lock().unwrap().abort_request
    }

    /// Appends `pkt` tagged with the queue's current serial. Fails silently
    /// (a no-op) once the queue is aborted — per spec.md §4.1, `put` on an
    /// aborted queue "fails."
    pub fn put(&self, pkt: Packet) {
        let mut g = self.inner.lock().unwrap();
        if g.abort_request {
            return;
        }
        let mut pkt = pkt;
        pkt.serial = g.serial;
        g.size += pkt.accounted_size();
        g.nb_packets += 1;
        g.items.push_back(PacketItem::Data(pkt));
        drop(g);
        self.cv.notify_one();
    }

    /// Empty "drain" packet signaling end-of-stream to this stream's decoder.
    pub fn put_null(&self, stream_index: usize) {
        self.put(Packet::null(stream_index));
    }

    /// Enqueues a FLUSH sentinel, bumping `serial` first so the sentinel
    /// itself carries the new generation.
    pub fn put_flush(&self) {
        let mut g = self.inner.lock().unwrap();
        if g.abort_request {
            return;
        }
        g.serial = self.serial_cell.bump();
        g.nb_packets += 1;
        g.items.push_back(PacketItem::Flush);
        drop(g);
        self.cv.notify_one();
    }

    /// Pops the head item. Blocks on an empty, non-aborted queue when
    /// `block` is set; unblocks on either a new enqueue or `abort()`.
    pub fn get(&self, block: bool) -> GetResult {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.abort_request {
                return GetResult::Aborted;
            }
            match g.items.pop_front() {
                Some(PacketItem::Flush) => {
                    // Decoder detects the flush via the serial jump on the
                    // next Data packet, not by seeing this variant directly.
                    g.nb_packets = g.nb_packets.saturating_sub(1);
                    continue;
                }
                Some(PacketItem::Data(pkt)) => {
                    g.nb_packets = g.nb_packets.saturating_sub(1);
                    g.size = g.size.saturating_sub(pkt.accounted_size());
                    let serial = pkt.serial;
                    return GetResult::Ok(pkt, serial);
                }
                None => {
                    if !block {
                        return GetResult::Empty;
                    }
                    g = self.cv.wait(g).unwrap();
                }
            }
        }
    }

    /// Drops every queued item and resets counters. Does not touch `serial`
    /// or `abort_request` (spec.md §4.1).
    pub fn flush(&self) {
        let mut g = self.inner.lock().unwrap();
        g.items.clear();
        g.nb_packets = 0;
        g.size = 0;
    }

    pub fn abort(&self) {
        let mut g = self.inner.lock().unwrap();
        g.abort_request = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Clears `abort_request` and enqueues a FLUSH sentinel, bumping serial —
    /// the queue is ready to accept fresh packets under a new generation.
    pub fn start(&self) {
        {
            let mut g = self.inner.lock().unwrap();
            g.abort_request = false;
        }
        self.put_flush();
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience alias used by Reader/Decoder to share ownership across
/// threads without each constructing its own `Arc`.
pub type SharedPacketQueue = Arc<PacketQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn put_then_get_round_trips() {
        let q = PacketQueue::new();
        q.put(Packet::new(0, Some(10), Some(10), vec![1, 2, 3]));
        assert_eq!(q.nb_packets(), 1);
        match q.get(false) {
            GetResult::Ok(pkt, _serial) => assert_eq!(pkt.data, vec![1, 2, 3]),
            _ => panic!("expected Ok"),
        }
        assert_eq!(q.nb_packets(), 0);
    }

    #[test]
    fn empty_nonblocking_get_does_not_mutate_state() {
        let q = PacketQueue::new();
        assert!(matches!(q.get(false), GetResult::Empty));
        assert_eq!(q.nb_packets(), 0);
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn flush_bumps_serial_and_tags_subsequent_packets() {
        let q = PacketQueue::new();
        let before = q.serial();
        q.put_flush();
        assert!(q.serial() > before);
        q.put(Packet::new(0, None, None, vec![9]));
        match q.get(false) {
            GetResult::Ok(pkt, serial) => {
                assert_eq!(pkt.serial, serial);
                assert_eq!(serial, q.serial());
            }
            _ => panic!("expected Ok"),
        }
    }

    #[test]
    fn size_and_count_invariant_after_put_and_get() {
        let q = PacketQueue::new();
        q.put(Packet::new(0, Some(1), Some(1), vec![0; 100]));
        q.put(Packet::new(0, Some(2), Some(2), vec![0; 50]));
        assert_eq!(q.nb_packets(), 2);
        assert_eq!(q.size(), 100 + 24 + 50 + 24);
        let _ = q.get(false);
        assert_eq!(q.nb_packets(), 1);
        assert_eq!(q.size(), 50 + 24);
    }

    #[test]
    fn blocking_get_wakes_on_put() {
        let q = Arc::new(PacketQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || match q2.get(true) {
            GetResult::Ok(pkt, _) => pkt.data,
            _ => panic!("expected Ok"),
        });
        thread::sleep(Duration::from_millis(20));
        q.put(Packet::new(0, None, None, vec![42]));
        let data = handle.join().unwrap();
        assert_eq!(data, vec![42]);
    }

    #[test]
    fn abort_wakes_all_blocking_waiters_within_a_few_ms() {
        let q = Arc::new(PacketQueue::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let q2 = q.clone();
            handles.push(thread::spawn(move || matches!(q2.get(true), GetResult::Aborted)));
        }
        thread::sleep(Duration::from_millis(10));
        q.abort();
        for h in handles {
            assert!(h.join().unwrap());
        }
    }

    #[test]
    fn put_after_abort_is_a_silent_no_op() {
        let q = PacketQueue::new();
        q.abort();
        q.put(Packet::new(0, None, None, vec![1]));
        assert_eq!(q.nb_packets(), 0);
    }

    #[test]
    fn start_clears_abort_and_bumps_serial() {
        let q = PacketQueue::new();
        q.abort();
        assert!(q.is_aborted());
        let before = q.serial();
        q.start();
        assert!(!q.is_aborted());
        assert!(q.serial() > before);
    }
}
