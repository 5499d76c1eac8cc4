// crates/player-core/src/packet.rs
//
// Compressed unit handed from the Reader to a per-stream PacketQueue, and
// from there to that stream's Decoder.
//
// The FLUSH sentinel is a distinct enum variant (`PacketItem::Flush`) rather
// than a magic `data` pointer compared against a sentinel address — see
// REDESIGN FLAGS in SPEC_FULL.md §4. A null packet (`Packet::null`) is a
// different thing: a real, empty-payload `Data` packet used to drain a
// decoder at end-of-stream without bumping the queue's serial.

use crate::serial::Serial;

/// One compressed unit of a single stream, or an empty "drain" marker.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub data: Vec<u8>,
    /// Assigned by `PacketQueue::put` at enqueue time — the serial in force
    /// when this packet joined the queue, not necessarily the queue's
    /// *current* serial by the time a consumer dequeues it.
    pub serial: Serial,
}

impl Packet {
    pub fn new(stream_index: usize, pts: Option<i64>, dts: Option<i64>, data: Vec<u8>) -> Self {
        Self { stream_index, pts, dts, data, serial: Serial::ZERO }
    }

    /// An empty packet used to signal end-of-stream to this stream's decoder
    /// (`PacketQueue::put_null`). Carries no data, but still carries a real
    /// serial — unlike `PacketItem::Flush`, it does not reset the queue's
    /// generation.
    pub fn null(stream_index: usize) -> Self {
        Self { stream_index, pts: None, dts: None, data: Vec::new(), serial: Serial::ZERO }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte accounting used for `PacketQueue::size`'s invariant
    /// (`size == Σ packet.size + overhead`). The per-entry overhead
    /// approximates the fixed cost of an AVPacket-equivalent struct.
    pub fn accounted_size(&self) -> usize {
        const PER_ENTRY_OVERHEAD: usize = 24;
        self.data.len() + PER_ENTRY_OVERHEAD
    }
}

/// A queue entry: either real packet data, or the flush control message that
/// bumps the queue's serial and tells every downstream consumer "discard
/// anything you were holding from before this point."
#[derive(Clone, Debug)]
pub enum PacketItem {
    Data(Packet),
    Flush,
}

impl PacketItem {
    pub fn accounted_size(&self) -> usize {
        match self {
            PacketItem::Data(p) => p.accounted_size(),
            PacketItem::Flush => 0,
        }
    }
}
