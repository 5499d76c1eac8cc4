// crates/player-core/src/serial.rs
//
// Monotonic flush generation. Bumped exactly once per FLUSH sentinel so
// stale packets/frames surviving a seek can be told apart from fresh ones.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(pub u64);

impl Serial {
    pub const ZERO: Serial = Serial(0);

    pub fn next(self) -> Serial {
        Serial(self.0 + 1)
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared cell a `Clock` reads to decide whether its own serial is stale —
/// the PacketQueue on the producing side owns the authoritative counter and
/// hands out clones of this cell so readers never need a back-reference to
/// the queue itself.
#[derive(Clone, Debug, Default)]
pub struct SerialCell(Arc<AtomicU64>);

impl SerialCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    pub fn get(&self) -> Serial {
        Serial(self.0.load(Ordering::Acquire))
    }

    pub fn bump(&self) -> Serial {
        let next = self.0.fetch_add(1, Ordering::AcqRel) + 1;
        Serial(next)
    }

    pub fn set(&self, serial: Serial) {
        self.0.store(serial.0, Ordering::Release);
    }
}

/// Shared, cross-thread-readable mirror of a `Decoder`'s `finished` field
/// (spec.md §3: "serial at which EOF was observed; 0 otherwise"). The
/// decoder itself runs on its own worker thread; `Reader` needs to read this
/// without taking any lock the decoder might be blocked on, so it's a plain
/// atomic rather than a field behind the decoder's own state. Sentinel
/// `u64::MAX` stands in for "not finished" since a real serial starts at 0.
#[derive(Clone, Debug, Default)]
pub struct FinishedCell(Arc<AtomicU64>);

const NOT_FINISHED: u64 = u64::MAX;

impl FinishedCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(NOT_FINISHED)))
    }

    pub fn get(&self) -> Option<Serial> {
        match self.0.load(Ordering::Acquire) {
            NOT_FINISHED => None,
            v => Some(Serial(v)),
        }
    }

    pub fn set(&self, serial: Serial) {
        self.0.store(serial.0, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(NOT_FINISHED, Ordering::Release);
    }
}
