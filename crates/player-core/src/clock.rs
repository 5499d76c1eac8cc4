// crates/player-core/src/clock.rs
//
// Monotonic, pausable, speed-scaled time source. One instance each for
// audio, video and "external" (wall-time-derived) playback position.
//
// The get/set formulas are lifted verbatim from the ffplay-derived source
// this spec was distilled from (`Clock::get` == `get_clock` in
// `FFPlayer.cpp`): `pts_drift + now - (now - last_updated) * (1.0 - speed)`.
// This is algebraically the same expression spec.md §3 writes as
// `pts_drift + now + (now - last_updated) * (speed - 1)` — kept in the
// original's form since that's the one battle-tested against the rounding
// behavior of `set_clock_speed`'s re-anchor-then-update sequence.

use std::sync::OnceLock;
use std::time::Instant;

use crate::serial::{Serial, SerialCell};

/// Seconds elapsed since an arbitrary, process-lifetime-stable epoch.
/// Analogous to `av_gettime_relative() / 1_000_000.0`.
pub fn monotonic_now() -> f64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_secs_f64()
}

/// Threshold above which two clocks are considered irreconcilably apart and
/// a slave clock simply adopts the master's value outright.
pub const AV_NOSYNC_THRESHOLD: f64 = 10.0;

pub const SPEED_MIN: f64 = 0.9;
pub const SPEED_MAX: f64 = 1.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterSyncType {
    Video,
    Audio,
    External,
}

#[derive(Clone, Debug)]
pub struct Clock {
    pts: f64,
    pts_drift: f64,
    last_updated: f64,
    speed: f64,
    /// `None` until the first `set`/`set_at` call — mirrors the original's
    /// `serial = -1` sentinel, which can never equal a real (unsigned) serial.
    serial: Option<Serial>,
    paused: bool,
    /// Points at the "currently valid serial" of this clock's source
    /// PacketQueue. A mismatch between `serial` and `*queue_serial.get()`
    /// means the queue was flushed since this clock was last anchored —
    /// the clock is stale until the next `set`.
    queue_serial: SerialCell,
}

impl Clock {
    pub fn new(queue_serial: SerialCell) -> Self {
        let mut c = Self {
            pts: f64::NAN,
            pts_drift: 0.0,
            last_updated: 0.0,
            speed: 1.0,
            serial: None,
            paused: false,
            queue_serial,
        };
        c.set(f64::NAN, None);
        c
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn last_updated(&self) -> f64 {
        self.last_updated
    }

    /// The serial this clock was last anchored against — `None` before the
    /// first `set`/`set_at`. Used by `VideoState::toggle_pause` to re-anchor
    /// a clock to its own current value without losing its serial.
    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    /// Current value, or NaN if this clock's source queue was flushed since
    /// it was last anchored (spec.md §3 staleness rule).
    pub fn get(&self) -> f64 {
        if self.serial != Some(self.queue_serial.get()) {
            return f64::NAN;
        }
        if self.paused {
            self.pts
        } else {
            let now = monotonic_now();
            self.pts_drift + now - (now - self.last_updated) * (1.0 - self.speed)
        }
    }

    pub fn set_at(&mut self, pts: f64, serial: Option<Serial>, time: f64) {
        self.pts = pts;
        self.last_updated = time;
        self.pts_drift = self.pts - time;
        self.serial = serial;
    }

    pub fn set(&mut self, pts: f64, serial: Option<Serial>) {
        let time = monotonic_now();
        self.set_at(pts, serial, time);
    }

    /// Re-anchors to the clock's own current value before changing speed, so
    /// the speed change takes effect from "now" rather than silently
    /// rewinding/advancing the anchor.
    pub fn set_speed(&mut self, speed: f64) {
        let cur = self.get();
        self.set(cur, self.serial);
        self.speed = speed;
    }

    /// Adopt `slave`'s value if this clock is stale or has drifted from it
    /// by more than `AV_NOSYNC_THRESHOLD`.
    pub fn sync_to_slave(&mut self, slave: &Clock) {
        let clock = self.get();
        let slave_clock = slave.get();
        if !slave_clock.is_nan() && (clock.is_nan() || (clock - slave_clock).abs() > AV_NOSYNC_THRESHOLD) {
            self.set(slave_clock, slave.serial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn fresh_clock_is_nan() {
        let cell = SerialCell::new();
        let c = Clock::new(cell);
        assert!(c.get().is_nan());
    }

    #[test]
    fn set_then_get_returns_pts_when_paused() {
        let cell = SerialCell::new();
        let mut c = Clock::new(cell.clone());
        c.set(5.0, Some(cell.get()));
        c.set_paused(true);
        assert_eq!(c.get(), 5.0);
    }

    #[test]
    fn running_clock_advances_with_wall_time() {
        let cell = SerialCell::new();
        let mut c = Clock::new(cell.clone());
        c.set(0.0, Some(cell.get()));
        let t1 = c.get();
        sleep(Duration::from_millis(30));
        let t2 = c.get();
        assert!(t2 > t1);
        assert!((t2 - t1 - 0.03).abs() < 0.05);
    }

    #[test]
    fn stale_after_queue_flush() {
        let cell = SerialCell::new();
        let mut c = Clock::new(cell.clone());
        c.set(1.0, Some(cell.get()));
        assert!(!c.get().is_nan());
        cell.bump();
        assert!(c.get().is_nan());
    }

    #[test]
    fn sync_to_slave_adopts_when_far_apart() {
        let cell = SerialCell::new();
        let mut master = Clock::new(cell.clone());
        let mut slave = Clock::new(cell.clone());
        master.set(0.0, Some(cell.get()));
        master.set_paused(true);
        slave.set(20.0, Some(cell.get()));
        slave.set_paused(true);
        master.sync_to_slave(&slave);
        assert_eq!(master.get(), 20.0);
    }

    #[test]
    fn sync_to_slave_ignores_small_drift() {
        let cell = SerialCell::new();
        let mut master = Clock::new(cell.clone());
        let mut slave = Clock::new(cell.clone());
        master.set(10.0, Some(cell.get()));
        master.set_paused(true);
        slave.set(10.05, Some(cell.get()));
        slave.set_paused(true);
        master.sync_to_slave(&slave);
        assert_eq!(master.get(), 10.0);
    }
}
