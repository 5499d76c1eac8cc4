// crates/player-pipeline/src/state.rs
//
// VideoState: the aggregate spec.md §3 describes — three PacketQueues, three
// FrameQueues, three Clocks, the sync mode, seek/pause control plane, EOF
// flag. Owned exclusively by one playback session (one `Controller::prepare`
// call); destroyed only after every worker thread has joined (§4.8,
// `release`).
//
// Control fields (`paused`, `seek`, `eof`, `abort_request`) are atomics/a
// small mutex rather than requiring callers to go through a single lock,
// matching spec.md §5's locking discipline note: "written only by Controller
// and Reader respectively; other readers tolerate stale values of at most
// one iteration."

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use player_core::clock::monotonic_now;
use player_core::{Clock, FinishedCell, MasterSyncType, Options, SerialCell, SyncType};

use crate::frame_queue::SharedFrameQueue;
use crate::packet_queue::SharedPacketQueue;

/// One stream's share of the pipeline: its packet/frame queues plus the
/// cross-thread-visible "decoder finished" flag Reader needs for the
/// loop-at-end / drain-and-wait check (spec.md §4.7).
pub struct StreamPipeline {
    pub stream_index: usize,
    pub time_base: (i32, i32),
    pub packet_queue: SharedPacketQueue,
    pub frame_queue: SharedFrameQueue,
    pub finished: FinishedCell,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SeekRequest {
    pub pos: i64,
    pub rel: i64,
    pub by_bytes: bool,
}

#[derive(Default)]
struct SeekSlot {
    pending: Option<SeekRequest>,
}

pub struct VideoState {
    pub video: Option<StreamPipeline>,
    pub audio: Option<StreamPipeline>,
    pub subtitle: Option<StreamPipeline>,

    pub vid_clock: Arc<Mutex<Clock>>,
    pub audio_clock: Arc<Mutex<Clock>>,
    pub ext_clock: Arc<Mutex<Clock>>,

    pub options: Options,
    pub max_frame_duration: f64,
    pub realtime: bool,

    /// Shared with `VideoSync`'s presentation loop — see video_sync.rs's
    /// doc comment on its own `frame_timer` field for why this can't just
    /// live there alone.
    pub frame_timer: Arc<Mutex<f64>>,

    abort_request: AtomicBool,
    paused: AtomicBool,
    eof: AtomicBool,
    step: AtomicBool,

    seek: Mutex<SeekSlot>,
    /// `continue_read_thread` from spec.md §4.7/§5: Reader waits on this
    /// (with a 10ms timeout) during backpressure and end-of-stream idling;
    /// `stream_seek` and `abort` both notify it.
    continue_read_gate: Mutex<()>,
    continue_read_cv: Condvar,
}

impl VideoState {
    pub fn new(
        video: Option<StreamPipeline>,
        audio: Option<StreamPipeline>,
        subtitle: Option<StreamPipeline>,
        options: Options,
        max_frame_duration: f64,
        realtime: bool,
    ) -> Self {
        let video_serial = video.as_ref().map(|v| v.packet_queue.serial_cell()).unwrap_or_default();
        let audio_serial = audio.as_ref().map(|a| a.packet_queue.serial_cell()).unwrap_or_default();
        let ext_serial = SerialCell::new();

        Self {
            video,
            audio,
            subtitle,
            vid_clock: Arc::new(Mutex::new(Clock::new(video_serial))),
            audio_clock: Arc::new(Mutex::new(Clock::new(audio_serial))),
            ext_clock: Arc::new(Mutex::new(Clock::new(ext_serial))),
            options,
            max_frame_duration,
            realtime,
            frame_timer: Arc::new(Mutex::new(monotonic_now())),
            abort_request: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            eof: AtomicBool::new(false),
            step: AtomicBool::new(false),
            seek: Mutex::new(SeekSlot::default()),
            continue_read_gate: Mutex::new(()),
            continue_read_cv: Condvar::new(),
        }
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::Acquire)
    }

    pub fn set_eof(&self, eof: bool) {
        self.eof.store(eof, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_request.load(Ordering::Acquire)
    }

    pub fn is_stepping(&self) -> bool {
        self.step.load(Ordering::Acquire)
    }

    pub fn clear_step(&self) {
        self.step.store(false, Ordering::Release);
    }

    /// Aborts every queue belonging to this session and wakes every waiter,
    /// including Reader's backpressure/idle wait (spec.md §4.8 `release`).
    pub fn abort(&self) {
        self.abort_request.store(true, Ordering::Release);
        if let Some(v) = &self.video {
            v.packet_queue.abort();
            v.frame_queue.abort();
        }
        if let Some(a) = &self.audio {
            a.packet_queue.abort();
            a.frame_queue.abort();
        }
        if let Some(s) = &self.subtitle {
            s.packet_queue.abort();
            s.frame_queue.abort();
        }
        self.notify_continue_read();
    }

    /// Records a seek request if none is already pending — mirrors
    /// `stream_seek`'s "if (!is->seek_req)" guard, so a burst of seekTo
    /// calls collapses to the most recent one only once Reader has drained
    /// the previous request.
    pub fn request_seek(&self, pos: i64, rel: i64, by_bytes: bool) {
        let mut slot = self.seek.lock().unwrap();
        if slot.pending.is_none() {
            slot.pending = Some(SeekRequest { pos, rel, by_bytes });
            drop(slot);
            self.notify_continue_read();
        }
    }

    pub fn take_seek_request(&self) -> Option<SeekRequest> {
        self.seek.lock().unwrap().pending.take()
    }

    pub fn notify_continue_read(&self) {
        let _g = self.continue_read_gate.lock().unwrap();
        self.continue_read_cv.notify_one();
    }

    /// Reader's 10ms timed wait on `continue_read_thread` (spec.md §4.7:
    /// used both for backpressure and end-of-stream idling).
    pub fn wait_continue_read(&self, timeout: std::time::Duration) {
        let g = self.continue_read_gate.lock().unwrap();
        let _ = self.continue_read_cv.wait_timeout(g, timeout).unwrap();
    }

    pub fn master_sync_type(&self) -> MasterSyncType {
        match self.options.av_sync_type {
            SyncType::Video if self.has_video() => MasterSyncType::Video,
            SyncType::Audio if self.has_audio() => MasterSyncType::Audio,
            _ => MasterSyncType::External,
        }
    }

    pub fn master_clock(&self) -> f64 {
        match self.master_sync_type() {
            MasterSyncType::Video => self.vid_clock.lock().unwrap().get(),
            MasterSyncType::Audio => self.audio_clock.lock().unwrap().get(),
            MasterSyncType::External => self.ext_clock.lock().unwrap().get(),
        }
    }

    /// `stream_toggle_pause` (original_source/FFPlayer.cpp): on resume,
    /// advances `frame_timer` by the video clock's own staleness rather than
    /// a separately tracked pause timestamp — SPEC_FULL.md §11 calls this
    /// out as deliberately preserved, since it's what keeps back-to-back
    /// pause/resume calls correct (spec.md §8: "two consecutive pause()
    /// calls... advanced by exactly one pause interval").
    pub fn toggle_pause(&self) {
        let was_paused = self.is_paused();
        if was_paused {
            let now = monotonic_now();
            let last_updated = self.vid_clock.lock().unwrap().last_updated();
            *self.frame_timer.lock().unwrap() += now - last_updated;

            let mut vid = self.vid_clock.lock().unwrap();
            let cur = vid.get();
            let serial = vid.serial();
            vid.set_paused(false);
            vid.set(cur, serial);
        }

        {
            let mut ext = self.ext_clock.lock().unwrap();
            let cur = ext.get();
            let serial = ext.serial();
            ext.set(cur, serial);
        }

        let now_paused = !was_paused;
        self.paused.store(now_paused, Ordering::Release);
        self.vid_clock.lock().unwrap().set_paused(now_paused);
        self.audio_clock.lock().unwrap().set_paused(now_paused);
        self.ext_clock.lock().unwrap().set_paused(now_paused);
    }

    /// `step_to_next_frame`: unpause if paused, then request exactly one
    /// frame's worth of forward progress before re-pausing.
    pub fn step_to_next_frame(&self) {
        if self.is_paused() {
            self.toggle_pause();
        }
        self.step.store(true, Ordering::Release);
    }
}

pub type SharedVideoState = Arc<VideoState>;

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VideoState {
        VideoState::new(None, None, None, Options::default(), 10.0, false)
    }

    #[test]
    fn request_seek_collapses_a_burst_to_the_first_pending_request() {
        let s = state();
        s.request_seek(5_000_000, 1_000_000, false);
        s.request_seek(9_000_000, 2_000_000, false);
        let req = s.take_seek_request().unwrap();
        assert_eq!(req.pos, 5_000_000);
        assert!(s.take_seek_request().is_none());
    }

    #[test]
    fn toggle_pause_twice_returns_to_playing() {
        let s = state();
        assert!(!s.is_paused());
        s.toggle_pause();
        assert!(s.is_paused());
        s.toggle_pause();
        assert!(!s.is_paused());
    }

    #[test]
    fn step_to_next_frame_unpauses_and_sets_step() {
        let s = state();
        s.toggle_pause();
        assert!(s.is_paused());
        s.step_to_next_frame();
        assert!(!s.is_paused());
        assert!(s.is_stepping());
        s.clear_step();
        assert!(!s.is_stepping());
    }

    #[test]
    fn abort_marks_aborted_and_wakes_continue_read_wait() {
        let s = Arc::new(state());
        let s2 = s.clone();
        let handle = std::thread::spawn(move || {
            s2.wait_continue_read(std::time::Duration::from_secs(5));
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        s.abort();
        handle.join().unwrap();
        assert!(s.is_aborted());
    }

    #[test]
    fn master_sync_type_falls_back_to_external_without_matching_stream() {
        let mut options = Options::default();
        options.av_sync_type = SyncType::Video;
        let s = VideoState::new(None, None, None, options, 10.0, false);
        assert_eq!(s.master_sync_type(), MasterSyncType::External);
    }
}
