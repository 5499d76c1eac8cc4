// crates/player-pipeline/src/video_sync.rs
//
// The ~10ms refresh-loop tick (spec.md §4.6). Owns the video clock and
// drives the Presenter; frame-drop and clock-drift decisions all live here
// rather than in the Reader or Decoder.

use std::sync::{Arc, Mutex};

use player_core::{Clock, Frame, MasterSyncType, SerialCell};
use player_core::options::{FramedropMode, SyncType};

use crate::frame_queue::SharedFrameQueue;
use crate::packet_queue::SharedPacketQueue;
use crate::presenter::Presenter;

/// Target poll interval for the refresh loop, seconds.
pub const REFRESH_INTERVAL: f64 = 0.01;

const EXTERNAL_CLOCK_MIN_FRAMES: usize = 2;
const EXTERNAL_CLOCK_MAX_FRAMES: usize = 10;
const EXTERNAL_CLOCK_SPEED_STEP: f64 = 0.001;

/// Frame's natural display duration: `b.pts - a.pts` when in range,
/// otherwise `a`'s own recorded duration. `0.0` whenever `a`/`b` straddle a
/// flush (different serials) since their timestamps aren't comparable.
fn frame_duration(a: &Frame, b: &Frame, max_frame_duration: f64) -> f64 {
    if a.serial != b.serial {
        return 0.0;
    }
    let d = b.pts - a.pts;
    if d.is_nan() || d <= 0.0 || d > max_frame_duration {
        a.duration
    } else {
        d
    }
}

pub struct VideoSync {
    video_fq: SharedFrameQueue,
    subtitle_fq: Option<SharedFrameQueue>,
    video_queue_serial: SerialCell,
    video_packet_queue: SharedPacketQueue,
    audio_packet_queue: Option<SharedPacketQueue>,
    vid_clock: Arc<Mutex<Clock>>,
    audio_clock: Arc<Mutex<Clock>>,
    ext_clock: Arc<Mutex<Clock>>,
    sync_type: SyncType,
    has_video: bool,
    has_audio: bool,
    framedrop: FramedropMode,
    realtime: bool,
    presenter: Presenter,
    /// Shared with `VideoState::toggle_pause`, which advances this anchor by
    /// the pause duration on resume (spec.md §4.9) — the presentation loop
    /// and the Controller's caller thread are different threads, so this
    /// can't be a plain private field the way the rest of the tick state is.
    frame_timer: Arc<Mutex<f64>>,
    force_refresh: bool,
    step: bool,
    max_frame_duration: f64,
    frame_drops_late: u64,
}

pub struct VideoSyncConfig {
    pub video_fq: SharedFrameQueue,
    pub subtitle_fq: Option<SharedFrameQueue>,
    pub video_queue_serial: SerialCell,
    pub video_packet_queue: SharedPacketQueue,
    pub audio_packet_queue: Option<SharedPacketQueue>,
    pub vid_clock: Arc<Mutex<Clock>>,
    pub audio_clock: Arc<Mutex<Clock>>,
    pub ext_clock: Arc<Mutex<Clock>>,
    pub sync_type: SyncType,
    pub has_video: bool,
    pub has_audio: bool,
    pub framedrop: FramedropMode,
    pub realtime: bool,
    pub presenter: Presenter,
    pub frame_timer: Arc<Mutex<f64>>,
    /// `10.0` matches the default used when the container lacks reliable
    /// frame-duration hints.
    pub max_frame_duration: f64,
}

impl VideoSync {
    pub fn new(cfg: VideoSyncConfig) -> Self {
        Self {
            video_fq: cfg.video_fq,
            subtitle_fq: cfg.subtitle_fq,
            video_queue_serial: cfg.video_queue_serial,
            video_packet_queue: cfg.video_packet_queue,
            audio_packet_queue: cfg.audio_packet_queue,
            vid_clock: cfg.vid_clock,
            audio_clock: cfg.audio_clock,
            ext_clock: cfg.ext_clock,
            sync_type: cfg.sync_type,
            has_video: cfg.has_video,
            has_audio: cfg.has_audio,
            framedrop: cfg.framedrop,
            realtime: cfg.realtime,
            presenter: cfg.presenter,
            frame_timer: cfg.frame_timer,
            force_refresh: false,
            step: false,
            max_frame_duration: cfg.max_frame_duration,
            frame_drops_late: 0,
        }
    }

    pub fn request_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn set_step(&mut self, step: bool) {
        self.step = step;
    }

    pub fn frame_drops_late(&self) -> u64 {
        self.frame_drops_late
    }

    /// Master clock selection (spec.md §4.6): requested video only if a
    /// video stream exists, requested audio only if one exists, external
    /// otherwise.
    fn master_sync_type(&self) -> MasterSyncType {
        match self.sync_type {
            SyncType::Video if self.has_video => MasterSyncType::Video,
            SyncType::Audio if self.has_audio => MasterSyncType::Audio,
            _ => MasterSyncType::External,
        }
    }

    fn master_clock_value(&self) -> f64 {
        match self.master_sync_type() {
            MasterSyncType::Video => self.vid_clock.lock().unwrap().get(),
            MasterSyncType::Audio => self.audio_clock.lock().unwrap().get(),
            MasterSyncType::External => self.ext_clock.lock().unwrap().get(),
        }
    }

    fn framedrop_enabled(&self) -> bool {
        match self.framedrop {
            FramedropMode::Always => true,
            FramedropMode::Off => false,
            FramedropMode::Auto => self.master_sync_type() != MasterSyncType::Video,
        }
    }

    /// Step 1: nudges the external clock's speed based on packet-queue
    /// depth for realtime inputs. Grouping kept unambiguous per
    /// DESIGN.md's note on the original's precedence bug.
    fn check_external_clock_speed(&mut self) {
        let video_starved = self.has_video && self.video_packet_queue.nb_packets() <= EXTERNAL_CLOCK_MIN_FRAMES;
        let audio_starved = self.has_audio
            && self
                .audio_packet_queue
                .as_ref()
                .map(|q| q.nb_packets() <= EXTERNAL_CLOCK_MIN_FRAMES)
                .unwrap_or(false);

        if video_starved || audio_starved {
            let mut ext = self.ext_clock.lock().unwrap();
            let speed = ext.speed();
            ext.set_speed(player_core::clock::SPEED_MIN.max(speed - EXTERNAL_CLOCK_SPEED_STEP));
            return;
        }

        let video_full = !self.has_video || self.video_packet_queue.nb_packets() > EXTERNAL_CLOCK_MAX_FRAMES;
        let audio_full = !self.has_audio
            || self
                .audio_packet_queue
                .as_ref()
                .map(|q| q.nb_packets() > EXTERNAL_CLOCK_MAX_FRAMES)
                .unwrap_or(true);

        if video_full && audio_full {
            let mut ext = self.ext_clock.lock().unwrap();
            let speed = ext.speed();
            ext.set_speed(player_core::clock::SPEED_MAX.min(speed + EXTERNAL_CLOCK_SPEED_STEP));
            return;
        }

        let mut ext = self.ext_clock.lock().unwrap();
        let speed = ext.speed();
        if speed != 1.0 {
            ext.set_speed(speed + EXTERNAL_CLOCK_SPEED_STEP * (1.0 - speed) / (1.0 - speed).abs());
        }
    }

    fn compute_target_delay(&self, delay: f64) -> f64 {
        if self.master_sync_type() == MasterSyncType::Video {
            return delay;
        }
        let diff = self.vid_clock.lock().unwrap().get() - self.master_clock_value();
        if diff.is_nan() || diff.abs() >= self.max_frame_duration {
            return delay;
        }
        let threshold = delay.clamp(0.04, 0.1);
        if diff <= -threshold {
            (delay + diff).max(0.0)
        } else if diff >= threshold && delay > 0.1 {
            delay + diff
        } else if diff >= threshold {
            delay * 2.0
        } else {
            delay
        }
    }

    fn drop_expired_subtitles(&self, vid_pts: f64) {
        let Some(sub_fq) = &self.subtitle_fq else { return };
        if vid_pts.is_nan() {
            return;
        }
        while sub_fq.nb_remaining() > 0 {
            let Some(sp) = sub_fq.peek() else { break };
            let expired = sp.as_subtitle().map(|s| vid_pts > sp.pts + s.end_pts).unwrap_or(false);
            if expired {
                sub_fq.next();
            } else {
                break;
            }
        }
    }

    /// Runs one refresh-loop tick (spec.md §4.6's 14 steps), returning a
    /// `remaining_time` hint in seconds for the caller's next sleep.
    pub fn tick(&mut self) -> f64 {
        let mut remaining_time = REFRESH_INTERVAL;

        if self.realtime {
            self.check_external_clock_speed();
        }

        let redisplay = self.force_refresh;
        if redisplay {
            self.video_fq.prev();
        }

        loop {
            if self.video_fq.nb_remaining() == 0 {
                break;
            }
            let (Some(lastvp), Some(vp)) = (self.video_fq.peek_last(), self.video_fq.peek()) else { break };

            if vp.serial != self.video_queue_serial.get() {
                self.video_fq.next();
                continue;
            }

            if lastvp.serial != vp.serial && !redisplay {
                *self.frame_timer.lock().unwrap() = player_core::clock::monotonic_now();
            }

            if !redisplay {
                let last_duration = frame_duration(&lastvp, &vp, self.max_frame_duration);
                let delay = self.compute_target_delay(last_duration);
                let now = player_core::clock::monotonic_now();
                let mut frame_timer = self.frame_timer.lock().unwrap();
                if now < *frame_timer + delay {
                    remaining_time = remaining_time.min(*frame_timer + delay - now);
                    return remaining_time;
                }
                *frame_timer += delay;
                if delay > 0.0 && now - *frame_timer > 0.1 {
                    *frame_timer = now;
                }
                drop(frame_timer);
                if !vp.pts.is_nan() {
                    self.vid_clock.lock().unwrap().set(vp.pts, Some(vp.serial));
                }
            }

            if self.video_fq.nb_remaining() > 1 && !self.step {
                if let Some(nextvp) = self.video_fq.peek_next() {
                    let dur = frame_duration(&vp, &nextvp, self.max_frame_duration);
                    let now = player_core::clock::monotonic_now();
                    let frame_timer = *self.frame_timer.lock().unwrap();
                    if (redisplay || self.framedrop_enabled()) && now > frame_timer + dur {
                        self.frame_drops_late += 1;
                        self.video_fq.next();
                        continue;
                    }
                }
            }

            self.drop_expired_subtitles(vp.pts);

            if let Err(e) = self.presenter.display(&vp) {
                tracing::warn!(target: "player::presenter", error = %e, "frame dropped");
            }
            self.video_fq.next();
            self.force_refresh = false;
            if self.step {
                self.request_refresh();
            }
            return remaining_time;
        }

        self.force_refresh = false;
        remaining_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_core::{Serial, VideoBuffer};

    #[test]
    fn frame_duration_falls_back_across_flush() {
        let a = Frame::video(1.0, 0.04, 0, Serial::ZERO, VideoBuffer { width: 1, height: 1, sample_aspect_ratio: 1.0, rgba: None });
        let b = Frame::video(2.0, 0.04, 0, Serial::ZERO.next(), VideoBuffer { width: 1, height: 1, sample_aspect_ratio: 1.0, rgba: None });
        assert_eq!(frame_duration(&a, &b, 1.0), 0.0);
    }

    #[test]
    fn frame_duration_uses_pts_delta_when_sane() {
        let a = Frame::video(1.0, 0.04, 0, Serial::ZERO, VideoBuffer { width: 1, height: 1, sample_aspect_ratio: 1.0, rgba: None });
        let b = Frame::video(1.04, 0.04, 0, Serial::ZERO, VideoBuffer { width: 1, height: 1, sample_aspect_ratio: 1.0, rgba: None });
        assert!((frame_duration(&a, &b, 1.0) - 0.04).abs() < 1e-9);
    }
}
