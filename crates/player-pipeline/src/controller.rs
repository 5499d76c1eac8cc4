// crates/player-pipeline/src/controller.rs
//
// Public façade (spec.md §4.8). `prepare` opens the input, probes streams,
// builds the VideoState aggregate and every worker thread; `release` tears
// it all back down. Grounded in velocut-media/src/worker.rs's MediaWorker —
// same "one struct owns every thread handle this session spawned" shape,
// generalized from one encode job to a playback session's five worker
// threads plus a pull-model audio sink and a caller-owned video surface.
//
// The presentation thread doubles as the event-worker the original runs on
// its main thread (spec.md §5, thread 5): each tick it drains any pending
// `PlayerEvent` before calling `VideoSync::tick`, so `Quit`/`FatalError`
// don't need a second thread to be observed promptly.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use player_codec::{AudioSinkFormat, Demuxer, VideoSurface};
use player_core::{FinishedCell, Options, PlayerError, SeekByBytes, StreamKind};

use crate::audio_sync::{AudioSync, MasterClockFn};
use crate::decoder::{run_decoder_loop, AudioDecoderState, StreamDecoder, SubtitleDecoderState, VideoDecoderState};
use crate::events::{EventQueue, PlayerEvent};
use crate::frame_queue::FrameQueue;
use crate::packet_queue::PacketQueue;
use crate::presenter::Presenter;
use crate::reader::{run_reader, ReaderConfig};
use crate::state::{SharedVideoState, StreamPipeline, VideoState};
use crate::video_sync::{VideoSync, VideoSyncConfig, REFRESH_INTERVAL};

const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;
const SAMPLE_QUEUE_SIZE: usize = 9;
const SUBPICTURE_QUEUE_SIZE: usize = 16;

fn time_base_of(demuxer: &dyn Demuxer, index: usize) -> (i32, i32) {
    demuxer.streams().iter().find(|s| s.index == index).map(|s| s.time_base).unwrap_or((1, 1_000_000))
}

/// Fallback per-frame duration from the container's reported average frame
/// rate, used to seed video frames whose codec gives no better estimate
/// (spec.md §4.6 step 6's `lastvp.duration` fallback). Defaults to 25 fps
/// worth of seconds when the container reports no rate at all.
fn frame_duration_of(demuxer: &dyn Demuxer, index: usize) -> f64 {
    let (num, den) = demuxer
        .streams()
        .iter()
        .find(|s| s.index == index)
        .map(|s| s.avg_frame_rate)
        .unwrap_or((0, 0));
    if num > 0 && den > 0 {
        den as f64 / num as f64
    } else {
        1.0 / 25.0
    }
}

/// `IDLE → PREPARING → PLAYING ↔ PAUSED`, terminal `CLOSING` (spec.md §4.9).
/// `Playing`/`Paused` aren't tracked as distinct variants here — both are
/// `Active(Session)`, and `VideoState::is_paused` is the actual source of
/// truth, since that's what Reader and VideoSync already consult directly.
enum Lifecycle {
    Idle,
    Preparing,
    Active(Session),
    Closing,
}

struct Session {
    state: SharedVideoState,
    events: Arc<EventQueue>,
    audio_sink: Option<Arc<Mutex<AudioSync>>>,
    video_sync: Option<Arc<Mutex<VideoSync>>>,
    seek_by_bytes: bool,
    duration: Option<Duration>,
    reader_thread: Option<JoinHandle<()>>,
    presentation_thread: Option<JoinHandle<()>>,
    decoder_threads: Vec<JoinHandle<()>>,
}

pub struct Controller {
    options: Options,
    url: Mutex<Option<String>>,
    surface: Mutex<Option<Box<dyn VideoSurface>>>,
    audio_format: Mutex<AudioSinkFormat>,
    lifecycle: Mutex<Lifecycle>,
}

impl Controller {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            url: Mutex::new(None),
            surface: Mutex::new(None),
            audio_format: Mutex::new(AudioSinkFormat { sample_rate: 44_100, channels: 2 }),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn set_data_source(&self, url: impl Into<String>) {
        *self.url.lock().unwrap() = Some(url.into());
    }

    /// `None` skips video presentation entirely (audio-only playback); the
    /// video stream, if any, is still demuxed and decoded but never
    /// displayed.
    pub fn set_surface(&self, surface: Box<dyn VideoSurface>) {
        *self.surface.lock().unwrap() = Some(surface);
    }

    /// Negotiated PCM format the host's audio device actually wants — set
    /// before `prepare()`. Defaults to 44.1 kHz stereo if never called.
    pub fn set_audio_format(&self, format: AudioSinkFormat) {
        *self.audio_format.lock().unwrap() = format;
    }

    /// Opens the input, probes streams, constructs `VideoState`, and spawns
    /// Reader, per-stream decoder, and presentation/event worker threads.
    pub fn prepare(&self) -> Result<(), PlayerError> {
        {
            let mut lc = self.lifecycle.lock().unwrap();
            if !matches!(*lc, Lifecycle::Idle) {
                return Err(PlayerError::StreamInfo(anyhow::anyhow!("prepare() called outside Idle")));
            }
            *lc = Lifecycle::Preparing;
        }

        match self.build_session() {
            Ok(session) => {
                *self.lifecycle.lock().unwrap() = Lifecycle::Active(session);
                Ok(())
            }
            Err(e) => {
                *self.lifecycle.lock().unwrap() = Lifecycle::Idle;
                Err(e)
            }
        }
    }

    fn build_session(&self) -> Result<Session, PlayerError> {
        let url = self.url.lock().unwrap().clone().ok_or_else(|| PlayerError::InputOpen {
            path: String::new(),
            source: anyhow::anyhow!("setDataSource was never called"),
        })?;

        player_codec::ffmpeg::init().map_err(|e| PlayerError::InputOpen { path: url.clone(), source: e })?;

        let demuxer = player_codec::ffmpeg::FfmpegDemuxer::open(&url)?;
        let realtime = demuxer.is_realtime();
        let duration = demuxer.duration().map(Duration::from_secs_f64);
        let ts_discont = demuxer.prefers_seek_by_bytes();
        let seek_by_bytes = match self.options.seek_by_bytes {
            SeekByBytes::On => true,
            SeekByBytes::Off => false,
            SeekByBytes::Auto => ts_discont,
        };
        // original_source/FFPlayer.cpp: 10s when the container's timestamps
        // are discontinuous, 3600s (effectively "never triggers") otherwise.
        let max_frame_duration = if ts_discont { 10.0 } else { 3600.0 };

        let audio_target = *self.audio_format.lock().unwrap();
        let mut decoder_threads_src: Vec<(Box<dyn StreamDecoder>, &'static str)> = Vec::new();

        let video_index = demuxer.best_stream(StreamKind::Video);
        let video_pipeline = video_index.and_then(|idx| {
            let params = match demuxer.codec_parameters(idx) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "video stream unreadable, skipping");
                    return None;
                }
            };
            let packet_queue = Arc::new(PacketQueue::new());
            let frame_queue = Arc::new(FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE, true));
            let finished = FinishedCell::new();
            let tb = time_base_of(&demuxer, idx);
            let default_duration = frame_duration_of(&demuxer, idx);
            match VideoDecoderState::new(
                idx,
                tb,
                params,
                packet_queue.clone(),
                frame_queue.clone(),
                Box::new(player_codec::ffmpeg::FfmpegScaler::new()),
                self.options.decoder_reorder_pts,
                finished.clone(),
                default_duration,
            ) {
                Ok(dec) => {
                    decoder_threads_src.push((Box::new(dec), "video"));
                    Some(StreamPipeline { stream_index: idx, time_base: tb, packet_queue, frame_queue, finished })
                }
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "video codec open failed, disabling video stream");
                    None
                }
            }
        });

        let audio_index = demuxer.best_stream(StreamKind::Audio);
        let audio_pipeline = audio_index.and_then(|idx| {
            let params = match demuxer.codec_parameters(idx) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "audio stream unreadable, skipping");
                    return None;
                }
            };
            let packet_queue = Arc::new(PacketQueue::new());
            let frame_queue = Arc::new(FrameQueue::new(SAMPLE_QUEUE_SIZE, false));
            let finished = FinishedCell::new();
            let tb = time_base_of(&demuxer, idx);
            match AudioDecoderState::new(
                idx,
                tb,
                params,
                packet_queue.clone(),
                frame_queue.clone(),
                Box::new(player_codec::ffmpeg::FfmpegResampler::new()),
                audio_target,
                finished.clone(),
            ) {
                Ok(dec) => {
                    decoder_threads_src.push((Box::new(dec), "audio"));
                    Some(StreamPipeline { stream_index: idx, time_base: tb, packet_queue, frame_queue, finished })
                }
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "audio codec open failed, disabling audio stream");
                    None
                }
            }
        });

        let subtitle_index = demuxer.best_stream(StreamKind::Subtitle);
        let subtitle_pipeline = subtitle_index.and_then(|idx| {
            let params = match demuxer.codec_parameters(idx) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "subtitle stream unreadable, skipping");
                    return None;
                }
            };
            let packet_queue = Arc::new(PacketQueue::new());
            let frame_queue = Arc::new(FrameQueue::new(SUBPICTURE_QUEUE_SIZE, false));
            let finished = FinishedCell::new();
            let tb = time_base_of(&demuxer, idx);
            match SubtitleDecoderState::new(idx, tb, params, packet_queue.clone(), frame_queue.clone(), finished.clone()) {
                Ok(dec) => {
                    decoder_threads_src.push((Box::new(dec), "subtitle"));
                    Some(StreamPipeline { stream_index: idx, time_base: tb, packet_queue, frame_queue, finished })
                }
                Err(e) => {
                    tracing::warn!(target: "player::controller", error = %e, "subtitle codec open failed, disabling subtitle stream");
                    None
                }
            }
        });

        let state: SharedVideoState = Arc::new(VideoState::new(
            video_pipeline,
            audio_pipeline,
            subtitle_pipeline,
            self.options.clone(),
            max_frame_duration,
            realtime,
        ));

        let events = Arc::new(EventQueue::new(64));

        let surface = self.surface.lock().unwrap().take();
        let video_sync = match (&state.video, surface) {
            (Some(vp), Some(surface)) => {
                let cfg = VideoSyncConfig {
                    video_fq: vp.frame_queue.clone(),
                    subtitle_fq: state.subtitle.as_ref().map(|s| s.frame_queue.clone()),
                    video_queue_serial: vp.packet_queue.serial_cell(),
                    video_packet_queue: vp.packet_queue.clone(),
                    audio_packet_queue: state.audio.as_ref().map(|a| a.packet_queue.clone()),
                    vid_clock: state.vid_clock.clone(),
                    audio_clock: state.audio_clock.clone(),
                    ext_clock: state.ext_clock.clone(),
                    sync_type: self.options.av_sync_type,
                    has_video: true,
                    has_audio: state.has_audio(),
                    framedrop: self.options.framedrop,
                    realtime,
                    presenter: Presenter::new(surface),
                    frame_timer: state.frame_timer.clone(),
                    max_frame_duration,
                };
                Some(Arc::new(Mutex::new(VideoSync::new(cfg))))
            }
            _ => None,
        };

        let audio_sink = state.audio.as_ref().map(|ap| {
            let clock_state = state.clone();
            let master_clock: MasterClockFn = Arc::new(move || clock_state.master_clock());
            Arc::new(Mutex::new(AudioSync::new(
                ap.frame_queue.clone(),
                ap.packet_queue.serial_cell(),
                audio_target,
                state.audio_clock.clone(),
                state.ext_clock.clone(),
                master_clock,
            )))
        });

        let mut decoder_threads = Vec::with_capacity(decoder_threads_src.len());
        for (decoder, label) in decoder_threads_src {
            let handle = std::thread::Builder::new()
                .name(format!("player-decoder-{label}"))
                .spawn(move || run_decoder_loop(decoder))
                .expect("failed to spawn decoder thread");
            decoder_threads.push(handle);
        }

        let reader_thread = {
            let reader_state = state.clone();
            let event_tx = events.sender();
            std::thread::Builder::new()
                .name("player-reader".into())
                .spawn(move || run_reader(ReaderConfig { demuxer: Box::new(demuxer), state: reader_state, event_tx }))
                .expect("failed to spawn reader thread")
        };

        let presentation_thread = {
            let events = events.clone();
            let video_sync = video_sync.clone();
            let state = state.clone();
            std::thread::Builder::new()
                .name("player-presentation".into())
                .spawn(move || run_presentation_loop(events, video_sync, state))
                .expect("failed to spawn presentation thread")
        };

        Ok(Session {
            state,
            events,
            audio_sink,
            video_sync,
            seek_by_bytes,
            duration,
            reader_thread: Some(reader_thread),
            presentation_thread: Some(presentation_thread),
            decoder_threads,
        })
    }

    /// Resumes playback if currently paused; a no-op otherwise (including
    /// before `prepare()` has completed).
    pub fn start(&self) {
        if let Lifecycle::Active(session) = &*self.lifecycle.lock().unwrap() {
            if session.state.is_paused() {
                session.state.toggle_pause();
            }
        }
    }

    /// Pauses playback if currently playing; a no-op otherwise.
    pub fn pause(&self) {
        if let Lifecycle::Active(session) = &*self.lifecycle.lock().unwrap() {
            if !session.state.is_paused() {
                session.state.toggle_pause();
            }
        }
    }

    /// Computes a target position relative to the master clock and records
    /// a pending seek; Reader picks it up on its next loop turn (spec.md
    /// §4.8).
    pub fn seek_to(&self, target_micros: i64) {
        if let Lifecycle::Active(session) = &*self.lifecycle.lock().unwrap() {
            let current_secs = session.state.master_clock();
            let rel = if current_secs.is_finite() {
                target_micros - (current_secs * 1_000_000.0) as i64
            } else {
                0
            };
            session.state.request_seek(target_micros, rel, session.seek_by_bytes);
        }
    }

    pub fn get_duration(&self) -> Option<Duration> {
        match &*self.lifecycle.lock().unwrap() {
            Lifecycle::Active(session) => session.duration,
            _ => None,
        }
    }

    /// The host's audio device calls `fill` on this from its own dedicated
    /// callback thread (spec.md §6) — we never create that thread ourselves.
    /// `None` if the session has no audio stream, or none is prepared yet.
    pub fn audio_sink(&self) -> Option<Arc<Mutex<AudioSync>>> {
        match &*self.lifecycle.lock().unwrap() {
            Lifecycle::Active(session) => session.audio_sink.clone(),
            _ => None,
        }
    }

    /// Posts `Quit`, aborts every queue, and joins every worker thread this
    /// session spawned (spec.md §4.8). Idempotent: calling it twice, or
    /// before `prepare()`, is a no-op the second time.
    pub fn release(&self) {
        let session = {
            let mut lc = self.lifecycle.lock().unwrap();
            match std::mem::replace(&mut *lc, Lifecycle::Closing) {
                Lifecycle::Active(session) => Some(session),
                other => {
                    *lc = other;
                    None
                }
            }
        };
        let Some(mut session) = session else { return };

        let _ = session.events.sender().send(PlayerEvent::Quit);
        session.state.abort();

        if let Some(h) = session.presentation_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = session.reader_thread.take() {
            let _ = h.join();
        }
        for h in session.decoder_threads.drain(..) {
            let _ = h.join();
        }

        *self.lifecycle.lock().unwrap() = Lifecycle::Idle;
    }
}

/// One thread doing double duty: the refresh-loop ticker when a video
/// stream is being presented, and the sole consumer of `PlayerEvent`
/// regardless (spec.md §5, thread 5 — "doubles as the control-event
/// consumer").
fn run_presentation_loop(events: Arc<EventQueue>, video_sync: Option<Arc<Mutex<VideoSync>>>, state: SharedVideoState) {
    loop {
        if let Some(ev) = events.try_recv() {
            match ev {
                PlayerEvent::Quit => {
                    state.abort();
                    return;
                }
                PlayerEvent::FatalError(msg) => {
                    tracing::error!(target: "player::controller", error = %msg, "fatal error, closing session");
                    state.abort();
                    return;
                }
                PlayerEvent::Eof => {
                    tracing::info!(target: "player::controller", "end of stream");
                }
                PlayerEvent::Error(msg) => {
                    tracing::warn!(target: "player::controller", error = %msg, "non-fatal playback error");
                }
            }
        }

        if state.is_aborted() {
            return;
        }

        let remaining = match &video_sync {
            Some(vs) => vs.lock().unwrap().tick(),
            None => REFRESH_INTERVAL,
        };
        std::thread::sleep(Duration::from_secs_f64(remaining.max(0.0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_without_data_source_fails_and_returns_to_idle() {
        let controller = Controller::new(Options::default());
        let err = controller.prepare().unwrap_err();
        assert!(matches!(err, PlayerError::InputOpen { .. }));
        assert!(matches!(*controller.lifecycle.lock().unwrap(), Lifecycle::Idle));
    }

    #[test]
    fn start_pause_seek_and_release_before_prepare_are_no_ops() {
        let controller = Controller::new(Options::default());
        controller.start();
        controller.pause();
        controller.seek_to(5_000_000);
        controller.release();
        assert!(controller.get_duration().is_none());
        assert!(controller.audio_sink().is_none());
    }

    #[test]
    fn release_is_idempotent_when_never_prepared() {
        let controller = Controller::new(Options::default());
        controller.release();
        controller.release();
        assert!(matches!(*controller.lifecycle.lock().unwrap(), Lifecycle::Idle));
    }
}
