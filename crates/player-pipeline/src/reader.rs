// crates/player-pipeline/src/reader.rs
//
// One worker thread: demuxes the input and routes packets into the three
// PacketQueues, handling seek, backpressure, EOF and loop-at-end (spec.md
// §4.7). Stream selection and decoder construction happen once, up front, in
// `Controller::prepare` (not inside this loop) — this function only drives
// the steady-state read loop the original's `read_thread` runs after that
// setup, since Controller already owns the "open input / probe streams /
// open decoders" sequence for its own bookkeeping (stream_index → pipeline
// mapping) and there's no reason to duplicate it here.
//
// Backpressure/EOF/loop-at-end constants mirror `FFPlayer.cpp`:
// `MAX_QUEUE_SIZE` (15 MiB), `MIN_FRAMES` (25 packets), the ±2 seek slack,
// and the 10ms `continue_read_thread` timed wait.

use std::time::Duration;

use crossbeam_channel::Sender;

use player_codec::Demuxer;
use player_core::{Packet, PlayerError, Serial};

use crate::events::PlayerEvent;
use crate::state::{SharedVideoState, StreamPipeline};

const MAX_QUEUE_SIZE: usize = 15 * 1024 * 1024;
const MIN_FRAMES: usize = 25;
/// Ticks, in the demuxer's seek-timestamp units — spec.md §4.7: "compute
/// `[seek_min, seek_target, seek_max]` with ±2 slack." The original's own
/// comment calls this "due to rounding not being done in the correct
/// direction," kept verbatim rather than guessed at.
const SEEK_SLACK: i64 = 2;
const IDLE_WAIT: Duration = Duration::from_millis(10);

pub struct ReaderConfig {
    pub demuxer: Box<dyn Demuxer>,
    pub state: SharedVideoState,
    pub event_tx: Sender<PlayerEvent>,
}

fn pipeline_for(state: &SharedVideoState, stream_index: usize) -> Option<&StreamPipeline> {
    [state.video.as_ref(), state.audio.as_ref(), state.subtitle.as_ref()]
        .into_iter()
        .flatten()
        .find(|p| p.stream_index == stream_index)
}

fn flush_and_reseed(state: &SharedVideoState) {
    if let Some(a) = &state.audio {
        a.packet_queue.flush();
        a.packet_queue.put_flush();
    }
    if let Some(s) = &state.subtitle {
        s.packet_queue.flush();
        s.packet_queue.put_flush();
    }
    if let Some(v) = &state.video {
        v.packet_queue.flush();
        v.packet_queue.put_flush();
    }
}

fn all_streams_drained(state: &SharedVideoState) -> bool {
    let video_drained = state
        .video
        .as_ref()
        .map(|v| v.finished.get().is_some() && v.frame_queue.nb_remaining() == 0)
        .unwrap_or(true);
    let audio_drained = state
        .audio
        .as_ref()
        .map(|a| a.finished.get().is_some() && a.frame_queue.nb_remaining() == 0)
        .unwrap_or(true);
    video_drained && audio_drained
}

fn queues_backlogged(state: &SharedVideoState) -> bool {
    let total_size = [state.video.as_ref(), state.audio.as_ref(), state.subtitle.as_ref()]
        .into_iter()
        .flatten()
        .map(|p| p.packet_queue.size())
        .sum::<usize>();
    if total_size > MAX_QUEUE_SIZE {
        return true;
    }

    let stream_ready = |p: &Option<StreamPipeline>| {
        p.as_ref().map(|p| p.packet_queue.nb_packets() > MIN_FRAMES || p.packet_queue.is_aborted()).unwrap_or(true)
    };
    stream_ready(&state.video) && stream_ready(&state.audio) && stream_ready(&state.subtitle)
}

/// spec.md §4.7's `pkt_in_play_range` filter against `start_time`/`duration`.
/// The original also offsets by the stream's own `start_time`; our `Demuxer`
/// trait doesn't surface that field, so this compares directly against the
/// packet's own timestamp — acceptable since `start_time`/`duration`
/// clipping is a user-requested convenience, not a correctness invariant.
fn in_play_range(state: &SharedVideoState, pkt: &Packet, time_base: (i32, i32)) -> bool {
    let Some(duration) = state.options.duration else { return true };
    let Some(pts) = pkt.pts.or(pkt.dts) else { return true };
    let pts_secs = pts as f64 * time_base.0 as f64 / time_base.1 as f64;
    let start_secs = state.options.start_time.map(|d| d.as_secs_f64()).unwrap_or(0.0);
    pts_secs - start_secs <= duration.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::frame_queue::FrameQueue;
    use crate::packet_queue::PacketQueue;
    use crate::state::VideoState;
    use player_core::{FinishedCell, Options, Packet};

    fn video_pipeline() -> StreamPipeline {
        StreamPipeline {
            stream_index: 0,
            time_base: (1, 1_000_000),
            packet_queue: Arc::new(PacketQueue::new()),
            frame_queue: Arc::new(FrameQueue::new(3, true)),
            finished: FinishedCell::new(),
        }
    }

    #[test]
    fn in_play_range_accepts_everything_without_a_duration_cap() {
        let state = Arc::new(VideoState::new(None, None, None, Options::default(), 10.0, false));
        let pkt = Packet::new(0, Some(1_000_000_000), Some(1_000_000_000), vec![]);
        assert!(in_play_range(&state, &pkt, (1, 1_000_000)));
    }

    #[test]
    fn in_play_range_rejects_packets_past_the_configured_duration() {
        let mut options = Options::default();
        options.duration = Some(std::time::Duration::from_secs(5));
        let state = Arc::new(VideoState::new(None, None, None, options, 10.0, false));
        let within = Packet::new(0, Some(2_000_000), Some(2_000_000), vec![]);
        let past = Packet::new(0, Some(9_000_000), Some(9_000_000), vec![]);
        assert!(in_play_range(&state, &within, (1, 1_000_000)));
        assert!(!in_play_range(&state, &past, (1, 1_000_000)));
    }

    #[test]
    fn all_streams_drained_is_true_with_no_streams_at_all() {
        let state = Arc::new(VideoState::new(None, None, None, Options::default(), 10.0, false));
        assert!(all_streams_drained(&state));
    }

    #[test]
    fn all_streams_drained_is_true_once_video_is_finished_and_its_queue_is_empty() {
        let video = video_pipeline();
        video.finished.set(Serial::ZERO);
        let state = Arc::new(VideoState::new(Some(video), None, None, Options::default(), 10.0, false));
        assert!(all_streams_drained(&state));
    }

    #[test]
    fn queues_backlogged_is_false_when_a_stream_has_too_few_packets() {
        let video = video_pipeline();
        let state = Arc::new(VideoState::new(Some(video), None, None, Options::default(), 10.0, false));
        assert!(!queues_backlogged(&state));
    }

    #[test]
    fn queues_backlogged_is_true_once_every_present_stream_is_aborted() {
        let video = video_pipeline();
        video.packet_queue.abort();
        let state = Arc::new(VideoState::new(Some(video), None, None, Options::default(), 10.0, false));
        assert!(queues_backlogged(&state));
    }
}

pub fn run_reader(cfg: ReaderConfig) {
    let ReaderConfig { mut demuxer, state, event_tx } = cfg;
    let mut last_paused = false;
    let mut loop_remaining = state.options.loop_count;

    loop {
        if state.is_aborted() {
            return;
        }

        let paused = state.is_paused();
        if paused != last_paused {
            last_paused = paused;
            if paused {
                demuxer.pause();
            } else {
                demuxer.resume();
            }
        }

        if let Some(req) = state.take_seek_request() {
            let seek_min = if req.rel > 0 { req.pos - req.rel + SEEK_SLACK } else { i64::MIN };
            let seek_max = if req.rel < 0 { req.pos - req.rel - SEEK_SLACK } else { i64::MAX };
            match demuxer.seek(seek_min, req.pos, seek_max, req.by_bytes) {
                Ok(()) => {
                    flush_and_reseed(&state);
                    let mut ext = state.ext_clock.lock().unwrap();
                    if req.by_bytes {
                        ext.set(f64::NAN, None);
                    } else {
                        ext.set(req.pos as f64 / 1_000_000.0, None);
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "player::reader", error = %e, "seek failed");
                }
            }
            state.set_eof(false);
            if state.is_paused() {
                state.step_to_next_frame();
            }
        }

        if !state.options.infinite_buffer && !state.realtime && queues_backlogged(&state) {
            state.wait_continue_read(IDLE_WAIT);
            continue;
        }

        if !state.is_paused() && all_streams_drained(&state) {
            if loop_remaining != 1 {
                if loop_remaining != 0 {
                    loop_remaining -= 1;
                }
                let start = state.options.start_time.map(|d| d.as_micros() as i64).unwrap_or(0);
                state.request_seek(start, 0, false);
            } else if state.options.autoexit {
                // Mirrors the original's `goto fail` on an exhausted,
                // non-looping stream with autoexit set: terminal, not a
                // transient idle — the event worker tears the session down.
                let _ = event_tx.send(PlayerEvent::Eof);
                return;
            } else {
                // No more loops, no autoexit: spec.md §8 scenario 4 — the
                // player settles into PAUSED rather than busy-waiting
                // forever on an exhausted stream.
                state.toggle_pause();
                continue;
            }
        }

        match demuxer.read_packet() {
            Ok(None) => {
                if !state.is_eof() {
                    if let Some(v) = &state.video {
                        v.packet_queue.put_null(v.stream_index);
                    }
                    if let Some(a) = &state.audio {
                        a.packet_queue.put_null(a.stream_index);
                    }
                    if let Some(s) = &state.subtitle {
                        s.packet_queue.put_null(s.stream_index);
                    }
                    state.set_eof(true);
                }
                state.wait_continue_read(IDLE_WAIT);
                continue;
            }
            Err(PlayerError::Io(e)) => {
                tracing::error!(target: "player::reader", error = %e, "persistent I/O error, stopping reader");
                let _ = event_tx.send(PlayerEvent::FatalError(e.to_string()));
                return;
            }
            Err(e) => {
                tracing::warn!(target: "player::reader", error = %e, "demuxer read error, retrying");
                state.wait_continue_read(IDLE_WAIT);
                continue;
            }
            Ok(Some(pkt)) => {
                state.set_eof(false);
                let Some(pipeline) = pipeline_for(&state, pkt.stream_index) else { continue };
                if in_play_range(&state, &pkt, pipeline.time_base) {
                    pipeline.packet_queue.put(pkt);
                }
            }
        }
    }
}
