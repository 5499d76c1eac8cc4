// crates/player-pipeline/src/decoder.rs
//
// Wraps codec state; drains a PacketQueue, produces frames (spec.md §4.4).
//
// Dispatch on stream kind used to be `switch(codec_type)` in the source this
// spec was distilled from (REDESIGN FLAGS, SPEC_FULL.md §4). Replaced here
// with a tagged union — `DecoderKind` holding one of three concrete states —
// sharing a `StreamDecoder` trait, the same shape as the transition registry
// in velocut-core/src/transitions/mod.rs (`TransitionKind` discriminant +
// `VideoTransition` trait + one impl per variant), generalized from "which
// blend algorithm" to "which stream decoder." Unlike that registry, the kind
// is fixed per decoder instance at construction rather than looked up per
// call, so there's no `HashMap` here — just one `Box<dyn StreamDecoder>` per
// worker thread.

use player_core::{DecoderReorderPts, FinishedCell, Frame, PlayerError, Serial};
use player_codec::{
    AudioDecoderBackend, AudioSinkFormat, CodecParameters, Resampler, Scaler, SubtitleDecoderBackend,
    VideoDecoderBackend,
};

use crate::frame_queue::SharedFrameQueue;
use crate::packet_queue::{GetResult, SharedPacketQueue};

pub enum DecodeOutcome {
    FrameReady,
    NoFrame,
    Aborted,
}

/// Shared capability set every decoder variant exposes to its worker thread.
pub trait StreamDecoder: Send {
    /// Runs spec.md §4.4's loop once: drain packets until a frame is
    /// produced, the queue is exhausted for now, or the queue is aborted.
    fn decode_one(&mut self) -> Result<DecodeOutcome, PlayerError>;
    fn is_finished(&self) -> Option<Serial>;
    fn packet_queue(&self) -> &SharedPacketQueue;
    fn frame_queue(&self) -> &SharedFrameQueue;
}

fn pts_to_secs(pts: i64, time_base: (i32, i32)) -> f64 {
    pts as f64 * time_base.0 as f64 / time_base.1 as f64
}

pub struct VideoDecoderState {
    stream_index: usize,
    time_base: (i32, i32),
    packet_queue: SharedPacketQueue,
    frame_queue: SharedFrameQueue,
    backend: Box<dyn VideoDecoderBackend>,
    scaler: Box<dyn Scaler>,
    pkt_serial: Serial,
    finished: Option<Serial>,
    finished_cell: FinishedCell,
    reorder_pts: DecoderReorderPts,
    /// Fallback `Frame::duration` seeded from the container's average frame
    /// rate (spec.md §4.6 step 6) — used since the codec itself reports
    /// only a pts per frame, never a duration.
    default_duration: f64,
}

impl VideoDecoderState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_index: usize,
        time_base: (i32, i32),
        params: CodecParameters,
        packet_queue: SharedPacketQueue,
        frame_queue: SharedFrameQueue,
        scaler: Box<dyn Scaler>,
        reorder_pts: DecoderReorderPts,
        finished_cell: FinishedCell,
        default_duration: f64,
    ) -> Result<Self, PlayerError> {
        let backend = Box::new(player_codec::ffmpeg::FfmpegVideoDecoder::open(params, stream_index)?);
        Ok(Self {
            stream_index,
            time_base,
            packet_queue,
            frame_queue,
            backend,
            scaler,
            pkt_serial: Serial::ZERO,
            finished: None,
            finished_cell,
            reorder_pts,
            default_duration,
        })
    }

    fn pick_pts(&self, decoded: &player_codec::DecodedVideo) -> Option<i64> {
        match self.reorder_pts {
            DecoderReorderPts::UseDts => decoded.dts.or(decoded.pts),
            DecoderReorderPts::UsePts => decoded.pts,
            DecoderReorderPts::Auto => decoded.pts.or(decoded.dts),
        }
    }
}

impl StreamDecoder for VideoDecoderState {
    fn decode_one(&mut self) -> Result<DecodeOutcome, PlayerError> {
        loop {
            if let Some(decoded) = self.backend.receive_frame()? {
                let pts_secs = self.pick_pts(&decoded).map(|p| pts_to_secs(p, self.time_base)).unwrap_or(f64::NAN);
                let buf = self.scaler.scale_to_rgba(&decoded)?;
                let Some(mut guard) = self.frame_queue.peek_writable() else {
                    return Ok(DecodeOutcome::Aborted);
                };
                guard.fill(Frame::video(pts_secs, self.default_duration, 0, self.pkt_serial, buf));
                guard.commit();
                return Ok(DecodeOutcome::FrameReady);
            }

            match self.packet_queue.get(true) {
                GetResult::Aborted => return Ok(DecodeOutcome::Aborted),
                GetResult::Empty => return Ok(DecodeOutcome::NoFrame),
                GetResult::Ok(pkt, serial) => {
                    if serial != self.pkt_serial {
                        self.backend.flush();
                        self.finished = None;
                        self.finished_cell.clear();
                        self.pkt_serial = serial;
                    }
                    if pkt.is_null() {
                        self.backend.signal_eof()?;
                        self.finished = Some(serial);
                        self.finished_cell.set(serial);
                    } else {
                        self.backend.send_packet(&pkt)?;
                    }
                }
            }
        }
    }

    fn is_finished(&self) -> Option<Serial> {
        self.finished
    }

    fn packet_queue(&self) -> &SharedPacketQueue {
        &self.packet_queue
    }

    fn frame_queue(&self) -> &SharedFrameQueue {
        &self.frame_queue
    }
}

/// Unlike video, the audio path resamples to the sink's target format here
/// at decode time rather than carrying the native FFmpeg frame downstream
/// into the FrameQueue (see DESIGN.md: `Frame` is required to stay `Clone`
/// for `FrameQueue::peek`/`peek_last`, and a native FFmpeg handle can't be).
/// AudioSync's own drift compensation (spec.md §4.5's `wanted_nb_samples`
/// stretch/compress) then runs as a cheap linear resample directly on this
/// already-PCM buffer instead of re-invoking the FFmpeg resampler a second
/// time — see audio_sync.rs.
pub struct AudioDecoderState {
    time_base: (i32, i32),
    packet_queue: SharedPacketQueue,
    frame_queue: SharedFrameQueue,
    backend: Box<dyn AudioDecoderBackend>,
    resampler: Box<dyn Resampler>,
    target: AudioSinkFormat,
    pkt_serial: Serial,
    finished: Option<Serial>,
    finished_cell: FinishedCell,
    next_pts: f64,
}

impl AudioDecoderState {
    pub fn new(
        stream_index: usize,
        time_base: (i32, i32),
        params: CodecParameters,
        packet_queue: SharedPacketQueue,
        frame_queue: SharedFrameQueue,
        resampler: Box<dyn Resampler>,
        target: AudioSinkFormat,
        finished_cell: FinishedCell,
    ) -> Result<Self, PlayerError> {
        let backend = Box::new(player_codec::ffmpeg::FfmpegAudioDecoder::open(params, stream_index)?);
        Ok(Self {
            time_base,
            packet_queue,
            frame_queue,
            backend,
            resampler,
            target,
            pkt_serial: Serial::ZERO,
            finished: None,
            finished_cell,
            next_pts: 0.0,
        })
    }
}

impl StreamDecoder for AudioDecoderState {
    fn decode_one(&mut self) -> Result<DecodeOutcome, PlayerError> {
        loop {
            if let Some(decoded) = self.backend.receive_frame()? {
                let src_nb_samples = decoded.nb_samples;
                let src_sample_rate = decoded.sample_rate;
                let pts_secs = decoded
                    .pts
                    .map(|p| pts_to_secs(p, self.time_base))
                    .unwrap_or(self.next_pts);

                let data = self.resampler.resample(&decoded, src_nb_samples, self.target)?;
                let bytes_per_frame = self.target.channels as usize * 2;
                let nb_samples = if bytes_per_frame > 0 { data.len() / bytes_per_frame } else { 0 };

                self.next_pts = pts_secs + src_nb_samples as f64 / src_sample_rate.max(1) as f64;

                let buf = player_core::AudioBuffer {
                    sample_rate: self.target.sample_rate,
                    channels: self.target.channels,
                    nb_samples,
                    data,
                };
                let Some(mut guard) = self.frame_queue.peek_writable() else {
                    return Ok(DecodeOutcome::Aborted);
                };
                guard.fill(Frame::audio(pts_secs, 0.0, 0, self.pkt_serial, buf));
                guard.commit();
                return Ok(DecodeOutcome::FrameReady);
            }

            match self.packet_queue.get(true) {
                GetResult::Aborted => return Ok(DecodeOutcome::Aborted),
                GetResult::Empty => return Ok(DecodeOutcome::NoFrame),
                GetResult::Ok(pkt, serial) => {
                    if serial != self.pkt_serial {
                        self.backend.flush();
                        self.finished = None;
                        self.finished_cell.clear();
                        self.pkt_serial = serial;
                    }
                    if pkt.is_null() {
                        self.backend.signal_eof()?;
                        self.finished = Some(serial);
                        self.finished_cell.set(serial);
                    } else {
                        self.backend.send_packet(&pkt)?;
                    }
                }
            }
        }
    }

    fn is_finished(&self) -> Option<Serial> {
        self.finished
    }

    fn packet_queue(&self) -> &SharedPacketQueue {
        &self.packet_queue
    }

    fn frame_queue(&self) -> &SharedFrameQueue {
        &self.frame_queue
    }
}

pub struct SubtitleDecoderState {
    time_base: (i32, i32),
    packet_queue: SharedPacketQueue,
    frame_queue: SharedFrameQueue,
    backend: Box<dyn SubtitleDecoderBackend>,
    pkt_serial: Serial,
    finished: Option<Serial>,
    finished_cell: FinishedCell,
}

impl SubtitleDecoderState {
    pub fn new(
        stream_index: usize,
        time_base: (i32, i32),
        params: CodecParameters,
        packet_queue: SharedPacketQueue,
        frame_queue: SharedFrameQueue,
        finished_cell: FinishedCell,
    ) -> Result<Self, PlayerError> {
        let backend = Box::new(player_codec::ffmpeg::FfmpegSubtitleDecoder::open(params, stream_index)?);
        Ok(Self { time_base, packet_queue, frame_queue, backend, pkt_serial: Serial::ZERO, finished: None, finished_cell })
    }
}

impl StreamDecoder for SubtitleDecoderState {
    fn decode_one(&mut self) -> Result<DecodeOutcome, PlayerError> {
        loop {
            match self.packet_queue.get(true) {
                GetResult::Aborted => return Ok(DecodeOutcome::Aborted),
                GetResult::Empty => return Ok(DecodeOutcome::NoFrame),
                GetResult::Ok(pkt, serial) => {
                    if serial != self.pkt_serial {
                        self.backend.flush();
                        self.finished = None;
                        self.finished_cell.clear();
                        self.pkt_serial = serial;
                    }
                    if pkt.is_null() {
                        self.finished = Some(serial);
                        self.finished_cell.set(serial);
                        continue;
                    }
                    let pts_secs = pkt.pts.map(|p| pts_to_secs(p, self.time_base)).unwrap_or(f64::NAN);
                    self.backend.send_packet(&pkt)?;
                    let Some(sub) = self.backend.receive_subtitle()? else { continue };
                    let Some(mut guard) = self.frame_queue.peek_writable() else {
                        return Ok(DecodeOutcome::Aborted);
                    };
                    guard.fill(Frame::subtitle(pts_secs, 0.0, 0, self.pkt_serial, sub));
                    guard.commit();
                    return Ok(DecodeOutcome::FrameReady);
                }
            }
        }
    }

    fn is_finished(&self) -> Option<Serial> {
        self.finished
    }

    fn packet_queue(&self) -> &SharedPacketQueue {
        &self.packet_queue
    }

    fn frame_queue(&self) -> &SharedFrameQueue {
        &self.frame_queue
    }
}

/// One worker thread's decode loop: call `decode_one` until the queue is
/// aborted. `NoFrame` only happens with a non-blocking get, which this loop
/// never requests, so in practice every iteration either produces a frame or
/// observes abort.
pub fn run_decoder_loop(mut decoder: Box<dyn StreamDecoder>) {
    loop {
        match decoder.decode_one() {
            Ok(DecodeOutcome::Aborted) => return,
            Ok(DecodeOutcome::FrameReady) | Ok(DecodeOutcome::NoFrame) => continue,
            Err(e) => {
                tracing::warn!(target: "player::decoder", error = %e, "decode error, dropping packet");
                continue;
            }
        }
    }
}
