// crates/player-pipeline/src/audio_sync.rs
//
// Drains the audio FrameQueue on each host audio-sink pull, applying the
// clock-drift sample-count correction described in spec.md §4.5. Format
// conversion itself already happened in the Decoder (decoder.rs) — what's
// left here is purely a sample-count stretch/compress plus the audio-clock
// bookkeeping, so `AudioSync` never touches FFmpeg at all.

use std::sync::{Arc, Mutex};

use player_core::{Clock, Serial, SerialCell};
use player_codec::{AudioSink, AudioSinkFormat};

use crate::frame_queue::SharedFrameQueue;

/// exp(ln(0.01) / 20), i.e. 10^(-1/10) — the EMA coefficient spec.md §4.5
/// names for smoothing the audio/master clock diff.
const AUDIO_DIFF_AVG_COEF: f64 = 0.794_328_234_724_281_5;
/// |Δ| / nb_samples never exceeds this fraction.
const SAMPLE_CORRECTION_MAX: f64 = 0.10;

/// Supplies the current master-clock position and its source serial, so
/// `AudioSync` can stay agnostic of which clock (audio/video/external) is
/// actually mastering — that selection lives in `state.rs`.
pub type MasterClockFn = Arc<dyn Fn() -> f64 + Send + Sync>;

pub struct AudioSync {
    frame_queue: SharedFrameQueue,
    queue_serial: SerialCell,
    target: AudioSinkFormat,
    audio_clock: Arc<Mutex<Clock>>,
    ext_clock: Arc<Mutex<Clock>>,
    master_clock: MasterClockFn,
    staging: Vec<u8>,
    staging_pos: usize,
    avg_diff: f64,
    current_serial: Serial,
}

impl AudioSync {
    pub fn new(
        frame_queue: SharedFrameQueue,
        queue_serial: SerialCell,
        target: AudioSinkFormat,
        audio_clock: Arc<Mutex<Clock>>,
        ext_clock: Arc<Mutex<Clock>>,
        master_clock: MasterClockFn,
    ) -> Self {
        Self {
            frame_queue,
            queue_serial,
            target,
            audio_clock,
            ext_clock,
            master_clock,
            staging: Vec::new(),
            staging_pos: 0,
            avg_diff: 0.0,
            current_serial: Serial::ZERO,
        }
    }

    fn bytes_per_frame(&self) -> usize {
        self.target.channels as usize * 2
    }

    /// Pulls and decodes-through-resample the next audio frame into the
    /// staging buffer, discarding any frame left behind by a flush. `false`
    /// means the queue is empty or aborted (spec.md §4.5: "may return
    /// silence on error").
    fn refill_staging(&mut self) -> bool {
        loop {
            if self.frame_queue.peek_readable().is_none() {
                return false;
            }
            let Some(frame) = self.frame_queue.peek() else { return false };
            self.frame_queue.next();
            if frame.serial != self.queue_serial.get() {
                continue;
            }
            let Some(audio) = frame.as_audio() else { continue };
            self.current_serial = frame.serial;

            let nb_samples = audio.nb_samples;
            let wanted = self.wanted_nb_samples(nb_samples);
            let data = if wanted != nb_samples && nb_samples > 0 {
                stretch_samples(&audio.data, self.target.channels, nb_samples, wanted)
            } else {
                audio.data.clone()
            };

            {
                let mut clk = self.audio_clock.lock().unwrap();
                let audio_clock_pts = frame.pts + nb_samples as f64 / audio.sample_rate.max(1) as f64;
                clk.set(audio_clock_pts, Some(frame.serial));
            }

            self.staging = data;
            self.staging_pos = 0;
            return true;
        }
    }

    fn wanted_nb_samples(&mut self, nb_samples: usize) -> usize {
        let audio_clock = self.audio_clock.lock().unwrap().get();
        let master = (self.master_clock)();
        let diff = audio_clock - master;
        if diff.is_nan() || diff.abs() >= player_core::clock::AV_NOSYNC_THRESHOLD {
            return nb_samples;
        }

        self.avg_diff = diff + AUDIO_DIFF_AVG_COEF * self.avg_diff;
        let avg = self.avg_diff * (1.0 - AUDIO_DIFF_AVG_COEF);
        let delta_samples = (avg * self.target.sample_rate as f64) as i64;
        let max_delta = (nb_samples as f64 * SAMPLE_CORRECTION_MAX) as i64;
        let delta = delta_samples.clamp(-max_delta, max_delta);
        (nb_samples as i64 + delta).max(0) as usize
    }
}

impl AudioSink for AudioSync {
    fn fill(&mut self, buf: &mut [u8]) -> usize {
        let callback_time = player_core::clock::monotonic_now();
        let mut written = 0;

        while written < buf.len() {
            if self.staging_pos >= self.staging.len() {
                if !self.refill_staging() {
                    break;
                }
            }
            let available = self.staging.len() - self.staging_pos;
            let take = available.min(buf.len() - written);
            buf[written..written + take]
                .copy_from_slice(&self.staging[self.staging_pos..self.staging_pos + take]);
            self.staging_pos += take;
            written += take;
        }

        let bytes_per_sec = (self.target.sample_rate as usize * self.bytes_per_frame()).max(1);
        let residual = self.staging.len() - self.staging_pos;
        let hw_buf_size = buf.len();
        let latency = (2 * hw_buf_size + residual) as f64 / bytes_per_sec as f64;

        {
            let mut audclk = self.audio_clock.lock().unwrap();
            let pts = audclk.get();
            if !pts.is_nan() {
                audclk.set_at(pts, Some(self.current_serial), callback_time - latency);
            }
        }
        let audclk_snapshot = self.audio_clock.lock().unwrap().clone();
        self.ext_clock.lock().unwrap().sync_to_slave(&audclk_snapshot);

        written
    }

    fn negotiated_format(&self) -> AudioSinkFormat {
        self.target
    }
}

/// Linear-interpolation stretch/compress of interleaved S16LE PCM from
/// `from` to `to` frames per channel. A pure-Rust stand-in for
/// `swr_set_compensation`'s job, operating on already-resampled PCM instead
/// of a second FFmpeg pass (see decoder.rs's doc comment).
fn stretch_samples(data: &[u8], channels: u16, from: usize, to: usize) -> Vec<u8> {
    let channels = channels as usize;
    if from == 0 || to == 0 || channels == 0 {
        return Vec::new();
    }
    let src: Vec<i16> = data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();

    let mut out = Vec::with_capacity(to * channels * 2);
    for i in 0..to {
        let src_pos = i as f64 * (from - 1).max(1) as f64 / (to - 1).max(1) as f64;
        let idx0 = src_pos.floor() as usize;
        let idx1 = (idx0 + 1).min(from - 1);
        let frac = src_pos - idx0 as f64;
        for c in 0..channels {
            let s0 = *src.get(idx0 * channels + c).unwrap_or(&0) as f64;
            let s1 = *src.get(idx1 * channels + c).unwrap_or(&0) as f64;
            let sample = (s0 + (s1 - s0) * frac).round() as i16;
            out.extend_from_slice(&sample.to_le_bytes());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_preserves_frame_count() {
        let channels = 2u16;
        let from = 4usize;
        let data: Vec<u8> = (0..from as i16)
            .flat_map(|i| [i.to_le_bytes(), (i * 2).to_le_bytes()])
            .flatten()
            .collect();
        let out = stretch_samples(&data, channels, from, 6);
        assert_eq!(out.len(), 6 * channels as usize * 2);
    }

    #[test]
    fn stretch_to_same_count_is_close_to_identity() {
        let channels = 1u16;
        let data: Vec<u8> = [10i16, 20, 30, 40].iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = stretch_samples(&data, channels, 4, 4);
        let samples: Vec<i16> = out.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(samples, vec![10, 20, 30, 40]);
    }
}
