// crates/player-codec/src/traits.rs
//
// Trait boundary between the playback pipeline and the codec/IO world named
// as external collaborators in spec.md §1. `player-pipeline` depends only on
// these traits, never on `ffmpeg-the-third` directly — the `ffmpeg` module
// in this crate is one implementation, not the only possible one.

use player_core::{Packet, PlayerError, StreamKind, VideoBuffer};

/// One elementary stream as reported by `Demuxer::streams`.
#[derive(Clone, Debug)]
pub struct StreamDescriptor {
    pub index: usize,
    pub kind: StreamKind,
    /// Rational time base as `(numerator, denominator)` — multiply a raw
    /// timestamp by `numerator / denominator` to get seconds.
    pub time_base: (i32, i32),
    /// Average frame rate as `(numerator, denominator)`, `(0, 0)` if the
    /// container doesn't report one (e.g. audio/subtitle streams). Video
    /// decoders use its reciprocal as a frame's `duration` fallback when the
    /// codec itself gives no better estimate (spec.md §4.6 step 6).
    pub avg_frame_rate: (i32, i32),
}

/// Opaque per-stream codec parameters, produced by `Demuxer::codec_parameters`
/// and consumed only by this crate's own decoder-backend constructors — the
/// `ffmpeg` module downcasts it back to `ffmpeg_the_third::codec::Parameters`.
/// Lets `Demuxer` stay a trait object without leaking FFmpeg types into its
/// signature.
pub struct CodecParameters(pub Box<dyn std::any::Any + Send>);

/// Demuxes a container, selects streams, and yields packets.
///
/// Implementations own the underlying IO; `player-pipeline::Reader` drives
/// this trait from its single worker thread (spec.md §4.7).
pub trait Demuxer: Send {
    fn streams(&self) -> &[StreamDescriptor];

    /// FFmpeg's "best stream" heuristic for a given kind, or `None` if the
    /// container has no stream of that kind.
    fn best_stream(&self, kind: StreamKind) -> Option<usize>;

    /// Codec parameters for one stream, handed to the matching
    /// `*DecoderBackend::open` free function in the `ffmpeg` module when a
    /// decoder for that stream is first constructed.
    fn codec_parameters(&self, stream_index: usize) -> Result<CodecParameters, PlayerError>;

    /// Read the next packet. `Ok(None)` signals end of stream; the caller
    /// (`Reader`) is responsible for draining decoders at that point.
    fn read_packet(&mut self) -> Result<Option<Packet>, PlayerError>;

    /// Seek so that the next read lands at or near `target_ts`, within
    /// `[min_ts, max_ts]` (spec.md §4.7's ±2s slack window), in the
    /// container's AV_TIME_BASE-equivalent units.
    fn seek(&mut self, min_ts: i64, target_ts: i64, max_ts: i64, by_bytes: bool) -> Result<(), PlayerError>;

    fn pause(&mut self);
    fn resume(&mut self);

    /// True for realtime transports (`rtp:`, `rtsp:`, `sdp:`, `udp:`)
    /// identified by protocol prefix — enables external-clock adaptation
    /// and forces `infinite_buffer`.
    fn is_realtime(&self) -> bool;

    /// Whether the container lacks reliable timestamps, making
    /// seek-by-bytes the appropriate strategy (spec.md §4.7).
    fn prefers_seek_by_bytes(&self) -> bool;

    /// Total duration in seconds, if known.
    fn duration(&self) -> Option<f64>;
}

/// One decoded video frame, prior to RGBA scaling.
pub struct DecodedVideo {
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub width: u32,
    pub height: u32,
    pub sample_aspect_ratio: f64,
    /// Opaque handle into the backend's native frame representation —
    /// `Scaler::scale_to_rgba` is the only thing that reads it.
    pub native: Box<dyn std::any::Any + Send>,
}

pub trait VideoDecoderBackend: Send {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError>;
    /// Signals end-of-stream (the `avcodec_send_packet(ctx, NULL)` moment) so
    /// the decoder drains any frames buffered internally.
    fn signal_eof(&mut self) -> Result<(), PlayerError>;
    /// Pull one decoded frame. `Ok(None)` means "feed more packets."
    fn receive_frame(&mut self) -> Result<Option<DecodedVideo>, PlayerError>;
    /// Reset internal codec state after a FLUSH sentinel.
    fn flush(&mut self);
}

pub trait Scaler: Send {
    fn scale_to_rgba(&mut self, frame: &DecodedVideo) -> Result<VideoBuffer, PlayerError>;
}

/// One decoded audio frame, in the codec's native sample format.
pub struct DecodedAudio {
    pub pts: Option<i64>,
    pub sample_rate: u32,
    pub channels: u16,
    pub nb_samples: usize,
    pub native: Box<dyn std::any::Any + Send>,
}

pub trait AudioDecoderBackend: Send {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError>;
    fn signal_eof(&mut self) -> Result<(), PlayerError>;
    fn receive_frame(&mut self) -> Result<Option<DecodedAudio>, PlayerError>;
    fn flush(&mut self);
}

/// Target format `AudioSync` requests PCM in: 16-bit signed little-endian,
/// interleaved, at a fixed rate/channel count (spec.md §6, "Required sink
/// format").
#[derive(Clone, Copy, Debug)]
pub struct AudioSinkFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

pub trait Resampler: Send {
    /// Convert `frame` to `target`, asking the resampler to stretch or
    /// compress to exactly `wanted_nb_samples` output frames (the
    /// sample-count adjustment `AudioSync` computes from clock drift).
    fn resample(
        &mut self,
        frame: &DecodedAudio,
        wanted_nb_samples: usize,
        target: AudioSinkFormat,
    ) -> Result<Vec<u8>, PlayerError>;
}

pub trait SubtitleDecoderBackend: Send {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError>;
    fn receive_subtitle(&mut self) -> Result<Option<player_core::SubtitleBuffer>, PlayerError>;
    fn flush(&mut self);
}

/// Pull-model host audio sink (spec.md §6). The host calls `fill` from its
/// own dedicated callback thread; we never create that thread ourselves.
pub trait AudioSink: Send {
    fn fill(&mut self, buf: &mut [u8]) -> usize;
    fn negotiated_format(&self) -> AudioSinkFormat;
}

/// One locked, writable region of the video surface. `unlock_and_post`
/// happens in `Drop` so a panicking presenter can't leave the surface
/// locked.
pub trait SurfaceWriteGuard {
    fn bits_mut(&mut self) -> &mut [u8];
    fn stride_px(&self) -> usize;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

pub trait VideoSurface: Send {
    /// `None` means the lock failed — spec.md §4.10: drop the frame, log.
    fn lock(&mut self) -> Option<Box<dyn SurfaceWriteGuard + '_>>;
}
