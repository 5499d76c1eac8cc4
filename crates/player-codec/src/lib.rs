// crates/player-codec/src/lib.rs
//
// The external-collaborator boundary named in spec.md §1: demux, decode,
// resample and scale are reached only through the traits in `traits.rs`.
// `ffmpeg` is the one concrete implementation of each, built on
// `ffmpeg-the-third` — the same crate the teacher (`velocut-media`) uses for
// every FFmpeg touch point, following its two-context-open pattern for
// seek-then-decode (see `ffmpeg::demux::FfmpegDemuxer::open`).

pub mod ffmpeg;
pub mod traits;

pub use traits::{
    AudioDecoderBackend, AudioSink, AudioSinkFormat, CodecParameters, DecodedAudio, DecodedVideo,
    Demuxer, Resampler, Scaler, StreamDescriptor, SubtitleDecoderBackend, SurfaceWriteGuard,
    VideoDecoderBackend, VideoSurface,
};
