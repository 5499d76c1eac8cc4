// crates/player-codec/src/ffmpeg/mod.rs
//
// The concrete, ffmpeg-the-third-backed implementation of every trait in
// `crate::traits`. This is the only module in the workspace that imports
// `ffmpeg_the_third` directly — everything upstream of it (player-pipeline)
// talks to the traits, never to FFmpeg types.

pub mod audio;
pub mod demux;
pub mod resample;
pub mod scale;
pub mod subtitle;
pub mod video;

pub use audio::FfmpegAudioDecoder;
pub use demux::FfmpegDemuxer;
pub use resample::FfmpegResampler;
pub use scale::FfmpegScaler;
pub use subtitle::FfmpegSubtitleDecoder;
pub use video::FfmpegVideoDecoder;

/// Must be called once per process before any other function in this module.
/// Thin wrapper so callers don't need a direct `ffmpeg-the-third` dependency
/// just to initialize it — mirrors `ffmpeg_the_third::init()` called from
/// `main.rs` in the teacher binary.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_the_third::init()?;
    Ok(())
}
