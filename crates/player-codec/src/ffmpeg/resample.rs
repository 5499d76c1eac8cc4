// crates/player-codec/src/ffmpeg/resample.rs
//
// Resampler over ffmpeg-the-third's software::resampling::Context, built the
// same way velocut-media/src/encode.rs builds its encode-side resampler:
// lazily, via Context::get2(src_fmt, src_layout, src_rate, dst_fmt,
// dst_layout, dst_rate), rebuilt when the source signature changes. Output
// format is fixed at S16 packed/interleaved — the format AudioSync's sink
// contract (spec.md §6) requires — rather than the teacher's F32 planar
// (their target is an AAC encoder, ours is a PCM callback sink).
//
// `wanted_nb_samples` drives swr's compensation path (`set_compensation`),
// the idiomatic-Rust surface for `swr_set_compensation` — this is how
// AudioSync's drift-correction resample (spec.md §4.8, `synchronize_audio`)
// actually stretches or compresses a frame instead of just converting it.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::software::resampling::Context as ResampleContext;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;

use player_core::PlayerError;

use crate::traits::{AudioSinkFormat, DecodedAudio, Resampler};

fn channel_layout_for(channels: u16) -> ChannelLayout {
    if channels >= 2 {
        ChannelLayout::STEREO
    } else {
        ChannelLayout::MONO
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct SrcSignature {
    format: Sample,
    rate: u32,
    channels: u16,
    dst_rate: u32,
    dst_channels: u16,
}

pub struct FfmpegResampler {
    inner: Option<ResampleContext>,
    sig: Option<SrcSignature>,
}

impl FfmpegResampler {
    pub fn new() -> Self {
        Self { inner: None, sig: None }
    }
}

impl Default for FfmpegResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Resampler for FfmpegResampler {
    fn resample(
        &mut self,
        frame: &DecodedAudio,
        wanted_nb_samples: usize,
        target: AudioSinkFormat,
    ) -> Result<Vec<u8>, PlayerError> {
        let native = frame.native.downcast_ref::<AudioFrame>().ok_or_else(|| {
            PlayerError::Resample(anyhow::anyhow!("native frame was not an ffmpeg audio frame"))
        })?;

        let sig = SrcSignature {
            format: native.format(),
            rate: native.rate(),
            channels: frame.channels,
            dst_rate: target.sample_rate,
            dst_channels: target.channels,
        };

        if self.inner.is_none() || self.sig != Some(sig) {
            let dst_layout = channel_layout_for(target.channels);
            let rs = ResampleContext::get2(
                native.format(), native.ch_layout(), native.rate(),
                Sample::I16(SampleType::Packed), dst_layout, target.sample_rate,
            ).map_err(|e| PlayerError::Resample(e.into()))?;
            self.inner = Some(rs);
            self.sig = Some(sig);
        }

        let rs = self.inner.as_mut().expect("just built above");
        if wanted_nb_samples != native.samples() && native.samples() > 0 {
            let delta = wanted_nb_samples as i32 - native.samples() as i32;
            rs.set_compensation(delta, native.samples() as i32).map_err(|e| PlayerError::Resample(e.into()))?;
        }

        let mut out = AudioFrame::empty();
        rs.run(native, &mut out).map_err(|e| PlayerError::Resample(e.into()))?;

        let bytes_per_sample = 2usize;
        let len = out.samples() * target.channels as usize * bytes_per_sample;
        let data = out.data(0);
        Ok(data[..len.min(data.len())].to_vec())
    }
}
