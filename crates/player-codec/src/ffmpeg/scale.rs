// crates/player-codec/src/ffmpeg/scale.rs
//
// RGBA scaling via SwsContext, following velocut-media/src/decode.rs's
// scaler setup and its row-by-row stride-to-tight-packed copy in
// LiveDecoder::next_frame. The SwsContext is built lazily on first frame
// (source format/dimensions aren't known until then) and rebuilt if they
// change, mirroring the resampler's lazy-build-then-rebuild-on-change shape
// in resample.rs.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use player_core::{PlayerError, VideoBuffer};

use crate::traits::{DecodedVideo, Scaler};

struct SwsSignature {
    format: Pixel,
    width: u32,
    height: u32,
}

pub struct FfmpegScaler {
    inner: Option<SwsContext>,
    sig: Option<SwsSignature>,
    out_width: u32,
    out_height: u32,
}

impl FfmpegScaler {
    /// Converts pixel format only — output dimensions always track the
    /// source frame's own width/height. Resizing to fit a surface is the
    /// Presenter's job (aspect-preserving "contain" blit at display time),
    /// not the decode-side scaler's.
    pub fn new() -> Self {
        Self { inner: None, sig: None, out_width: 0, out_height: 0 }
    }
}

impl Default for FfmpegScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scaler for FfmpegScaler {
    fn scale_to_rgba(&mut self, frame: &DecodedVideo) -> Result<VideoBuffer, PlayerError> {
        let native = frame.native.downcast_ref::<VideoFrame>().ok_or_else(|| PlayerError::Decode {
            kind: "video",
            index: 0,
            source: anyhow::anyhow!("native frame was not an ffmpeg video frame"),
        })?;

        let sig = SwsSignature { format: native.format(), width: native.width(), height: native.height() };
        let needs_rebuild = match &self.sig {
            Some(s) => s.format != sig.format || s.width != sig.width || s.height != sig.height,
            None => true,
        };
        if needs_rebuild {
            let ctx = SwsContext::get(
                sig.format, sig.width, sig.height,
                Pixel::RGBA, sig.width, sig.height, Flags::BILINEAR,
            ).map_err(|e| PlayerError::Decode { kind: "video", index: 0, source: e.into() })?;
            self.inner = Some(ctx);
            self.out_width = sig.width;
            self.out_height = sig.height;
            self.sig = Some(sig);
        }

        let sws = self.inner.as_mut().expect("just built above");
        let mut out = VideoFrame::empty();
        sws.run(native, &mut out).map_err(|e| PlayerError::Decode { kind: "video", index: 0, source: e.into() })?;

        let stride = out.stride(0);
        let raw = out.data(0);
        let row_bytes = self.out_width as usize * 4;
        let mut rgba = Vec::with_capacity(row_bytes * self.out_height as usize);
        for row in 0..self.out_height as usize {
            let start = row * stride;
            rgba.extend_from_slice(&raw[start..start + row_bytes]);
        }

        Ok(VideoBuffer {
            width: self.out_width,
            height: self.out_height,
            sample_aspect_ratio: frame.sample_aspect_ratio,
            rgba: Some(rgba),
        })
    }
}
