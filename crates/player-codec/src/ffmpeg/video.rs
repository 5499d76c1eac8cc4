// crates/player-codec/src/ffmpeg/video.rs
//
// VideoDecoderBackend over ffmpeg-the-third's decoder::video::Video.
// send/receive loop follows velocut-media/src/decode.rs::next_frame: any
// receive_frame error is treated as "no frame ready yet," matching the
// teacher's `while decoder.receive_frame(&mut decoded).is_ok()` pattern
// rather than discriminating EAGAIN from a real decode failure.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::decoder::video::Video as Inner;
use ffmpeg::util::frame::video::Video as VideoFrame;

use player_core::{Packet, PlayerError};

use crate::traits::{CodecParameters, DecodedVideo, VideoDecoderBackend};

pub struct FfmpegVideoDecoder {
    inner: Inner,
    stream_index: usize,
}

impl FfmpegVideoDecoder {
    pub fn open(params: CodecParameters, stream_index: usize) -> Result<Self, PlayerError> {
        let params = *params.0.downcast::<ffmpeg::codec::Parameters>().map_err(|_| {
            PlayerError::CodecOpen {
                kind: "video",
                index: stream_index,
                source: anyhow::anyhow!("codec parameters type mismatch"),
            }
        })?;
        let ctx = CodecContext::from_parameters(params).map_err(|e| PlayerError::CodecOpen {
            kind: "video",
            index: stream_index,
            source: e.into(),
        })?;
        let inner = ctx.decoder().video().map_err(|e| PlayerError::CodecOpen {
            kind: "video",
            index: stream_index,
            source: e.into(),
        })?;
        Ok(Self { inner, stream_index })
    }
}

impl VideoDecoderBackend for FfmpegVideoDecoder {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError> {
        let mut raw = ffmpeg::codec::packet::Packet::copy(&pkt.data);
        raw.set_pts(pkt.pts);
        raw.set_dts(pkt.dts);
        self.inner.send_packet(&raw).map_err(|e| PlayerError::Decode {
            kind: "video",
            index: self.stream_index,
            source: e.into(),
        })
    }

    fn signal_eof(&mut self) -> Result<(), PlayerError> {
        self.inner.send_eof().map_err(|e| PlayerError::Decode {
            kind: "video",
            index: self.stream_index,
            source: e.into(),
        })
    }

    fn receive_frame(&mut self) -> Result<Option<DecodedVideo>, PlayerError> {
        let mut frame = VideoFrame::empty();
        if self.inner.receive_frame(&mut frame).is_err() {
            return Ok(None);
        }

        let sar = {
            let a = frame.aspect_ratio();
            if a.denominator() != 0 {
                a.numerator() as f64 / a.denominator() as f64
            } else {
                1.0
            }
        };

        Ok(Some(DecodedVideo {
            pts: frame.pts(),
            dts: None, // post-decode frames don't carry a separate decode timestamp
            width: frame.width(),
            height: frame.height(),
            sample_aspect_ratio: sar,
            native: Box::new(frame),
        }))
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}
