// crates/player-codec/src/ffmpeg/subtitle.rs
//
// SubtitleDecoderBackend over ffmpeg-the-third's decoder::subtitle::Subtitle.
// Unlike video/audio, FFmpeg's subtitle decoder is a one-shot
// packet-in/subtitle-out call (avcodec_decode_subtitle2), not a send/receive
// pair — send_packet stashes the packet, receive_subtitle does the decode.
//
// Rasterizing ASS/bitmap subtitles into RGBA regions is out of scope (see
// SPEC_FULL.md's Non-goals); we surface timing only, via end_display_time,
// so VideoSync's expiry check (step 13: drop a subtitle past its end_pts)
// still has something real to compare against.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::codec::subtitle::Subtitle as RawSubtitle;

use player_core::{Packet, PlayerError, SubtitleBuffer};

use crate::traits::{CodecParameters, SubtitleDecoderBackend};

pub struct FfmpegSubtitleDecoder {
    inner: ffmpeg::decoder::subtitle::Subtitle,
    stream_index: usize,
    pending: Option<ffmpeg::codec::packet::Packet>,
}

impl FfmpegSubtitleDecoder {
    pub fn open(params: CodecParameters, stream_index: usize) -> Result<Self, PlayerError> {
        let params = *params.0.downcast::<ffmpeg::codec::Parameters>().map_err(|_| {
            PlayerError::CodecOpen {
                kind: "subtitle",
                index: stream_index,
                source: anyhow::anyhow!("codec parameters type mismatch"),
            }
        })?;
        let ctx = CodecContext::from_parameters(params).map_err(|e| PlayerError::CodecOpen {
            kind: "subtitle",
            index: stream_index,
            source: e.into(),
        })?;
        let inner = ctx.decoder().subtitle().map_err(|e| PlayerError::CodecOpen {
            kind: "subtitle",
            index: stream_index,
            source: e.into(),
        })?;
        Ok(Self { inner, stream_index, pending: None })
    }
}

impl SubtitleDecoderBackend for FfmpegSubtitleDecoder {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError> {
        self.pending = Some(ffmpeg::codec::packet::Packet::copy(&pkt.data));
        Ok(())
    }

    fn receive_subtitle(&mut self) -> Result<Option<SubtitleBuffer>, PlayerError> {
        let Some(pkt) = self.pending.take() else {
            return Ok(None);
        };

        let mut raw = RawSubtitle::default();
        let got = self.inner.decode(&pkt, &mut raw).map_err(|e| PlayerError::Decode {
            kind: "subtitle",
            index: self.stream_index,
            source: e.into(),
        })?;
        if !got {
            return Ok(None);
        }

        let end_pts = raw.end() as f64 / 1000.0;
        Ok(Some(SubtitleBuffer { regions: Vec::new(), end_pts }))
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}
