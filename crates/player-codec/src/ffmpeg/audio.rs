// crates/player-codec/src/ffmpeg/audio.rs
//
// AudioDecoderBackend over ffmpeg-the-third's decoder::audio::Audio. Same
// send/receive shape as video.rs; see that file for the EAGAIN-vs-error note.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::context::Context as CodecContext;
use ffmpeg::decoder::audio::Audio as Inner;
use ffmpeg::util::frame::audio::Audio as AudioFrame;

use player_core::{Packet, PlayerError};

use crate::traits::{CodecParameters, DecodedAudio, AudioDecoderBackend};

pub struct FfmpegAudioDecoder {
    inner: Inner,
    stream_index: usize,
}

impl FfmpegAudioDecoder {
    pub fn open(params: CodecParameters, stream_index: usize) -> Result<Self, PlayerError> {
        let params = *params.0.downcast::<ffmpeg::codec::Parameters>().map_err(|_| {
            PlayerError::CodecOpen {
                kind: "audio",
                index: stream_index,
                source: anyhow::anyhow!("codec parameters type mismatch"),
            }
        })?;
        let ctx = CodecContext::from_parameters(params).map_err(|e| PlayerError::CodecOpen {
            kind: "audio",
            index: stream_index,
            source: e.into(),
        })?;
        let inner = ctx.decoder().audio().map_err(|e| PlayerError::CodecOpen {
            kind: "audio",
            index: stream_index,
            source: e.into(),
        })?;
        Ok(Self { inner, stream_index })
    }
}

impl AudioDecoderBackend for FfmpegAudioDecoder {
    fn send_packet(&mut self, pkt: &Packet) -> Result<(), PlayerError> {
        let mut raw = ffmpeg::codec::packet::Packet::copy(&pkt.data);
        raw.set_pts(pkt.pts);
        raw.set_dts(pkt.dts);
        self.inner.send_packet(&raw).map_err(|e| PlayerError::Decode {
            kind: "audio",
            index: self.stream_index,
            source: e.into(),
        })
    }

    fn signal_eof(&mut self) -> Result<(), PlayerError> {
        self.inner.send_eof().map_err(|e| PlayerError::Decode {
            kind: "audio",
            index: self.stream_index,
            source: e.into(),
        })
    }

    fn receive_frame(&mut self) -> Result<Option<DecodedAudio>, PlayerError> {
        let mut frame = AudioFrame::empty();
        if self.inner.receive_frame(&mut frame).is_err() {
            return Ok(None);
        }

        Ok(Some(DecodedAudio {
            pts: frame.pts(),
            sample_rate: frame.rate(),
            channels: frame.ch_layout().channels() as u16,
            nb_samples: frame.samples(),
            native: Box::new(frame),
        }))
    }

    fn flush(&mut self) {
        self.inner.flush();
    }
}
