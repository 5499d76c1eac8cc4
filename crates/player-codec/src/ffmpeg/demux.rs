// crates/player-codec/src/ffmpeg/demux.rs
//
// Demuxer implementation over ffmpeg-the-third's format::context::Input.
// Stream enumeration and the seek-ts-from-timebase conversion mirror
// velocut-media/src/decode.rs::LiveDecoder::open and helpers/seek.rs; pause,
// resume and byte-seek go through raw FFI the same way decode.rs reaches into
// AVCodecParameters (`stream.parameters().as_ptr()`) for fields the safe
// wrapper doesn't expose.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::ffi;
use ffmpeg::format::input;
use ffmpeg::media::Type as MediaType;

use player_core::{Packet, PlayerError, Serial, StreamKind};

use crate::traits::{CodecParameters, Demuxer, StreamDescriptor};

fn to_stream_kind(t: MediaType) -> Option<StreamKind> {
    match t {
        MediaType::Video => Some(StreamKind::Video),
        MediaType::Audio => Some(StreamKind::Audio),
        MediaType::Subtitle => Some(StreamKind::Subtitle),
        _ => None,
    }
}

pub struct FfmpegDemuxer {
    path: String,
    ictx: ffmpeg::format::context::Input,
    streams: Vec<StreamDescriptor>,
    paused: bool,
}

impl FfmpegDemuxer {
    pub fn open(path: &str) -> Result<Self, PlayerError> {
        let ictx = input(path).map_err(|e| PlayerError::InputOpen {
            path: path.to_string(),
            source: e.into(),
        })?;

        let streams: Vec<StreamDescriptor> = ictx
            .streams()
            .filter_map(|s| {
                let kind = to_stream_kind(s.parameters().medium())?;
                let tb = s.time_base();
                let afr = unsafe { (*s.as_ptr()).avg_frame_rate };
                Some(StreamDescriptor {
                    index: s.index(),
                    kind,
                    time_base: (tb.numerator(), tb.denominator()),
                    avg_frame_rate: (afr.num, afr.den),
                })
            })
            .collect();

        Ok(Self { path: path.to_string(), ictx, streams, paused: false })
    }

    fn format_name(&self) -> &str {
        unsafe {
            let iformat = (*self.ictx.as_ptr()).iformat;
            std::ffi::CStr::from_ptr((*iformat).name).to_str().unwrap_or("")
        }
    }
}

impl Demuxer for FfmpegDemuxer {
    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    fn best_stream(&self, kind: StreamKind) -> Option<usize> {
        let media = match kind {
            StreamKind::Video => MediaType::Video,
            StreamKind::Audio => MediaType::Audio,
            StreamKind::Subtitle => MediaType::Subtitle,
        };
        self.ictx.streams().best(media).map(|s| s.index())
    }

    fn codec_parameters(&self, stream_index: usize) -> Result<CodecParameters, PlayerError> {
        let stream = self.ictx.stream(stream_index).ok_or_else(|| {
            PlayerError::StreamInfo(anyhow::anyhow!("no stream at index {stream_index}"))
        })?;
        Ok(CodecParameters(Box::new(stream.parameters())))
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, PlayerError> {
        match self.ictx.packets().next() {
            None => Ok(None),
            Some(Err(e)) => Err(PlayerError::Io(e.into())),
            Some(Ok((stream, pkt))) => {
                let data = pkt.data().map(|d| d.to_vec()).unwrap_or_default();
                let mut out = Packet::new(stream.index(), pkt.pts(), pkt.dts(), data);
                out.serial = Serial::ZERO; // PacketQueue::put overwrites this at enqueue.
                Ok(Some(out))
            }
        }
    }

    fn seek(&mut self, min_ts: i64, target_ts: i64, max_ts: i64, by_bytes: bool) -> Result<(), PlayerError> {
        let flags = if by_bytes { ffi::AVSEEK_FLAG_BYTE } else { 0 };
        let ret = unsafe {
            ffi::avformat_seek_file(self.ictx.as_mut_ptr(), -1, min_ts, target_ts, max_ts, flags)
        };
        if ret < 0 {
            return Err(PlayerError::Io(anyhow::anyhow!("avformat_seek_file: {ret}")));
        }
        Ok(())
    }

    fn pause(&mut self) {
        if !self.paused {
            unsafe { ffi::av_read_pause(self.ictx.as_mut_ptr()) };
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if self.paused {
            unsafe { ffi::av_read_play(self.ictx.as_mut_ptr()) };
            self.paused = false;
        }
    }

    fn is_realtime(&self) -> bool {
        let p = self.path.as_str();
        p.starts_with("rtp:") || p.starts_with("rtsp:") || p.starts_with("sdp:")
            || (p.starts_with("udp:") && self.format_name() == "mpegts")
    }

    fn prefers_seek_by_bytes(&self) -> bool {
        let ts_discont = unsafe {
            let iformat = (*self.ictx.as_ptr()).iformat;
            (*iformat).flags & ffi::AVFMT_TS_DISCONT as i32 != 0
        };
        ts_discont && self.format_name() != "ogg"
    }

    fn duration(&self) -> Option<f64> {
        let d = unsafe { (*self.ictx.as_ptr()).duration };
        (d > 0).then(|| d as f64 / ffi::AV_TIME_BASE as f64)
    }
}
