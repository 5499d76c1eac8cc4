// crates/player-core/src/options.rs
//
// Immutable playback configuration, built once by the Controller's caller
// and handed to VideoState at `open()` time — see SPEC_FULL.md §9
// ("Global option state"). Generalizes the teacher's one-shot job-spec
// pattern (`EncodeSpec`/`ClipSpec` in velocut-media/src/encode.rs: a plain
// data struct constructed by the caller, handed to a worker function) from
// "one encode job" to "one playback session's fixed configuration." No
// field here is ever read from a process global.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncType {
    Audio,
    Video,
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramedropMode {
    Auto,
    Off,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekByBytes {
    Auto,
    Off,
    On,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderReorderPts {
    Auto,
    UseDts,
    UsePts,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub av_sync_type: SyncType,
    pub framedrop: FramedropMode,
    /// `0` = loop forever, `n > 0` = play `n` times.
    pub loop_count: u32,
    pub autoexit: bool,
    pub start_time: Option<Duration>,
    pub duration: Option<Duration>,
    pub seek_by_bytes: SeekByBytes,
    /// Disables the 15 MiB backpressure cap (forced on for realtime inputs
    /// regardless of this field — see `Reader`).
    pub infinite_buffer: bool,
    pub decoder_reorder_pts: DecoderReorderPts,
    pub fast: bool,
    pub lowres: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            av_sync_type: SyncType::Audio,
            framedrop: FramedropMode::Auto,
            loop_count: 1,
            autoexit: false,
            start_time: None,
            duration: None,
            seek_by_bytes: SeekByBytes::Auto,
            infinite_buffer: false,
            decoder_reorder_pts: DecoderReorderPts::Auto,
            fast: false,
            lowres: 0,
        }
    }
}
