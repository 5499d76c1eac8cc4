// crates/player-pipeline/src/lib.rs
//
// The playback pipeline: queues, decoders, the two sync engines, the reader
// worker and the public Controller façade (spec.md §4). Depends on
// `player-codec`'s traits, never on `ffmpeg-the-third` directly.

pub mod audio_sync;
pub mod controller;
pub mod decoder;
pub mod events;
pub mod frame_queue;
pub mod packet_queue;
pub mod presenter;
pub mod reader;
pub mod state;
pub mod video_sync;

pub use audio_sync::AudioSync;
pub use controller::Controller;
pub use decoder::{AudioDecoderState, SubtitleDecoderState, VideoDecoderState};
pub use events::{EventQueue, PlayerEvent};
pub use frame_queue::{FrameQueue, SharedFrameQueue};
pub use packet_queue::{PacketQueue, SharedPacketQueue};
pub use presenter::Presenter;
pub use state::VideoState;
pub use video_sync::VideoSync;
