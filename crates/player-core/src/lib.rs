// crates/player-core/src/lib.rs
//
// Pure data model for the playback pipeline: packets, frames, clocks,
// configuration and the error taxonomy. No FFmpeg, no threads — those live
// in `player-codec` and `player-pipeline` respectively.

pub mod clock;
pub mod error;
pub mod frame;
pub mod options;
pub mod packet;
pub mod serial;
pub mod stream;

pub use clock::{Clock, MasterSyncType};
pub use error::PlayerError;
pub use frame::{AudioBuffer, Frame, FramePayload, SubtitleBuffer, SubtitleRegion, VideoBuffer};
pub use options::{DecoderReorderPts, FramedropMode, Options, SeekByBytes, SyncType};
pub use packet::{Packet, PacketItem};
pub use serial::{FinishedCell, Serial, SerialCell};
pub use stream::StreamKind;
