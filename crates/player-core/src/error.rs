// crates/player-core/src/error.rs
//
// Error taxonomy for the playback core. Internal glue code (worker loops,
// one-shot helpers) is free to use `anyhow::Result` the way the rest of the
// corpus does — this enum exists specifically for the public API boundary,
// where callers need to branch on *kind* of failure (terminal vs recoverable)
// rather than parse a message string.

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Opening the input (file or URL) failed.
    #[error("failed to open input {path:?}: {source}")]
    InputOpen {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Stream probing / `avformat_find_stream_info` equivalent failed.
    #[error("failed to read stream info: {0}")]
    StreamInfo(anyhow::Error),

    /// A codec failed to open for a given stream. Non-fatal at the playback
    /// level — the affected stream is simply dropped — but callers that
    /// asked for that stream explicitly want to know.
    #[error("codec open failed for {kind} stream {index}: {source}")]
    CodecOpen {
        kind: &'static str,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A single packet failed to decode. Recovered by dropping the packet;
    /// surfaced here only for counters/diagnostics, never propagated as a
    /// fatal error on its own.
    #[error("decode error on {kind} stream {index}: {source}")]
    Decode {
        kind: &'static str,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The resampler failed to convert a frame. Recovered by emitting
    /// silence for that frame.
    #[error("resample error: {0}")]
    Resample(anyhow::Error),

    /// The video surface could not be locked for writing. Recovered by
    /// dropping the frame.
    #[error("surface lock failed: {0}")]
    SurfaceLock(anyhow::Error),

    /// A persistent I/O error from the demuxer (not EOF).
    #[error("I/O error: {0}")]
    Io(anyhow::Error),

    /// Not a real error — the expected result of a blocking call unwinding
    /// because `abort_request` was set during `release()`.
    #[error("aborted")]
    Aborted,

    /// Allocation failure. Always fatal.
    #[error("out of memory: {0}")]
    OutOfMemory(&'static str),
}

impl PlayerError {
    /// Whether this error terminates playback (posts `PlayerEvent::Quit` and
    /// transitions to `Closing`) per spec.md §7, as opposed to being
    /// recovered from transparently.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlayerError::InputOpen { .. }
                | PlayerError::StreamInfo(_)
                | PlayerError::OutOfMemory(_)
                | PlayerError::Io(_)
        )
    }

    /// Whether this is the expected unwind-on-abort result rather than a
    /// genuine failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, PlayerError::Aborted)
    }
}
