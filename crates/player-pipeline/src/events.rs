// crates/player-pipeline/src/events.rs
//
// Controller/event-worker messaging. The source this spec was distilled
// from has a hand-rolled, unlocked `MessageQueue` shared between a JNI
// callback thread and the render thread, and its `popMessage` silently
// omits `return true` on the success path — both called out in spec.md's
// REDESIGN FLAGS as bugs to fix, not reproduce. `crossbeam_channel` gives
// us internal synchronization for free and `Option<PlayerEvent>` makes the
// success/empty distinction unambiguous at the type level.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// Playback reached end of stream (and won't loop/autoexit further).
    Eof,
    /// A non-fatal error occurred; playback continues.
    Error(String),
    /// A fatal error occurred; the event worker will close the session.
    FatalError(String),
    /// `release()` was called; the event worker should tear everything down.
    Quit,
}

/// Bounded event channel between the Reader/Controller side and the
/// dedicated event-worker thread that reacts to `Quit`/`FatalError` by
/// calling `stream_close` (spec.md §4.8).
pub struct EventQueue {
    tx: Sender<PlayerEvent>,
    rx: Receiver<PlayerEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<PlayerEvent> {
        self.tx.clone()
    }

    /// Blocks until an event arrives.
    pub fn recv(&self) -> Option<PlayerEvent> {
        self.rx.recv().ok()
    }

    /// Non-blocking poll; `None` covers both "empty" and "disconnected."
    pub fn try_recv(&self) -> Option<PlayerEvent> {
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_then_recv_round_trips() {
        let q = EventQueue::new(4);
        q.sender().send(PlayerEvent::Eof).unwrap();
        assert_eq!(q.recv(), Some(PlayerEvent::Eof));
    }

    #[test]
    fn try_recv_on_empty_queue_is_none() {
        let q = EventQueue::new(4);
        assert_eq!(q.try_recv(), None);
    }

    #[test]
    fn quit_is_observable_from_another_thread() {
        let q = std::sync::Arc::new(EventQueue::new(4));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.recv());
        std::thread::sleep(std::time::Duration::from_millis(10));
        q.sender().send(PlayerEvent::Quit).unwrap();
        assert_eq!(handle.join().unwrap(), Some(PlayerEvent::Quit));
    }
}
