// crates/player-pipeline/src/frame_queue.rs
//
// Bounded ring of decoded frames with peek-last semantics (spec.md §3, §4.2).
// Same mutex+condvar shape as packet_queue.rs. `peek_writable`/`push` is
// exposed as a scoped `FrameWriteGuard` (SPEC_FULL.md §4's redesign note) so
// a slot is only published — `windex` advanced, waiters signaled — if the
// caller actually commits it; a decoder that bails out partway through
// filling a frame just drops the guard and the slot stays unpublished.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use player_core::{Frame, Serial};

struct Inner {
    queue: Vec<Option<Frame>>,
    rindex: usize,
    windex: usize,
    size: usize,
    rindex_shown: bool,
    abort_request: bool,
}

pub struct FrameQueue {
    inner: Mutex<Inner>,
    cv: Condvar,
    max_size: usize,
    keep_last: bool,
}

impl FrameQueue {
    pub fn new(max_size: usize, keep_last: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: (0..max_size).map(|_| None).collect(),
                rindex: 0,
                windex: 0,
                size: 0,
                rindex_shown: false,
                abort_request: false,
            }),
            cv: Condvar::new(),
            max_size,
            keep_last,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    pub fn nb_remaining(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.size - g.rindex_shown as usize
    }

    pub fn abort(&self) {
        let mut g = self.inner.lock().unwrap();
        g.abort_request = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Blocks while the ring is full and not aborted; returns a write handle
    /// into the slot at the current `windex`. `None` on abort.
    pub fn peek_writable(&self) -> Option<FrameWriteGuard<'_>> {
        let mut g = self.inner.lock().unwrap();
        while g.size >= self.max_size && !g.abort_request {
            g = self.cv.wait(g).unwrap();
        }
        if g.abort_request {
            return None;
        }
        let windex = g.windex;
        Some(FrameWriteGuard { queue: self, guard: Some(g), windex, frame: None })
    }

    /// Blocks while there is no readable frame and not aborted. `None` on
    /// abort.
    pub fn peek_readable(&self) -> Option<()> {
        let mut g = self.inner.lock().unwrap();
        while g.size as isize - g.rindex_shown as isize <= 0 && !g.abort_request {
            g = self.cv.wait(g).unwrap();
        }
        if g.abort_request {
            None
        } else {
            Some(())
        }
    }

    fn readable_index(g: &Inner, max_size: usize) -> usize {
        (g.rindex + g.rindex_shown as usize) % max_size
    }

    pub fn peek(&self) -> Option<Frame> {
        let g = self.inner.lock().unwrap();
        let idx = Self::readable_index(&g, self.max_size);
        g.queue[idx].clone()
    }

    pub fn peek_next(&self) -> Option<Frame> {
        let g = self.inner.lock().unwrap();
        let idx = (Self::readable_index(&g, self.max_size) + 1) % self.max_size;
        g.queue[idx].clone()
    }

    pub fn peek_last(&self) -> Option<Frame> {
        let g = self.inner.lock().unwrap();
        g.queue[g.rindex].clone()
    }

    /// Advances past the current readable frame. With `keep_last` set, the
    /// first call after a fresh frame only marks it shown-but-retained; the
    /// slot itself is released (and `rindex` actually advances) on the call
    /// after that.
    pub fn next(&self) {
        let mut g = self.inner.lock().unwrap();
        if self.keep_last && !g.rindex_shown {
            g.rindex_shown = true;
            drop(g);
            self.cv.notify_one();
            return;
        }
        g.queue[g.rindex] = None;
        g.rindex = (g.rindex + 1) % self.max_size;
        g.size -= 1;
        drop(g);
        self.cv.notify_one();
    }

    /// Clears `rindex_shown`, forcing the next `peek`/`peek_readable` pair to
    /// re-show the currently retained frame. Used by the refresh loop for a
    /// forced redisplay. Returns the previous value.
    pub fn prev(&self) -> bool {
        let mut g = self.inner.lock().unwrap();
        let was_shown = g.rindex_shown;
        g.rindex_shown = false;
        was_shown
    }

    pub fn signal(&self) {
        self.cv.notify_all();
    }
}

/// Scoped write handle into a `FrameQueue` slot. Publishing (advancing
/// `windex`, bumping `size`, waking readers) happens only in `commit()`;
/// dropping without committing leaves the slot untouched.
pub struct FrameWriteGuard<'q> {
    queue: &'q FrameQueue,
    guard: Option<MutexGuard<'q, Inner>>,
    windex: usize,
    frame: Option<Frame>,
}

impl<'q> FrameWriteGuard<'q> {
    pub fn fill(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    pub fn serial(&self) -> Serial {
        self.frame.as_ref().map(|f| f.serial).unwrap_or(Serial::ZERO)
    }

    /// Publishes the filled frame. No-op (frame dropped) if `fill` was never
    /// called.
    pub fn commit(mut self) {
        let Some(frame) = self.frame.take() else { return };
        let mut g = self.guard.take().expect("guard held for lifetime of FrameWriteGuard");
        let windex = self.windex;
        g.queue[windex] = Some(frame);
        g.windex = (g.windex + 1) % self.queue.max_size;
        g.size += 1;
        drop(g);
        self.queue.cv.notify_one();
    }
}

pub type SharedFrameQueue = Arc<FrameQueue>;

#[cfg(test)]
mod tests {
    use super::*;
    use player_core::{Frame, FramePayload, VideoBuffer};
    use std::thread;
    use std::time::Duration;

    fn video_frame(pts: f64, serial: Serial) -> Frame {
        Frame::video(pts, 0.04, 0, serial, VideoBuffer { width: 2, height: 2, sample_aspect_ratio: 1.0, rgba: None })
    }

    fn push(q: &FrameQueue, pts: f64, serial: Serial) {
        let mut w = q.peek_writable().expect("not aborted");
        w.fill(video_frame(pts, serial));
        w.commit();
    }

    #[test]
    fn push_then_peek_readable_sees_frame() {
        let q = FrameQueue::new(3, false);
        push(&q, 1.0, Serial::ZERO);
        assert_eq!(q.size(), 1);
        assert!(q.peek().is_some());
    }

    #[test]
    fn keep_last_retains_shown_frame_with_zero_remaining() {
        let q = FrameQueue::new(3, true);
        push(&q, 1.0, Serial::ZERO);
        q.next();
        assert_eq!(q.nb_remaining(), 0);
        assert!(q.peek_last().is_some());
        assert_eq!(q.peek_last().unwrap().pts, 1.0);
    }

    #[test]
    fn size_never_exceeds_max() {
        let q = Arc::new(FrameQueue::new(2, false));
        push(&q, 1.0, Serial::ZERO);
        push(&q, 2.0, Serial::ZERO);
        assert_eq!(q.size(), 2);

        let q2 = q.clone();
        let handle = thread::spawn(move || {
            push(&q2, 3.0, Serial::ZERO);
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.size(), 2);
        q.next();
        handle.join().unwrap();
        assert_eq!(q.size(), 2);
    }

    #[test]
    fn abort_wakes_blocking_writers_and_readers() {
        let q = Arc::new(FrameQueue::new(1, false));
        push(&q, 1.0, Serial::ZERO);

        let qw = q.clone();
        let writer = thread::spawn(move || qw.peek_writable().is_none());
        thread::sleep(Duration::from_millis(10));
        q.abort();
        assert!(writer.join().unwrap());
    }

    #[test]
    fn prev_clears_rindex_shown_for_forced_redisplay() {
        let q = FrameQueue::new(3, true);
        push(&q, 1.0, Serial::ZERO);
        q.next();
        assert_eq!(q.nb_remaining(), 0);
        let was_shown = q.prev();
        assert!(was_shown);
        assert_eq!(q.nb_remaining(), 1);
    }
}
