//! Single-slot frame ingest with supersession.
//!
//! Both transports write into one pending slot. A write always replaces
//! whatever is waiting there, so memory stays bounded and the renderer
//! only ever sees the freshest frame. Under sustained overload frames are
//! dropped; that is the intended policy.
//!
//! Wake-ups are coalesced: the first write after the render loop took the
//! slot schedules one wake-up, later writes only replace the frame.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::stream::types::Frame;

/// A frame waiting for the render loop, tagged with its ingest id.
#[derive(Debug)]
pub struct PendingFrame {
    pub id: u64,
    pub frame: Frame,
}

#[derive(Debug, Default)]
struct SlotState {
    pending: Option<PendingFrame>,
    /// Id of the newest frame ever written. Monotonic.
    latest_id: u64,
    /// A wake-up has been issued and not yet consumed by [`FrameSlot::take`].
    scheduled: bool,
    /// Frames replaced before the render loop got to them.
    dropped: u64,
}

/// Last-writer-wins frame slot.
#[derive(Debug, Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    wake: Notify,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the pending frame and return its id.
    ///
    /// Replaces any frame still waiting. Issues a wake-up only if none is
    /// outstanding.
    pub fn submit(&self, frame: Frame) -> u64 {
        let (id, wake) = {
            let mut st = self.state.lock();
            st.latest_id += 1;
            let id = st.latest_id;
            if let Some(old) = st.pending.replace(PendingFrame { id, frame }) {
                st.dropped += 1;
                trace!(superseded = old.id, by = id, "pending frame replaced");
            }
            let wake = !st.scheduled;
            st.scheduled = true;
            (id, wake)
        };
        if wake {
            self.wake.notify_one();
        }
        id
    }

    /// Wait until a wake-up has been issued.
    ///
    /// A wake-up issued while nobody waits is remembered, so none is lost.
    pub async fn scheduled(&self) {
        self.wake.notified().await
    }

    /// Take the pending frame and clear the scheduled flag.
    pub fn take(&self) -> Option<PendingFrame> {
        let mut st = self.state.lock();
        st.scheduled = false;
        st.pending.take()
    }

    /// Whether a strictly newer frame than `id` has been written.
    pub fn is_superseded(&self, id: u64) -> bool {
        self.state.lock().latest_id > id
    }

    pub fn latest_id(&self) -> u64 {
        self.state.lock().latest_id
    }

    /// Frames replaced in the slot before being taken.
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready, task};

    fn frame(tag: &'static [u8]) -> Frame {
        Frame::binary(Bytes::from_static(tag))
    }

    #[test]
    fn ids_are_monotonic() {
        let slot = FrameSlot::new();
        assert_eq!(slot.submit(frame(b"a")), 1);
        assert_eq!(slot.submit(frame(b"b")), 2);
        assert_eq!(slot.latest_id(), 2);
    }

    #[test]
    fn last_writer_wins() {
        let slot = FrameSlot::new();
        slot.submit(frame(b"a"));
        slot.submit(frame(b"b"));
        slot.submit(frame(b"c"));
        let p = slot.take().unwrap();
        assert_eq!(p.id, 3);
        assert_eq!(&p.frame.bytes[..], b"c");
        assert_eq!(slot.dropped(), 2);
        assert!(slot.take().is_none());
    }

    #[test]
    fn supersession_check() {
        let slot = FrameSlot::new();
        let first = slot.submit(frame(b"a"));
        let taken = slot.take().unwrap();
        assert_eq!(taken.id, first);
        assert!(!slot.is_superseded(first));
        slot.submit(frame(b"b"));
        assert!(slot.is_superseded(first));
    }

    #[test]
    fn wakeups_are_coalesced() {
        let slot = FrameSlot::new();
        slot.submit(frame(b"a"));
        slot.submit(frame(b"b"));

        // One stored wake-up for two writes.
        let mut first = task::spawn(slot.scheduled());
        assert_ready!(first.poll());
        let mut second = task::spawn(slot.scheduled());
        assert_pending!(second.poll());

        // Still scheduled: another write must not wake again.
        slot.submit(frame(b"c"));
        assert!(!second.is_woken());

        // After taking, the next write schedules a fresh wake-up.
        slot.take();
        slot.submit(frame(b"d"));
        assert!(second.is_woken());
        assert_ready!(second.poll());
    }
}
