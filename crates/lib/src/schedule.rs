//! Update scheduler: frame-coalesced transcript commits with an urgent fast path.
//!
//! Bursts of backend updates are queued and applied in one rebuild per display
//! frame. Interactive prompts (permission requests, tool groups awaiting
//! confirmation) cancel the pending frame and flush synchronously so they are
//! visible without a frame of delay. All of this runs on the UI thread; the
//! only asynchronous boundary is the host's repaint signal.

use crate::compose;
use crate::index::IndexCache;
use crate::message::Message;
use crate::store::TranscriptStore;
use std::collections::VecDeque;
use std::sync::Arc;

/// Identifies one outstanding frame request. The scheduler hands a fresh token
/// to the clock on every request and ignores fired tokens that no longer
/// match, so a cancelled or superseded request can never trigger a flush.
pub type FrameToken = u64;

/// Single-shot "wake me before the next repaint" seam to the host's render
/// loop. The host fires a requested token back into [`Scheduler::on_frame`];
/// after `cancel_frame` it must not fire that token (and a stray fire is
/// harmless, the scheduler drops stale tokens).
pub trait FrameClock {
    fn request_frame(&mut self, token: FrameToken);
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Host-driven clock for embedders whose render loop polls rather than calls
/// back (and for tests): the host takes the due token right before repainting
/// and feeds it to [`Scheduler::on_frame`].
#[derive(Debug, Default)]
pub struct ManualFrameClock {
    due: Option<FrameToken>,
}

impl ManualFrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the outstanding request, if any; cleared on take.
    pub fn take_due(&mut self) -> Option<FrameToken> {
        self.due.take()
    }

    pub fn is_idle(&self) -> bool {
        self.due.is_none()
    }
}

impl FrameClock for ManualFrameClock {
    fn request_frame(&mut self, token: FrameToken) {
        self.due = Some(token);
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        if self.due == Some(token) {
            self.due = None;
        }
    }
}

struct Pending {
    message: Message,
    is_new: bool,
}

type Transform = Box<dyn FnOnce(Vec<Message>) -> Vec<Message>>;

/// Owns the pending queue, the frame request handle, the transcript store,
/// and the index cache for the active conversation view.
pub struct Scheduler<C: FrameClock> {
    clock: C,
    store: TranscriptStore,
    cache: IndexCache,
    pending: VecDeque<Pending>,
    scheduled: Option<FrameToken>,
    next_token: FrameToken,
    before_commit: Vec<Transform>,
}

impl<C: FrameClock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self::with_store(clock, TranscriptStore::new())
    }

    pub fn with_store(clock: C, store: TranscriptStore) -> Self {
        Self {
            clock,
            store,
            cache: IndexCache::new(),
            pending: VecDeque::new(),
            scheduled: None,
            next_token: 1,
            before_commit: Vec::new(),
        }
    }

    pub fn store(&self) -> &TranscriptStore {
        &self.store
    }

    /// Direct store access, e.g. for hydrating when the view opens.
    pub fn store_mut(&mut self) -> &mut TranscriptStore {
        &mut self.store
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Current committed snapshot (shorthand for `store().snapshot()`).
    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        self.store.snapshot()
    }

    /// True while a frame request is outstanding.
    pub fn has_pending_frame(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Queue one update. `is_new` appends directly on flush; otherwise the
    /// update goes through the compose/merge path. Urgent updates (new
    /// permission prompts, or tool groups with an item awaiting confirmation)
    /// cancel any pending frame and flush the whole queue synchronously;
    /// everything else coalesces into at most one flush per frame. Arrival
    /// order is preserved either way.
    pub fn enqueue(&mut self, message: Message, is_new: bool) {
        let urgent =
            is_new && (message.is_permission_prompt() || message.has_confirming_tool());
        self.pending.push_back(Pending { message, is_new });

        if urgent {
            if let Some(token) = self.scheduled.take() {
                self.clock.cancel_frame(token);
            }
            self.flush();
        } else if self.scheduled.is_none() {
            let token = self.next_token;
            self.next_token += 1;
            self.scheduled = Some(token);
            self.clock.request_frame(token);
        }
    }

    /// Host callback when a requested frame arrives. Tokens that are stale or
    /// were cancelled are ignored.
    pub fn on_frame(&mut self, token: FrameToken) {
        if self.scheduled != Some(token) {
            return;
        }
        self.scheduled = None;
        self.flush();
    }

    /// Register a one-shot transform over the working transcript. Transforms
    /// run after the next applied update, in registration order, each exactly
    /// once, then are discarded.
    pub fn before_commit(&mut self, f: impl FnOnce(Vec<Message>) -> Vec<Message> + 'static) {
        self.before_commit.push(Box::new(f));
    }

    /// Drain the queue in FIFO order against a working copy of the committed
    /// snapshot, then commit the result in one atomic replacement. Runs to
    /// completion once started.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let committed = self.store.snapshot();
        let index = self.cache.get_or_build(&committed);
        let mut working: Vec<Message> = (*committed).clone();

        while let Some(item) = self.pending.pop_front() {
            if item.is_new {
                index.note_appended(&item.message, working.len());
                working.push(item.message);
            } else {
                compose::compose_into(item.message, &mut working, index);
            }
            for f in self.before_commit.drain(..) {
                working = f(working);
            }
        }

        log::debug!("flush committed {} entries", working.len());
        self.store.replace(Arc::new(working));
    }
}

impl<C: FrameClock> Drop for Scheduler<C> {
    fn drop(&mut self) {
        // A torn-down view must never leave a wake registered with the host.
        if let Some(token) = self.scheduled.take() {
            self.clock.cancel_frame(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use serde_json::json;

    fn fire_frame(sched: &mut Scheduler<ManualFrameClock>) {
        if let Some(token) = sched.clock_mut().take_due() {
            sched.on_frame(token);
        }
    }

    #[test]
    fn non_urgent_updates_wait_for_the_frame() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(Message::text("a", "Hel"), true);
        sched.enqueue(Message::text("a", "lo"), false);
        assert!(sched.snapshot().is_empty());
        assert!(sched.has_pending_frame());

        fire_frame(&mut sched);
        let snap = sched.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].content["content"], "Hello");
        assert!(!sched.has_pending_frame());
    }

    #[test]
    fn one_frame_request_per_burst() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        for i in 0..5 {
            sched.enqueue(Message::text(format!("m{i}"), "x"), true);
        }
        let first = sched.clock_mut().take_due();
        assert!(first.is_some());
        // No further request was issued while one was outstanding.
        assert!(sched.clock_mut().take_due().is_none());
        sched.on_frame(first.expect("token"));
        assert_eq!(sched.snapshot().len(), 5);
    }

    #[test]
    fn urgent_permission_flushes_synchronously() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        for i in 0..5 {
            sched.enqueue(Message::text(format!("m{i}"), "x"), true);
        }
        sched.enqueue(
            Message::new(MessageKind::AcpPermission, "p1", json!({ "options": [] })),
            true,
        );
        // All six visible, nothing outstanding with the clock or scheduler.
        assert_eq!(sched.snapshot().len(), 6);
        assert!(!sched.has_pending_frame());
        assert!(sched.clock_mut().is_idle());
    }

    #[test]
    fn confirming_tool_group_is_urgent() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(
            Message::new(
                MessageKind::ToolGroup,
                "g1",
                json!([{ "callId": "c1", "status": "Confirming" }]),
            ),
            true,
        );
        assert_eq!(sched.snapshot().len(), 1);
    }

    #[test]
    fn merged_permission_updates_are_not_urgent() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(
            Message::new(MessageKind::AcpPermission, "p1", json!({ "n": 1 })),
            false,
        );
        // Only new entries take the fast path.
        assert!(sched.snapshot().is_empty());
        assert!(sched.has_pending_frame());
    }

    #[test]
    fn cancelled_frame_never_flushes() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(Message::text("a", "x"), true);
        let stale = sched.clock_mut().take_due().expect("token");
        // Urgent enqueue cancels and flushes; the old token is now stale.
        sched.enqueue(
            Message::new(MessageKind::CodexPermission, "p1", json!({})),
            true,
        );
        let len = sched.snapshot().len();
        sched.on_frame(stale);
        assert_eq!(sched.snapshot().len(), len);
    }

    #[test]
    fn same_flush_append_then_update_merges() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(
            Message::new(
                MessageKind::ToolCall,
                "t1",
                json!({ "callId": "c1", "status": "Running" }),
            ),
            true,
        );
        sched.enqueue(
            Message::new(
                MessageKind::ToolCall,
                "",
                json!({ "callId": "c1", "status": "Confirming" }),
            ),
            false,
        );
        fire_frame(&mut sched);
        let snap = sched.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].content["callId"], "c1");
        assert_eq!(snap[0].content["status"], "Confirming");
    }

    #[test]
    fn order_preserved_across_flush_boundaries() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(Message::text("m1", "1"), true);
        sched.enqueue(Message::text("m2", "2"), true);
        fire_frame(&mut sched);
        sched.enqueue(Message::text("m3", "3"), true);
        sched.enqueue(Message::text("m4", "4"), true);
        fire_frame(&mut sched);
        let snap = sched.snapshot();
        let ids: Vec<_> = snap.iter().map(|m| m.msg_id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn before_commit_transforms_run_once_in_order() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.before_commit(|mut list| {
            for m in &mut list {
                m.conversation_id = Some("conv".to_string());
            }
            list
        });
        sched.before_commit(|list| {
            list.into_iter().filter(|m| m.msg_id != "drop-me").collect()
        });
        sched.enqueue(Message::text("first", "x"), true);
        sched.enqueue(Message::text("drop-me", "y"), true);
        fire_frame(&mut sched);
        let snap = sched.snapshot();
        // Both transforms ran (in order) after the first update and were
        // discarded, so the later "drop-me" entry survived untagged.
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].msg_id, "first");
        assert_eq!(snap[0].conversation_id.as_deref(), Some("conv"));
        assert_eq!(snap[1].msg_id, "drop-me");
        assert_eq!(snap[1].conversation_id, None);
    }

    #[test]
    fn readers_keep_the_old_snapshot_across_a_commit() {
        let mut sched = Scheduler::new(ManualFrameClock::new());
        sched.enqueue(Message::text("a", "Hel"), true);
        fire_frame(&mut sched);
        let held = sched.snapshot();
        sched.enqueue(Message::text("a", "lo"), false);
        fire_frame(&mut sched);
        assert_eq!(held[0].content["content"], "Hel");
        assert_eq!(sched.snapshot()[0].content["content"], "Hello");
    }

    #[derive(Clone, Default)]
    struct CountingClock {
        requested: std::rc::Rc<std::cell::Cell<u32>>,
        cancelled: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl FrameClock for CountingClock {
        fn request_frame(&mut self, _token: FrameToken) {
            self.requested.set(self.requested.get() + 1);
        }
        fn cancel_frame(&mut self, _token: FrameToken) {
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }

    #[test]
    fn teardown_cancels_outstanding_frame() {
        let clock = CountingClock::default();
        {
            let mut sched = Scheduler::new(clock.clone());
            sched.enqueue(Message::text("a", "x"), true);
            assert_eq!(clock.requested.get(), 1);
            assert_eq!(clock.cancelled.get(), 0);
        }
        assert_eq!(clock.cancelled.get(), 1);
    }

    #[test]
    fn urgent_enqueue_cancels_the_scheduled_frame() {
        let clock = CountingClock::default();
        let mut sched = Scheduler::new(clock.clone());
        sched.enqueue(Message::text("a", "x"), true);
        sched.enqueue(
            Message::new(MessageKind::AcpPermission, "p", json!({})),
            true,
        );
        assert_eq!(clock.cancelled.get(), 1);
        // Nothing left outstanding, so Drop has nothing to cancel.
        drop(sched);
        assert_eq!(clock.cancelled.get(), 1);
    }
}
