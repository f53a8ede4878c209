use std::fmt;
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::debug;

use super::{LogicAction, LoopHandler};
use crate::time::frame_duration;

/// Maximum nesting of loop frames.
pub const FRAME_STACK_CAPACITY: usize = 32;

/// Identifies one entered loop frame.
///
/// `generation` is unique per `enter`, so a frame that was left and replaced
/// by another one at the same depth never compares equal to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    pub depth: usize,
    pub generation: u64,
}

/// Runs once after its frame is popped; the stack already has the new top.
pub type LeaveHook = Box<dyn FnOnce(&mut FrameStack)>;

struct Slot {
    // `None` while the handler is running.
    handler: Option<Box<dyn LoopHandler>>,
    on_leave: Option<LeaveHook>,
    target: Duration,
    last_action: LogicAction,
    generation: u64,
}

/// The nested loop-frame stack.
///
/// Confined to the thread that created it.
pub struct FrameStack {
    slots: Vec<Slot>,
    next_generation: u64,
    owner: ThreadId,
}

impl Default for FrameStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStack")
            .field("depth", &self.slots.len())
            .field("top", &self.top())
            .finish()
    }
}

impl FrameStack {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(FRAME_STACK_CAPACITY),
            next_generation: 1,
            owner: thread::current().id(),
        }
    }

    #[inline]
    fn assert_owner(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "loop frame stack used off its owning thread"
        );
    }

    /// Push a new frame running at `target_fps` logic steps per second.
    pub fn enter(&mut self, handler: Box<dyn LoopHandler>, target_fps: u32) -> FrameId {
        self.push(handler, None, target_fps)
    }

    /// Like [`enter`](Self::enter), with `on_leave` run when the frame is left.
    pub fn enter_with_leave(
        &mut self,
        handler: Box<dyn LoopHandler>,
        target_fps: u32,
        on_leave: impl FnOnce(&mut FrameStack) + 'static,
    ) -> FrameId {
        self.push(handler, Some(Box::new(on_leave)), target_fps)
    }

    fn push(
        &mut self,
        handler: Box<dyn LoopHandler>,
        on_leave: Option<LeaveHook>,
        target_fps: u32,
    ) -> FrameId {
        self.assert_owner();
        assert!(
            self.slots.len() < FRAME_STACK_CAPACITY,
            "loop frame stack overflow ({FRAME_STACK_CAPACITY} frames)"
        );

        let generation = self.next_generation;
        self.next_generation += 1;

        self.slots.push(Slot {
            handler: Some(handler),
            on_leave,
            target: frame_duration(target_fps),
            last_action: LogicAction::Wait,
            generation,
        });

        let id = FrameId {
            depth: self.slots.len() - 1,
            generation,
        };
        debug!("eventloop: enter depth={} fps={target_fps}", id.depth);
        id
    }

    /// Pop the top frame, then run its `on_leave`.
    ///
    /// This holds even when the frame leaves itself from its own logic step:
    /// the hook runs before `leave()` returns.
    pub fn leave(&mut self) {
        self.assert_owner();
        let slot = self
            .slots
            .pop()
            .unwrap_or_else(|| panic!("loop frame stack underflow: leave() on empty stack"));

        debug!("eventloop: leave depth={}", self.slots.len());

        if let Some(on_leave) = slot.on_leave {
            on_leave(self);
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn top(&self) -> Option<FrameId> {
        self.slots.last().map(|s| FrameId {
            depth: self.slots.len() - 1,
            generation: s.generation,
        })
    }

    #[inline]
    pub fn is_top(&self, id: FrameId) -> bool {
        self.top() == Some(id)
    }

    fn slot(&self, id: FrameId) -> Option<&Slot> {
        self.slots.get(id.depth).filter(|s| s.generation == id.generation)
    }

    fn slot_mut(&mut self, id: FrameId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.depth)
            .filter(|s| s.generation == id.generation)
    }

    /// Frame duration of a live frame.
    pub fn target(&self, id: FrameId) -> Duration {
        self.slot(id)
            .map(|s| s.target)
            .unwrap_or_else(|| panic!("stale loop frame {id:?}"))
    }

    /// Action recorded by the frame's most recent logic step.
    pub fn last_action(&self, id: FrameId) -> Option<LogicAction> {
        self.slot(id).map(|s| s.last_action)
    }

    pub(super) fn set_last_action(&mut self, id: FrameId, action: LogicAction) {
        if let Some(s) = self.slot_mut(id) {
            s.last_action = action;
        }
    }

    pub(super) fn take_handler(&mut self, id: FrameId) -> Box<dyn LoopHandler> {
        self.slot_mut(id)
            .unwrap_or_else(|| panic!("stale loop frame {id:?}"))
            .handler
            .take()
            .unwrap_or_else(|| panic!("loop frame {id:?} re-entered while running"))
    }

    /// Put a handler back after its step. Returns `false`, dropping the
    /// handler, if its frame was left in the meantime.
    pub(super) fn restore_handler(&mut self, id: FrameId, handler: Box<dyn LoopHandler>) -> bool {
        match self.slot_mut(id) {
            Some(s) => {
                s.handler = Some(handler);
                true
            }
            None => false,
        }
    }
}
