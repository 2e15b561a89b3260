use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::SessionID;

/// Asks the host to call `TimelineEngine::on_frame` once more, on its next display frame. Each
/// request is good for exactly one call; nothing repeats on its own.
pub trait FrameScheduler {
    fn request_frame(&mut self, session: SessionID);
}

/// Requested frames wait here until the host drains them, once per display frame. Clones share
/// the same queue.
#[derive(Clone, Default)]
pub struct FrameQueue {
    pending: Rc<RefCell<VecDeque<SessionID>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything requested so far. Frames requested while servicing these wait for the next
    /// call.
    pub fn take_pending(&self) -> Vec<SessionID> {
        self.pending.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self, session: SessionID) {
        self.pending.borrow_mut().push_back(session);
    }
}
