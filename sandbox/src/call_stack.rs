//! Call stack, call-tree records and events for one top-level invocation.

use switchboard_primitives::{ErrorCode, ModuleId};

/// One active frame: the module executing and the points it was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub module: ModuleId,
    pub points_limit: u64,
}

/// Frames of the invocation currently running, innermost last.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: ModuleId, points_limit: u64) {
        self.frames.push(Frame {
            module,
            points_limit,
        });
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The frame currently executing.
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The frame that issued the current one's cross-call, if any.
    pub fn caller(&self) -> Option<&Frame> {
        self.frames.len().checked_sub(2).and_then(|i| self.frames.get(i))
    }

    /// Number of active frames, top-level call included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// One node of the flattened call tree, in call order.
///
/// The top-level call has depth 0; a cross-call issued from depth `d` is
/// recorded at depth `d + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub depth: usize,
    pub module: ModuleId,
    pub fn_name: String,
    pub points_limit: u64,
    pub points_spent: u64,
    pub status: ErrorCode,
}

/// An event recorded through the `emit` import.
///
/// Events of a failed cross-call are discarded together with its state
/// changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub module: ModuleId,
    pub topic: String,
    pub data: Vec<u8>,
}
