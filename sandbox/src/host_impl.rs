//! Per-session mutable state held in the Wasmtime Store.
//!
//! `SessionState` combines the deployed instances, the call stack of the
//! running invocation, the resource store behind `hd`, and the memory
//! limiter into a single struct that lives inside `Store<SessionState>` for
//! the life of a session. A `Checkpoint` captures everything a failed call
//! must leave untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;
use wasmtime::{AsContext, AsContextMut, Instance, Memory, StoreLimits};

use switchboard_hostapi::{ExecutionConfig, ResourceStore};
use switchboard_primitives::{ErrorCode, ModuleId};

use crate::call_stack::{CallRecord, CallStack, Event};
use crate::memory;

/// Handles to one deployed instance.
///
/// All three are plain indices into the owning store and are `Copy`.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSlot {
    pub instance: Instance,
    pub memory: Memory,
    /// Address of the instance's argument buffer (value of its `A` export).
    pub argbuf: u32,
}

/// Session state held in the Wasmtime `Store`.
pub struct SessionState {
    /// Deployed instances by id.
    pub modules: BTreeMap<ModuleId, ModuleSlot>,
    /// Frames of the invocation currently running.
    pub stack: CallStack,
    /// Call tree of the current (or last) top-level invocation.
    pub records: Vec<CallRecord>,
    /// Events emitted by the current (or last) top-level invocation.
    pub events: Vec<Event>,
    /// Named resources served by `hd`.
    pub resources: Arc<dyn ResourceStore>,
    /// Points and call-depth limits.
    pub config: ExecutionConfig,
    /// Linear memory limits.
    pub limits: StoreLimits,
}

impl SessionState {
    pub fn new(
        resources: Arc<dyn ResourceStore>,
        config: ExecutionConfig,
        limits: StoreLimits,
    ) -> Self {
        Self {
            modules: BTreeMap::new(),
            stack: CallStack::new(),
            records: Vec::new(),
            events: Vec::new(),
            resources,
            config,
            limits,
        }
    }

    pub fn slot(&self, id: &ModuleId) -> Option<ModuleSlot> {
        self.modules.get(id).copied()
    }

    /// The instance of the frame currently executing.
    pub fn current_slot(&self) -> Option<(ModuleId, ModuleSlot)> {
        let frame = self.stack.current()?;
        self.slot(&frame.module).map(|slot| (frame.module, slot))
    }

    /// Append a record, returning its index for later completion.
    pub fn begin_record(&mut self, record: CallRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn finish_record(&mut self, index: usize, points_spent: u64, status: ErrorCode) {
        if let Some(record) = self.records.get_mut(index) {
            record.points_spent = points_spent;
            record.status = status;
        }
    }
}

/// Linear memory of every deployed module plus the event count, taken
/// before a call runs.
///
/// Any module may be reached from a call's subtree, so a failed call rolls
/// all of them back, not just the module it targeted.
pub struct Checkpoint {
    memories: Vec<(Memory, Vec<u8>)>,
    events: usize,
}

impl Checkpoint {
    pub fn take(store: &impl AsContext<Data = SessionState>) -> Self {
        let store = store.as_context();
        let memories = store
            .data()
            .modules
            .values()
            .map(|slot| (slot.memory, slot.memory.data(&store).to_vec()))
            .collect();
        Self {
            memories,
            events: store.data().events.len(),
        }
    }

    pub fn restore(self, store: &mut impl AsContextMut<Data = SessionState>) {
        let mut store = store.as_context_mut();
        trace!(modules = self.memories.len(), "restoring checkpoint");
        for (mem, bytes) in &self.memories {
            memory::restore(mem.data_mut(&mut store), bytes);
        }
        store.data_mut().events.truncate(self.events);
    }
}
