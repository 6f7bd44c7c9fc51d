//! In-process fake host.
//!
//! Runs guest code natively against registered `FakeModule`s. The calling
//! instance's argument buffer is the only addressable memory: a range
//! outside it is a trap, raised as a `Trap` panic payload. Wrap the code
//! under test in [`catch_trap`] to tell traps apart from statuses.
//!
//! The code under test runs as the top-level frame, with the id set by
//! [`FakeHost::set_self_id`] and the whole meter as its limit. A module can
//! cross-call further through the host it is handed, up to the depth limit.
//! Every failed cross-call restores all registered modules and drops the
//! events recorded since it started.

use std::boxed::Box;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::string::String;
use std::vec::Vec;

use switchboard_primitives::points::{points_cost_call, points_cost_emit, points_cost_host_data};
use switchboard_primitives::{
    callee_limit, read_i64, write_i64, ErrorCode, ModuleId, PointsMeter, ARGBUF_LEN,
    DEFAULT_POINT_PASS_PCT, MODULE_ID_BYTES,
};

use crate::buffer::ArgBuf;
use crate::host::HostInterface;

/// Points a fake host grants when none are specified.
pub const DEFAULT_FAKE_POINTS: u64 = 10_000_000;

/// Points a fake entry point costs unless the module says otherwise.
pub const DEFAULT_INVOKE_COST: u64 = 10;

/// Active frames allowed, the top-level one included.
pub const DEFAULT_FAKE_CALL_DEPTH: usize = 64;

/// A fault the real host would turn into a trap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    MemoryAccessOutOfBounds { offset: u64, len: u64 },
    PointsExhausted,
    InvalidResourceName,
    InvalidUtf8,
    ResourceTooLarge { len: usize },
    /// Raised through `panic` with this message.
    Panic(String),
}

impl Trap {
    /// Aborts every frame up to the top level.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MemoryAccessOutOfBounds { .. })
    }
}

fn raise(trap: Trap) -> ! {
    panic::panic_any(trap)
}

/// Run `f`, turning a raised [`Trap`] into `Err`. Other panics propagate.
pub fn catch_trap<R>(f: impl FnOnce() -> R) -> Result<R, Trap> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<Trap>() {
            Ok(trap) => Err(*trap),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// What a fake entry point did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invoke {
    /// Returned normally with this output length.
    Returned(u32),
    NotFound,
    Trapped,
}

/// A module the fake host can dispatch to.
pub trait FakeModule: 'static {
    /// Run `fn_name` with its input in `buf[..arg_len]`. `host` serves the
    /// module's own host calls.
    fn invoke(
        &mut self,
        fn_name: &str,
        buf: &mut ArgBuf,
        arg_len: u32,
        host: &mut dyn HostInterface,
    ) -> Invoke;

    /// Points `fn_name` consumes on top of what its own host calls cost.
    fn points(&self, _fn_name: &str) -> u64 {
        DEFAULT_INVOKE_COST
    }

    /// Copy of the module's state, restored if a call fails.
    fn boxed_clone(&self) -> Box<dyn FakeModule>;
}

/// Counter with the same entry points as the sandbox test counter.
#[derive(Debug, Clone, Default)]
pub struct FakeCounter {
    value: i64,
}

impl FakeCounter {
    pub fn new(value: i64) -> Self {
        Self { value }
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl FakeModule for FakeCounter {
    fn invoke(
        &mut self,
        fn_name: &str,
        buf: &mut ArgBuf,
        arg_len: u32,
        _host: &mut dyn HostInterface,
    ) -> Invoke {
        match fn_name {
            "increment" => {
                self.value += 1;
                Invoke::Returned(0)
            }
            "read_value" => match write_i64(buf.as_bytes_mut(), self.value) {
                Ok(()) => Invoke::Returned(8),
                Err(_) => Invoke::Trapped,
            },
            "set_value" => match buf.prefix(arg_len).and_then(read_i64) {
                Ok(value) => {
                    self.value = value;
                    Invoke::Returned(0)
                }
                Err(_) => Invoke::Trapped,
            },
            "increment_then_trap" => {
                self.value += 1;
                Invoke::Trapped
            }
            "declare_oversize" => Invoke::Returned(ARGBUF_LEN as u32 + 1),
            // never finishes within any limit; see `points`
            "spin" => {
                self.value += 1;
                Invoke::Returned(0)
            }
            _ => Invoke::NotFound,
        }
    }

    fn points(&self, fn_name: &str) -> u64 {
        match fn_name {
            "spin" => u64::MAX,
            _ => DEFAULT_INVOKE_COST,
        }
    }

    fn boxed_clone(&self) -> Box<dyn FakeModule> {
        Box::new(self.clone())
    }
}

struct Slot {
    module: Box<dyn FakeModule>,
    buf: Box<ArgBuf>,
}

struct Frame {
    module: ModuleId,
    limit: u64,
    /// Meter reading when the frame started.
    start: u64,
}

/// Registered module states and the event count, taken before a cross-call.
struct Checkpoint {
    modules: Vec<(ModuleId, Box<dyn FakeModule>)>,
    events: usize,
}

/// One dispatched cross-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    pub module: ModuleId,
    pub fn_name: String,
    pub points_limit: u64,
    pub status: ErrorCode,
}

/// One recorded `emit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeEvent {
    pub module: ModuleId,
    pub topic: String,
    pub data: Vec<u8>,
}

/// In-process `HostInterface`.
pub struct FakeHost {
    modules: BTreeMap<ModuleId, Slot>,
    resources: BTreeMap<String, Vec<u8>>,
    meter: PointsMeter,
    pass_pct: u64,
    max_call_depth: usize,
    self_id: ModuleId,
    /// Cross-calls in progress, outermost first.
    frames: Vec<Frame>,
    calls: Vec<FakeCall>,
    events: Vec<FakeEvent>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::with_points(DEFAULT_FAKE_POINTS)
    }

    pub fn with_points(limit: u64) -> Self {
        Self {
            modules: BTreeMap::new(),
            resources: BTreeMap::new(),
            meter: PointsMeter::new(limit),
            pass_pct: DEFAULT_POINT_PASS_PCT,
            max_call_depth: DEFAULT_FAKE_CALL_DEPTH,
            self_id: ModuleId::uninitialized(),
            frames: Vec::new(),
            calls: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Id reported by `self_id` to the code under test.
    pub fn set_self_id(&mut self, id: ModuleId) {
        self.self_id = id;
    }

    pub fn register(&mut self, id: ModuleId, module: impl FakeModule) {
        self.modules.insert(
            id,
            Slot {
                module: Box::new(module),
                buf: Box::new(ArgBuf::new()),
            },
        );
    }

    pub fn insert_resource(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.resources.insert(name.into(), data);
    }

    pub fn remaining(&self) -> u64 {
        self.meter.remaining()
    }

    pub fn spent(&self) -> u64 {
        self.meter.consumed()
    }

    /// Cross-calls dispatched so far, in order.
    pub fn calls(&self) -> &[FakeCall] {
        &self.calls
    }

    /// Events recorded by calls that did not fail.
    pub fn events(&self) -> &[FakeEvent] {
        &self.events
    }

    fn current_module(&self) -> ModuleId {
        self.frames.last().map_or(self.self_id, |frame| frame.module)
    }

    fn frame_limit(&self) -> u64 {
        self.frames.last().map_or(self.meter.limit(), |frame| frame.limit)
    }

    fn frame_spent(&self) -> u64 {
        let start = self.frames.last().map_or(0, |frame| frame.start);
        self.meter.consumed().saturating_sub(start)
    }

    /// Points the running frame may still spend.
    fn frame_remaining(&self) -> u64 {
        self.frame_limit()
            .saturating_sub(self.frame_spent())
            .min(self.meter.remaining())
    }

    fn charge_or_trap(&mut self, cost: u64) {
        if cost > self.frame_remaining() || self.meter.charge(cost).is_err() {
            raise(Trap::PointsExhausted);
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            modules: self
                .modules
                .iter()
                .map(|(id, slot)| (*id, slot.module.boxed_clone()))
                .collect(),
            events: self.events.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        for (id, module) in checkpoint.modules {
            if let Some(slot) = self.modules.get_mut(&id) {
                slot.module = module;
            }
        }
        self.events.truncate(checkpoint.events);
    }

    fn dispatch(
        &mut self,
        buf: &mut ArgBuf,
        module: &ModuleId,
        fn_name: &[u8],
        arg_len: u32,
        limit: u64,
    ) -> Result<(), ErrorCode> {
        if !self.modules.contains_key(module) {
            // an active module is out of the map while it runs
            return Err(if self.frames.iter().any(|frame| frame.module == *module) {
                ErrorCode::Internal
            } else {
                ErrorCode::ModuleNotFound
            });
        }
        if self.frames.len() + 1 >= self.max_call_depth {
            return Err(ErrorCode::CallDepthExceeded);
        }
        let name = core::str::from_utf8(fn_name).map_err(|_| ErrorCode::FunctionNotFound)?;
        let arg = buf.prefix(arg_len).map_err(|_| ErrorCode::Internal)?;

        let checkpoint = self.checkpoint();
        let Some(mut slot) = self.modules.remove(module) else {
            return Err(ErrorCode::ModuleNotFound);
        };
        slot.buf.as_bytes_mut()[..arg.len()].copy_from_slice(arg);
        let cost = slot.module.points(name);

        self.frames.push(Frame {
            module: *module,
            limit,
            start: self.meter.consumed(),
        });
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            slot.module.invoke(name, &mut slot.buf, arg_len, &mut *self)
        }));
        let nested = self.frame_spent();
        let used = nested.saturating_add(cost);
        self.frames.pop();

        if let Ok(Invoke::Returned(len)) = &invoked {
            let len = (*len as usize).min(ARGBUF_LEN);
            buf.as_bytes_mut()[..len].copy_from_slice(&slot.buf.as_bytes()[..len]);
        }
        self.modules.insert(*module, slot);

        let outcome = match invoked {
            Ok(Invoke::NotFound) => Err(ErrorCode::FunctionNotFound),
            Ok(_) if used > limit => Err(ErrorCode::OutOfPoints),
            Ok(Invoke::Trapped) => Err(ErrorCode::CalleeFailed),
            Ok(Invoke::Returned(len)) if len as usize > ARGBUF_LEN => Err(ErrorCode::ReturnTooLarge),
            Ok(Invoke::Returned(_)) => Ok(()),
            Err(payload) => match payload.downcast::<Trap>() {
                Ok(trap) if trap.is_fatal() => {
                    self.restore(checkpoint);
                    raise(*trap);
                }
                Ok(trap) if *trap == Trap::PointsExhausted => Err(ErrorCode::OutOfPoints),
                Ok(_) => Err(ErrorCode::CalleeFailed),
                Err(other) => panic::resume_unwind(other),
            },
        };

        match outcome {
            Ok(()) => {
                self.charge_or_trap(cost);
                Ok(())
            }
            Err(ErrorCode::FunctionNotFound) => {
                self.restore(checkpoint);
                Err(ErrorCode::FunctionNotFound)
            }
            Err(code) => {
                self.restore(checkpoint);
                // a failed callee costs its whole limit
                let unpaid = limit.saturating_sub(nested);
                self.charge_or_trap(unpaid);
                Err(code)
            }
        }
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostInterface for FakeHost {
    fn call(
        &mut self,
        buf: &mut ArgBuf,
        module: &ModuleId,
        fn_name: &[u8],
        arg_len: u32,
        points_limit: u64,
    ) -> i32 {
        if arg_len as usize > ARGBUF_LEN {
            raise(Trap::MemoryAccessOutOfBounds {
                offset: buf.address() as u64,
                len: arg_len as u64,
            });
        }
        self.charge_or_trap(points_cost_call(arg_len as usize));

        let limit = callee_limit(points_limit, self.frame_remaining(), self.pass_pct);
        let index = self.calls.len();
        self.calls.push(FakeCall {
            module: *module,
            fn_name: String::from_utf8_lossy(fn_name).into_owned(),
            points_limit: limit,
            status: ErrorCode::Internal,
        });

        let status = match self.dispatch(buf, module, fn_name, arg_len, limit) {
            Ok(()) => ErrorCode::Ok,
            Err(code) => code,
        };
        self.calls[index].status = status;
        status.as_i32()
    }

    fn host_data(&mut self, buf: &mut ArgBuf, name_addr: usize, name_len: u32) -> u32 {
        if !buf.contains_range(name_addr, name_len as usize) {
            raise(Trap::MemoryAccessOutOfBounds {
                offset: name_addr as u64,
                len: name_len as u64,
            });
        }
        let start = name_addr - buf.address();
        let name_bytes = &buf.as_bytes()[start..start + name_len as usize];
        let Ok(name) = core::str::from_utf8(name_bytes) else {
            raise(Trap::InvalidResourceName);
        };

        let data = self.resources.get(name).cloned().unwrap_or_default();
        if data.len() > ARGBUF_LEN {
            raise(Trap::ResourceTooLarge { len: data.len() });
        }
        self.charge_or_trap(points_cost_host_data(name_len as usize + data.len()));

        buf.as_bytes_mut()[..data.len()].copy_from_slice(&data);
        data.len() as u32
    }

    fn caller(&mut self, buf: &mut ArgBuf) {
        let caller = match self.frames.len() {
            0 => ModuleId::uninitialized(),
            1 => self.self_id,
            n => self.frames[n - 2].module,
        };
        buf.as_bytes_mut()[..MODULE_ID_BYTES].copy_from_slice(caller.as_bytes());
    }

    fn self_id(&mut self, buf: &mut ArgBuf) {
        let id = self.current_module();
        buf.as_bytes_mut()[..MODULE_ID_BYTES].copy_from_slice(id.as_bytes());
    }

    fn limit(&mut self) -> u64 {
        self.frame_limit()
    }

    fn spent(&mut self) -> u64 {
        self.frame_spent()
    }

    fn emit(&mut self, buf: &mut ArgBuf, topic: &[u8], data_len: u32) {
        let Ok(data) = buf.prefix(data_len) else {
            raise(Trap::MemoryAccessOutOfBounds {
                offset: buf.address() as u64,
                len: data_len as u64,
            });
        };
        let data = data.to_vec();
        let Ok(topic) = core::str::from_utf8(topic) else {
            raise(Trap::InvalidUtf8);
        };
        self.charge_or_trap(points_cost_emit(topic.len() + data.len()));

        let module = self.current_module();
        self.events.push(FakeEvent {
            module,
            topic: topic.into(),
            data,
        });
    }

    fn panic(&mut self, buf: &mut ArgBuf, msg_len: u32) -> ! {
        let Ok(msg) = buf.prefix(msg_len) else {
            raise(Trap::MemoryAccessOutOfBounds {
                offset: buf.address() as u64,
                len: msg_len as u64,
            });
        };
        let Ok(msg) = core::str::from_utf8(msg) else {
            raise(Trap::InvalidUtf8);
        };
        raise(Trap::Panic(msg.into()))
    }
}
