//! Bodies of the `env` host functions.
//!
//! A cross-call runs the callee re-entrantly on the same store. Points are
//! the store's fuel: the caller's remaining fuel is parked while the callee
//! runs under its own limit, and the caller resumes with what is left.
//!
//! Failure classes:
//! - `MemoryFault` or a `HostError` anywhere in the callee's subtree is
//!   re-raised, so it aborts the whole top-level call
//! - fuel exhaustion or `PointsExhausted` becomes `ERR_OUT_OF_POINTS`
//! - a guest panic or any other trap becomes `ERR_CALLEE_FAILED`
//!
//! A failed cross-call restores every module's memory and drops the events
//! recorded since it started.

use anyhow::{anyhow, Result};
use tracing::{debug, trace, warn};
use wasmtime::{Caller, Trap};

use switchboard_hostapi::HostError;
use switchboard_primitives::points::{points_cost_call, points_cost_emit, points_cost_host_data};
use switchboard_primitives::{callee_limit, ErrorCode, ModuleId, ARGBUF_LEN, MODULE_ID_BYTES};

use crate::call_stack::{CallRecord, Event};
use crate::error::{GuestPanic, MemoryFault, PointsExhausted};
use crate::host_impl::{Checkpoint, ModuleSlot, SessionState};
use crate::memory;

/// How a failed guest invocation is reported.
#[derive(Debug)]
pub enum Fault {
    /// Out-of-bounds access through a host primitive. Fatal.
    Memory(MemoryFault),
    /// A host backend failed. Fatal.
    Host(HostError),
    /// The frame ran out of points.
    Points,
    /// The guest called `panic`.
    Panic(String),
    /// Any other trap.
    Trap(String),
}

fn find<T>(err: &anyhow::Error) -> Option<&T>
where
    T: std::error::Error + Send + Sync + 'static,
{
    err.downcast_ref::<T>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<T>()))
}

/// Classify the error returned by a guest invocation.
pub fn classify(err: &anyhow::Error) -> Fault {
    if let Some(fault) = find::<MemoryFault>(err) {
        return Fault::Memory(*fault);
    }
    if let Some(e) = find::<HostError>(err) {
        return Fault::Host(e.clone());
    }
    if find::<PointsExhausted>(err).is_some() || find::<Trap>(err) == Some(&Trap::OutOfFuel) {
        return Fault::Points;
    }
    if let Some(GuestPanic(msg)) = find::<GuestPanic>(err) {
        return Fault::Panic(msg.clone());
    }
    Fault::Trap(format!("{:#}", err))
}

fn fatal(fault: MemoryFault) -> anyhow::Error {
    warn!(
        offset = fault.offset,
        len = fault.len,
        mem_len = fault.mem_len,
        "guest passed an out-of-bounds range to a host primitive"
    );
    anyhow::Error::new(fault)
}

/// Charge the running frame `cost` points, trapping it if it cannot pay.
/// Returns what the frame has left.
fn charge(caller: &mut Caller<'_, SessionState>, cost: u64) -> Result<u64> {
    let remaining = caller.get_fuel()?;
    if remaining < cost {
        return Err(PointsExhausted {
            needed: cost,
            remaining,
        }
        .into());
    }
    let left = remaining - cost;
    caller.set_fuel(left)?;
    Ok(left)
}

/// The calling frame's module and instance handles.
fn current_frame(caller: &Caller<'_, SessionState>) -> Result<(ModuleId, ModuleSlot)> {
    caller
        .data()
        .current_slot()
        .ok_or_else(|| anyhow!("host primitive called outside of a session frame"))
}

/// Check that the running frame's first `len` buffer bytes exist.
fn check_arg(caller: &Caller<'_, SessionState>, slot: &ModuleSlot, len: u32) -> Result<()> {
    let mem_len = slot.memory.data_size(caller);
    if len as usize > ARGBUF_LEN {
        return Err(fatal(MemoryFault {
            offset: slot.argbuf as u64,
            len: len as u64,
            mem_len,
        }));
    }
    memory::validate_range(mem_len, slot.argbuf, len).map_err(fatal)?;
    Ok(())
}

/// Host side of `c`.
///
/// Returns the status for the caller; `Err` traps the caller's frame.
pub fn cross_call(
    mut caller: Caller<'_, SessionState>,
    module_id_ptr: i32,
    fn_name_ptr: i32,
    fn_name_len: i32,
    arg_len: i32,
    points_limit: i64,
) -> Result<i32> {
    let (_, from) = current_frame(&caller)?;
    let arg_len = arg_len as u32;

    // 1. Every range the caller handed us must lie in its memory.
    let (module_id, fn_name) = {
        let data = from.memory.data(&caller);
        let id = memory::read_bytes(data, module_id_ptr as u32, MODULE_ID_BYTES as u32)
            .map_err(fatal)?;
        let name = memory::read_bytes(data, fn_name_ptr as u32, fn_name_len as u32)
            .map_err(fatal)?;
        let id = ModuleId::from_slice(&id)
            .ok_or_else(|| anyhow!("module id is not {} bytes", MODULE_ID_BYTES))?;
        (id, name)
    };
    check_arg(&caller, &from, arg_len)?;

    // 2. The caller pays for the call itself.
    let remaining = charge(&mut caller, points_cost_call(arg_len as usize))?;

    let depth = caller.data().stack.depth();
    let record = caller.data_mut().begin_record(CallRecord {
        depth,
        module: module_id,
        fn_name: String::from_utf8_lossy(&fn_name).into_owned(),
        points_limit: 0,
        points_spent: 0,
        status: ErrorCode::Internal,
    });

    // 3. Resolve the target.
    let Some(target) = caller.data().slot(&module_id) else {
        return reject(&mut caller, record, ErrorCode::ModuleNotFound);
    };
    if depth >= caller.data().config.max_call_depth {
        return reject(&mut caller, record, ErrorCode::CallDepthExceeded);
    }
    let Ok(name) = std::str::from_utf8(&fn_name) else {
        return reject(&mut caller, record, ErrorCode::FunctionNotFound);
    };
    let Ok(func) = target.instance.get_typed_func::<i32, i32>(&mut caller, name) else {
        return reject(&mut caller, record, ErrorCode::FunctionNotFound);
    };

    // 4. Stage the argument and run the callee under its own limit.
    let pass_pct = caller.data().config.point_pass_pct;
    let limit = callee_limit(points_limit as u64, remaining, pass_pct);
    if let Some(r) = caller.data_mut().records.get_mut(record) {
        r.points_limit = limit;
    }
    debug!(module = %module_id, function = name, limit, depth = depth + 1, "dispatching cross-call");

    let checkpoint = Checkpoint::take(&caller);
    let arg = memory::read_bytes(from.memory.data(&caller), from.argbuf, arg_len).map_err(fatal)?;
    memory::write_bytes(target.memory.data_mut(&mut caller), target.argbuf, &arg)
        .map_err(fatal)?;

    caller.data_mut().stack.push(module_id, limit);
    caller.set_fuel(limit)?;
    let result = func.call(&mut caller, arg_len as i32);
    let spent = limit.saturating_sub(caller.get_fuel()?);
    caller.data_mut().stack.pop();

    // 5. Copy the output back, or roll the callee back.
    let outcome = match result {
        Ok(ret_len) if ret_len as u32 as usize > ARGBUF_LEN => Err(ErrorCode::ReturnTooLarge),
        Ok(ret_len) => Ok(ret_len as u32),
        Err(err) => match classify(&err) {
            Fault::Memory(_) | Fault::Host(_) => {
                checkpoint.restore(&mut caller);
                caller.set_fuel(remaining.saturating_sub(limit))?;
                caller.data_mut().finish_record(record, limit, ErrorCode::Internal);
                return Err(err);
            }
            Fault::Points => Err(ErrorCode::OutOfPoints),
            Fault::Panic(msg) => {
                debug!(module = %module_id, function = name, message = %msg, "callee panicked");
                Err(ErrorCode::CalleeFailed)
            }
            Fault::Trap(msg) => {
                debug!(module = %module_id, function = name, error = %msg, "callee trapped");
                Err(ErrorCode::CalleeFailed)
            }
        },
    };

    match outcome {
        Ok(ret_len) => {
            let out = memory::read_bytes(target.memory.data(&caller), target.argbuf, ret_len)
                .map_err(fatal)?;
            memory::write_bytes(from.memory.data_mut(&mut caller), from.argbuf, &out)
                .map_err(fatal)?;
            caller.set_fuel(remaining.saturating_sub(spent))?;
            caller.data_mut().finish_record(record, spent, ErrorCode::Ok);
            Ok(ErrorCode::Ok.as_i32())
        }
        Err(code) => {
            checkpoint.restore(&mut caller);
            // a failed callee costs its whole limit
            caller.set_fuel(remaining.saturating_sub(limit))?;
            caller.data_mut().finish_record(record, limit, code);
            debug!(module = %module_id, function = name, status = %code, "cross-call failed");
            Ok(code.as_i32())
        }
    }
}

/// Close a record for a call that never reached the callee.
fn reject(caller: &mut Caller<'_, SessionState>, record: usize, code: ErrorCode) -> Result<i32> {
    if let Some(r) = caller.data().records.get(record) {
        debug!(module = %r.module, function = %r.fn_name, status = %code, "cross-call rejected");
    }
    caller.data_mut().finish_record(record, 0, code);
    Ok(code.as_i32())
}

/// Host side of `hd`.
///
/// Copies the named resource into the caller's buffer and returns its
/// length. Missing resources are empty.
pub fn host_data(mut caller: Caller<'_, SessionState>, name_ptr: i32, name_len: i32) -> Result<i32> {
    let (_, from) = current_frame(&caller)?;

    let name = memory::read_bytes(from.memory.data(&caller), name_ptr as u32, name_len as u32)
        .map_err(fatal)?;
    let name = String::from_utf8(name).map_err(|_| anyhow!("resource name is not valid UTF-8"))?;

    let data = caller
        .data()
        .resources
        .get(&name)
        .map_err(|e| {
            warn!(resource = %name, error = %e, "resource store failed");
            anyhow::Error::new(e)
        })?
        .unwrap_or_default();
    let max_len = caller.data().config.max_resource_len.min(ARGBUF_LEN);
    if data.len() > max_len {
        return Err(anyhow!(
            "resource '{}' is {} bytes, larger than the {} byte limit",
            name,
            data.len(),
            max_len
        ));
    }

    charge(&mut caller, points_cost_host_data(name.len() + data.len()))?;
    memory::write_bytes(from.memory.data_mut(&mut caller), from.argbuf, &data).map_err(fatal)?;

    trace!(resource = %name, len = data.len(), "served host data");
    Ok(data.len() as i32)
}

/// Write `bytes` to the start of the running frame's buffer.
fn write_own_buffer(caller: &mut Caller<'_, SessionState>, bytes: &[u8]) -> Result<()> {
    let (_, own) = current_frame(caller)?;
    memory::write_bytes(own.memory.data_mut(caller), own.argbuf, bytes).map_err(fatal)?;
    Ok(())
}

/// Host side of `caller`: the id of the module that issued the running
/// frame's cross-call, or the all-zero id at top level.
pub fn caller_id(mut caller: Caller<'_, SessionState>) -> Result<()> {
    let id = caller
        .data()
        .stack
        .caller()
        .map_or(ModuleId::uninitialized(), |frame| frame.module);
    write_own_buffer(&mut caller, id.as_bytes())
}

/// Host side of `self_id`.
pub fn self_id(mut caller: Caller<'_, SessionState>) -> Result<()> {
    let (id, _) = current_frame(&caller)?;
    write_own_buffer(&mut caller, id.as_bytes())
}

fn frame_limit(caller: &Caller<'_, SessionState>) -> Result<u64> {
    caller
        .data()
        .stack
        .current()
        .map(|frame| frame.points_limit)
        .ok_or_else(|| anyhow!("host primitive called outside of a session frame"))
}

/// Host side of `limit`: the points the running frame was granted.
pub fn limit(caller: Caller<'_, SessionState>) -> Result<i64> {
    Ok(frame_limit(&caller)? as i64)
}

/// Host side of `spent`: points the running frame has used so far.
pub fn spent(caller: Caller<'_, SessionState>) -> Result<i64> {
    let granted = frame_limit(&caller)?;
    Ok(granted.saturating_sub(caller.get_fuel()?) as i64)
}

/// Host side of `emit`.
///
/// The topic is read from `[topic_ptr, topic_ptr + topic_len)` and must be
/// UTF-8; the data is the first `data_len` bytes of the caller's buffer.
pub fn emit(
    mut caller: Caller<'_, SessionState>,
    topic_ptr: i32,
    topic_len: i32,
    data_len: i32,
) -> Result<()> {
    let (module, from) = current_frame(&caller)?;
    let data_len = data_len as u32;

    let topic = memory::read_bytes(from.memory.data(&caller), topic_ptr as u32, topic_len as u32)
        .map_err(fatal)?;
    check_arg(&caller, &from, data_len)?;
    let data = memory::read_bytes(from.memory.data(&caller), from.argbuf, data_len).map_err(fatal)?;
    let topic = String::from_utf8(topic).map_err(|_| anyhow!("event topic is not valid UTF-8"))?;

    charge(&mut caller, points_cost_emit(topic.len() + data.len()))?;

    trace!(module = %module, topic = %topic, len = data.len(), "event emitted");
    caller.data_mut().events.push(Event {
        module,
        topic,
        data,
    });
    Ok(())
}

/// Host side of `panic`: abort the running frame with the UTF-8 message in
/// the first `msg_len` bytes of its buffer.
pub fn panic(caller: Caller<'_, SessionState>, msg_len: i32) -> Result<()> {
    let (_, from) = current_frame(&caller)?;
    let msg_len = msg_len as u32;
    check_arg(&caller, &from, msg_len)?;
    let msg = memory::read_bytes(from.memory.data(&caller), from.argbuf, msg_len).map_err(fatal)?;
    let msg = String::from_utf8(msg).map_err(|_| anyhow!("panic message is not valid UTF-8"))?;
    Err(GuestPanic(msg).into())
}
