//! The per-call instance wrapper.
//!
//! `Guest` owns the two capabilities an entry point needs: its argument
//! buffer and a host. Helper code only ever reaches the buffer through it.

use core::fmt;

use switchboard_primitives::{
    AbiError, ArgReader, Decode, Encode, EntryPoint, ErrorCode, ModuleId, ARGBUF_LEN,
};

use crate::buffer::ArgBuf;
use crate::host::HostInterface;

/// Failure of a cross-call or of the buffer encoding around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    /// The host returned a non-zero status.
    Status(ErrorCode),
    Abi(AbiError),
}

impl From<AbiError> for CallError {
    fn from(e: AbiError) -> Self {
        Self::Abi(e)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "cross-call failed: {}", code),
            Self::Abi(e) => write!(f, "argument buffer: {}", e),
        }
    }
}

fn check_status(code: i32) -> Result<(), CallError> {
    match code {
        0 => Ok(()),
        other => Err(CallError::Status(
            ErrorCode::from_i32(other).unwrap_or(ErrorCode::Internal),
        )),
    }
}

pub struct Guest<'a, H> {
    buf: &'a mut ArgBuf,
    host: H,
}

impl<'a, H: HostInterface> Guest<'a, H> {
    pub fn new(buf: &'a mut ArgBuf, host: H) -> Self {
        Self { buf, host }
    }

    pub fn buf(&self) -> &ArgBuf {
        &*self.buf
    }

    pub fn buf_mut(&mut self) -> &mut ArgBuf {
        &mut *self.buf
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Cross-call with raw input bytes. On success the callee's output is
    /// at the start of [`buf`](Self::buf).
    pub fn call_raw(
        &mut self,
        module: &ModuleId,
        fn_name: &str,
        arg: &[u8],
        points_limit: u64,
    ) -> Result<(), CallError> {
        let arg_len = self.buf.stage(arg)?;
        let code = self
            .host
            .call(self.buf, module, fn_name.as_bytes(), arg_len, points_limit);
        check_status(code)
    }

    /// Cross-call `E` under the default budget.
    pub fn call<E: EntryPoint>(&mut self, module: &ModuleId, arg: &E::Arg) -> Result<E::Ret, CallError> {
        self.call_with_limit::<E>(module, arg, 0)
    }

    /// Cross-call `E` with an explicit points limit (`0` inherits).
    pub fn call_with_limit<E: EntryPoint>(
        &mut self,
        module: &ModuleId,
        arg: &E::Arg,
        points_limit: u64,
    ) -> Result<E::Ret, CallError> {
        let arg_len = self.buf.encode(arg)?;
        let code = self
            .host
            .call(self.buf, module, E::NAME.as_bytes(), arg_len, points_limit);
        check_status(code)?;
        // the output length is fixed by the signature, not reported
        Ok(E::Ret::decode(&mut ArgReader::new(self.buf.as_bytes()))?)
    }

    /// Fetch a named host resource. The name is staged in the buffer and
    /// then overwritten by the data.
    pub fn host_data(&mut self, name: &str) -> Result<&[u8], CallError> {
        let name_len = self.buf.stage(name.as_bytes())?;
        let addr = self.buf.address();
        let len = self.host.host_data(self.buf, addr, name_len);
        Ok(self.buf.prefix(len)?)
    }

    /// Hand the host an arbitrary range to resolve as a resource name.
    /// Returns only if the range is valid.
    pub fn host_data_at(&mut self, addr: usize, len: u32) -> u32 {
        self.host.host_data(self.buf, addr, len)
    }

    /// The module that cross-called this one, or `None` at top level.
    pub fn caller(&mut self) -> Option<ModuleId> {
        self.host.caller(self.buf);
        let id = self.buf.read_module_id();
        (!id.is_uninitialized()).then_some(id)
    }

    pub fn self_id(&mut self) -> ModuleId {
        self.host.self_id(self.buf);
        self.buf.read_module_id()
    }

    /// Points limit of this call.
    pub fn limit(&mut self) -> u64 {
        self.host.limit()
    }

    pub fn spent(&mut self) -> u64 {
        self.host.spent()
    }

    /// Record an event. Overwrites the buffer.
    pub fn emit(&mut self, topic: &str, data: &[u8]) -> Result<(), CallError> {
        let data_len = self.buf.stage(data)?;
        self.host.emit(self.buf, topic.as_bytes(), data_len);
        Ok(())
    }

    /// Record an event with an encoded payload.
    pub fn emit_event<T: Encode>(&mut self, topic: &str, data: &T) -> Result<(), CallError> {
        let data_len = self.buf.encode(data)?;
        self.host.emit(self.buf, topic.as_bytes(), data_len);
        Ok(())
    }

    /// Abort this call with `msg`, cut to what fits the buffer.
    pub fn panic(&mut self, msg: &str) -> ! {
        let mut end = msg.len().min(ARGBUF_LEN);
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        let msg_len = self.buf.stage(&msg.as_bytes()[..end]).unwrap_or(0);
        self.host.panic(self.buf, msg_len)
    }

    /// Run an entry point: decode its input from the first `arg_len` bytes,
    /// call `f`, stage the result. Returns the output length.
    pub fn dispatch<E, F>(&mut self, arg_len: u32, f: F) -> Result<u32, CallError>
    where
        E: EntryPoint,
        F: FnOnce(&mut Self, E::Arg) -> Result<E::Ret, CallError>,
    {
        let arg = self.buf.decode::<E::Arg>(arg_len)?;
        let ret = f(self, arg)?;
        Ok(self.buf.encode(&ret)?)
    }
}
