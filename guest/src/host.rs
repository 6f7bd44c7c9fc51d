//! The host operations a guest can perform.

use switchboard_primitives::ModuleId;

use crate::buffer::ArgBuf;

/// Capability over the host functions.
///
/// `buf` is the calling instance's own argument buffer. The wasm bridge
/// ignores it (the host already knows where the buffer lives); in-process
/// fakes read and write through it.
pub trait HostInterface {
    /// Cross-call `fn_name` on `module` with `buf[..arg_len]` as input.
    ///
    /// Returns `0` with the callee's output in `buf`, or a non-zero
    /// `ErrorCode` after which `buf` must not be trusted.
    fn call(
        &mut self,
        buf: &mut ArgBuf,
        module: &ModuleId,
        fn_name: &[u8],
        arg_len: u32,
        points_limit: u64,
    ) -> i32;

    /// Copy the resource named by `[name_addr, name_addr + name_len)` into
    /// `buf`, returning its length. An invalid range never returns.
    fn host_data(&mut self, buf: &mut ArgBuf, name_addr: usize, name_len: u32) -> u32;

    /// Write the id of the module that cross-called this one to the start
    /// of `buf`; all zeros for a top-level call.
    fn caller(&mut self, buf: &mut ArgBuf);

    /// Write this instance's own id to the start of `buf`.
    fn self_id(&mut self, buf: &mut ArgBuf);

    /// Points limit of the running call.
    fn limit(&mut self) -> u64;

    /// Points the running call has used so far.
    fn spent(&mut self) -> u64;

    /// Record an event with `buf[..data_len]` as its data. Dropped if the
    /// call, or any call above it, fails.
    fn emit(&mut self, buf: &mut ArgBuf, topic: &[u8], data_len: u32);

    /// Abort the running call with the UTF-8 message in `buf[..msg_len]`.
    fn panic(&mut self, buf: &mut ArgBuf, msg_len: u32) -> !;
}

impl<H: HostInterface + ?Sized> HostInterface for &mut H {
    fn call(
        &mut self,
        buf: &mut ArgBuf,
        module: &ModuleId,
        fn_name: &[u8],
        arg_len: u32,
        points_limit: u64,
    ) -> i32 {
        (**self).call(buf, module, fn_name, arg_len, points_limit)
    }

    fn host_data(&mut self, buf: &mut ArgBuf, name_addr: usize, name_len: u32) -> u32 {
        (**self).host_data(buf, name_addr, name_len)
    }

    fn caller(&mut self, buf: &mut ArgBuf) {
        (**self).caller(buf)
    }

    fn self_id(&mut self, buf: &mut ArgBuf) {
        (**self).self_id(buf)
    }

    fn limit(&mut self) -> u64 {
        (**self).limit()
    }

    fn spent(&mut self) -> u64 {
        (**self).spent()
    }

    fn emit(&mut self, buf: &mut ArgBuf, topic: &[u8], data_len: u32) {
        (**self).emit(buf, topic, data_len)
    }

    fn panic(&mut self, buf: &mut ArgBuf, msg_len: u32) -> ! {
        (**self).panic(buf, msg_len)
    }
}
