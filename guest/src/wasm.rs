//! Bridge to the `env` imports on wasm32.

use switchboard_primitives::ModuleId;

use crate::buffer::ArgBuf;
use crate::host::HostInterface;

#[link(wasm_import_module = "env")]
extern "C" {
    /// Cross-call. Input and output travel through the caller's `A` buffer.
    fn c(
        module_id_ptr: *const u8,
        fn_name_ptr: *const u8,
        fn_name_len: u32,
        arg_len: u32,
        points_limit: u64,
    ) -> i32;

    /// Resource lookup; traps on a range outside linear memory.
    fn hd(name_ptr: *const u8, name_len: u32) -> u32;

    // These write into, or read from, the `A` buffer.
    fn caller();
    fn self_id();
    fn limit() -> u64;
    fn spent() -> u64;
    fn emit(topic_ptr: *const u8, topic_len: u32, data_len: u32);
    fn panic(msg_len: u32) -> !;
}

/// `HostInterface` over the real host functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmHost;

impl HostInterface for WasmHost {
    fn call(
        &mut self,
        _buf: &mut ArgBuf,
        module: &ModuleId,
        fn_name: &[u8],
        arg_len: u32,
        points_limit: u64,
    ) -> i32 {
        // SAFETY: both pointers address live guest memory for the call's
        // duration; the host bounds-checks them against linear memory.
        unsafe {
            c(
                module.as_bytes().as_ptr(),
                fn_name.as_ptr(),
                fn_name.len() as u32,
                arg_len,
                points_limit,
            )
        }
    }

    fn host_data(&mut self, _buf: &mut ArgBuf, name_addr: usize, name_len: u32) -> u32 {
        // SAFETY: the host validates the range before reading it.
        unsafe { hd(name_addr as *const u8, name_len) }
    }

    fn caller(&mut self, _buf: &mut ArgBuf) {
        // SAFETY: takes no arguments; the host writes 32 bytes into `A`.
        unsafe { caller() }
    }

    fn self_id(&mut self, _buf: &mut ArgBuf) {
        // SAFETY: as for `caller`.
        unsafe { self_id() }
    }

    fn limit(&mut self) -> u64 {
        // SAFETY: reads host state only.
        unsafe { limit() }
    }

    fn spent(&mut self) -> u64 {
        // SAFETY: reads host state only.
        unsafe { spent() }
    }

    fn emit(&mut self, _buf: &mut ArgBuf, topic: &[u8], data_len: u32) {
        // SAFETY: `topic` is live guest memory; the host bounds-checks it
        // and `data_len`.
        unsafe { emit(topic.as_ptr(), topic.len() as u32, data_len) }
    }

    fn panic(&mut self, _buf: &mut ArgBuf, msg_len: u32) -> ! {
        // SAFETY: the host bounds-checks `msg_len` and never returns.
        unsafe { panic(msg_len) }
    }
}

/// Abort the current entry point.
pub fn trap() -> ! {
    core::arch::wasm32::unreachable()
}
