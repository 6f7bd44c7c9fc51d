//! Example guest module.
//!
//! `increment_and_read` bumps a counter module through two cross-calls and
//! returns its new value. `out_of_bounds` hands the host an address outside
//! linear memory and never returns.
//!
//! The entry points are written once over `HostInterface`; on wasm32 the
//! exports bind them to the static buffer `A` and the real imports.

#![cfg_attr(target_arch = "wasm32", no_std)]

use switchboard_guest::{CallError, Guest, HostInterface};
use switchboard_primitives::abi::{Increment, ReadValue, OUT_OF_BOUNDS_ADDR, OUT_OF_BOUNDS_LEN};
use switchboard_primitives::ModuleId;

pub fn increment_and_read<H: HostInterface>(
    guest: &mut Guest<'_, H>,
    counter: ModuleId,
) -> Result<i64, CallError> {
    guest.call::<Increment>(&counter, &())?;
    guest.call::<ReadValue>(&counter, &())
}

pub fn out_of_bounds<H: HostInterface>(guest: &mut Guest<'_, H>, _: ()) -> Result<(), CallError> {
    guest.host_data_at(OUT_OF_BOUNDS_ADDR as usize, OUT_OF_BOUNDS_LEN);
    Ok(())
}

#[cfg(target_arch = "wasm32")]
mod exports {
    use core::ptr::addr_of_mut;

    use switchboard_guest::{trap, ArgBuf, Guest, WasmHost};
    use switchboard_primitives::abi::{IncrementAndRead, OutOfBounds};

    #[no_mangle]
    pub static mut A: ArgBuf = ArgBuf::new();

    fn guest() -> Guest<'static, WasmHost> {
        // SAFETY: a wasm instance is single-threaded and each export builds
        // exactly one `Guest` for the duration of the call.
        Guest::new(unsafe { &mut *addr_of_mut!(A) }, WasmHost)
    }

    #[no_mangle]
    pub extern "C" fn increment_and_read(arg_len: i32) -> i32 {
        match guest().dispatch::<IncrementAndRead, _>(arg_len as u32, super::increment_and_read) {
            Ok(len) => len as i32,
            Err(_) => trap(),
        }
    }

    #[no_mangle]
    pub extern "C" fn out_of_bounds(arg_len: i32) -> i32 {
        match guest().dispatch::<OutOfBounds, _>(arg_len as u32, super::out_of_bounds) {
            Ok(len) => len as i32,
            Err(_) => trap(),
        }
    }

    #[panic_handler]
    fn panic(_: &core::panic::PanicInfo<'_>) -> ! {
        trap()
    }
}
