//! Host function registration via Wasmtime linker.
//!
//! Registers the `env` imports a guest may use:
//!
//! - `c(module_id_ptr, fn_name_ptr, fn_name_len, arg_len, points_limit) -> status`
//! - `hd(name_ptr, name_len) -> len`
//! - `caller()` and `self_id()`, which write a module id to the buffer
//! - `limit() -> i64` and `spent() -> i64`
//! - `emit(topic_ptr, topic_len, data_len)`
//! - `panic(msg_len)`
//!
//! Every guest range is validated before memory is touched. An invalid
//! range traps the calling frame with a `MemoryFault`; declared failures of
//! `c` come back as a non-zero `ErrorCode`.

use wasmtime::{Caller, Linker};

use switchboard_primitives::types::{
    HOST_IMPORT_MODULE, IMPORT_CALL, IMPORT_CALLER, IMPORT_EMIT, IMPORT_HOST_DATA, IMPORT_LIMIT,
    IMPORT_PANIC, IMPORT_SELF_ID, IMPORT_SPENT,
};

use crate::dispatch;
use crate::error::SandboxError;
use crate::host_impl::SessionState;

/// Register all host functions with the linker.
pub fn register_host_functions(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    register_call(linker)?;
    register_host_data(linker)?;
    register_context(linker)?;
    register_emit(linker)?;
    register_panic(linker)?;
    Ok(())
}

fn register_call(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        IMPORT_CALL,
        |caller: Caller<'_, SessionState>,
         module_id_ptr: i32,
         fn_name_ptr: i32,
         fn_name_len: i32,
         arg_len: i32,
         points_limit: i64|
         -> anyhow::Result<i32> {
            dispatch::cross_call(
                caller,
                module_id_ptr,
                fn_name_ptr,
                fn_name_len,
                arg_len,
                points_limit,
            )
        },
    )?;
    Ok(())
}

fn register_host_data(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        IMPORT_HOST_DATA,
        |caller: Caller<'_, SessionState>, name_ptr: i32, name_len: i32| -> anyhow::Result<i32> {
            dispatch::host_data(caller, name_ptr, name_len)
        },
    )?;
    Ok(())
}

/// Frame context: who is running, who called it, and its points.
fn register_context(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    linker.func_wrap(HOST_IMPORT_MODULE, IMPORT_CALLER, dispatch::caller_id)?;
    linker.func_wrap(HOST_IMPORT_MODULE, IMPORT_SELF_ID, dispatch::self_id)?;
    linker.func_wrap(HOST_IMPORT_MODULE, IMPORT_LIMIT, dispatch::limit)?;
    linker.func_wrap(HOST_IMPORT_MODULE, IMPORT_SPENT, dispatch::spent)?;
    Ok(())
}

fn register_emit(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        IMPORT_EMIT,
        |caller: Caller<'_, SessionState>,
         topic_ptr: i32,
         topic_len: i32,
         data_len: i32|
         -> anyhow::Result<()> { dispatch::emit(caller, topic_ptr, topic_len, data_len) },
    )?;
    Ok(())
}

fn register_panic(linker: &mut Linker<SessionState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_IMPORT_MODULE,
        IMPORT_PANIC,
        |caller: Caller<'_, SessionState>, msg_len: i32| -> anyhow::Result<()> {
            dispatch::panic(caller, msg_len)
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, Module};

    #[test]
    fn test_registered_imports_satisfy_a_guest() {
        let engine = Engine::default();
        let mut linker = Linker::new(&engine);
        register_host_functions(&mut linker).unwrap();

        let module = Module::new(
            &engine,
            r#"
            (module
                (import "env" "c" (func (param i32 i32 i32 i32 i64) (result i32)))
                (import "env" "hd" (func (param i32 i32) (result i32)))
                (import "env" "caller" (func))
                (import "env" "self_id" (func))
                (import "env" "limit" (func (result i64)))
                (import "env" "spent" (func (result i64)))
                (import "env" "emit" (func (param i32 i32 i32)))
                (import "env" "panic" (func (param i32)))
                (memory (export "memory") 2)
                (global (export "A") i32 (i32.const 65536))
            )
        "#,
        )
        .unwrap();

        // resolves every import against the registered definitions
        linker.instantiate_pre(&module).unwrap();
    }

    #[test]
    fn test_mismatched_import_is_unresolved() {
        let engine = Engine::default();
        let mut linker = Linker::new(&engine);
        register_host_functions(&mut linker).unwrap();

        let module = Module::new(
            &engine,
            r#"
            (module
                (import "env" "hd" (func (param i32) (result i32)))
                (memory (export "memory") 1)
            )
        "#,
        )
        .unwrap();
        assert!(linker.instantiate_pre(&module).is_err());
    }
}
