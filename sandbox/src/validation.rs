//! WASM module validation: ABI compatibility checks.
//!
//! Validates that a compiled module can take part in cross-calls before it
//! is deployed. Checks:
//!
//! 1. `memory` export and the i32 global `A` (argument buffer address)
//! 2. Every exported function is an entry point `(i32) -> i32`
//! 3. Imports come only from `env`, each one a known host function with
//!    exactly its ABI signature
//! 4. No WASI imports

use wasmtime::{ExternType, FuncType, Module, ValType};

use switchboard_primitives::types::{
    EXPORT_ARGBUF, EXPORT_MEMORY, HOST_IMPORT_MODULE, IMPORT_CALL, IMPORT_CALLER, IMPORT_EMIT,
    IMPORT_HOST_DATA, IMPORT_LIMIT, IMPORT_PANIC, IMPORT_SELF_ID, IMPORT_SPENT,
};

use crate::error::SandboxError;

fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

fn is_i64(vt: &ValType) -> bool {
    matches!(vt, ValType::I64)
}

type Check = fn(&ValType) -> bool;

/// Entry points take the input length.
const ENTRY_PARAMS: &[Check] = &[is_i32];
/// Entry points return the output length.
const I32_RESULT: &[Check] = &[is_i32];

/// Host imports as `(name, params, results)`.
const HOST_IMPORTS: &[(&str, &[Check], &[Check])] = &[
    (IMPORT_CALL, &[is_i32, is_i32, is_i32, is_i32, is_i64], &[is_i32]),
    (IMPORT_HOST_DATA, &[is_i32, is_i32], &[is_i32]),
    (IMPORT_CALLER, &[], &[]),
    (IMPORT_SELF_ID, &[], &[]),
    (IMPORT_LIMIT, &[], &[is_i64]),
    (IMPORT_SPENT, &[], &[is_i64]),
    (IMPORT_EMIT, &[is_i32, is_i32, is_i32], &[]),
    (IMPORT_PANIC, &[is_i32], &[]),
];

fn signature_matches(ty: &FuncType, params: &[Check], results: &[Check]) -> bool {
    let got_params: Vec<ValType> = ty.params().collect();
    let got_results: Vec<ValType> = ty.results().collect();
    got_params.len() == params.len()
        && got_results.len() == results.len()
        && got_params.iter().zip(params).all(|(vt, check)| check(vt))
        && got_results.iter().zip(results).all(|(vt, check)| check(vt))
}

/// Validate that a WASM module meets the argument-buffer ABI.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == EXPORT_MEMORY && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(SandboxError::ValidationError(format!(
            "module must export '{}'",
            EXPORT_MEMORY
        )));
    }

    let has_argbuf = module.exports().any(|e| {
        e.name() == EXPORT_ARGBUF
            && matches!(e.ty(), ExternType::Global(g) if is_i32(g.content()))
    });
    if !has_argbuf {
        return Err(SandboxError::ValidationError(format!(
            "module must export the i32 global '{}'",
            EXPORT_ARGBUF
        )));
    }

    for export in module.exports() {
        if let ExternType::Func(ft) = export.ty() {
            if !signature_matches(&ft, ENTRY_PARAMS, I32_RESULT) {
                return Err(SandboxError::ValidationError(format!(
                    "export '{}' is not an entry point: expected (i32) -> i32",
                    export.name()
                )));
            }
        }
    }

    Ok(())
}

fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(SandboxError::ValidationError(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != HOST_IMPORT_MODULE {
            return Err(SandboxError::ValidationError(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                HOST_IMPORT_MODULE,
                import.name()
            )));
        }

        let func_ty = match import.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(SandboxError::ValidationError(format!(
                    "non-function import not allowed: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        };

        let Some((_, params, results)) = HOST_IMPORTS
            .iter()
            .find(|(name, _, _)| *name == import.name())
        else {
            return Err(SandboxError::ValidationError(format!(
                "unknown host import: {}::{}",
                module_name,
                import.name()
            )));
        };

        if !signature_matches(&func_ty, params, results) {
            return Err(SandboxError::ValidationError(format!(
                "host import '{}' has the wrong signature",
                import.name()
            )));
        }
    }

    Ok(())
}
