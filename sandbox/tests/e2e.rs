//! End-to-end tests for the cross-call pipeline:
//! host → caller entry point → `c` → callee entry point → back up the stack.

mod common;

use switchboard_primitives::abi::{IncrementAndRead, ReadValue};
use switchboard_primitives::{ErrorCode, ModuleId};
use switchboard_sandbox::SandboxError;

use common::*;

// ── Test: increment_and_read on a preloaded counter ──

#[test]
fn test_increment_and_read_returns_next_value() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);
    set_counter(&mut session, &counter, 41);

    let receipt = session
        .call_raw(&caller, "increment_and_read", counter.as_bytes(), 0)
        .unwrap();

    assert_eq!(receipt.data.len(), 8);
    assert_eq!(i64::from_le_bytes(receipt.data[..8].try_into().unwrap()), 42);
    assert_eq!(read_counter(&mut session, &counter), 42);
}

// ── Test: counter state persists across top-level calls ──

#[test]
fn test_repeated_calls_keep_counting() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);

    for expected in 1..=3 {
        let value = session.call::<IncrementAndRead>(&caller, &counter, 0).unwrap();
        assert_eq!(value, expected);
    }
    assert_eq!(session.call::<ReadValue>(&counter, &(), 0).unwrap(), 3);
}

// ── Test: call tree is recorded ──

#[test]
fn test_receipt_records_call_tree() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);

    let receipt = session
        .call_raw(&caller, "increment_and_read", counter.as_bytes(), 0)
        .unwrap();

    let calls = &receipt.calls;
    assert_eq!(calls.len(), 3);

    assert_eq!(calls[0].depth, 0);
    assert_eq!(calls[0].module, caller);
    assert_eq!(calls[0].fn_name, "increment_and_read");

    assert_eq!(calls[1].depth, 1);
    assert_eq!(calls[1].module, counter);
    assert_eq!(calls[1].fn_name, "increment");
    assert_eq!(calls[1].status, ErrorCode::Ok);

    assert_eq!(calls[2].fn_name, "read_value");
    assert_eq!(calls[2].status, ErrorCode::Ok);

    // callees are paid out of the top-level budget
    assert!(calls[1].points_spent + calls[2].points_spent < receipt.points_spent);
}

// ── Test: unknown target is a status, host keeps running ──

#[test]
fn test_unknown_module_is_a_status() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);
    let nobody = ModuleId::from_bytes([0xAB; 32]);

    let (status, _) = call_fn(&mut session, &caller, &nobody, b"read_value", 0);
    assert_eq!(status, ErrorCode::ModuleNotFound.as_i32());

    // the session is still usable
    let value = session.call::<IncrementAndRead>(&caller, &counter, 0).unwrap();
    assert_eq!(value, 1);
}

// ── Test: unknown function names ──

#[test]
fn test_unknown_function_is_a_status() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);

    let (status, _) = call_fn(&mut session, &caller, &counter, b"does_not_exist", 0);
    assert_eq!(status, ErrorCode::FunctionNotFound.as_i32());

    let (status, _) = call_fn(&mut session, &caller, &counter, &[0xff, 0xfe], 0);
    assert_eq!(status, ErrorCode::FunctionNotFound.as_i32());
}

// ── Test: successful cross-call output lands in the caller's buffer ──

#[test]
fn test_call_fn_returns_callee_output() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);
    set_counter(&mut session, &counter, -7);

    let (status, output) = call_fn(&mut session, &caller, &counter, b"read_value", 0);
    assert_eq!(status, 0);
    assert_eq!(i64::from_le_bytes(output.unwrap()), -7);
}

// ── Test: oversized declared return ──

#[test]
fn test_return_too_large_is_rejected() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);

    let (status, _) = call_fn(&mut session, &caller, &counter, b"declare_oversize", 0);
    assert_eq!(status, ErrorCode::ReturnTooLarge.as_i32());

    let err = session
        .call_raw(&counter, "declare_oversize", &[], 0)
        .unwrap_err();
    assert!(matches!(err, SandboxError::ReturnTooLarge(65_537)));
}

// ── Test: trapping callee is rolled back ──

#[test]
fn test_failed_callee_has_no_effect() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);
    set_counter(&mut session, &counter, 10);

    let (status, _) = call_fn(&mut session, &caller, &counter, b"increment_then_trap", 0);
    assert_eq!(status, ErrorCode::CalleeFailed.as_i32());
    assert_eq!(read_counter(&mut session, &counter), 10);
}

// ── Test: failed callee undoes the cross-calls it completed ──

#[test]
fn test_failed_subtree_has_no_effect() {
    let mut session = empty_session();
    let (counter, caller) = deploy_fixtures(&mut session);
    let middle = deploy_middle(&mut session);
    session.call_raw(&middle, "remember", counter.as_bytes(), 0).unwrap();
    set_counter(&mut session, &counter, 20);

    // caller -> middle -> counter.increment (ok), then middle traps
    let arg = call_fn_arg(&middle, b"increment_then_fail", 0);
    let receipt = session.call_raw(&caller, "call_fn", &arg, 0).unwrap();
    let (status, _) = split_call_fn_output(&receipt.data);

    assert_eq!(status, ErrorCode::CalleeFailed.as_i32());
    assert_eq!(read_counter(&mut session, &counter), 20);

    // the completed inner call is still part of the call tree
    let inner = &receipt.calls[2];
    assert_eq!(inner.depth, 2);
    assert_eq!(inner.module, counter);
    assert_eq!(inner.status, ErrorCode::Ok);
    assert_eq!(receipt.calls[1].status, ErrorCode::CalleeFailed);
}

// ── Test: call depth limit ──

#[test]
fn test_call_depth_limit() {
    let mut config = switchboard_sandbox::SandboxConfig::default();
    config.execution.max_call_depth = 4;
    let mut session = sandbox_with_config(config)
        .session(std::sync::Arc::new(switchboard_hostapi::MemStore::new()))
        .unwrap();
    let (_, caller) = deploy_fixtures(&mut session);

    let receipt = session
        .call_raw(&caller, "recurse", caller.as_bytes(), 0)
        .unwrap();

    assert_eq!(
        i32::from_le_bytes(receipt.data[..4].try_into().unwrap()),
        ErrorCode::CallDepthExceeded.as_i32()
    );
    assert_eq!(receipt.calls.len(), 5);
    let last = receipt.calls.last().unwrap();
    assert_eq!(last.depth, 4);
    assert_eq!(last.status, ErrorCode::CallDepthExceeded);
    assert!(receipt.calls[1..4].iter().all(|r| r.status == ErrorCode::Ok));
}

// ── Test: compiled example module ──

#[test]
fn test_callcounter_artifact_increments_and_reads() {
    let mut session = empty_session();
    let (counter, _) = deploy_fixtures(&mut session);
    let module = session.deploy_file(callcounter_artifact()).unwrap();
    set_counter(&mut session, &counter, 99);

    let receipt = session
        .call_raw(&module, "increment_and_read", counter.as_bytes(), 0)
        .unwrap();
    assert_eq!(receipt.data.len(), 8);
    assert_eq!(i64::from_le_bytes(receipt.data[..8].try_into().unwrap()), 100);
    assert_eq!(read_counter(&mut session, &counter), 100);

    // the typed path agrees
    let value = session.call::<IncrementAndRead>(&module, &counter, 0).unwrap();
    assert_eq!(value, 101);
}

#[test]
fn test_callcounter_artifact_out_of_bounds_is_fatal() {
    let mut session = empty_session();
    let (counter, _) = deploy_fixtures(&mut session);
    let module = session.deploy_file(callcounter_artifact()).unwrap();
    set_counter(&mut session, &counter, 7);

    let err = session.call_raw(&module, "out_of_bounds", &[], 0).unwrap_err();
    assert!(err.is_fatal(), "expected a memory fault, got {:?}", err);
    assert!(matches!(
        err,
        SandboxError::MemoryAccessOutOfBounds { offset: 4_294_967_295, len: 2, .. }
    ));

    // the session survives and nothing moved
    assert_eq!(read_counter(&mut session, &counter), 7);
    let value = session.call::<IncrementAndRead>(&module, &counter, 0).unwrap();
    assert_eq!(value, 8);
}
