//! Shared test helpers for integration tests.
//!
//! Provides the WAT fixtures (a counter module and a caller module that
//! drives the `env` imports), session factories, and argument builders used
//! across all integration test files.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, OnceLock};

use switchboard_hostapi::{HostError, MemStore, ResourceStore};
use switchboard_primitives::{ModuleId, ARGBUF_LEN};
use switchboard_sandbox::{Sandbox, SandboxConfig, Session};

/// Target dir the example module is built into. Separate from the
/// workspace target dir so the build does not wait on the test run's lock.
pub const CALLCOUNTER_TARGET_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../target/callcounter-wasm");

/// Compiled example module.
pub const CALLCOUNTER_ARTIFACT: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../target/callcounter-wasm/wasm32-unknown-unknown/release/callcounter.wasm"
);

// ── Fixtures ──

/// Counter module. The value is an i64 at address 0; the argument buffer
/// starts at 65536 and fills the second page.
pub const COUNTER_WAT: &str = r#"
(module
    (memory (export "memory") 2)
    (global (export "A") i32 (i32.const 65536))

    (func (export "increment") (param i32) (result i32)
        (i64.store (i32.const 0) (i64.add (i64.load (i32.const 0)) (i64.const 1)))
        (i32.const 0))

    (func (export "read_value") (param i32) (result i32)
        (i64.store (i32.const 65536) (i64.load (i32.const 0)))
        (i32.const 8))

    (func (export "set_value") (param i32) (result i32)
        (i64.store (i32.const 0) (i64.load (i32.const 65536)))
        (i32.const 0))

    (func (export "increment_then_trap") (param i32) (result i32)
        (i64.store (i32.const 0) (i64.add (i64.load (i32.const 0)) (i64.const 1)))
        (unreachable))

    (func (export "declare_oversize") (param i32) (result i32)
        (i32.const 65537))

    (func (export "spin") (param i32) (result i32)
        (loop $forever (br $forever))
        (i32.const 0))
)
"#;

/// Caller module. Entry points that take a target read its 32-byte id from
/// the start of the buffer. `remember` stores an id for
/// `increment_then_fail`, which increments that counter and then traps.
///
/// `call_fn` input: `[id: 32] [points_limit: i64 LE] [fn name...]`.
/// Output: `[status: i32 LE]`, followed by the first 8 output bytes of the
/// callee when the status is 0.
pub const CALLER_WAT: &str = r#"
(module
    (import "env" "c" (func $c (param i32 i32 i32 i32 i64) (result i32)))
    (import "env" "hd" (func $hd (param i32 i32) (result i32)))
    (import "env" "caller" (func $caller))
    (import "env" "self_id" (func $self_id))
    (import "env" "limit" (func $limit (result i64)))
    (import "env" "spent" (func $spent (result i64)))
    (import "env" "emit" (func $emit (param i32 i32 i32)))
    (import "env" "panic" (func $panic (param i32)))

    (memory (export "memory") 2)
    (global (export "A") i32 (i32.const 65536))

    (data (i32.const 0) "increment")
    (data (i32.const 16) "read_value")
    (data (i32.const 32) "probe_oob")
    (data (i32.const 48) "recurse")
    (data (i32.const 64) "tick")

    ;; target id scratch at 1024, name scratch at 2048, remembered id at 3072
    (func $load_target
        (memory.copy (i32.const 1024) (i32.const 65536) (i32.const 32)))

    (func (export "increment_and_read") (param $len i32) (result i32)
        (call $load_target)
        (if (call $c (i32.const 1024) (i32.const 0) (i32.const 9) (i32.const 0) (i64.const 0))
            (then (unreachable)))
        (if (call $c (i32.const 1024) (i32.const 16) (i32.const 10) (i32.const 0) (i64.const 0))
            (then (unreachable)))
        (i32.const 8))

    (func (export "call_fn") (param $len i32) (result i32)
        (local $name_len i32)
        (local $status i32)
        (call $load_target)
        (local.set $name_len (i32.sub (local.get $len) (i32.const 40)))
        (memory.copy (i32.const 2048) (i32.const 65576) (local.get $name_len))
        (local.set $status
            (call $c
                (i32.const 1024)
                (i32.const 2048)
                (local.get $name_len)
                (i32.const 0)
                (i64.load (i32.const 65568))))
        (if (result i32) (local.get $status)
            (then
                (i32.store (i32.const 65536) (local.get $status))
                (i32.const 4))
            (else
                (memory.copy (i32.const 65540) (i32.const 65536) (i32.const 8))
                (i32.store (i32.const 65536) (i32.const 0))
                (i32.const 12))))

    (func (export "probe_resource") (param $len i32) (result i32)
        (memory.copy (i32.const 2048) (i32.const 65536) (local.get $len))
        (call $hd (i32.const 2048) (local.get $len)))

    (func (export "probe_oob") (param i32) (result i32)
        (drop (call $hd (i32.const -1) (i32.const 2)))
        (i32.const 0))

    (func (export "nested_oob") (param i32) (result i32)
        (call $load_target)
        (i32.store (i32.const 65536)
            (call $c (i32.const 1024) (i32.const 32) (i32.const 9) (i32.const 0) (i64.const 0)))
        (i32.const 4))

    (func (export "increment_then_oob") (param i32) (result i32)
        (call $load_target)
        (drop (call $c (i32.const 1024) (i32.const 0) (i32.const 9) (i32.const 0) (i64.const 0)))
        (drop (call $hd (i32.const -1) (i32.const 2)))
        (i32.const 0))

    (func (export "bad_name_ptr") (param i32) (result i32)
        (call $load_target)
        (call $c (i32.const 1024) (i32.const -1) (i32.const 4) (i32.const 0) (i64.const 0)))

    (func (export "bad_arg_len") (param i32) (result i32)
        (call $load_target)
        (call $c (i32.const 1024) (i32.const 0) (i32.const 9) (i32.const 65537) (i64.const 0)))

    ;; calls itself with its own id until the host refuses; the innermost
    ;; status travels back up as a 4-byte output
    (func (export "recurse") (param i32) (result i32)
        (local $status i32)
        (call $load_target)
        (local.set $status
            (call $c (i32.const 1024) (i32.const 48) (i32.const 7) (i32.const 32) (i64.const 0)))
        (if (local.get $status)
            (then (i32.store (i32.const 65536) (local.get $status))))
        (i32.const 4))

    (func (export "remember") (param i32) (result i32)
        (memory.copy (i32.const 3072) (i32.const 65536) (i32.const 32))
        (i32.const 0))

    (func (export "increment_then_fail") (param i32) (result i32)
        (drop (call $c (i32.const 3072) (i32.const 0) (i32.const 9) (i32.const 0) (i64.const 0)))
        (unreachable))

    (func (export "who_called") (param i32) (result i32)
        (call $caller)
        (i32.const 32))

    (func (export "whoami") (param i32) (result i32)
        (call $self_id)
        (i32.const 32))

    ;; output: [limit: i64] [spent: i64]
    (func (export "budget") (param i32) (result i32)
        (i64.store (i32.const 65536) (call $limit))
        (i64.store (i32.const 65544) (call $spent))
        (i32.const 16))

    ;; emits the input as a "tick" event
    (func (export "emit_tick") (param $len i32) (result i32)
        (call $emit (i32.const 64) (i32.const 4) (local.get $len))
        (i32.const 0))

    (func (export "emit_then_fail") (param $len i32) (result i32)
        (call $emit (i32.const 64) (i32.const 4) (local.get $len))
        (unreachable))

    (func (export "emit_bad_topic") (param i32) (result i32)
        (call $emit (i32.const -1) (i32.const 4) (i32.const 0))
        (i32.const 0))

    ;; panics with the input as the message
    (func (export "panic_with") (param $len i32) (result i32)
        (call $panic (local.get $len))
        (i32.const 0))

    (func (export "panic_bad_len") (param i32) (result i32)
        (call $panic (i32.const 65537))
        (i32.const 0))
)
"#;

/// Resource store whose backend is always down.
pub struct OfflineStore;

impl ResourceStore for OfflineStore {
    fn get(&self, _name: &str) -> Result<Option<Vec<u8>>, HostError> {
        Err(HostError::internal("store offline"))
    }
}

/// Fixed id under which a second copy of the caller fixture is deployed.
pub const MIDDLE_ID: ModuleId = ModuleId::from_bytes([0x4d; 32]);

// ── Session Builders ──

pub fn sandbox() -> Sandbox {
    Sandbox::new(SandboxConfig::default()).expect("failed to create sandbox")
}

pub fn sandbox_with_config(config: SandboxConfig) -> Sandbox {
    Sandbox::new(config).expect("failed to create sandbox with config")
}

/// Session with no host resources.
pub fn empty_session() -> Session {
    sandbox()
        .session(Arc::new(MemStore::new()))
        .expect("failed to open session")
}

/// Session serving the given resources through `hd`.
pub fn session_with_resources(resources: &[(&str, &[u8])]) -> Session {
    let data: BTreeMap<String, Vec<u8>> = resources
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_vec()))
        .collect();
    sandbox()
        .session(Arc::new(MemStore::with_data(data)))
        .expect("failed to open session")
}

/// Session serving resources from an arbitrary backend.
pub fn session_with_store(store: Arc<dyn ResourceStore>) -> Session {
    sandbox().session(store).expect("failed to open session")
}

/// Deploy the counter and caller fixtures. Returns `(counter, caller)`.
pub fn deploy_fixtures(session: &mut Session) -> (ModuleId, ModuleId) {
    let counter = session.deploy(COUNTER_WAT.as_bytes()).expect("deploy counter");
    let caller = session.deploy(CALLER_WAT.as_bytes()).expect("deploy caller");
    (counter, caller)
}

/// Deploy a second caller instance under `MIDDLE_ID`.
pub fn deploy_middle(session: &mut Session) -> ModuleId {
    session
        .deploy_with_id(MIDDLE_ID, CALLER_WAT.as_bytes())
        .expect("deploy middle");
    MIDDLE_ID
}

/// Store `value` as the counter's current value.
pub fn set_counter(session: &mut Session, counter: &ModuleId, value: i64) {
    session
        .call_raw(counter, "set_value", &value.to_le_bytes(), 0)
        .expect("set_value");
}

pub fn read_counter(session: &mut Session, counter: &ModuleId) -> i64 {
    let receipt = session.call_raw(counter, "read_value", &[], 0).expect("read_value");
    i64::from_le_bytes(receipt.data.try_into().expect("8-byte output"))
}

// ── Artifact Loaders ──

/// Path of the compiled example module, built on first use if missing.
pub fn callcounter_artifact() -> &'static Path {
    static BUILT: OnceLock<()> = OnceLock::new();
    let path = Path::new(CALLCOUNTER_ARTIFACT);
    BUILT.get_or_init(|| {
        if path.exists() {
            return;
        }
        let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        let status = Command::new(cargo)
            .current_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/.."))
            .args(["build", "-p", "callcounter", "--release"])
            .args(["--target", "wasm32-unknown-unknown"])
            .args(["--target-dir", CALLCOUNTER_TARGET_DIR])
            .status()
            .expect("failed to run cargo");
        assert!(
            status.success(),
            "building callcounter failed. Install the target with: rustup target add wasm32-unknown-unknown"
        );
    });
    assert!(
        path.exists(),
        "callcounter artifact not found at {:?}. Build with: cargo build -p callcounter --release --target wasm32-unknown-unknown --target-dir target/callcounter-wasm",
        path
    );
    path
}

// ── Argument Builders ──

/// Input for the caller fixture's `call_fn`.
pub fn call_fn_arg(target: &ModuleId, fn_name: &[u8], points_limit: i64) -> Vec<u8> {
    let mut arg = Vec::with_capacity(40 + fn_name.len());
    arg.extend_from_slice(target.as_bytes());
    arg.extend_from_slice(&points_limit.to_le_bytes());
    arg.extend_from_slice(fn_name);
    assert!(arg.len() <= ARGBUF_LEN);
    arg
}

/// Split a `call_fn` output into `(status, callee output prefix)`.
pub fn split_call_fn_output(data: &[u8]) -> (i32, Option<[u8; 8]>) {
    let status = i32::from_le_bytes(data[..4].try_into().expect("status"));
    if status == 0 {
        (status, Some(data[4..12].try_into().expect("output")))
    } else {
        (status, None)
    }
}

/// Run `call_fn` on the caller fixture and return `(status, output prefix)`.
pub fn call_fn(
    session: &mut Session,
    caller: &ModuleId,
    target: &ModuleId,
    fn_name: &[u8],
    points_limit: i64,
) -> (i32, Option<[u8; 8]>) {
    let arg = call_fn_arg(target, fn_name, points_limit);
    let receipt = session.call_raw(caller, "call_fn", &arg, 0).expect("call_fn");
    split_call_fn_output(&receipt.data)
}
