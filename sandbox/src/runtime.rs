//! Sandbox runtime: Wasmtime engine, sessions, deployment and top-level calls.
//!
//! `Sandbox` owns the deterministic engine. Each `Session` owns one store in
//! which every deployed module is instantiated once, so module state (a
//! counter, say) persists across calls for the life of the session.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimitsBuilder};

use switchboard_hostapi::{ExecutionConfig, ResourceStore};
use switchboard_primitives::types::{EXPORT_ARGBUF, EXPORT_MEMORY};
use switchboard_primitives::{decode_from, encode_into, EntryPoint, ErrorCode, ModuleId, ARGBUF_LEN};
use switchboard_primitives::AbiError;

use crate::call_stack::{CallRecord, Event};
use crate::config::SandboxConfig;
use crate::dispatch::{classify, Fault};
use crate::error::SandboxError;
use crate::host_impl::{Checkpoint, ModuleSlot, SessionState};
use crate::linker::register_host_functions;
use crate::memory;
use crate::validation::validate_module;

/// The deterministic WASM sandbox.
pub struct Sandbox {
    engine: Engine,
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        Ok(Self { engine, config })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Open a session serving `resources` through `hd`.
    pub fn session(&self, resources: Arc<dyn ResourceStore>) -> Result<Session, SandboxError> {
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory_bytes())
            .build();
        let state = SessionState::new(resources, self.config.execution.clone(), limits);

        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::new(&self.engine);
        register_host_functions(&mut linker)?;

        Ok(Session {
            engine: self.engine.clone(),
            store,
            linker,
            last_spent: 0,
        })
    }
}

/// Outcome of a successful top-level call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallReceipt {
    /// The entry point's output, copied out of its argument buffer.
    pub data: Vec<u8>,
    pub points_spent: u64,
    /// Flattened call tree, top-level call first.
    pub calls: Vec<CallRecord>,
    /// Events emitted by calls that completed, in emission order.
    pub events: Vec<Event>,
}

/// A store plus the modules deployed into it.
///
/// Single-threaded: every call takes `&mut self` and nested cross-calls run
/// re-entrantly on the same store.
pub struct Session {
    engine: Engine,
    store: Store<SessionState>,
    linker: Linker<SessionState>,
    last_spent: u64,
}

impl Session {
    /// Deploy bytecode under `blake3(bytecode)`.
    pub fn deploy(&mut self, bytecode: &[u8]) -> Result<ModuleId, SandboxError> {
        let id = ModuleId::from_bytes(*blake3::hash(bytecode).as_bytes());
        self.deploy_with_id(id, bytecode)?;
        Ok(id)
    }

    /// Load bytecode from a `.wasm` file and deploy it.
    pub fn deploy_file(&mut self, path: &Path) -> Result<ModuleId, SandboxError> {
        let bytecode = std::fs::read(path).map_err(|e| {
            SandboxError::ValidationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.deploy(&bytecode)
    }

    /// Deploy bytecode under an explicit id.
    pub fn deploy_with_id(&mut self, id: ModuleId, bytecode: &[u8]) -> Result<(), SandboxError> {
        if self.store.data().modules.contains_key(&id) {
            return Err(SandboxError::AlreadyDeployed(id));
        }

        let module = Module::new(&self.engine, bytecode)?;
        validate_module(&module)?;

        // start functions run under the session's default budget
        let budget = self.store.data().config.points_limit;
        self.store.set_fuel(budget)?;
        let instance = self.linker.instantiate(&mut self.store, &module)?;

        let memory = instance
            .get_memory(&mut self.store, EXPORT_MEMORY)
            .ok_or_else(|| SandboxError::ValidationError("no memory export".into()))?;
        let argbuf = instance
            .get_global(&mut self.store, EXPORT_ARGBUF)
            .and_then(|g| g.get(&mut self.store).i32())
            .ok_or_else(|| SandboxError::ValidationError("no argument buffer export".into()))?
            as u32;
        memory::validate_range(memory.data_size(&self.store), argbuf, ARGBUF_LEN as u32)
            .map_err(|fault| {
                SandboxError::ValidationError(format!(
                    "argument buffer at {:#x} does not fit in {} bytes of memory",
                    fault.offset, fault.mem_len
                ))
            })?;

        self.store.data_mut().modules.insert(
            id,
            ModuleSlot {
                instance,
                memory,
                argbuf,
            },
        );
        info!(module = %id, argbuf, "deployed module");
        Ok(())
    }

    pub fn is_deployed(&self, id: &ModuleId) -> bool {
        self.store.data().modules.contains_key(id)
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.store.data().config
    }

    /// Points spent by the last top-level call, successful or not.
    pub fn spent(&self) -> u64 {
        self.last_spent
    }

    /// Call `fn_name` on a deployed module with raw argument bytes.
    ///
    /// A `points_limit` of `0` runs under `ExecutionConfig::points_limit`.
    /// On failure every module's memory is rolled back to its state before
    /// the call and no events are kept.
    pub fn call_raw(
        &mut self,
        id: &ModuleId,
        fn_name: &str,
        arg: &[u8],
        points_limit: u64,
    ) -> Result<CallReceipt, SandboxError> {
        let slot = self
            .store
            .data()
            .slot(id)
            .ok_or(SandboxError::ModuleNotFound(*id))?;
        if arg.len() > ARGBUF_LEN {
            return Err(AbiError::LengthOutOfRange {
                len: arg.len(),
                capacity: ARGBUF_LEN,
            }
            .into());
        }
        if self.store.data().config.max_call_depth == 0 {
            return Err(SandboxError::CallDepthExceeded(0));
        }
        let func = slot
            .instance
            .get_typed_func::<i32, i32>(&mut self.store, fn_name)
            .map_err(|_| SandboxError::FunctionNotFound(fn_name.to_string()))?;

        let limit = self.store.data().config.top_level_limit(points_limit);
        self.store.data_mut().events.clear();
        let checkpoint = Checkpoint::take(&self.store);

        memory::write_bytes(slot.memory.data_mut(&mut self.store), slot.argbuf, arg)?;

        let state = self.store.data_mut();
        state.stack.clear();
        state.stack.push(*id, limit);
        state.records.clear();
        state.records.push(CallRecord {
            depth: 0,
            module: *id,
            fn_name: fn_name.to_string(),
            points_limit: limit,
            points_spent: 0,
            status: ErrorCode::Internal,
        });

        debug!(module = %id, function = fn_name, limit, "top-level call");
        self.store.set_fuel(limit)?;
        let result = func.call(&mut self.store, arg.len() as i32);
        let spent = limit.saturating_sub(self.store.get_fuel()?);
        self.last_spent = spent;
        self.store.data_mut().stack.clear();

        let outcome = match result {
            Ok(ret_len) if ret_len as u32 as usize > ARGBUF_LEN => {
                Err(SandboxError::ReturnTooLarge(ret_len as u32 as usize))
            }
            Ok(ret_len) => {
                let data = memory::read_bytes(slot.memory.data(&self.store), slot.argbuf, ret_len as u32)?;
                Ok(data)
            }
            Err(err) => Err(match classify(&err) {
                Fault::Memory(fault) => {
                    warn!(module = %id, function = fn_name, "call aborted by memory fault");
                    SandboxError::from(fault)
                }
                Fault::Host(e) => {
                    warn!(module = %id, function = fn_name, error = %e, "call aborted by host failure");
                    SandboxError::HostError(e)
                }
                Fault::Points => SandboxError::OutOfPoints,
                Fault::Panic(msg) => SandboxError::GuestPanic(msg),
                Fault::Trap(msg) => SandboxError::GuestTrapped(msg),
            }),
        };

        match outcome {
            Ok(data) => {
                let state = self.store.data_mut();
                state.finish_record(0, spent, ErrorCode::Ok);
                Ok(CallReceipt {
                    data,
                    points_spent: spent,
                    calls: std::mem::take(&mut state.records),
                    events: std::mem::take(&mut state.events),
                })
            }
            Err(err) => {
                checkpoint.restore(&mut self.store);
                self.store.data_mut().finish_record(0, spent, err.to_error_code());
                debug!(module = %id, function = fn_name, error = %err, "top-level call failed");
                Err(err)
            }
        }
    }

    /// Call an entry point with typed argument and return values.
    pub fn call<E: EntryPoint>(
        &mut self,
        id: &ModuleId,
        arg: &E::Arg,
        points_limit: u64,
    ) -> Result<E::Ret, SandboxError> {
        let mut buf = vec![0u8; ARGBUF_LEN];
        let len = encode_into(&mut buf, arg)?;
        let receipt = self.call_raw(id, E::NAME, &buf[..len], points_limit)?;
        Ok(decode_from::<E::Ret>(&receipt.data)?)
    }

    /// Call tree of the last top-level call that failed, or of a call in
    /// progress. Successful calls hand their tree out in the receipt.
    pub fn last_calls(&self) -> &[CallRecord] {
        &self.store.data().records
    }
}

/// Create a Wasmtime engine with deterministic configuration.
fn create_engine(config: &SandboxConfig) -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Points are fuel
    wasm_config.consume_fuel(true);

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    let max_bytes = config.max_memory_bytes() as u64;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Ok(Engine::new(&wasm_config)?)
}
