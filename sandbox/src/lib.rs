//! `switchboard-sandbox`: Wasmtime host dispatcher for argument-buffer modules.
//!
//! Deploys guest modules into a session and runs their entry points,
//! relaying cross-calls between them. It enforces:
//!
//! - **Determinism:** No SIMD, no threads, NaN canonicalization
//! - **Points:** Wasmtime fuel, split between caller and callee per call
//! - **Isolation:** one argument buffer per instance; failed callees are rolled back
//! - **Memory safety:** every guest range is bounds-checked; violations are fatal
//! - **Import whitelisting:** only the `env` host functions, no WASI
//!
//! The primary entry points are [`Sandbox::session`] and [`Session::call`].

pub mod error;
pub mod config;
pub mod memory;
pub mod call_stack;
pub mod host_impl;
pub mod validation;
pub mod dispatch;
pub mod linker;
pub mod runtime;

pub use call_stack::{CallRecord, Event};
pub use config::SandboxConfig;
pub use error::{GuestPanic, MemoryFault, PointsExhausted, SandboxError};
pub use runtime::{CallReceipt, Sandbox, Session};
