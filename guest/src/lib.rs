//! `switchboard-guest`: helper layer for modules speaking the
//! argument-buffer calling convention.
//!
//! - [`ArgBuf`]: the per-instance buffer, exported on wasm32 as `A`
//! - [`HostInterface`]: the `env` host operations as a trait
//! - [`Guest`]: buffer plus host, with typed cross-calls and entry-point
//!   dispatch
//! - `WasmHost` (wasm32): the real imports
//! - `fake` (feature `fake`): an in-process host for native tests
//!
//! `no_std` unless the fake host is enabled.

#![cfg_attr(not(any(test, feature = "fake")), no_std)]

pub mod buffer;
pub mod host;
pub mod guest;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use buffer::ArgBuf;
pub use guest::{CallError, Guest};
pub use host::HostInterface;

#[cfg(target_arch = "wasm32")]
pub use wasm::{trap, WasmHost};
