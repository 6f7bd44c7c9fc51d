//! `switchboard-primitives`: the argument-buffer calling convention.
//!
//! Shared by guest modules and the host dispatcher:
//!
//! - ABI constants (`ARGBUF_LEN`, import/export names) and `ModuleId`
//! - `ErrorCode` status values returned by the cross-call primitive
//! - Points policy (`callee_limit`) and `PointsMeter`
//! - `Encode`/`Decode` over the unframed buffer, and `EntryPoint` signatures
//!
//! Supports `#![no_std]` for guest builds (use `default-features = false`).
//! Nothing here allocates.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod types;
pub mod error;
pub mod points;
pub mod codec;
pub mod abi;

pub use types::{ModuleId, ARGBUF_LEN, MODULE_ID_BYTES};
pub use error::{AbiError, ErrorCode};
pub use points::{callee_limit, PointsMeter, DEFAULT_POINT_PASS_PCT};
pub use codec::{decode_from, encode_into, read_i64, write_i64, ArgReader, ArgWriter, Decode, Encode};
pub use abi::EntryPoint;
