//! `switchboard-hostapi`: host-side types for the switchboard dispatcher.
//!
//! - `HostError`: host error type with `ErrorCode` conversion
//! - `ExecutionConfig`: points and call-depth limits for a session
//! - `ResourceStore` trait: named resources served by the host-data primitive
//! - `MemStore`: in-memory `ResourceStore`

pub mod error;
pub mod types;
pub mod resource_store;
pub mod mem_store;

pub use error::HostError;
pub use types::ExecutionConfig;
pub use resource_store::ResourceStore;
pub use mem_store::MemStore;
