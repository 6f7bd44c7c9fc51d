//! Named resource lookup for the host-data primitive.
//!
//! A guest names a resource by a UTF-8 string living in its linear memory;
//! the host resolves it through a `ResourceStore` and copies the bytes into
//! the guest's argument buffer.
//!
//! Implementations:
//! - `MemStore` (this crate): in-memory BTreeMap

use crate::error::HostError;

/// Read-only source of named byte resources exposed to guests.
///
/// Implementations must be deterministic: the same name always returns the
/// same bytes for the lifetime of a session.
pub trait ResourceStore: Send + Sync {
    /// Returns `Ok(None)` if no resource has that name.
    ///
    /// A backend failure aborts the guest call that asked for the resource
    /// and is reported to the host as `SandboxError::HostError`.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, HostError>;
}
