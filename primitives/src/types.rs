//! Core ABI constants and the module identifier type.
//!
//! These are shared verbatim by the guest helper library and the host
//! dispatcher; both sides must agree on them at build time.

use core::fmt;

/// Capacity of the argument buffer every module instance owns.
pub const ARGBUF_LEN: usize = 65_536;

/// Size of a module identifier in bytes.
pub const MODULE_ID_BYTES: usize = 32;

/// Wasm import module under which the host functions are provided.
pub const HOST_IMPORT_MODULE: &str = "env";

/// Name of the cross-call host function.
pub const IMPORT_CALL: &str = "c";

/// Name of the host-data (bounds-probe) host function.
pub const IMPORT_HOST_DATA: &str = "hd";

/// Writes the calling module's id (all zero at top level) to the buffer.
pub const IMPORT_CALLER: &str = "caller";

/// Writes the running module's own id to the buffer.
pub const IMPORT_SELF_ID: &str = "self_id";

/// Returns the running frame's points limit.
pub const IMPORT_LIMIT: &str = "limit";

/// Returns the points the running frame has spent so far.
pub const IMPORT_SPENT: &str = "spent";

/// Records an event: a topic from memory and data from the buffer.
pub const IMPORT_EMIT: &str = "emit";

/// Aborts the running frame with a message staged in the buffer.
pub const IMPORT_PANIC: &str = "panic";

/// Name of the exported global holding the argument buffer's address.
pub const EXPORT_ARGBUF: &str = "A";

/// Name of the exported linear memory.
pub const EXPORT_MEMORY: &str = "memory";

/// Opaque 32-byte identifier of a deployed module.
///
/// Passed by value through the argument buffer. Guests never interpret
/// the bytes; the host derives them from the module's bytecode.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ModuleId([u8; MODULE_ID_BYTES]);

impl ModuleId {
    /// The all-zero identifier, never assigned to a deployed module.
    pub const fn uninitialized() -> Self {
        Self([0u8; MODULE_ID_BYTES])
    }

    pub const fn from_bytes(bytes: [u8; MODULE_ID_BYTES]) -> Self {
        Self(bytes)
    }

    /// Build an id from a slice. Returns `None` unless exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; MODULE_ID_BYTES] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub const fn as_bytes(&self) -> &[u8; MODULE_ID_BYTES] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; MODULE_ID_BYTES] {
        &mut self.0
    }

    pub fn is_uninitialized(&self) -> bool {
        self.0 == [0u8; MODULE_ID_BYTES]
    }
}

impl From<[u8; MODULE_ID_BYTES]> for ModuleId {
    fn from(bytes: [u8; MODULE_ID_BYTES]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self)
    }
}
