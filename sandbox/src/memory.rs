//! Bounds-checked access to guest linear memory.
//!
//! Guest addresses and lengths arrive as wasm `i32`s and are read as
//! unsigned 32-bit values. Every range is checked with overflow-safe
//! arithmetic before any byte is touched; a bad range is a `MemoryFault`.

use std::ops::Range;

use crate::error::MemoryFault;

/// Validate that `[ptr, ptr + len)` lies within a memory of `mem_len` bytes.
pub fn validate_range(mem_len: usize, ptr: u32, len: u32) -> Result<Range<usize>, MemoryFault> {
    let fault = MemoryFault {
        offset: ptr as u64,
        len: len as u64,
        mem_len,
    };
    let start = ptr as usize;
    let end = start.checked_add(len as usize).ok_or(fault)?;
    if end > mem_len {
        return Err(fault);
    }
    Ok(start..end)
}

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: u32, len: u32) -> Result<Vec<u8>, MemoryFault> {
    let range = validate_range(mem.len(), ptr, len)?;
    Ok(mem[range].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: u32, data: &[u8]) -> Result<(), MemoryFault> {
    let len = u32::try_from(data.len()).map_err(|_| MemoryFault {
        offset: ptr as u64,
        len: data.len() as u64,
        mem_len: mem.len(),
    })?;
    let range = validate_range(mem.len(), ptr, len)?;
    mem[range].copy_from_slice(data);
    Ok(())
}

/// Roll a memory back to `snapshot`.
///
/// Memory cannot shrink, so pages grown since the snapshot are zeroed.
pub fn restore(mem: &mut [u8], snapshot: &[u8]) {
    let split = snapshot.len().min(mem.len());
    mem[..split].copy_from_slice(&snapshot[..split]);
    mem[split..].fill(0);
}
