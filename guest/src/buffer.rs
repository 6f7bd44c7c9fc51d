//! The argument buffer.
//!
//! A fixed `ARGBUF_LEN`-byte region per module instance. At entry the first
//! `arg_len` bytes hold the input; before returning the entry point stages
//! its output at the start and returns the output length. After a
//! successful cross-call the same region holds the callee's output.

use switchboard_primitives::{
    decode_from, encode_into, read_i64, write_i64, AbiError, Decode, Encode, ModuleId,
    ARGBUF_LEN, MODULE_ID_BYTES,
};

/// A module instance's argument buffer.
#[repr(C, align(8))]
pub struct ArgBuf([u8; ARGBUF_LEN]);

impl ArgBuf {
    pub const fn new() -> Self {
        Self([0u8; ARGBUF_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; ARGBUF_LEN] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; ARGBUF_LEN] {
        &mut self.0
    }

    /// Native address of the first byte.
    pub fn address(&self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Whether `[addr, addr + len)` lies inside this buffer.
    pub fn contains_range(&self, addr: usize, len: usize) -> bool {
        let base = self.address();
        match addr.checked_add(len) {
            Some(end) => addr >= base && end <= base + ARGBUF_LEN,
            None => false,
        }
    }

    /// The first `len` bytes, or `LengthOutOfRange` past capacity.
    pub fn prefix(&self, len: u32) -> Result<&[u8], AbiError> {
        self.0
            .get(..len as usize)
            .ok_or(AbiError::LengthOutOfRange {
                len: len as usize,
                capacity: ARGBUF_LEN,
            })
    }

    /// Copy `data` to the start of the buffer.
    pub fn stage(&mut self, data: &[u8]) -> Result<u32, AbiError> {
        let dst = self.0.get_mut(..data.len()).ok_or(AbiError::BufferOverflow {
            needed: data.len(),
            capacity: ARGBUF_LEN,
        })?;
        dst.copy_from_slice(data);
        Ok(data.len() as u32)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<u32, AbiError> {
        write_i64(&mut self.0, value)?;
        Ok(8)
    }

    pub fn read_i64(&self) -> Result<i64, AbiError> {
        read_i64(&self.0)
    }

    /// The module id stored in the first 32 bytes.
    pub fn read_module_id(&self) -> ModuleId {
        let mut id = ModuleId::uninitialized();
        id.as_bytes_mut().copy_from_slice(&self.0[..MODULE_ID_BYTES]);
        id
    }

    /// Encode `value` at the start of the buffer, returning its length.
    pub fn encode<T: Encode>(&mut self, value: &T) -> Result<u32, AbiError> {
        encode_into(&mut self.0, value).map(|len| len as u32)
    }

    /// Decode a `T` from exactly the first `len` bytes.
    pub fn decode<T: Decode>(&self, len: u32) -> Result<T, AbiError> {
        decode_from(self.prefix(len)?)
    }
}

impl Default for ArgBuf {
    fn default() -> Self {
        Self::new()
    }
}
