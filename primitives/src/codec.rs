//! Typed encoding over the argument buffer.
//!
//! The buffer itself is an unframed byte region: no length prefix, no type
//! tag. The layout of an entry point's input and output is fixed by its
//! signature (see [`crate::abi`]). This module supplies the reader/writer
//! pair that enforces that layout in code.
//!
//! Encoding format:
//! - Integers are fixed-width little-endian
//! - `bool` is one byte, 0 or 1
//! - `ModuleId` is its 32 raw bytes
//! - `()` occupies zero bytes
//! - Tuples are their fields back to back

use crate::error::AbiError;
use crate::types::{ModuleId, MODULE_ID_BYTES};

/// A cursor for writing into a fixed-capacity byte region.
pub struct ArgWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ArgWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), AbiError> {
        let end = self
            .pos
            .checked_add(data.len())
            .filter(|&end| end <= self.buf.len())
            .ok_or(AbiError::BufferOverflow {
                needed: self.pos.saturating_add(data.len()),
                capacity: self.buf.len(),
            })?;
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }
}

/// A cursor for reading from the first `len` bytes of a buffer.
pub struct ArgReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], AbiError> {
        if n > self.remaining() {
            return Err(AbiError::UnexpectedEnd {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], AbiError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(self) -> Result<(), AbiError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(AbiError::TrailingBytes { remaining }),
        }
    }
}

/// A value with a fixed argument-buffer encoding.
pub trait Encode {
    fn encode(&self, w: &mut ArgWriter<'_>) -> Result<(), AbiError>;
}

/// A value decodable from the argument buffer.
pub trait Decode: Sized {
    fn decode(r: &mut ArgReader<'_>) -> Result<Self, AbiError>;
}

impl Encode for () {
    fn encode(&self, _w: &mut ArgWriter<'_>) -> Result<(), AbiError> {
        Ok(())
    }
}

impl Decode for () {
    fn decode(_r: &mut ArgReader<'_>) -> Result<Self, AbiError> {
        Ok(())
    }
}

macro_rules! impl_le_int {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut ArgWriter<'_>) -> Result<(), AbiError> {
                    w.write_bytes(&self.to_le_bytes())
                }
            }

            impl Decode for $ty {
                fn decode(r: &mut ArgReader<'_>) -> Result<Self, AbiError> {
                    Ok(<$ty>::from_le_bytes(r.read_array()?))
                }
            }
        )*
    };
}

impl_le_int!(u32, u64, i32, i64);

impl Encode for bool {
    fn encode(&self, w: &mut ArgWriter<'_>) -> Result<(), AbiError> {
        w.write_bytes(&[*self as u8])
    }
}

impl Decode for bool {
    fn decode(r: &mut ArgReader<'_>) -> Result<Self, AbiError> {
        match r.read_array::<1>()?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(AbiError::InvalidValue),
        }
    }
}

impl Encode for ModuleId {
    fn encode(&self, w: &mut ArgWriter<'_>) -> Result<(), AbiError> {
        w.write_bytes(self.as_bytes())
    }
}

impl Decode for ModuleId {
    fn decode(r: &mut ArgReader<'_>) -> Result<Self, AbiError> {
        Ok(ModuleId::from_bytes(r.read_array::<MODULE_ID_BYTES>()?))
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, w: &mut ArgWriter<'_>) -> Result<(), AbiError> {
        self.0.encode(w)?;
        self.1.encode(w)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(r: &mut ArgReader<'_>) -> Result<Self, AbiError> {
        let a = A::decode(r)?;
        let b = B::decode(r)?;
        Ok((a, b))
    }
}

/// Encode `value` at the start of `buf`, returning the encoded length.
pub fn encode_into<T: Encode + ?Sized>(buf: &mut [u8], value: &T) -> Result<usize, AbiError> {
    let mut w = ArgWriter::new(buf);
    value.encode(&mut w)?;
    Ok(w.position())
}

/// Decode a `T` from exactly `data`, rejecting leftover bytes.
pub fn decode_from<T: Decode>(data: &[u8]) -> Result<T, AbiError> {
    let mut r = ArgReader::new(data);
    let value = T::decode(&mut r)?;
    r.finish()?;
    Ok(value)
}

/// Write an 8-byte little-endian integer at the start of `buf`.
pub fn write_i64(buf: &mut [u8], value: i64) -> Result<(), AbiError> {
    encode_into(buf, &value).map(|_| ())
}

/// Read an 8-byte little-endian integer from the start of `buf`.
pub fn read_i64(buf: &[u8]) -> Result<i64, AbiError> {
    i64::decode(&mut ArgReader::new(buf))
}
