//! Entry-point signatures.
//!
//! Every exported guest function takes the length of its input (already
//! staged in the argument buffer) and returns the length of the output it
//! staged. What those bytes mean is fixed per function by an
//! [`EntryPoint`] implementation, so both sides of a call share one
//! definition of the layout.

use crate::codec::{Decode, Encode};
use crate::types::ModuleId;

/// The name and argument/return encoding of one exported function.
pub trait EntryPoint {
    /// Export name of the function.
    const NAME: &'static str;
    /// Input staged in the callee's buffer.
    type Arg: Encode + Decode;
    /// Output the callee stages before returning.
    type Ret: Encode + Decode;
}

/// Counter module: add one to the stored value. No input, no output.
pub struct Increment;

impl EntryPoint for Increment {
    const NAME: &'static str = "increment";
    type Arg = ();
    type Ret = ();
}

/// Counter module: return the stored value as an `i64`.
pub struct ReadValue;

impl EntryPoint for ReadValue {
    const NAME: &'static str = "read_value";
    type Arg = ();
    type Ret = i64;
}

/// Example module: increment the given counter, then return its value.
pub struct IncrementAndRead;

impl EntryPoint for IncrementAndRead {
    const NAME: &'static str = "increment_and_read";
    type Arg = ModuleId;
    type Ret = i64;
}

/// Example module: probe the host with an invalid address. Never returns.
pub struct OutOfBounds;

impl EntryPoint for OutOfBounds {
    const NAME: &'static str = "out_of_bounds";
    type Arg = ();
    type Ret = ();
}

/// Address handed to the bounds probe by [`OutOfBounds`]: the highest
/// 32-bit address, outside any guest's linear memory in practice.
pub const OUT_OF_BOUNDS_ADDR: u32 = u32::MAX;

/// Length handed to the bounds probe by [`OutOfBounds`].
pub const OUT_OF_BOUNDS_LEN: u32 = 2;
