//! Points (execution budget) accounting.
//!
//! Points are consumed by guest compute (host-side instruction metering)
//! and by host calls. A cross-call carries an explicit limit for the callee;
//! `0` means "inherit a share of the caller's remaining points".

// ── Point cost constants ──

/// Base cost of a cross-call, charged to the caller before dispatch.
pub const P_CALL: u64 = 100;

/// Base cost of a host-data lookup.
pub const P_HOST_DATA: u64 = 50;

/// Base cost of recording an event.
pub const P_EMIT: u64 = 50;

/// Per-byte cost added to buffer transfers.
pub const P_PER_BYTE: u64 = 1;

/// Percentage of the caller's remaining points handed to a callee when the
/// requested limit is `0` or not smaller than what the caller has left.
pub const DEFAULT_POINT_PASS_PCT: u64 = 93;

/// Compute the point cost of issuing a cross-call with `arg_len` bytes.
pub fn points_cost_call(arg_len: usize) -> u64 {
    P_CALL.saturating_add((arg_len as u64).saturating_mul(P_PER_BYTE))
}

/// Compute the point cost of a host-data lookup moving `byte_count` bytes.
pub fn points_cost_host_data(byte_count: usize) -> u64 {
    P_HOST_DATA.saturating_add((byte_count as u64).saturating_mul(P_PER_BYTE))
}

/// Compute the point cost of an event with `byte_count` topic and data bytes.
pub fn points_cost_emit(byte_count: usize) -> u64 {
    P_EMIT.saturating_add((byte_count as u64).saturating_mul(P_PER_BYTE))
}

/// Resolve the limit a callee runs under.
///
/// An explicit request below the caller's remaining points is honored as-is.
/// Zero, or anything the caller could not cover, falls back to
/// `caller_remaining * pass_pct / 100`. `pass_pct` is clamped to 100.
pub fn callee_limit(requested: u64, caller_remaining: u64, pass_pct: u64) -> u64 {
    if requested > 0 && requested < caller_remaining {
        return requested;
    }
    let pct = pass_pct.min(100) as u128;
    ((caller_remaining as u128 * pct) / 100) as u64
}

/// Error returned when a charge would exceed the meter's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfPoints {
    pub limit: u64,
    pub requested: u64,
}

impl core::fmt::Display for OutOfPoints {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "out of points: limit={}, requested={}", self.limit, self.requested)
    }
}

/// Tracks points consumed against a fixed limit.
///
/// Charges are checked before applying, so on error the consumed count is
/// unchanged.
#[derive(Debug, Clone)]
pub struct PointsMeter {
    limit: u64,
    consumed: u64,
}

impl PointsMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Consume points. Returns `OutOfPoints` if the limit would be exceeded.
    pub fn charge(&mut self, amount: u64) -> Result<(), OutOfPoints> {
        let new_consumed = match self.consumed.checked_add(amount) {
            Some(v) if v <= self.limit => v,
            _ => {
                return Err(OutOfPoints {
                    limit: self.limit,
                    requested: self.consumed.saturating_add(amount),
                });
            }
        };
        self.consumed = new_consumed;
        Ok(())
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_inherits_pass_percentage() {
        assert_eq!(callee_limit(0, 1_000, DEFAULT_POINT_PASS_PCT), 930);
        assert_eq!(callee_limit(0, 0, DEFAULT_POINT_PASS_PCT), 0);
    }

    #[test]
    fn test_explicit_limit_below_remaining_is_honored() {
        assert_eq!(callee_limit(500, 1_000, DEFAULT_POINT_PASS_PCT), 500);
        assert_eq!(callee_limit(1, 1_000, DEFAULT_POINT_PASS_PCT), 1);
    }

    #[test]
    fn test_limit_not_below_remaining_falls_back() {
        assert_eq!(callee_limit(1_000, 1_000, DEFAULT_POINT_PASS_PCT), 930);
        assert_eq!(callee_limit(u64::MAX, 1_000, DEFAULT_POINT_PASS_PCT), 930);
    }

    #[test]
    fn test_pass_pct_is_clamped_and_overflow_free() {
        assert_eq!(callee_limit(0, u64::MAX, 100), u64::MAX);
        assert_eq!(callee_limit(0, u64::MAX, 250), u64::MAX);
        assert_eq!(callee_limit(0, u64::MAX, 50), u64::MAX / 2);
    }

    #[test]
    fn test_costs() {
        assert_eq!(points_cost_call(0), 100);
        assert_eq!(points_cost_call(32), 132);
        assert_eq!(points_cost_host_data(10), 60);
        assert_eq!(points_cost_emit(12), 62);
        assert_eq!(points_cost_call(usize::MAX), u64::MAX);
    }

    #[test]
    fn test_meter_basic() {
        let mut meter = PointsMeter::new(1000);
        meter.charge(100).unwrap();
        assert_eq!(meter.consumed(), 100);
        assert_eq!(meter.remaining(), 900);
        assert_eq!(meter.limit(), 1000);
    }

    #[test]
    fn test_meter_exceeds_limit() {
        let mut meter = PointsMeter::new(100);
        meter.charge(60).unwrap();
        let err = meter.charge(41).unwrap_err();
        assert_eq!(err, OutOfPoints { limit: 100, requested: 101 });
        // consumed must not change on error
        assert_eq!(meter.consumed(), 60);
    }

    #[test]
    fn test_meter_overflow_protection() {
        let mut meter = PointsMeter::new(u64::MAX);
        meter.charge(u64::MAX - 1).unwrap();
        assert!(meter.charge(2).is_err());
        assert_eq!(meter.consumed(), u64::MAX - 1);
    }

    #[test]
    fn test_meter_exact_limit() {
        let mut meter = PointsMeter::new(500);
        meter.charge(500).unwrap();
        assert_eq!(meter.remaining(), 0);
        assert!(meter.charge(1).is_err());
    }
}
