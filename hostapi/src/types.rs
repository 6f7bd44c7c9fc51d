//! Host-side execution limits.
//!
//! `ExecutionConfig` bundles the points and call-depth limits a session
//! enforces. Hosts can load it from any serde format; missing fields take
//! their defaults.

use serde::Deserialize;
use switchboard_primitives::{ARGBUF_LEN, DEFAULT_POINT_PASS_PCT};

/// Limits applied to every top-level call in a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Points granted to a top-level call that requests a limit of `0`.
    pub points_limit: u64,
    /// Share (percent) of the caller's remaining points a callee inherits
    /// when the requested limit is `0`.
    pub point_pass_pct: u64,
    /// Maximum number of frames on the call stack, top-level call included.
    pub max_call_depth: usize,
    /// Maximum size of a host resource handed to a guest.
    pub max_resource_len: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            points_limit: 10_000_000,
            point_pass_pct: DEFAULT_POINT_PASS_PCT,
            max_call_depth: 64,
            max_resource_len: ARGBUF_LEN,
        }
    }
}

impl ExecutionConfig {
    /// The points a top-level call runs under for a requested `limit`.
    pub fn top_level_limit(&self, limit: u64) -> u64 {
        match limit {
            0 => self.points_limit,
            n => n,
        }
    }
}
