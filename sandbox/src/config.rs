//! Sandbox configuration.

use serde::Deserialize;
use switchboard_hostapi::ExecutionConfig;

/// Configuration for the WASM sandbox.
///
/// Controls memory limits and the points/call-depth limits every session
/// enforces. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Maximum linear memory pages per instance (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Points and call-depth limits.
    pub execution: ExecutionConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            execution: ExecutionConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Memory limit in bytes handed to the store limiter.
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_pages as usize * 65536
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.max_memory_pages, 256);
        assert_eq!(config.max_memory_bytes(), 16 * 1024 * 1024);
        assert_eq!(config.execution.points_limit, 10_000_000);
    }

    #[test]
    fn test_deserialize_nested() {
        let config: SandboxConfig = serde_json::from_str(
            r#"{ "max_memory_pages": 4, "execution": { "point_pass_pct": 50 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_memory_pages, 4);
        assert_eq!(config.execution.point_pass_pct, 50);
        assert_eq!(config.execution.max_call_depth, 64);
    }

    #[test]
    fn test_deserialize_empty_is_default() {
        let config: SandboxConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SandboxConfig::default());
    }
}
