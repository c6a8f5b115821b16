//! Stream runtime configuration.

use serde::{Deserialize, Serialize};

/// Tunables shared by the operators of one pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Capacity of every inter-operator channel; a full channel applies
    /// backpressure upstream
    pub channel_capacity: usize,
    /// Worker count per unary operator; values above 1 trade input order
    /// for throughput
    pub concurrency: usize,
    /// Processing-time trigger drift beyond which a warning is logged, in
    /// milliseconds
    pub drift_warn_ms: i64,
    /// Default late-arrival tolerance for event-time windows, in
    /// milliseconds
    pub late_tolerance_ms: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            channel_capacity: 1024,
            concurrency: 1,
            drift_warn_ms: 100,
            late_tolerance_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = StreamConfig::default();
        assert_eq!(c.channel_capacity, 1024);
        assert_eq!(c.concurrency, 1);
    }
}
