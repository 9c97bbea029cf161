//! VM-wide configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulingPolicy;

/// Tunables for a [`crate::tvm::Tvm`] instance. Constructed in code; no
/// on-disk format is mandated, though this derives (de)serialization
/// behind the optional `serde` feature for embedding hosts that want one.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VmConfig {
    pub memory_trits: usize,
    pub policy: SchedulingPolicy,
    pub time_quantum: u32,
    pub gc_threshold: f64,
    pub gc_min_interval_ticks: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            memory_trits: 729,
            policy: SchedulingPolicy::RoundRobin,
            time_quantum: 100,
            gc_threshold: 0.8,
            gc_min_interval_ticks: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = VmConfig::default();
        assert_eq!(cfg.memory_trits, 729);
        assert_eq!(cfg.time_quantum, 100);
        assert_eq!(cfg.gc_threshold, 0.8);
    }
}
