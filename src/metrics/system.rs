//! Host resource sampling.
//!
//! CPU usage is computed from the delta between two successive counter
//! samples, not an instantaneous value: the sampler keeps the previous
//! refresh between calls, so each snapshot reports the busy share of the
//! interval since the last one. The first snapshot after startup reports
//! against the baseline taken at construction.

use sysinfo::System;

/// Samples host memory and CPU counters
pub struct SystemSampler {
    sys: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Baseline sample so the first delta has something to diff against
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self { sys }
    }

    /// Memory in use as a percentage of total, 0.0 when total is unknown
    pub fn memory_used_pct(&mut self) -> f64 {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        (self.sys.used_memory() as f64 / total as f64) * 100.0
    }

    /// CPU busy share over the interval since the previous sample
    pub fn cpu_used_pct(&mut self) -> f64 {
        self.sys.refresh_cpu_usage();
        f64::from(self.sys.global_cpu_info().cpu_usage())
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pct_in_range() {
        let mut sampler = SystemSampler::new();
        let pct = sampler.memory_used_pct();
        assert!((0.0..=100.0).contains(&pct));
    }

    #[test]
    fn test_cpu_pct_non_negative() {
        let mut sampler = SystemSampler::new();
        // Two samples: the second diffs against the first
        let _ = sampler.cpu_used_pct();
        std::thread::sleep(std::time::Duration::from_millis(20));
        let pct = sampler.cpu_used_pct();
        assert!(pct >= 0.0);
    }
}
