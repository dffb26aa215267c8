//! Capacity policy: how many virtual CPUs a cgroup's bandwidth and cpuset
//! controls entitle it to.

/// Derived per-read capacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuCapacity {
    /// Count of virtual CPUs exposed; 0 means "quota unlimited".
    pub max_cpus: u32,
    /// Fractional entitlement, for the partial-CPU idle correction;
    /// 0 when unlimited.
    pub exact_cpus: f64,
}

/// Derives the capacity from the bandwidth controls and the cpuset size.
///
/// `quota <= 0` or `period <= 0` means no bandwidth limit. A positive
/// cpuset count clamps the quota-derived count down (and stands in for it
/// entirely when there is no quota). The final clamp against the number of
/// online in-cpuset CPUs actually present in the host table happens inside
/// reconciliation, once that count is known.
pub fn capacity(quota: i64, period: i64, cpuset_count: u32, nprocs: u32) -> CpuCapacity {
    let mut max_cpus: u32 = if quota > 0 && period > 0 {
        let ceil = (quota / period) + i64::from(quota % period > 0);
        ceil.clamp(1, i64::from(nprocs.max(1))) as u32
    } else {
        0
    };

    if cpuset_count > 0 && (max_cpus == 0 || cpuset_count < max_cpus) {
        max_cpus = cpuset_count;
    }

    let exact_cpus = if quota > 0 && period > 0 {
        (quota as f64 / period as f64).clamp(0.0, f64::from(nprocs))
    } else {
        0.0
    };

    CpuCapacity {
        max_cpus,
        exact_cpus,
    }
}
