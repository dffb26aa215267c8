//! Per-CPU accounting model shared between the sample sources and the
//! view engine.
//!
//! All times are in kernel ticks (USER_HZ). Counters coming from the kernel
//! are cumulative; the engine works on deltas between consecutive reads,
//! which must saturate to zero to absorb out-of-order sampling and cpuset
//! reshuffles.

/// CPU time attributed to a cgroup on one host CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuUsage {
    /// Ticks spent in user mode.
    pub user: u64,
    /// Ticks spent in system mode.
    pub system: u64,
    /// Idle ticks, imputed from host idle plus host time not consumed by
    /// the cgroup.
    pub idle: u64,
    /// Whether this host CPU is online and inside the cgroup's cpuset for
    /// the current sample.
    pub online: bool,
}

impl CpuUsage {
    /// Busy ticks (user + system).
    pub fn busy(&self) -> u64 {
        self.user + self.system
    }

    /// All accounted ticks (user + system + idle).
    pub fn total(&self) -> u64 {
        self.user + self.system + self.idle
    }

    /// Field-wise saturating delta against an earlier sample of the same
    /// counter. The online flag is taken from `self` (the newer sample).
    pub fn saturating_delta(&self, prev: &CpuUsage) -> CpuUsage {
        CpuUsage {
            user: self.user.saturating_sub(prev.user),
            system: self.system.saturating_sub(prev.system),
            idle: self.idle.saturating_sub(prev.idle),
            online: self.online,
        }
    }

    /// Accumulates a delta into this counter.
    pub fn accumulate(&mut self, diff: &CpuUsage) {
        self.user += diff.user;
        self.system += diff.system;
        self.idle += diff.idle;
    }
}
