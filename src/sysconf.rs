//! Host topology and clock configuration.

/// CPU counts and tick rate of the host, detected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysConf {
    /// CPUs configured on the host (including offline ones).
    pub nprocs_conf: u32,
    /// CPUs currently online.
    pub nprocs_online: u32,
    /// Kernel ticks per second (USER_HZ).
    pub tick_rate: i64,
}

impl SysConf {
    /// Builds a configuration from literal values (used in tests and by
    /// callers that already know the topology).
    pub fn new(nprocs_conf: u32, nprocs_online: u32, tick_rate: i64) -> Self {
        Self {
            nprocs_conf,
            nprocs_online,
            tick_rate,
        }
    }

    /// Detects the host configuration via `sysconf(3)`.
    ///
    /// Values the libc reports as unavailable fall back to a one-CPU,
    /// 100 Hz host.
    pub fn detect() -> Self {
        let nprocs_conf = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
        let nprocs_online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        let tick_rate = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };

        Self {
            nprocs_conf: if nprocs_conf > 0 { nprocs_conf as u32 } else { 1 },
            nprocs_online: if nprocs_online > 0 {
                nprocs_online as u32
            } else {
                1
            },
            tick_rate: if tick_rate > 0 { tick_rate } else { 100 },
        }
    }
}

impl Default for SysConf {
    fn default() -> Self {
        Self::detect()
    }
}
