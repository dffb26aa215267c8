//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic host `/proc/stat` tables and cgroup v1
//! trees for testing the CPU view under various container policies. All of
//! them place the container at cgroup path `/lxc/app` and assume a tick rate
//! of 100 (so 1 tick = 10,000,000 ns in `cpuacct` files).

use super::filesystem::MockFs;

/// Cgroup path used by every canned scenario.
pub const SCENARIO_CG: &str = "/lxc/app";

impl MockFs {
    /// Single-CPU host, full quota (quota == period), cpuset `0`.
    ///
    /// The cgroup has consumed 100 ticks of user and 50 ticks of system
    /// time; the host CPU additionally shows 200 ticks of idle.
    pub fn quota_single_cpu() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  100 0 50 200 0 0 0 0 0 0
cpu0 100 0 50 200 0 0 0 0 0 0
intr 1000 50 0 0
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );

        fs.add_cgroup_cpu_params(SCENARIO_CG, "100000", "100000");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 1000000000 500000000\n",
        );

        fs
    }

    /// Two-CPU host, quota limited to one CPU, cpuset `0-1`.
    ///
    /// Counters start at zero so tests control every delta.
    pub fn quota_two_cpu_host() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  0 0 0 0 0 0 0 0 0 0
cpu0 0 0 0 0 0 0 0 0 0 0
cpu1 0 0 0 0 0 0 0 0 0 0
ctxt 0
btime 1700000000
",
        );

        fs.add_cgroup_cpu_params(SCENARIO_CG, "100000", "100000");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0-1\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 0 0\n1 0 0\n",
        );

        fs
    }

    /// Four-CPU host, no quota, cpuset `0,2`.
    ///
    /// Host CPUs 1 and 3 are online on the host but outside the cpuset.
    pub fn cpuset_gap() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  400 0 200 800 0 0 0 0 0 0
cpu0 100 0 50 200 0 0 0 0 0 0
cpu1 100 0 50 200 0 0 0 0 0 0
cpu2 100 0 50 200 0 0 0 0 0 0
cpu3 100 0 50 200 0 0 0 0 0 0
ctxt 12345
btime 1700000000
",
        );

        fs.add_file("/sys/fs/cgroup/cpu/lxc/app/cpu.shares", "1024\n");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0,2\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "\
cpu user system
0 1000000000 500000000
1 1000000000 500000000
2 1000000000 500000000
3 1000000000 500000000
",
        );

        fs
    }

    /// Two-CPU host with neither bandwidth quota nor cpuset restriction.
    pub fn unlimited() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  200 0 100 400 0 0 0 0 0 0
cpu0 100 0 50 200 0 0 0 0 0 0
cpu1 100 0 50 200 0 0 0 0 0 0
ctxt 777
btime 1700000000
",
        );

        fs.add_file("/sys/fs/cgroup/cpu/lxc/app/cpu.shares", "1024\n");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0-1\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 1000000000 500000000\n1 1000000000 500000000\n",
        );

        fs
    }

    /// Adds the v1 bandwidth control files (and `cpu.shares`, which the
    /// pruner probes) for a cgroup.
    pub fn add_cgroup_cpu_params(&mut self, cg: &str, quota_us: &str, period_us: &str) {
        let cg = cg.trim_start_matches('/');
        self.add_file(
            format!("/sys/fs/cgroup/cpu/{cg}/cpu.cfs_quota_us"),
            format!("{quota_us}\n"),
        );
        self.add_file(
            format!("/sys/fs/cgroup/cpu/{cg}/cpu.cfs_period_us"),
            format!("{period_us}\n"),
        );
        self.add_file(format!("/sys/fs/cgroup/cpu/{cg}/cpu.shares"), "1024\n");
    }
}
