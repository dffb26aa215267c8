//! The CPU-view engine.
//!
//! Ties the sample sources, the capacity policy, the per-cgroup state
//! cache, the reconciliation algorithm, and the renderer into the entry
//! points the filesystem layer calls:
//!
//! - [`CpuView::proc_stat`] — one full read: collect host and cgroup
//!   samples, reconcile, render.
//! - [`CpuView::render_proc_stat`] — the core cycle over samples and a
//!   host table the caller already holds.
//! - [`CpuView::read_cpuacct_usage`] — a per-CPU cgroup snapshot in ticks.
//! - [`CpuView::max_cpu_count`] — virtual CPU count, for `/proc/cpuinfo`
//!   rendering elsewhere.

pub mod policy;
pub mod reconcile;
pub mod registry;
pub mod render;

pub use policy::{CpuCapacity, capacity};
pub use reconcile::Reconciled;
pub use registry::{CPUVIEW_HASH_SIZE, PRUNE_INTERVAL, StatRegistry};

use crate::collector::cgroup::CgroupFs;
use crate::collector::procfs::{self, HostStatReader};
use crate::collector::traits::FileSystem;
use crate::collector::CollectError;
use crate::cpuset::CpuSet;
use crate::model::CpuUsage;
use crate::sysconf::SysConf;

/// Errors surfaced to the filesystem layer.
///
/// The caller translates these into a user-visible I/O error; nothing is
/// retried inside the engine.
#[derive(Debug)]
pub enum CpuViewError {
    /// A sample source failed.
    Collect(CollectError),
    /// The rendered output does not fit the caller's buffer.
    Capacity { needed: usize, cap: usize },
}

impl std::fmt::Display for CpuViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuViewError::Collect(e) => write!(f, "sample collection failed: {}", e),
            CpuViewError::Capacity { needed, cap } => {
                write!(f, "output of {} bytes exceeds buffer of {}", needed, cap)
            }
        }
    }
}

impl std::error::Error for CpuViewError {}

impl From<CollectError> for CpuViewError {
    fn from(e: CollectError) -> Self {
        CpuViewError::Collect(e)
    }
}

/// The per-process CPU-view engine.
///
/// Holds the sample sources and the cgroup node cache. Reads may run
/// concurrently from many threads; see the registry for the lock
/// discipline. Construction is `init()`, dropping the value is
/// `shutdown()`.
pub struct CpuView<F: FileSystem + Clone> {
    host: HostStatReader<F>,
    cgroup: CgroupFs<F>,
    sysconf: SysConf,
    registry: StatRegistry,
}

impl<F: FileSystem + Clone> CpuView<F> {
    pub const DEFAULT_PROC_PATH: &'static str = "/proc";
    pub const DEFAULT_CGROUP_ROOT: &'static str = "/sys/fs/cgroup";

    /// Creates an engine over the standard mount points.
    pub fn new(fs: F, sysconf: SysConf) -> Self {
        Self::with_paths(
            fs,
            Self::DEFAULT_PROC_PATH,
            Self::DEFAULT_CGROUP_ROOT,
            sysconf,
        )
    }

    /// Creates an engine with explicit proc and cgroup roots.
    pub fn with_paths(fs: F, proc_path: &str, cgroup_root: &str, sysconf: SysConf) -> Self {
        Self {
            host: HostStatReader::new(fs.clone(), proc_path),
            cgroup: CgroupFs::new(fs, cgroup_root),
            sysconf,
            registry: StatRegistry::new(),
        }
    }

    /// One full virtualized read of the host stat table for `cg`.
    ///
    /// A cgroup without any cpuset cannot be virtualized here; the caller
    /// falls back to serving the host table unfiltered.
    pub fn proc_stat(&self, cg: &str, out_cap: usize) -> Result<String, CpuViewError> {
        let cpuset = self.cgroup.cpuset(cg);
        if cpuset.is_empty() {
            return Err(CollectError::Missing("cpuset.cpus".into()).into());
        }

        let host_stat = self.host.read()?;
        let mut samples = self.read_cpuacct_usage(cg)?;
        self.reconcile_and_render(cg, &cpuset, &mut samples, &host_stat, out_cap)
    }

    /// The core read-reconcile-render cycle over caller-held inputs.
    ///
    /// `samples` is the cgroup's per-CPU snapshot (see
    /// [`read_cpuacct_usage`](Self::read_cpuacct_usage)); `host_stat` is
    /// the host table text. Returns the rendered block, or a `Capacity`
    /// error when it does not fit `out_cap`.
    pub fn render_proc_stat(
        &self,
        cg: &str,
        cpuset_list: &str,
        samples: &mut [CpuUsage],
        host_stat: &str,
        out_cap: usize,
    ) -> Result<String, CpuViewError> {
        let cpuset = CpuSet::parse(cpuset_list);
        self.reconcile_and_render(cg, &cpuset, samples, host_stat, out_cap)
    }

    fn reconcile_and_render(
        &self,
        cg: &str,
        cpuset: &CpuSet,
        samples: &mut [CpuUsage],
        host_stat: &str,
        out_cap: usize,
    ) -> Result<String, CpuViewError> {
        let host = procfs::parse_host_stat(host_stat);
        let cpu_cnt = reconcile::impute_idle(&host.cpus, samples, cpuset);

        let (quota, period) = self.cgroup.cpu_quota_and_period(cg);
        let cap = policy::capacity(quota, period, cpuset.count(), self.sysconf.nprocs_online);

        let node = self
            .registry
            .find_or_create(cg, samples, &|cg| self.cgroup.cgroup_exists(cg));

        // Held across reconcile and render so a reader observes a strictly
        // monotonic view.
        let mut state = node.lock();
        state.ensure_cpus(samples.len());
        let reconciled =
            reconcile::reconcile(&mut state, samples, cpu_cnt, cap.max_cpus, cap.exact_cpus);
        render::render_proc_stat(&reconciled, host.remainder, out_cap)
    }

    /// Reads the cgroup's per-CPU accounting snapshot, in ticks.
    pub fn read_cpuacct_usage(&self, cg: &str) -> Result<Vec<CpuUsage>, CollectError> {
        self.cgroup.cpuacct_usage(cg, self.sysconf.tick_rate)
    }

    /// The number of virtual CPUs the cgroup's policy exposes; 0 means
    /// unlimited.
    pub fn max_cpu_count(&self, cg: &str) -> u32 {
        let (quota, period) = self.cgroup.cpu_quota_and_period(cg);
        let cpuset_count = self.cgroup.cpuset(cg).count();
        policy::capacity(quota, period, cpuset_count, self.sysconf.nprocs_online).max_cpus
    }

    /// Number of cgroups currently cached, for diagnostics.
    pub fn cached_nodes(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, SCENARIO_CG, SharedFs};

    const OUT_CAP: usize = 64 * 1024;

    fn view_over(fs: MockFs, nprocs: u32) -> (SharedFs, CpuView<SharedFs>) {
        let shared = SharedFs::new(fs);
        let view = CpuView::new(shared.clone(), SysConf::new(nprocs, nprocs, 100));
        (shared, view)
    }

    /// Splits a rendered `cpuN` line into (user, system, idle).
    fn parse_line(out: &str, label: &str) -> (u64, u64, u64) {
        let line = out
            .lines()
            .find(|l| l.split_whitespace().next() == Some(label))
            .unwrap_or_else(|| panic!("no {label} line in output:\n{out}"));
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .map(|v| v.parse().unwrap())
            .collect();
        (fields[0], fields[2], fields[3])
    }

    #[test]
    fn test_full_quota_single_cpu_reads() {
        let (fs, view) = view_over(MockFs::quota_single_cpu(), 1);

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        assert!(out.starts_with("cpu  100 0 50 200 0 0 0 0 0 0\n"));
        assert!(out.contains("\ncpu0 100 0 50 200 0 0 0 0 0 0\n"));
        assert!(out.contains("intr 1000"));
        assert!(out.ends_with("procs_blocked 0\n"));

        fs.set_file(
            "/proc/stat",
            "cpu  200 0 100 400 0 0 0 0 0 0\ncpu0 200 0 100 400 0 0 0 0 0 0\nctxt 600000\n",
        );
        fs.set_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 2000000000 1000000000\n",
        );

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        assert!(out.starts_with("cpu  200 0 100 400 0 0 0 0 0 0\n"));
        assert!(out.contains("\ncpu0 200 0 100 400 0 0 0 0 0 0\n"));
        assert!(out.ends_with("ctxt 600000\n"));
    }

    #[test]
    fn test_two_cpu_host_quota_one_redistributes() {
        let (fs, view) = view_over(MockFs::quota_two_cpu_host(), 2);

        // Baseline read over zero counters.
        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        assert!(out.starts_with("cpu  0 0 0 0"));
        assert!(out.contains("\ncpu0 0 0 0 0"));
        assert!(!out.contains("\ncpu1 "));

        // Host deltas: cpu0 100/50/50, cpu1 40/20/140.
        // Cgroup deltas: cpu0 80/40, cpu1 20/10.
        fs.set_file(
            "/proc/stat",
            "\
cpu  140 0 70 190 0 0 0 0 0 0
cpu0 100 0 50 50 0 0 0 0 0 0
cpu1 40 0 20 140 0 0 0 0 0 0
ctxt 1
",
        );
        fs.set_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 800000000 400000000\n1 200000000 100000000\n",
        );

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        // Donor cpu1's surplus is credited to the one visible CPU.
        assert_eq!(parse_line(&out, "cpu0"), (100, 50, 50));
        assert_eq!(parse_line(&out, "cpu"), (100, 50, 50));
        assert!(!out.contains("\ncpu1 "));
    }

    #[test]
    fn test_partial_quota_zeroes_idle() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/stat",
            "cpu  40 0 10 50 0 0 0 0 0 0\ncpu0 40 0 10 50 0 0 0 0 0 0\nctxt 1\n",
        );
        fs.add_cgroup_cpu_params(SCENARIO_CG, "50000", "100000");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 400000000 100000000\n",
        );

        let (_fs, view) = view_over(fs, 1);
        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();

        // diff = {user:40, system:10, idle:50}; delta = floor(100*0.5).
        assert_eq!(parse_line(&out, "cpu0"), (40, 10, 0));
        assert_eq!(parse_line(&out, "cpu"), (40, 10, 0));
    }

    #[test]
    fn test_counter_reset_shows_new_incarnation_only() {
        let (fs, view) = view_over(MockFs::quota_single_cpu(), 1);

        view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();

        fs.set_file(
            "/proc/stat",
            "cpu  200 0 100 400 0 0 0 0 0 0\ncpu0 200 0 100 400 0 0 0 0 0 0\nctxt 2\n",
        );
        fs.set_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 2000000000 1000000000\n",
        );
        view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();

        // The cgroup is recreated: counters drop to 5/2 ticks.
        fs.set_file(
            "/proc/stat",
            "cpu  300 0 150 500 0 0 0 0 0 0\ncpu0 300 0 150 500 0 0 0 0 0 0\nctxt 3\n",
        );
        fs.set_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 50000000 20000000\n",
        );

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        // idle = 500 + (450 - 7)
        assert_eq!(parse_line(&out, "cpu0"), (5, 2, 943));
        assert_eq!(parse_line(&out, "cpu"), (5, 2, 943));
    }

    #[test]
    fn test_hotplug_expands_in_place() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/stat",
            "\
cpu  200 0 100 400 0 0 0 0 0 0
cpu0 100 0 50 200 0 0 0 0 0 0
cpu1 100 0 50 200 0 0 0 0 0 0
ctxt 1
",
        );
        fs.add_file("/sys/fs/cgroup/cpu/lxc/app/cpu.shares", "1024\n");
        fs.add_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0-1\n");
        fs.add_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "cpu user system\n0 1000000000 500000000\n1 1000000000 500000000\n",
        );

        let (fs, view) = view_over(fs, 4);
        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        assert_eq!(parse_line(&out, "cpu0"), (100, 50, 200));
        assert!(!out.contains("\ncpu2 "));

        // Two more CPUs appear, and the cpuset widens to cover them.
        fs.set_file(
            "/proc/stat",
            "\
cpu  360 0 180 720 0 0 0 0 0 0
cpu0 150 0 75 300 0 0 0 0 0 0
cpu1 150 0 75 300 0 0 0 0 0 0
cpu2 30 0 15 60 0 0 0 0 0 0
cpu3 30 0 15 60 0 0 0 0 0 0
ctxt 2
",
        );
        fs.set_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus", "0-3\n");
        fs.set_file(
            "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
            "\
cpu user system
0 1500000000 750000000
1 1500000000 750000000
2 300000000 150000000
3 300000000 150000000
",
        );

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        // Pre-existing accumulators grew by their deltas; the new CPUs
        // start from this sample alone.
        assert_eq!(parse_line(&out, "cpu0"), (150, 75, 300));
        assert_eq!(parse_line(&out, "cpu1"), (150, 75, 300));
        assert_eq!(parse_line(&out, "cpu2"), (30, 15, 60));
        assert_eq!(parse_line(&out, "cpu3"), (30, 15, 60));
    }

    #[test]
    fn test_cpuset_gap_relabels_contiguously() {
        let (_fs, view) = view_over(MockFs::cpuset_gap(), 4);

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        // Host CPUs 0 and 2 become virtual CPUs 0 and 1.
        assert_eq!(parse_line(&out, "cpu"), (200, 100, 400));
        assert_eq!(parse_line(&out, "cpu0"), (100, 50, 200));
        assert_eq!(parse_line(&out, "cpu1"), (100, 50, 200));
        assert!(!out.contains("\ncpu2 "));
        assert!(!out.contains("\ncpu3 "));
        assert!(out.ends_with("ctxt 12345\nbtime 1700000000\n"));
    }

    #[test]
    fn test_unrestricted_cgroup_sees_all_cpuset_cpus() {
        let (_fs, view) = view_over(MockFs::unlimited(), 2);

        let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
        assert_eq!(parse_line(&out, "cpu"), (200, 100, 400));
        assert_eq!(parse_line(&out, "cpu0"), (100, 50, 200));
        assert_eq!(parse_line(&out, "cpu1"), (100, 50, 200));
        assert_eq!(view.max_cpu_count(SCENARIO_CG), 2);
    }

    #[test]
    fn test_view_is_monotonic_across_reads() {
        let (fs, view) = view_over(MockFs::quota_two_cpu_host(), 2);

        let mut prev = (0, 0, 0);
        for step in 1..=5u64 {
            // Counters advance unevenly but never regress.
            let (u0, s0, i0) = (step * 70, step * 30, step * 40);
            let (u1, s1, i1) = (step * 20, step * 10, step * 110);
            fs.set_file(
                "/proc/stat",
                format!(
                    "cpu  {} 0 {} {} 0 0 0 0 0 0\ncpu0 {u0} 0 {s0} {i0} 0 0 0 0 0 0\ncpu1 {u1} 0 {s1} {i1} 0 0 0 0 0 0\nctxt {step}\n",
                    u0 + u1,
                    s0 + s1,
                    i0 + i1
                ),
            );
            fs.set_file(
                "/sys/fs/cgroup/cpuacct/lxc/app/cpuacct.usage_all",
                format!(
                    "cpu user system\n0 {} {}\n1 {} {}\n",
                    u0 * 10_000_000,
                    s0 * 10_000_000,
                    u1 * 10_000_000,
                    s1 * 10_000_000
                ),
            );

            let out = view.proc_stat(SCENARIO_CG, OUT_CAP).unwrap();
            let curr = parse_line(&out, "cpu0");
            assert!(
                curr.0 >= prev.0 && curr.1 >= prev.1 && curr.2 >= prev.2,
                "view regressed at step {step}: {prev:?} -> {curr:?}"
            );
            prev = curr;
        }
    }

    #[test]
    fn test_concurrent_readers_share_one_node_per_cgroup() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/stat",
            "cpu  100 0 50 200 0 0 0 0 0 0\ncpu0 100 0 50 200 0 0 0 0 0 0\nctxt 1\n",
        );
        for i in 0..10 {
            let cg = format!("/lxc/worker{i}");
            fs.add_cgroup_cpu_params(&cg, "100000", "100000");
            fs.add_file(
                format!("/sys/fs/cgroup/cpuset/lxc/worker{i}/cpuset.cpus"),
                "0\n",
            );
            fs.add_file(
                format!("/sys/fs/cgroup/cpuacct/lxc/worker{i}/cpuacct.usage_all"),
                "cpu user system\n0 1000000000 500000000\n",
            );
        }

        let (_fs, view) = view_over(fs, 1);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..10 {
                        let out = view
                            .proc_stat(&format!("/lxc/worker{i}"), OUT_CAP)
                            .unwrap();
                        assert!(out.starts_with("cpu  "));
                    }
                });
            }
        });

        assert_eq!(view.cached_nodes(), 10);
    }

    #[test]
    fn test_max_cpu_count() {
        let (_fs, view) = view_over(MockFs::quota_single_cpu(), 8);
        assert_eq!(view.max_cpu_count(SCENARIO_CG), 1);

        let (_fs, view) = view_over(MockFs::cpuset_gap(), 8);
        assert_eq!(view.max_cpu_count(SCENARIO_CG), 2);

        // Nothing restricts this cgroup.
        let (_fs, view) = view_over(MockFs::new(), 8);
        assert_eq!(view.max_cpu_count("/lxc/none"), 0);
    }

    #[test]
    fn test_missing_cpuset_is_a_collect_error() {
        let mut fs = MockFs::quota_single_cpu();
        fs.remove_file("/sys/fs/cgroup/cpuset/lxc/app/cpuset.cpus");

        let (_fs, view) = view_over(fs, 1);
        assert!(matches!(
            view.proc_stat(SCENARIO_CG, OUT_CAP),
            Err(CpuViewError::Collect(CollectError::Missing(_)))
        ));
    }

    #[test]
    fn test_output_capacity_is_enforced() {
        let (_fs, view) = view_over(MockFs::quota_single_cpu(), 1);
        assert!(matches!(
            view.proc_stat(SCENARIO_CG, 8),
            Err(CpuViewError::Capacity { cap: 8, .. })
        ));
    }

    #[test]
    fn test_render_proc_stat_with_caller_inputs() {
        let (_fs, view) = view_over(MockFs::quota_single_cpu(), 1);

        let mut samples = view.read_cpuacct_usage(SCENARIO_CG).unwrap();
        let host = "cpu  100 0 50 200 0 0 0 0 0 0\ncpu0 100 0 50 200 0 0 0 0 0 0\nctxt 9\n";

        let out = view
            .render_proc_stat(SCENARIO_CG, "0", &mut samples, host, OUT_CAP)
            .unwrap();
        assert!(out.starts_with("cpu  100 0 50 200"));
        assert!(out.ends_with("ctxt 9\n"));
    }
}
