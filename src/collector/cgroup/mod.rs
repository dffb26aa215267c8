//! Cgroup filesystem accessor.
//!
//! Reads the control files the CPU view depends on: bandwidth quota and
//! period, the cpuset, the per-CPU `cpuacct` counters, and the existence
//! probe the pruner uses. File names are v1-style; on a v2 (unified) mount
//! the bandwidth controls are mapped to `cpu.max` / `cpu.weight`.

pub mod parser;

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::collector::traits::FileSystem;
use crate::collector::CollectError;
use crate::cpuset::CpuSet;
use crate::model::CpuUsage;

/// Cgroup hierarchy layout mounted at the accessor's root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupLayout {
    /// Per-controller hierarchies: `<root>/<controller>/<cg>/<file>`.
    V1,
    /// Unified hierarchy: `<root>/<cg>/<file>`.
    V2,
}

/// Accessor for a cgroup tree mounted at a fixed root.
pub struct CgroupFs<F: FileSystem> {
    fs: F,
    root: PathBuf,
    layout: CgroupLayout,
}

impl<F: FileSystem> CgroupFs<F> {
    /// Creates an accessor rooted at `root` (usually `/sys/fs/cgroup`),
    /// detecting whether a unified hierarchy is mounted there.
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let layout = if fs.exists(&root.join("cgroup.controllers")) {
            CgroupLayout::V2
        } else {
            CgroupLayout::V1
        };

        Self { fs, root, layout }
    }

    /// The detected hierarchy layout.
    pub fn layout(&self) -> CgroupLayout {
        self.layout
    }

    fn path(&self, controller: &str, cg: &str, file: &str) -> PathBuf {
        let mut p = self.root.clone();
        if self.layout == CgroupLayout::V1 {
            p.push(controller);
        }
        p.push(cg.trim_start_matches('/'));
        p.push(file);
        p
    }

    /// Reads a single control file as text.
    pub fn get(&self, controller: &str, cg: &str, file: &str) -> io::Result<String> {
        self.fs.read_to_string(&self.path(controller, cg, file))
    }

    /// Existence probe for a control file.
    pub fn param_exists(&self, controller: &str, cg: &str, file: &str) -> bool {
        self.fs.exists(&self.path(controller, cg, file))
    }

    /// Whether the cgroup still exists, probed via the bandwidth-weight
    /// control file. The pruner drops nodes for which this turns false.
    pub fn cgroup_exists(&self, cg: &str) -> bool {
        match self.layout {
            CgroupLayout::V1 => self.param_exists("cpu", cg, "cpu.shares"),
            CgroupLayout::V2 => self.param_exists("cpu", cg, "cpu.weight"),
        }
    }

    /// Reads the CFS bandwidth controls as (quota_us, period_us).
    ///
    /// A missing or malformed quota reads as -1 (unlimited), a missing
    /// period as 0 (not meaningful).
    pub fn cpu_quota_and_period(&self, cg: &str) -> (i64, i64) {
        match self.layout {
            CgroupLayout::V1 => {
                let quota = self
                    .get("cpu", cg, "cpu.cfs_quota_us")
                    .ok()
                    .and_then(|c| parser::parse_i64_param(&c))
                    .unwrap_or(-1);
                let period = self
                    .get("cpu", cg, "cpu.cfs_period_us")
                    .ok()
                    .and_then(|c| parser::parse_i64_param(&c))
                    .unwrap_or(0);
                (quota, period)
            }
            CgroupLayout::V2 => match self.get("cpu", cg, "cpu.max") {
                Ok(content) => parser::parse_cpu_max(&content),
                Err(_) => (-1, 0),
            },
        }
    }

    /// Reads the cgroup's cpuset as a parsed range-list.
    ///
    /// Falls back to the effective-cpuset file when the plain one is empty
    /// or missing; a cgroup without any cpuset reads as the empty set.
    pub fn cpuset(&self, cg: &str) -> CpuSet {
        let effective = match self.layout {
            CgroupLayout::V1 => "cpuset.effective_cpus",
            CgroupLayout::V2 => "cpuset.cpus.effective",
        };
        for file in ["cpuset.cpus", effective] {
            if let Ok(content) = self.get("cpuset", cg, file) {
                let set = CpuSet::parse(&content);
                if !set.is_empty() {
                    return set;
                }
            }
        }
        CpuSet::default()
    }

    /// Reads the per-CPU `cpuacct` counters for a cgroup, in ticks.
    ///
    /// Prefers `cpuacct.usage_all` (user/system split); falls back to
    /// `cpuacct.usage_percpu`, where the whole per-CPU total is carried as
    /// user time. Entries are returned with `online = false`; the
    /// reconciler flips the flag for CPUs present in the host table and
    /// the cpuset.
    pub fn cpuacct_usage(&self, cg: &str, tick_rate: i64) -> Result<Vec<CpuUsage>, CollectError> {
        if self.layout == CgroupLayout::V2 {
            // The unified hierarchy has no per-CPU accounting file; the
            // view engine requires the v1 cpuacct controller.
            return Err(CollectError::Missing("cpuacct.usage_all".into()));
        }

        match self.get("cpuacct", cg, "cpuacct.usage_all") {
            Ok(content) => {
                let rows = parser::parse_usage_all(&content)?;
                let len = rows.iter().map(|&(cpu, ..)| cpu + 1).max().unwrap_or(0);
                let mut usage = vec![CpuUsage::default(); len];
                for (cpu, user_ns, system_ns) in rows {
                    usage[cpu].user = parser::ns_to_ticks(user_ns, tick_rate);
                    usage[cpu].system = parser::ns_to_ticks(system_ns, tick_rate);
                }
                Ok(usage)
            }
            Err(e) => {
                warn!(cg, error = %e, "cpuacct.usage_all unreadable, falling back to usage_percpu");
                let content = self
                    .get("cpuacct", cg, "cpuacct.usage_percpu")
                    .map_err(|_| CollectError::Missing("cpuacct.usage_percpu".into()))?;
                Ok(parser::parse_usage_percpu(&content)
                    .into_iter()
                    .map(|total_ns| CpuUsage {
                        user: parser::ns_to_ticks(total_ns, tick_rate),
                        system: 0,
                        idle: 0,
                        online: false,
                    })
                    .collect())
            }
        }
    }
}
