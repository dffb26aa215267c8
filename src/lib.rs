//! cpuview — per-container virtualized view of host CPU statistics.
//!
//! A container reading its `/proc/stat` should see only the CPUs and CPU
//! time its cgroup policy entitles it to. This crate is the engine behind
//! that view: it reconciles the host's per-CPU time table with the
//! cgroup's own accounting, redistributes time from CPUs the container is
//! not entitled to, and renders a stable, monotonic per-virtual-CPU series
//! in the kernel's text format. The user-space filesystem that routes
//! reads here lives elsewhere; this crate only produces the bytes.
//!
//! Provides:
//! - `collector` — host `/proc` and cgroup sample sources behind a
//!   mockable filesystem seam
//! - `cpuset` — cpuset range-list parsing
//! - `view` — capacity policy, per-cgroup state cache, reconciliation,
//!   rendering
//!
//! # Usage
//!
//! ```
//! use cpuview::collector::MockFs;
//! use cpuview::{CpuView, SysConf};
//!
//! let view = CpuView::new(MockFs::quota_single_cpu(), SysConf::new(1, 1, 100));
//! let out = view.proc_stat("/lxc/app", 64 * 1024).unwrap();
//! assert!(out.starts_with("cpu  "));
//! ```
//!
//! In production, construct with [`collector::RealFs`] and
//! [`SysConf::detect`].

pub mod collector;
pub mod cpuset;
pub mod model;
pub mod sysconf;
pub mod view;

pub use collector::{CollectError, FileSystem, RealFs};
pub use cpuset::CpuSet;
pub use model::CpuUsage;
pub use sysconf::SysConf;
pub use view::{CpuView, CpuViewError};
