//! Sample sources for the CPU view.
//!
//! Everything the engine consumes comes from two trees: the host `/proc`
//! (the per-CPU time table) and the cgroup filesystem (per-cgroup CPU
//! accounting and policy). Both are read through the `FileSystem` trait so
//! tests can substitute an in-memory tree.
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                   Sample sources                   │
//! │  ┌──────────────────┐   ┌───────────────────────┐  │
//! │  │  HostStatReader  │   │       CgroupFs        │  │
//! │  │  - /proc/stat    │   │  - cpu.cfs_quota_us   │  │
//! │  └────────┬─────────┘   │  - cpuset.cpus        │  │
//! │           │             │  - cpuacct.usage_all  │  │
//! │           │             └───────────┬───────────┘  │
//! │           └───────────┬─────────────┘              │
//! │                ┌──────▼──────┐                     │
//! │                │  FileSystem │ (trait)             │
//! │                └──────┬──────┘                     │
//! └───────────────────────┼────────────────────────────┘
//!                         │
//!             ┌───────────┴───────────┐
//!      ┌──────▼──────┐         ┌──────▼──────┐
//!      │   RealFs    │         │   MockFs    │
//!      │  (Linux)    │         │  (testing)  │
//!      └─────────────┘         └─────────────┘
//! ```

pub mod cgroup;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use cgroup::CgroupFs;
pub use mock::{MockFs, SharedFs};
pub use procfs::HostStatReader;
pub use traits::{FileSystem, RealFs};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors raised while reading sample sources.
#[derive(Debug)]
pub enum CollectError {
    /// A control file the sample depends on does not exist.
    Missing(String),
    /// I/O error reading host or cgroup files.
    Io(std::io::Error),
    /// Malformed file content.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Missing(file) => write!(f, "missing control file: {}", file),
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}
