//! Host `/proc` sample source.

pub mod parser;

pub use parser::{HostCpuLine, HostStat, parse_host_stat};

use std::path::PathBuf;

use crate::collector::CollectError;
use crate::collector::traits::FileSystem;

/// Reads the host per-CPU time table.
pub struct HostStatReader<F: FileSystem> {
    fs: F,
    stat_path: PathBuf,
}

impl<F: FileSystem> HostStatReader<F> {
    /// Creates a reader for `<proc_path>/stat`.
    pub fn new(fs: F, proc_path: &str) -> Self {
        Self {
            fs,
            stat_path: PathBuf::from(proc_path).join("stat"),
        }
    }

    /// Returns the raw table text. Parsing is separate because the engine
    /// also accepts tables handed in by the caller.
    pub fn read(&self) -> Result<String, CollectError> {
        Ok(self.fs.read_to_string(&self.stat_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_read_host_stat() {
        let reader = HostStatReader::new(MockFs::quota_single_cpu(), "/proc");
        let content = reader.read().unwrap();
        let stat = parse_host_stat(&content);
        assert_eq!(stat.cpus.len(), 1);
        assert_eq!(stat.cpus[0].user, 100);
    }

    #[test]
    fn test_read_missing_stat() {
        let reader = HostStatReader::new(MockFs::new(), "/proc");
        assert!(matches!(reader.read(), Err(CollectError::Io(_))));
    }
}
