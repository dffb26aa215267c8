//! In-memory mock filesystem for testing collectors without real `/proc`
//! or `/sys/fs/cgroup` trees.
//!
//! This module provides `MockFs` which simulates a filesystem in memory,
//! allowing tests to run on macOS and in CI environments without Linux,
//! and `SharedFs` which wraps a `MockFs` in a shared handle so tests can
//! advance counters between reads while the engine keeps its own handle.

use crate::collector::traits::FileSystem;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// In-memory filesystem for testing.
///
/// Stores files and directories in memory, allowing tests to simulate
/// various `/proc` and cgroup states without needing actual Linux access.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for existence probes on directory paths).
    directories: HashSet<PathBuf>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content, replacing any previous content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.directories.insert(path.clone());

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    /// Removes a file, if present.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }
}

/// Cloneable handle over a mutable `MockFs`.
///
/// The engine owns one clone, the test keeps another and rewrites files
/// between reads to simulate advancing counters, cgroup removal, hotplug.
#[derive(Debug, Clone, Default)]
pub struct SharedFs(Arc<RwLock<MockFs>>);

impl SharedFs {
    /// Wraps a mock filesystem in a shared handle.
    pub fn new(fs: MockFs) -> Self {
        Self(Arc::new(RwLock::new(fs)))
    }

    /// Replaces the content of a file (creating it if needed).
    pub fn set_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.0.write().unwrap().add_file(path, content);
    }

    /// Removes a file, simulating e.g. a deleted cgroup control file.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.0.write().unwrap().remove_file(path);
    }
}

impl FileSystem for SharedFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.0.read().unwrap().read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.0.read().unwrap().exists(path)
    }
}
