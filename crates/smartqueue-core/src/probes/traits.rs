//! Abstraction for filesystem access so the Linux probes can be driven from
//! fixtures in tests instead of the real `/proc`.

use std::io;
use std::path::Path;

/// Minimal filesystem surface the Linux probes need.
///
/// Grounded on the same pattern used to make `/proc` parsing testable:
/// production code reads through [`RealFs`], tests read through
/// [`super::mock::MockFs`].
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_fs_reads_proc_self_status() {
        let fs = RealFs::new();
        // /proc/self/status exists on every Linux CI runner; skip elsewhere.
        if Path::new("/proc/self/status").exists() {
            let content = fs.read_to_string(Path::new("/proc/self/status")).unwrap();
            assert!(content.contains("Name:"));
        }
    }
}
