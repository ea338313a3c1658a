//! `/proc` parsing for the Linux CPU and memory probes.
//!
//! Parsing style follows the teacher's `procfs::parser` module: tolerant,
//! line-oriented, `unwrap_or(0)` on malformed fields rather than failing
//! the whole read over one bad column.

use super::traits::FileSystem;
use std::path::Path;

/// Raw cumulative counters from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTicks {
    pub fn idle_sum(&self) -> u64 {
        self.idle + self.iowait
    }

    pub fn total_sum(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat` (spec.md §4.1).
pub fn parse_proc_stat(content: &str) -> Option<CpuTicks> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let get = |idx: usize| -> u64 {
        line.split_whitespace()
            .nth(idx)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    Some(CpuTicks {
        user: get(1),
        nice: get(2),
        system: get(3),
        idle: get(4),
        iowait: get(5),
        irq: get(6),
        softirq: get(7),
        steal: get(8),
    })
}

/// Computes the 0-100 busy percentage between two `/proc/stat` samples.
///
/// Returns `None` when `Δtotal == 0` (caller should keep publishing the
/// previous value, per spec.md §4.1).
pub fn cpu_percent_delta(prev: CpuTicks, curr: CpuTicks) -> Option<u8> {
    let delta_total = curr.total_sum().saturating_sub(prev.total_sum());
    if delta_total == 0 {
        return None;
    }
    let delta_idle = curr.idle_sum().saturating_sub(prev.idle_sum());
    let busy = 100.0 - (100.0 * delta_idle as f64 / delta_total as f64);
    Some(busy.round().clamp(0.0, 100.0) as u8)
}

/// Fields read from `/proc/meminfo` (spec.md §4.2), in kB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfoKb {
    pub total: u64,
    pub free: u64,
    pub available: Option<u64>,
    pub buffers: u64,
    pub cached: u64,
}

pub fn parse_meminfo(content: &str) -> MemInfoKb {
    let mut info = MemInfoKb::default();
    let kb = |line: &str| -> u64 {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    };

    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            info.total = kb(line);
        } else if line.starts_with("MemFree:") {
            info.free = kb(line);
        } else if line.starts_with("MemAvailable:") {
            info.available = Some(kb(line));
        } else if line.starts_with("Buffers:") {
            info.buffers = kb(line);
        } else if line.starts_with("Cached:") && !line.starts_with("SwapCached:") {
            info.cached = kb(line);
        }
    }

    info
}

impl MemInfoKb {
    /// `used = total - available`, falling back to `free + buffers + cached`
    /// when the kernel doesn't expose `MemAvailable` (pre-3.14 kernels).
    pub fn used_kb(&self) -> u64 {
        let available = self
            .available
            .unwrap_or_else(|| self.free + self.buffers + self.cached);
        self.total.saturating_sub(available)
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = 100.0 * self.used_kb() as f64 / self.total as f64;
        pct.round().clamp(0.0, 100.0) as u8
    }
}

/// Reads `VmRSS` from `/proc/self/status`, in kB. Stands in for "runtime
/// heap bytes" on a platform with no managed heap (see SPEC_FULL.md).
pub fn parse_self_rss_kb(content: &str) -> u64 {
    content
        .lines()
        .find(|l| l.starts_with("VmRSS:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

pub fn read_proc_stat<F: FileSystem>(fs: &F, proc_path: &str) -> std::io::Result<CpuTicks> {
    let content = fs.read_to_string(Path::new(&format!("{proc_path}/stat")))?;
    parse_proc_stat(&content)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "no aggregate cpu line"))
}

pub fn read_meminfo<F: FileSystem>(fs: &F, proc_path: &str) -> std::io::Result<MemInfoKb> {
    let content = fs.read_to_string(Path::new(&format!("{proc_path}/meminfo")))?;
    Ok(parse_meminfo(&content))
}

pub fn read_self_rss_kb<F: FileSystem>(fs: &F, proc_path: &str) -> u64 {
    fs.read_to_string(Path::new(&format!("{proc_path}/self/status")))
        .map(|c| parse_self_rss_kb(&c))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::mock::MockFs;

    const STAT: &str = "cpu  1000 0 500 8000 100 0 0 0 0 0\ncpu0 1000 0 500 8000 100 0 0 0 0 0\n";

    #[test]
    fn parses_aggregate_cpu_line() {
        let ticks = parse_proc_stat(STAT).unwrap();
        assert_eq!(ticks.user, 1000);
        assert_eq!(ticks.idle, 8000);
        assert_eq!(ticks.iowait, 100);
    }

    #[test]
    fn delta_zero_total_returns_none() {
        let t = CpuTicks::default();
        assert_eq!(cpu_percent_delta(t, t), None);
    }

    #[test]
    fn delta_all_idle_is_zero_percent() {
        let prev = CpuTicks { idle: 1000, ..Default::default() };
        let curr = CpuTicks { idle: 2000, ..Default::default() };
        assert_eq!(cpu_percent_delta(prev, curr), Some(0));
    }

    #[test]
    fn delta_all_busy_is_hundred_percent() {
        let prev = CpuTicks { user: 1000, idle: 500, ..Default::default() };
        let curr = CpuTicks { user: 2000, idle: 500, ..Default::default() };
        assert_eq!(cpu_percent_delta(prev, curr), Some(100));
    }

    #[test]
    fn meminfo_uses_mem_available_when_present() {
        let content = "MemTotal:       1000000 kB\nMemFree:         100000 kB\nMemAvailable:    400000 kB\nBuffers:          50000 kB\nCached:          100000 kB\n";
        let info = parse_meminfo(content);
        assert_eq!(info.total, 1_000_000);
        assert_eq!(info.used_kb(), 600_000);
        assert_eq!(info.percent(), 60);
    }

    #[test]
    fn meminfo_falls_back_without_mem_available() {
        let content = "MemTotal:       1000000 kB\nMemFree:         200000 kB\nBuffers:          50000 kB\nCached:          150000 kB\n";
        let info = parse_meminfo(content);
        assert_eq!(info.available, None);
        // used = total - (free + buffers + cached) = 1_000_000 - 400_000
        assert_eq!(info.used_kb(), 600_000);
    }

    #[test]
    fn read_proc_stat_via_mock_fs() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", STAT);
        let ticks = read_proc_stat(&fs, "/proc").unwrap();
        assert_eq!(ticks.user, 1000);
    }

    #[test]
    fn rss_parses_from_status() {
        let content = "Name:\tdemo\nVmRSS:\t   12345 kB\n";
        assert_eq!(parse_self_rss_kb(content), 12345);
    }
}
