//! Memory utilisation probe (spec.md §4.2).

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;
use tracing::warn;

use super::linux::{read_meminfo, read_self_rss_kb};
use super::traits::{FileSystem, RealFs};
use super::{macos, windows};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const DEGRADED_FALLBACK_PERCENT: u8 = 50;

/// Point-in-time memory snapshot. `heap_mb` reports process RSS on this
/// port — Rust has no managed heap (see SPEC_FULL.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryDetail {
    pub percent: u8,
    pub total_mb: u64,
    pub used_mb: u64,
    pub available_mb: u64,
    pub heap_mb: u64,
    /// Set when the fallback path could not determine total memory and is
    /// reporting a fixed, documented-degraded estimate.
    pub degraded: bool,
}

/// Smoothed memory utilisation, published as a single atomic snapshot swap
/// so readers never observe a torn value (spec.md §3).
pub struct MemoryProbe {
    snapshot: Arc<ArcSwap<MemoryDetail>>,
    handle: JoinHandle<()>,
}

impl MemoryProbe {
    pub fn start(proc_path: String, enable_logs: bool) -> Self {
        Self::start_with_fs(RealFs::new(), proc_path, enable_logs)
    }

    pub(crate) fn start_with_fs<F: FileSystem + 'static>(
        fs: F,
        proc_path: String,
        enable_logs: bool,
    ) -> Self {
        let snapshot = Arc::new(ArcSwap::from_pointee(MemoryDetail::default()));
        let published = snapshot.clone();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(SAMPLE_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                if let Some(detail) = sample(&fs, &proc_path, enable_logs) {
                    published.store(Arc::new(detail));
                }
            }
        });

        Self { snapshot, handle }
    }

    pub fn current_percent(&self) -> u8 {
        self.snapshot.load().percent
    }

    pub fn detail(&self) -> MemoryDetail {
        **self.snapshot.load()
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

fn sample<F: FileSystem>(fs: &F, proc_path: &str, enable_logs: bool) -> Option<MemoryDetail> {
    if cfg!(target_os = "linux") {
        return sample_linux(fs, proc_path, enable_logs);
    }
    if cfg!(target_os = "windows") {
        return windows::read_memory_status().map(|(total, avail, load)| MemoryDetail {
            percent: load,
            total_mb: total / 1024 / 1024,
            used_mb: (total.saturating_sub(avail)) / 1024 / 1024,
            available_mb: avail / 1024 / 1024,
            heap_mb: 0,
            degraded: false,
        });
    }
    if cfg!(target_os = "macos") {
        if let Some((total, free)) = macos::sample_memory_bytes() {
            let used = total.saturating_sub(free);
            let pct = if total == 0 { 0 } else { (100.0 * used as f64 / total as f64).round() as u8 };
            return Some(MemoryDetail {
                percent: pct,
                total_mb: total / 1024 / 1024,
                used_mb: used / 1024 / 1024,
                available_mb: free / 1024 / 1024,
                heap_mb: 0,
                degraded: false,
            });
        }
    }
    Some(degraded_fallback())
}

fn sample_linux<F: FileSystem>(fs: &F, proc_path: &str, enable_logs: bool) -> Option<MemoryDetail> {
    let info = match read_meminfo(fs, proc_path) {
        Ok(i) => i,
        Err(e) => {
            if enable_logs {
                warn!(error = %e, "memory probe: failed to read /proc/meminfo");
            }
            return None;
        }
    };
    let heap_kb = read_self_rss_kb(fs, proc_path);

    Some(MemoryDetail {
        percent: info.percent(),
        total_mb: info.total / 1024,
        used_mb: info.used_kb() / 1024,
        available_mb: info.total.saturating_sub(info.used_kb()) / 1024,
        heap_mb: heap_kb / 1024,
        degraded: false,
    })
}

fn degraded_fallback() -> MemoryDetail {
    MemoryDetail {
        percent: DEGRADED_FALLBACK_PERCENT,
        total_mb: 0,
        used_mb: 0,
        available_mb: 0,
        heap_mb: 0,
        degraded: true,
    }
}
