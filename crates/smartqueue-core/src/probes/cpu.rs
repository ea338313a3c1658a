//! CPU utilisation probe (spec.md §4.1).
//!
//! `current_percent()` is a lock-free atomic load, O(1), and never blocks —
//! the sampling itself runs on its own `tokio` timer task, matching the
//! teacher's `tick_loop` background-task style
//! (`rpglot-web/src/background.rs`).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use super::fallback::{fallback_percent, FallbackSample};
use super::linux::{cpu_percent_delta, read_proc_stat, CpuTicks};
use super::traits::{FileSystem, RealFs};
use super::{macos, windows};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Smoothed, periodically-refreshed CPU utilisation percentage.
pub struct CpuProbe {
    percent: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

enum Prior {
    Linux(CpuTicks),
    Windows { idle: u64, kernel: u64, user: u64, primed: bool },
    Fallback(FallbackSample),
    None,
}

impl CpuProbe {
    /// Spawns the background sampling task and returns a handle whose
    /// [`CpuProbe::current_percent`] starts at `0` until the first real
    /// sample lands (spec.md §4.1: "The first tick publishes 0").
    pub fn start(proc_path: String, enable_logs: bool) -> Self {
        Self::start_with_fs(RealFs::new(), proc_path, enable_logs)
    }

    pub(crate) fn start_with_fs<F: FileSystem + 'static>(
        fs: F,
        proc_path: String,
        enable_logs: bool,
    ) -> Self {
        let percent = Arc::new(AtomicU8::new(0));
        let published = percent.clone();
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(SAMPLE_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut prior = Prior::None;

            loop {
                tick.tick().await;
                if let Some(pct) = sample(&fs, &proc_path, &mut prior, cpus, enable_logs) {
                    published.store(pct, Ordering::Relaxed);
                }
            }
        });

        Self { percent, handle }
    }

    /// O(1), lock-free, never blocks.
    pub fn current_percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Stops the sampling task (spec.md §5 shutdown: "dispose probes").
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

fn sample<F: FileSystem>(
    fs: &F,
    proc_path: &str,
    prior: &mut Prior,
    cpus: usize,
    enable_logs: bool,
) -> Option<u8> {
    if cfg!(target_os = "linux") {
        return sample_linux(fs, proc_path, prior, enable_logs);
    }
    if cfg!(target_os = "windows") {
        return sample_windows(prior);
    }
    if cfg!(target_os = "macos") {
        return macos::sample_cpu_percent().or_else(|| sample_fallback(prior, cpus));
    }
    sample_fallback(prior, cpus)
}

fn sample_linux<F: FileSystem>(
    fs: &F,
    proc_path: &str,
    prior: &mut Prior,
    enable_logs: bool,
) -> Option<u8> {
    let curr = match read_proc_stat(fs, proc_path) {
        Ok(t) => t,
        Err(e) => {
            if enable_logs {
                warn!(error = %e, "cpu probe: failed to read /proc/stat");
            }
            return None;
        }
    };

    let result = match *prior {
        Prior::Linux(prev) => cpu_percent_delta(prev, curr),
        _ => Some(0),
    };
    *prior = Prior::Linux(curr);
    result
}

fn sample_windows(prior: &mut Prior) -> Option<u8> {
    let (idle, kernel, user) = windows::read_system_times()?;

    let result = match *prior {
        Prior::Windows { idle: p_idle, kernel: p_kernel, user: p_user, primed } => {
            let delta_idle = idle.saturating_sub(p_idle);
            let delta_total = kernel.saturating_sub(p_kernel) + user.saturating_sub(p_user);
            if !primed {
                None
            } else if delta_total == 0 {
                None
            } else {
                let busy = 100.0 - (100.0 * delta_idle as f64 / delta_total as f64);
                Some(busy.round().clamp(0.0, 100.0) as u8)
            }
        }
        _ => None,
    };

    *prior = Prior::Windows { idle, kernel, user, primed: true };
    result
}

fn sample_fallback(prior: &mut Prior, cpus: usize) -> Option<u8> {
    let curr = FallbackSample::now();
    let result = match prior {
        Prior::Fallback(prev) => Some(fallback_percent(prev, &curr, cpus)),
        _ => Some(0),
    };
    *prior = Prior::Fallback(curr);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::mock::MockFs;

    #[test]
    fn first_linux_sample_publishes_zero() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  1000 0 500 8000 0 0 0 0 0 0\n");
        let mut prior = Prior::None;
        assert_eq!(sample_linux(&fs, "/proc", &mut prior, false), Some(0));
    }

    #[test]
    fn second_linux_sample_computes_delta() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  1000 0 500 8000 0 0 0 0 0 0\n");
        let mut prior = Prior::None;
        sample_linux(&fs, "/proc", &mut prior, false);

        fs.add_file("/proc/stat", "cpu  2000 0 500 8000 0 0 0 0 0 0\n");
        let pct = sample_linux(&fs, "/proc", &mut prior, false).unwrap();
        assert_eq!(pct, 100);
    }

    #[test]
    fn missing_proc_stat_keeps_previous() {
        let fs = MockFs::new();
        let mut prior = Prior::Linux(CpuTicks::default());
        assert_eq!(sample_linux(&fs, "/proc", &mut prior, false), None);
    }

    #[tokio::test]
    async fn current_percent_starts_at_zero() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  0 0 0 0 0 0 0 0 0 0\n");
        let probe = CpuProbe::start_with_fs(fs, "/proc".to_string(), false);
        assert_eq!(probe.current_percent(), 0);
        probe.shutdown();
    }
}
