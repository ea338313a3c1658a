//! Self-process CPU fraction fallback for platforms with no dedicated
//! sampling path (spec.md §4.1 "Fallback").
//!
//! `percent = (Δprocess_cpu_time / (cpus · Δwall)) · 100`

use std::time::{Duration, Instant};

#[cfg(unix)]
fn process_cpu_time() -> Duration {
    unsafe {
        let mut usage: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut usage) != 0 {
            return Duration::ZERO;
        }
        let to_duration = |tv: libc::timeval| {
            Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
        };
        to_duration(usage.ru_utime) + to_duration(usage.ru_stime)
    }
}

#[cfg(not(unix))]
fn process_cpu_time() -> Duration {
    Duration::ZERO
}

pub struct FallbackSample {
    pub at: Instant,
    pub cpu_time: Duration,
}

impl FallbackSample {
    pub fn now() -> Self {
        Self { at: Instant::now(), cpu_time: process_cpu_time() }
    }
}

/// Computes the busy percentage between two fallback samples.
pub fn fallback_percent(prev: &FallbackSample, curr: &FallbackSample, cpus: usize) -> u8 {
    let wall = curr.at.saturating_duration_since(prev.at);
    if wall.is_zero() || cpus == 0 {
        return 0;
    }
    let delta_cpu = curr.cpu_time.saturating_sub(prev.cpu_time);
    let pct = 100.0 * delta_cpu.as_secs_f64() / (cpus as f64 * wall.as_secs_f64());
    pct.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_wall_time_is_zero_percent() {
        let s = FallbackSample { at: Instant::now(), cpu_time: Duration::ZERO };
        assert_eq!(fallback_percent(&s, &s, 4), 0);
    }

    #[test]
    fn full_single_core_saturation_is_hundred_percent() {
        let prev = FallbackSample { at: Instant::now(), cpu_time: Duration::from_secs(0) };
        let curr = FallbackSample {
            at: prev.at + Duration::from_secs(1),
            cpu_time: Duration::from_secs(1),
        };
        assert_eq!(fallback_percent(&prev, &curr, 1), 100);
    }
}
