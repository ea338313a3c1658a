//! macOS sampling by shelling out to `top`/`sysctl`, per spec.md §4.1/§4.2.
//!
//! The reference implementation documents this path as self-declared
//! untested; we keep the same approach (no private Mach APIs) and rely on
//! the Linux `MockFs`-backed unit tests to cover the parsing formulas,
//! parsing the command *output* here with the same tolerant style.

use std::process::Command;

/// Runs `top -l 1` once and parses the `CPU usage: NN.N% user, NN.N% sys`
/// line into a single busy percentage.
pub fn sample_cpu_percent() -> Option<u8> {
    let output = Command::new("top").args(["-l", "1", "-n", "0"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse_top_cpu_line(&text)
}

pub fn parse_top_cpu_line(text: &str) -> Option<u8> {
    let line = text.lines().find(|l| l.contains("CPU usage"))?;
    let mut user = None;
    let mut sys = None;
    for part in line.split(',') {
        let part = part.trim();
        if let Some(pct) = part.strip_suffix("% user") {
            user = pct.trim().parse::<f64>().ok();
        } else if let Some(pct) = part.strip_suffix("% sys") {
            sys = pct.trim().parse::<f64>().ok();
        }
    }
    let total = user.unwrap_or(0.0) + sys.unwrap_or(0.0);
    Some(total.round().clamp(0.0, 100.0) as u8)
}

/// Runs `sysctl` for total physical memory and free page count, returning
/// `(total_bytes, free_bytes)`.
pub fn sample_memory_bytes() -> Option<(u64, u64)> {
    let memsize = sysctl_u64("hw.memsize")?;
    let page_size = sysctl_u64("vm.page_size").unwrap_or(4096);
    let free_pages = sysctl_u64("vm.page_free_count")?;
    Some((memsize, free_pages * page_size))
}

fn sysctl_u64(name: &str) -> Option<u64> {
    let output = Command::new("sysctl").args(["-n", name]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}
