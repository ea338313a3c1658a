//! Cross-platform resource probes (spec.md §4.1, §4.2).

mod cpu;
mod fallback;
mod linux;
mod macos;
mod memory;
pub mod mock;
pub mod traits;
mod windows;

pub use cpu::CpuProbe;
pub use memory::{MemoryDetail, MemoryProbe};

/// What the admission controller needs from resource sampling. Implemented
/// by [`RealProbes`] in production and by a fixed-value stub in tests
/// (spec.md §8: "probes stubbable to exact values").
///
/// This trait is the seam that makes the controller's decision logic
/// testable without touching `/proc` at all — the controller only ever
/// talks to a `dyn Probes`, never to `CpuProbe`/`MemoryProbe` directly.
pub trait Probes: Send + Sync {
    fn cpu_percent(&self) -> u8;
    fn mem_percent(&self) -> u8;
    fn mem_detail(&self) -> MemoryDetail;
}

/// Production wiring: a live [`CpuProbe`] + [`MemoryProbe`] pair.
pub struct RealProbes {
    pub cpu: CpuProbe,
    pub mem: MemoryProbe,
}

impl RealProbes {
    pub fn start(proc_path: impl Into<String>, enable_logs: bool) -> Self {
        let proc_path = proc_path.into();
        Self {
            cpu: CpuProbe::start(proc_path.clone(), enable_logs),
            mem: MemoryProbe::start(proc_path, enable_logs),
        }
    }

    pub fn shutdown(self) {
        self.cpu.shutdown();
        self.mem.shutdown();
    }
}

impl Probes for RealProbes {
    fn cpu_percent(&self) -> u8 {
        self.cpu.current_percent()
    }

    fn mem_percent(&self) -> u8 {
        self.mem.current_percent()
    }

    fn mem_detail(&self) -> MemoryDetail {
        self.mem.detail()
    }
}

/// Fixed-value probes for admission-controller tests (spec.md §8's
/// end-to-end scenarios all pin `cpu=`/`mem=` to exact values).
pub struct StubProbes {
    pub cpu: std::sync::atomic::AtomicU8,
    pub mem: std::sync::atomic::AtomicU8,
}

impl StubProbes {
    pub fn new(cpu: u8, mem: u8) -> Self {
        Self {
            cpu: std::sync::atomic::AtomicU8::new(cpu),
            mem: std::sync::atomic::AtomicU8::new(mem),
        }
    }

    pub fn set_cpu(&self, cpu: u8) {
        self.cpu.store(cpu, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn set_mem(&self, mem: u8) {
        self.mem.store(mem, std::sync::atomic::Ordering::Relaxed);
    }
}

impl Probes for StubProbes {
    fn cpu_percent(&self) -> u8 {
        self.cpu.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn mem_percent(&self) -> u8 {
        self.mem.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn mem_detail(&self) -> MemoryDetail {
        MemoryDetail {
            percent: self.mem_percent(),
            ..Default::default()
        }
    }
}
