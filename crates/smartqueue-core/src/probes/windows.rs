//! Windows sampling via the Win32 API.
//!
//! Grounded on the teacher pack's `winapi`-based platform module
//! (`adaptive_pipeline_bootstrap/src/platform/windows.rs`): a `#[cfg(windows)]`
//! implementation calling the real API, and a `#[cfg(not(windows))]` stub so
//! the crate still cross-compiles on Linux/macOS CI.

#[cfg(windows)]
pub fn read_system_times() -> Option<(u64, u64, u64)> {
    use std::mem;
    use winapi::shared::minwindef::FILETIME;
    use winapi::um::processthreadsapi::GetSystemTimes;

    unsafe {
        let mut idle: FILETIME = mem::zeroed();
        let mut kernel: FILETIME = mem::zeroed();
        let mut user: FILETIME = mem::zeroed();
        if GetSystemTimes(&mut idle, &mut kernel, &mut user) == 0 {
            return None;
        }
        let to_u64 = |ft: FILETIME| ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64;
        // `kernel` time already includes idle time on Windows.
        Some((to_u64(idle), to_u64(kernel), to_u64(user)))
    }
}

#[cfg(not(windows))]
pub fn read_system_times() -> Option<(u64, u64, u64)> {
    None
}

#[cfg(windows)]
pub fn read_memory_status() -> Option<(u64, u64, u8)> {
    use std::mem;
    use winapi::um::sysinfoapi::{GlobalMemoryStatusEx, MEMORYSTATUSEX};

    unsafe {
        let mut status: MEMORYSTATUSEX = mem::zeroed();
        status.dwLength = mem::size_of::<MEMORYSTATUSEX>() as u32;
        if GlobalMemoryStatusEx(&mut status) == 0 {
            return None;
        }
        Some((status.ullTotalPhys, status.ullAvailPhys, status.dwMemoryLoad as u8))
    }
}

#[cfg(not(windows))]
pub fn read_memory_status() -> Option<(u64, u64, u8)> {
    None
}
