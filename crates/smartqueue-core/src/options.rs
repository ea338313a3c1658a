//! Immutable admission-control configuration (spec.md §3).

use std::time::Duration;

use axum::http::StatusCode;

use crate::error::Error;

/// Recognised configuration keys, with the defaults from spec.md §3.
///
/// Construction never panics: build an `Options`, then call
/// [`Options::validate`] (also run implicitly by
/// [`crate::AdmissionController::new`]) to get a `ConfigError` synchronously
/// instead of an inconsistent controller (spec.md §7).
#[derive(Debug, Clone)]
pub struct Options {
    pub cpu_threshold: u8,
    pub memory_threshold: u8,
    pub use_memory_monitoring: bool,
    pub max_queue_size: usize,
    pub max_concurrent_requests: usize,
    pub max_wait: Duration,
    pub reject_status: StatusCode,
    pub reject_body: String,
    pub enable_logs: bool,
    /// Base path for the Linux probes' `/proc` reads. Overridable for
    /// containerised deployments that bind-mount `/proc` elsewhere.
    pub proc_path: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cpu_threshold: 80,
            memory_threshold: 90,
            use_memory_monitoring: true,
            max_queue_size: 100,
            max_concurrent_requests: 100,
            max_wait: Duration::from_secs(30),
            reject_status: StatusCode::SERVICE_UNAVAILABLE,
            reject_body: "Server is under high load. Please try again later.".to_string(),
            enable_logs: true,
            proc_path: "/proc".to_string(),
        }
    }
}

impl Options {
    pub fn with_cpu_threshold(mut self, v: u8) -> Self {
        self.cpu_threshold = v;
        self
    }

    pub fn with_memory_threshold(mut self, v: u8) -> Self {
        self.memory_threshold = v;
        self
    }

    pub fn with_use_memory_monitoring(mut self, v: bool) -> Self {
        self.use_memory_monitoring = v;
        self
    }

    pub fn with_max_queue_size(mut self, v: usize) -> Self {
        self.max_queue_size = v;
        self
    }

    pub fn with_max_concurrent_requests(mut self, v: usize) -> Self {
        self.max_concurrent_requests = v;
        self
    }

    pub fn with_max_wait(mut self, v: Duration) -> Self {
        self.max_wait = v;
        self
    }

    pub fn with_reject_status(mut self, v: StatusCode) -> Self {
        self.reject_status = v;
        self
    }

    pub fn with_reject_body(mut self, v: impl Into<String>) -> Self {
        self.reject_body = v.into();
        self
    }

    pub fn with_enable_logs(mut self, v: bool) -> Self {
        self.enable_logs = v;
        self
    }

    pub fn with_proc_path(mut self, v: impl Into<String>) -> Self {
        self.proc_path = v.into();
        self
    }

    /// Validates the effective-value contract of spec.md §6: thresholds in
    /// `[0,100]`, sizes `>= 1`, `max_wait >= 0` (always true for `Duration`).
    pub fn validate(&self) -> Result<(), Error> {
        if self.cpu_threshold > 100 {
            return Err(Error::Config(format!(
                "cpu_threshold must be in [0,100], got {}",
                self.cpu_threshold
            )));
        }
        if self.memory_threshold > 100 {
            return Err(Error::Config(format!(
                "memory_threshold must be in [0,100], got {}",
                self.memory_threshold
            )));
        }
        if self.max_queue_size < 1 {
            return Err(Error::Config("max_queue_size must be >= 1".to_string()));
        }
        if self.max_concurrent_requests < 1 {
            return Err(Error::Config(
                "max_concurrent_requests must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The exempt-path predicate of spec.md §4.5/§6: health/diagnostic paths
/// bypass admission entirely.
pub fn is_exempt_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.contains("health")
        || lower.contains("cpu")
        || lower.contains("memory")
        || lower.contains("/_")
        || lower.starts_with("/swagger")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let o = Options::default();
        assert_eq!(o.cpu_threshold, 80);
        assert_eq!(o.memory_threshold, 90);
        assert!(o.use_memory_monitoring);
        assert_eq!(o.max_queue_size, 100);
        assert_eq!(o.max_concurrent_requests, 100);
        assert_eq!(o.max_wait, Duration::from_secs(30));
        assert_eq!(o.reject_status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(o.enable_logs);
    }

    #[test]
    fn builder_round_trips_explicit_values() {
        let o = Options::default()
            .with_cpu_threshold(50)
            .with_max_queue_size(5)
            .with_max_concurrent_requests(2)
            .with_max_wait(Duration::from_secs(1));
        assert_eq!(o.cpu_threshold, 50);
        assert_eq!(o.max_queue_size, 5);
        assert_eq!(o.max_concurrent_requests, 2);
        assert_eq!(o.max_wait, Duration::from_secs(1));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let o = Options::default().with_cpu_threshold(255);
        assert!(o.validate().is_err());
    }

    #[test]
    fn rejects_zero_sized_queue() {
        let o = Options::default().with_max_queue_size(0);
        assert!(o.validate().is_err());
    }

    #[test]
    fn exempt_path_matches_are_case_insensitive() {
        assert!(is_exempt_path("/Health"));
        assert!(is_exempt_path("/api/CPU/stats"));
        assert!(is_exempt_path("/memory"));
        assert!(is_exempt_path("/_internal"));
        assert!(is_exempt_path("/swagger/index.html"));
        assert!(!is_exempt_path("/api/orders"));
    }
}
