//! Admission control - capability layer
//!
//! A coarse, slice-granularity backpressure signal: may a new slice of jobs
//! start, given currently available system memory? Denial is never an error
//! and never counts against any job's retry budget.

use std::sync::Mutex;

use sysinfo::System;
use tracing::debug;

/// Decides whether a new slice of jobs may be admitted
pub trait AdmissionPolicy: Send + Sync {
    fn admit(&self) -> bool;
}

/// Admits a slice only while available memory stays above a threshold
pub struct MemoryAdmission {
    min_free_bytes: u64,
    sys: Mutex<System>,
}

impl MemoryAdmission {
    pub fn new(min_free_mb: u64) -> Self {
        Self {
            min_free_bytes: min_free_mb * 1024 * 1024,
            sys: Mutex::new(System::new()),
        }
    }
}

impl AdmissionPolicy for MemoryAdmission {
    fn admit(&self) -> bool {
        let mut sys = match self.sys.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };
        sys.refresh_memory();
        let available = sys.available_memory();
        debug!(
            "admission check: {} MB available, {} MB required",
            available / (1024 * 1024),
            self.min_free_bytes / (1024 * 1024)
        );
        available >= self.min_free_bytes
    }
}

/// Admission control disabled: every slice is admitted immediately.
/// This is the degenerate configuration used by the sequential CSV mode.
pub struct AlwaysAdmit;

impl AdmissionPolicy for AlwaysAdmit {
    fn admit(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_admit_admits() {
        assert!(AlwaysAdmit.admit());
    }

    #[test]
    fn zero_threshold_always_passes() {
        // available_memory >= 0 holds on any host
        assert!(MemoryAdmission::new(0).admit());
    }

    #[test]
    fn unreachable_threshold_denies() {
        // No host has an exabyte free
        assert!(!MemoryAdmission::new(1 << 40).admit());
    }
}
