//! Resource admission controller.
//!
//! Samples process-visible memory and decides whether a memory-heavy stage
//! (upload parse, transcription, generation) may start. The gate is soft:
//! it bounds concurrency only indirectly, and a reclamation pass is a
//! best-effort hook that correctness never depends on. Denials are always
//! reported synchronously to the caller, before the stage begins.

use std::sync::Mutex;

use sysinfo::{MemoryRefreshKind, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::error::AdmissionError;

/// Used fraction above which pressure is flagged but still admitted.
const HIGH_FRACTION: f64 = 0.75;
/// Used fraction above which new heavy work is denied.
const CRITICAL_FRACTION: f64 = 0.90;
/// Absolute used-memory floor for a critical denial. Small processes on
/// small containers can legitimately sit at high fractions.
const CRITICAL_FLOOR_BYTES: u64 = 512 * 1024 * 1024;
/// A payload needs this multiple of its size in available memory before a
/// transcription or large-document parse may start.
const HEADROOM_FACTOR: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLevel {
    Normal,
    High,
    Critical,
}

/// A point-in-time memory sample.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MemoryStats {
    pub fn used_fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub allowed: bool,
    pub level: MemoryLevel,
    pub stats: MemoryStats,
}

/// Outcome of a payload-size check.
#[derive(Debug, Clone, Copy)]
pub struct SizeAdmission {
    pub allowed: bool,
    pub required_bytes: u64,
    pub available_bytes: u64,
}

/// Poll-based memory sampling seam. Injectable so tests can simulate
/// pressure instead of exhausting a real heap.
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> MemoryStats;
}

/// Probe backed by `sysinfo`, sampling the process's resident set against
/// system memory.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
    pid: sysinfo::Pid,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory_specifics(MemoryRefreshKind::everything());
        Self {
            system: Mutex::new(system),
            pid: sysinfo::Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn sample(&self) -> MemoryStats {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            // A poisoned probe lock degrades to "no pressure" rather than
            // blocking the pipeline.
            Err(_) => {
                return MemoryStats {
                    used_bytes: 0,
                    total_bytes: 0,
                    available_bytes: u64::MAX,
                }
            }
        };
        system.refresh_memory_specifics(MemoryRefreshKind::everything());
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        let process_used = system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or_else(|| system.used_memory());

        MemoryStats {
            used_bytes: process_used,
            total_bytes: system.total_memory(),
            available_bytes: system.available_memory(),
        }
    }
}

/// Probe returning fixed figures, adjustable at runtime. Intended for
/// tests and for embedders that meter memory externally.
pub struct StaticMemoryProbe {
    used: std::sync::atomic::AtomicU64,
    total: u64,
    available: std::sync::atomic::AtomicU64,
}

impl StaticMemoryProbe {
    pub fn new(used_bytes: u64, total_bytes: u64, available_bytes: u64) -> Self {
        Self {
            used: std::sync::atomic::AtomicU64::new(used_bytes),
            total: total_bytes,
            available: std::sync::atomic::AtomicU64::new(available_bytes),
        }
    }

    pub fn set_used(&self, bytes: u64) {
        self.used.store(bytes, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn set_available(&self, bytes: u64) {
        self.available
            .store(bytes, std::sync::atomic::Ordering::Relaxed);
    }
}

impl MemoryProbe for StaticMemoryProbe {
    fn sample(&self) -> MemoryStats {
        MemoryStats {
            used_bytes: self.used.load(std::sync::atomic::Ordering::Relaxed),
            total_bytes: self.total,
            available_bytes: self.available.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl MemoryProbe for std::sync::Arc<StaticMemoryProbe> {
    fn sample(&self) -> MemoryStats {
        self.as_ref().sample()
    }
}

/// Best-effort reclamation hook, invoked on denial and between retries.
/// Non-blocking and never guaranteed to free memory.
pub type ReclaimHook = Box<dyn Fn() + Send + Sync>;

pub struct AdmissionController {
    probe: Box<dyn MemoryProbe>,
    reclaim_hook: Option<ReclaimHook>,
}

impl AdmissionController {
    pub fn new(probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            probe,
            reclaim_hook: None,
        }
    }

    pub fn with_system_probe() -> Self {
        Self::new(Box::new(SystemMemoryProbe::new()))
    }

    pub fn with_reclaim_hook(mut self, hook: ReclaimHook) -> Self {
        self.reclaim_hook = Some(hook);
        self
    }

    /// Samples memory and classifies pressure. Critical denies; high admits
    /// with a warning for visibility.
    pub fn check_admission(&self) -> Admission {
        let stats = self.probe.sample();
        let fraction = stats.used_fraction();

        let level = if fraction > CRITICAL_FRACTION && stats.used_bytes > CRITICAL_FLOOR_BYTES {
            MemoryLevel::Critical
        } else if fraction > HIGH_FRACTION {
            MemoryLevel::High
        } else {
            MemoryLevel::Normal
        };

        match level {
            MemoryLevel::Critical => {
                warn!(
                    used = stats.used_bytes,
                    total = stats.total_bytes,
                    "Memory critical, denying new heavy work"
                );
                self.request_reclaim();
            }
            MemoryLevel::High => {
                warn!(
                    used = stats.used_bytes,
                    total = stats.total_bytes,
                    "Memory pressure high, admitting with reduced headroom"
                );
            }
            MemoryLevel::Normal => {
                debug!(used = stats.used_bytes, total = stats.total_bytes, "Memory normal");
            }
        }

        Admission {
            allowed: level != MemoryLevel::Critical,
            level,
            stats,
        }
    }

    /// Requires available memory to cover `HEADROOM_FACTOR` times the
    /// candidate payload. The fraction-based pressure check is separate
    /// (`check_admission`); callers gate on both where a stage buffers.
    pub fn can_handle_size(&self, payload_bytes: u64) -> SizeAdmission {
        let stats = self.probe.sample();
        let required = payload_bytes.saturating_mul(HEADROOM_FACTOR);
        let allowed = stats.available_bytes >= required;

        if !allowed {
            warn!(
                payload = payload_bytes,
                required,
                available = stats.available_bytes,
                "Payload too large for current memory headroom"
            );
            self.request_reclaim();
        }

        SizeAdmission {
            allowed,
            required_bytes: required,
            available_bytes: stats.available_bytes,
        }
    }

    /// Convenience wrapper turning a denial into the typed error the
    /// pipeline records.
    pub fn require_admission(&self) -> Result<Admission, AdmissionError> {
        let admission = self.check_admission();
        if admission.allowed {
            Ok(admission)
        } else {
            Err(AdmissionError::Denied {
                level: admission.level,
                used_bytes: admission.stats.used_bytes,
                total_bytes: admission.stats.total_bytes,
            })
        }
    }

    pub fn require_size(&self, payload_bytes: u64) -> Result<(), AdmissionError> {
        let size = self.can_handle_size(payload_bytes);
        if size.allowed {
            Ok(())
        } else {
            Err(AdmissionError::SizeDenied {
                payload_bytes,
                required_bytes: size.required_bytes,
                available_bytes: size.available_bytes,
            })
        }
    }

    /// Fires the reclamation hook if one is installed. Callers must never
    /// rely on memory actually being freed.
    pub fn request_reclaim(&self) {
        if let Some(ref hook) = self.reclaim_hook {
            debug!("Running reclamation hook");
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn controller(used: u64, total: u64, available: u64) -> AdmissionController {
        AdmissionController::new(Box::new(StaticMemoryProbe::new(used, total, available)))
    }

    #[test]
    fn test_normal_admission() {
        let ctrl = controller(GIB, 4 * GIB, 3 * GIB);
        let admission = ctrl.check_admission();
        assert!(admission.allowed);
        assert_eq!(admission.level, MemoryLevel::Normal);
    }

    #[test]
    fn test_high_pressure_still_admits() {
        let ctrl = controller(3200 * 1024 * 1024, 4 * GIB, 800 * 1024 * 1024);
        let admission = ctrl.check_admission();
        assert!(admission.allowed);
        assert_eq!(admission.level, MemoryLevel::High);
    }

    #[test]
    fn test_critical_denies() {
        let ctrl = controller(3700 * 1024 * 1024, 4 * GIB, 300 * 1024 * 1024);
        let admission = ctrl.check_admission();
        assert!(!admission.allowed);
        assert_eq!(admission.level, MemoryLevel::Critical);
        assert!(ctrl.require_admission().is_err());
    }

    #[test]
    fn test_high_fraction_below_floor_is_not_critical() {
        // 95% used of a tiny budget stays below the absolute floor.
        let ctrl = controller(95 * 1024 * 1024, 100 * 1024 * 1024, 5 * 1024 * 1024);
        let admission = ctrl.check_admission();
        assert!(admission.allowed);
        assert_eq!(admission.level, MemoryLevel::High);
    }

    #[test]
    fn test_size_check_requires_three_times_payload() {
        let ctrl = controller(GIB, 4 * GIB, 300 * 1024 * 1024);

        let ok = ctrl.can_handle_size(100 * 1024 * 1024);
        assert!(ok.allowed);
        assert_eq!(ok.required_bytes, 300 * 1024 * 1024);

        let denied = ctrl.can_handle_size(101 * 1024 * 1024);
        assert!(!denied.allowed);
        assert_eq!(denied.available_bytes, 300 * 1024 * 1024);

        match ctrl.require_size(101 * 1024 * 1024) {
            Err(AdmissionError::SizeDenied {
                payload_bytes,
                required_bytes,
                available_bytes,
            }) => {
                assert_eq!(payload_bytes, 101 * 1024 * 1024);
                assert_eq!(required_bytes, 303 * 1024 * 1024);
                assert_eq!(available_bytes, 300 * 1024 * 1024);
            }
            other => panic!("Expected SizeDenied, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_reclaim_hook_fires_on_denial() {
        let fired = Arc::new(AtomicU64::new(0));
        let fired_clone = Arc::clone(&fired);
        let ctrl = controller(3700 * 1024 * 1024, 4 * GIB, 100 * 1024 * 1024)
            .with_reclaim_hook(Box::new(move || {
                fired_clone.fetch_add(1, Ordering::Relaxed);
            }));

        ctrl.check_admission();
        assert_eq!(fired.load(Ordering::Relaxed), 1);

        ctrl.can_handle_size(200 * 1024 * 1024);
        assert_eq!(fired.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_used_fraction_zero_total() {
        let stats = MemoryStats {
            used_bytes: 10,
            total_bytes: 0,
            available_bytes: 0,
        };
        assert_eq!(stats.used_fraction(), 0.0);
    }
}
