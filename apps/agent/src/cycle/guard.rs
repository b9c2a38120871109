use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight flag shared by the scheduler and the manual trigger.
#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard, or `None` while another cycle holds it.
    pub fn try_start_cycle(&self) -> Option<CyclePermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                guard: self.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn cycle_finished(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Held for the duration of one cycle. Dropping it releases the guard.
#[derive(Debug)]
pub struct CyclePermit {
    guard: CycleGuard,
}

impl CyclePermit {
    pub fn cycle_finished(self) {}
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.guard.cycle_finished();
    }
}
