//! Single-flight guard for reconciliation cycles

use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks whether a cycle is running
///
/// The state is an epoch counter: odd while a cycle runs. A token only
/// releases the epoch it acquired.
#[derive(Debug, Default)]
pub struct CycleGuard {
    epoch: AtomicU64,
}

impl CycleGuard {
    /// Idle guard
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a cycle, `None` if one is already running
    pub fn try_acquire(&self) -> Option<CycleToken<'_>> {
        let current = self.epoch.load(Ordering::Acquire);
        if current % 2 == 1 {
            return None;
        }
        self.epoch
            .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleToken {
                guard: self,
                epoch: current + 1,
            })
    }

    /// Whether a cycle is running
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.epoch.load(Ordering::Acquire) % 2 == 1
    }
}

/// Held for the duration of one cycle; dropping it ends the cycle
#[derive(Debug)]
pub struct CycleToken<'a> {
    guard: &'a CycleGuard,
    epoch: u64,
}

impl Drop for CycleToken<'_> {
    fn drop(&mut self) {
        let _ = self.guard.epoch.compare_exchange(
            self.epoch,
            self.epoch + 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_entry_is_refused_until_release() {
        let guard = CycleGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(token);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn each_cycle_gets_a_new_epoch() {
        let guard = CycleGuard::new();
        drop(guard.try_acquire().unwrap());
        let second = guard.try_acquire().unwrap();
        assert_eq!(second.epoch, 3);
    }
}
