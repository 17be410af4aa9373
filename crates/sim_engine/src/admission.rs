//! Concurrency bound on runs. Extra runs queue rather than fail.

use std::sync::{Condvar, Mutex};

/// Counting gate admitting at most `capacity` runs at once.
#[derive(Debug)]
pub(crate) struct AdmissionGate {
    capacity: usize,
    active: Mutex<usize>,
    released: Condvar,
}

impl AdmissionGate {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            active: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Blocks until a slot is free.
    pub(crate) fn acquire(&self) -> AdmissionPermit<'_> {
        let mut active = self.active.lock().unwrap_or_else(|p| p.into_inner());
        while *active >= self.capacity {
            active = self.released.wait(active).unwrap_or_else(|p| p.into_inner());
        }
        *active += 1;
        AdmissionPermit { gate: self }
    }

    /// Runs currently admitted.
    pub(crate) fn active(&self) -> usize {
        *self.active.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Held for the duration of a run.
#[derive(Debug)]
pub(crate) struct AdmissionPermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        let mut active = self.gate.active.lock().unwrap_or_else(|p| p.into_inner());
        *active = active.saturating_sub(1);
        self.gate.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_permits_are_released() {
        let gate = AdmissionGate::new(2);
        let a = gate.acquire();
        let _b = gate.acquire();
        assert_eq!(gate.active(), 2);
        drop(a);
        assert_eq!(gate.active(), 1);
    }

    #[test]
    fn test_gate_bounds_concurrency() {
        let gate = Arc::new(AdmissionGate::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (gate, running, peak) = (Arc::clone(&gate), Arc::clone(&running), Arc::clone(&peak));
                std::thread::spawn(move || {
                    let _permit = gate.acquire();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(gate.active(), 0);
    }
}
