//! Cooperative cancellation and deadlines.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag.
///
/// Clones observe the same flag. Workers poll it between batches and every
/// checkpoint inside a batch; nothing is pre-empted.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// New, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Why work stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// The token was cancelled.
    Cancelled,
    /// The deadline passed.
    TimedOut,
}

/// Cancellation token plus optional deadline of one run.
#[derive(Clone, Debug)]
pub(crate) struct RunControl {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunControl {
    /// The deadline runs from now. A budget too large to represent is no
    /// deadline at all.
    pub(crate) fn new(token: CancellationToken, timeout: Option<Duration>) -> Self {
        Self {
            token,
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    /// Cancellation wins over timeout when both apply.
    pub(crate) fn check(&self) -> Option<Interrupt> {
        if self.token.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::TimedOut),
            _ => None,
        }
    }

    /// Sleeps for `delay` in short slices, returning early on interrupt.
    pub(crate) fn pause(&self, delay: Duration) -> Option<Interrupt> {
        const SLICE: Duration = Duration::from_millis(10);
        let until = Instant::now().checked_add(delay);
        loop {
            if let Some(interrupt) = self.check() {
                return Some(interrupt);
            }
            let now = Instant::now();
            let slice = match until {
                Some(until) if now >= until => return None,
                Some(until) => SLICE.min(until - now),
                None => SLICE,
            };
            std::thread::sleep(slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_control_deadline() {
        let control = RunControl::new(CancellationToken::new(), Some(Duration::ZERO));
        assert_eq!(control.check(), Some(Interrupt::TimedOut));
        let control = RunControl::new(CancellationToken::new(), None);
        assert_eq!(control.check(), None);
    }

    #[test]
    fn test_unrepresentable_deadline_never_expires() {
        let control = RunControl::new(CancellationToken::new(), Some(Duration::MAX));
        assert_eq!(control.check(), None);
        let control = RunControl::new(CancellationToken::new(), Some(Duration::from_secs(u64::MAX / 2)));
        assert_eq!(control.check(), None);
    }

    #[test]
    fn test_cancel_wins_over_timeout() {
        let token = CancellationToken::new();
        token.cancel();
        let control = RunControl::new(token, Some(Duration::ZERO));
        assert_eq!(control.check(), Some(Interrupt::Cancelled));
    }

    #[test]
    fn test_pause_returns_early() {
        let control = RunControl::new(CancellationToken::new(), Some(Duration::from_millis(20)));
        let start = Instant::now();
        assert_eq!(control.pause(Duration::from_secs(5)), Some(Interrupt::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
