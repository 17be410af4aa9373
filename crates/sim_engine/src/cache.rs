//! Result cache and single-flight coordination.
//!
//! [`ResultCache`] is the pluggable store; [`MokaResultCache`] is the
//! in-memory default with size and TTL eviction. [`SingleFlight`] makes
//! concurrent identical misses compute once: the first caller leads, later
//! callers wait for the leader's result.

use crate::control::{Interrupt, RunControl};
use crate::error::CacheError;
use crate::result::SimulationResult;
use moka::sync::Cache;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Cache key: blake3 over everything that determines a result.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives a key from the scenario hash, iteration count, seed and a
    /// descriptor of the correlation and batching settings.
    pub fn derive(scenario_hash: &str, iterations: usize, seed: u64, settings: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(scenario_hash.as_bytes());
        hasher.update(&(iterations as u64).to_le_bytes());
        hasher.update(&seed.to_le_bytes());
        hasher.update(settings.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..self.0.len().min(16)])
    }
}

/// Store for completed results.
///
/// Implementations must tolerate concurrent calls. Errors are logged by the
/// engine and treated as misses.
pub trait ResultCache: Send + Sync {
    /// Looks up a result.
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<SimulationResult>>, CacheError>;

    /// Stores a result.
    fn insert(&self, key: CacheKey, result: Arc<SimulationResult>) -> Result<(), CacheError>;

    /// Drops every entry.
    fn clear(&self) -> Result<(), CacheError>;

    /// Approximate number of entries.
    fn len(&self) -> u64;

    /// Whether the cache holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory cache backed by moka.
///
/// # Examples
///
/// ```rust
/// use sim_engine::{CacheKey, MokaResultCache, ResultCache};
/// use std::time::Duration;
///
/// let cache = MokaResultCache::new(16, Duration::from_secs(60));
/// let key = CacheKey::derive("abc", 1_000, 42, "gaussian");
/// assert!(cache.get(&key).unwrap().is_none());
/// ```
pub struct MokaResultCache {
    cache: Cache<CacheKey, Arc<SimulationResult>>,
}

impl MokaResultCache {
    /// Cache holding at most `capacity` results for at most `ttl`.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }
}

impl ResultCache for MokaResultCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Arc<SimulationResult>>, CacheError> {
        Ok(self.cache.get(key))
    }

    fn insert(&self, key: CacheKey, result: Arc<SimulationResult>) -> Result<(), CacheError> {
        self.cache.insert(key, result);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        Ok(())
    }

    fn len(&self) -> u64 {
        self.cache.entry_count()
    }
}

// =============================================================================
// Single flight
// =============================================================================

type Outcome = Option<Arc<SimulationResult>>;

#[derive(Default)]
struct Slot {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

/// Deduplicates concurrent computations of the same key.
#[derive(Default)]
pub struct SingleFlight {
    in_flight: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

/// Role of a caller in a single flight.
pub enum Flight<'a> {
    /// First caller: computes and publishes through the guard.
    Leader(FlightGuard<'a>),
    /// Later caller: waits for the leader.
    Follower(FlightWaiter),
}

impl SingleFlight {
    /// New, empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the flight for `key`, leading it if none is in progress.
    pub fn join(&self, key: &CacheKey) -> Flight<'_> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match in_flight.get(key) {
            Some(slot) => Flight::Follower(FlightWaiter { slot: Arc::clone(slot) }),
            None => {
                let slot = Arc::new(Slot::default());
                in_flight.insert(key.clone(), Arc::clone(&slot));
                Flight::Leader(FlightGuard {
                    owner: self,
                    key: key.clone(),
                    slot,
                    published: false,
                })
            }
        }
    }

    /// Keys currently being computed.
    pub fn in_progress(&self) -> usize {
        self.in_flight
            .lock()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

/// Leader's handle. Dropping it without publishing releases followers with
/// no result, so they compute on their own.
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: CacheKey,
    slot: Arc<Slot>,
    published: bool,
}

impl FlightGuard<'_> {
    /// Hands the leader's result (or `None` when nothing cacheable was
    /// produced) to every follower.
    pub fn publish(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.published {
            return;
        }
        self.published = true;
        self.owner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.key);
        let mut slot = self
            .slot
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(outcome);
        self.slot.ready.notify_all();
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.finish(None);
    }
}

/// Follower's handle.
pub struct FlightWaiter {
    slot: Arc<Slot>,
}

impl FlightWaiter {
    /// Blocks until the leader publishes.
    pub fn wait(self) -> Outcome {
        let mut outcome = self
            .slot
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .slot
                .ready
                .wait(outcome)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Blocks until the leader publishes or the follower's own run is
    /// cancelled or out of time.
    pub(crate) fn wait_or_interrupt(self, control: &RunControl) -> Result<Outcome, Interrupt> {
        const SLICE: Duration = Duration::from_millis(10);
        let mut outcome = self
            .slot
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(result) = outcome.as_ref() {
                return Ok(result.clone());
            }
            if let Some(interrupt) = control.check() {
                return Err(interrupt);
            }
            outcome = self
                .slot
                .ready
                .wait_timeout(outcome, SLICE)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancellationToken;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_depends_on_every_input() {
        let base = CacheKey::derive("h", 100, 1, "s");
        assert_eq!(base, CacheKey::derive("h", 100, 1, "s"));
        assert_ne!(base, CacheKey::derive("g", 100, 1, "s"));
        assert_ne!(base, CacheKey::derive("h", 101, 1, "s"));
        assert_ne!(base, CacheKey::derive("h", 100, 2, "s"));
        assert_ne!(base, CacheKey::derive("h", 100, 1, "t"));
        assert_eq!(base.as_str().len(), 64);
    }

    #[test]
    fn test_leader_then_follower() {
        let flight = SingleFlight::new();
        let key = CacheKey::derive("h", 1, 1, "");
        let leader = match flight.join(&key) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        assert!(matches!(flight.join(&key), Flight::Follower(_)));
        assert_eq!(flight.in_progress(), 1);
        drop(leader);
        assert_eq!(flight.in_progress(), 0);
        assert!(matches!(flight.join(&key), Flight::Leader(_)));
    }

    #[test]
    fn test_followers_receive_released_outcome() {
        let flight = Arc::new(SingleFlight::new());
        let key = CacheKey::derive("h", 1, 1, "");
        let leader = match flight.join(&key) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        let woke = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let waiter = match flight.join(&key) {
                    Flight::Follower(w) => w,
                    Flight::Leader(_) => panic!("flight already led"),
                };
                let woke = Arc::clone(&woke);
                std::thread::spawn(move || {
                    let outcome = waiter.wait();
                    woke.fetch_add(1, Ordering::SeqCst);
                    outcome.is_none()
                })
            })
            .collect();
        leader.publish(None);
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(woke.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_follower_wait_honours_own_deadline() {
        let flight = SingleFlight::new();
        let key = CacheKey::derive("h", 1, 1, "");
        let _leader = match flight.join(&key) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        let waiter = match flight.join(&key) {
            Flight::Follower(w) => w,
            Flight::Leader(_) => panic!("flight already led"),
        };
        let control = RunControl::new(CancellationToken::new(), Some(Duration::from_millis(50)));
        let started = std::time::Instant::now();
        assert_eq!(waiter.wait_or_interrupt(&control).err(), Some(Interrupt::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(flight.in_progress(), 1);
    }

    #[test]
    fn test_follower_wait_honours_cancellation() {
        let flight = Arc::new(SingleFlight::new());
        let key = CacheKey::derive("h", 1, 1, "");
        let leader = match flight.join(&key) {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("first caller must lead"),
        };
        let waiter = match flight.join(&key) {
            Flight::Follower(w) => w,
            Flight::Leader(_) => panic!("flight already led"),
        };
        let token = CancellationToken::new();
        let control = RunControl::new(token.clone(), None);
        let handle = std::thread::spawn(move || waiter.wait_or_interrupt(&control));
        std::thread::sleep(Duration::from_millis(30));
        token.cancel();
        assert_eq!(handle.join().unwrap().err(), Some(Interrupt::Cancelled));

        let waiter = match flight.join(&key) {
            Flight::Follower(w) => w,
            Flight::Leader(_) => panic!("flight already led"),
        };
        leader.publish(None);
        let control = RunControl::new(CancellationToken::new(), None);
        assert_eq!(waiter.wait_or_interrupt(&control), Ok(None));
    }
}
