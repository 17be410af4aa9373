//! Batch partitioning and the parallel join.
//!
//! A run of `n` iterations is cut into batches of a fixed size. Batch `i`
//! covers iterations `[i·size, min((i+1)·size, n))` and draws from its own
//! generator seeded with `derive_batch_seed(master, i)`. The partition does
//! not depend on the number of workers, and [`execute_batches`] returns
//! results in batch order, so concatenating them gives the same sample
//! matrix for any pool size.

use rayon::prelude::*;
use rayon::ThreadPool;
use sim_core::rng::derive_batch_seed;

/// One batch of iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSpec {
    /// Batch index
    pub index: usize,
    /// First global iteration
    pub start: usize,
    /// Number of iterations
    pub len: usize,
    /// Sub-seed of this batch
    pub seed: u64,
}

impl BatchSpec {
    /// Global iteration range.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Partition of a run into batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    total_iterations: usize,
    batch_size: usize,
    batches: Vec<BatchSpec>,
}

impl BatchPlan {
    /// Partitions `total_iterations` into batches of `batch_size` (at least 1).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sim_engine::BatchPlan;
    ///
    /// let plan = BatchPlan::new(2_500, 1_000, 42);
    /// assert_eq!(plan.len(), 3);
    /// assert_eq!(plan.batches()[2].len, 500);
    /// ```
    pub fn new(total_iterations: usize, batch_size: usize, master_seed: u64) -> Self {
        let batch_size = batch_size.max(1);
        let batches = (0..total_iterations.div_ceil(batch_size))
            .map(|index| {
                let start = index * batch_size;
                BatchSpec {
                    index,
                    start,
                    len: batch_size.min(total_iterations - start),
                    seed: derive_batch_seed(master_seed, index as u64),
                }
            })
            .collect();
        Self {
            total_iterations,
            batch_size,
            batches,
        }
    }

    /// Batches in index order.
    pub fn batches(&self) -> &[BatchSpec] {
        &self.batches
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether there are no batches.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Iterations across all batches.
    pub fn total_iterations(&self) -> usize {
        self.total_iterations
    }

    /// Configured batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Runs `worker` on every batch inside `pool` and joins.
///
/// Blocks until every batch has returned. Results come back in batch index
/// order whatever order the workers finished in.
pub fn execute_batches<R, F>(pool: &ThreadPool, plan: &BatchPlan, worker: F) -> Vec<R>
where
    R: Send,
    F: Fn(&BatchSpec) -> R + Sync + Send,
{
    pool.install(|| plan.batches().par_iter().map(worker).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool(threads: usize) -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap()
    }

    #[test]
    fn test_plan_partition() {
        let plan = BatchPlan::new(10, 4, 1);
        let ranges: Vec<_> = plan.batches().iter().map(|b| b.range()).collect();
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
        assert!(BatchPlan::new(0, 4, 1).is_empty());
        assert_eq!(BatchPlan::new(5, 0, 1).batch_size(), 1);
    }

    #[test]
    fn test_seeds_depend_on_index_only() {
        let a = BatchPlan::new(100, 10, 9);
        let b = BatchPlan::new(1_000, 10, 9);
        assert_eq!(a.batches()[3].seed, b.batches()[3].seed);
        assert_ne!(a.batches()[3].seed, a.batches()[4].seed);
    }

    #[test]
    fn test_execute_preserves_order() {
        let plan = BatchPlan::new(1_000, 7, 0);
        for threads in [1, 3, 8] {
            let starts = execute_batches(&pool(threads), &plan, |b| {
                // later batches finish first
                std::thread::sleep(std::time::Duration::from_micros((200 - b.index as u64 % 200) * 2));
                b.start
            });
            let expected: Vec<usize> = plan.batches().iter().map(|b| b.start).collect();
            assert_eq!(starts, expected);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_plan_covers_every_iteration(total in 0usize..5_000, size in 1usize..700) {
            let plan = BatchPlan::new(total, size, 3);
            let covered: usize = plan.batches().iter().map(|b| b.len).sum();
            prop_assert_eq!(covered, total);
            for pair in plan.batches().windows(2) {
                prop_assert_eq!(pair[0].start + pair[0].len, pair[1].start);
            }
        }
    }
}
