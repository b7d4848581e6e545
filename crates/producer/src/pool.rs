//! Bounded worker pool over a partitioned index range.
//!
//! Work `[0, quantity)` is split into at most `max_parallel` contiguous
//! partitions, one OS thread each. A failing item stops the rest of its own
//! partition only; sibling partitions keep running and the pool always joins
//! every worker before returning.

use std::ops::Range;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::errors::{ProducerError, Result};

/// Default number of concurrent workers.
pub const DEFAULT_PARALLELISM: usize = 8;

/// Contiguous, non-overlapping partitions covering `[0, quantity)` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    quantity: usize,
    partitions: Vec<Range<usize>>,
}

impl PartitionPlan {
    pub fn new(quantity: usize, max_parallel: usize) -> Self {
        if quantity == 0 {
            return Self {
                quantity,
                partitions: Vec::new(),
            };
        }

        let parallel = max_parallel.max(1).min(quantity);
        let cnt = quantity.div_ceil(parallel);

        let mut partitions = Vec::with_capacity(parallel);
        for idx in 0..parallel {
            let start = idx * cnt;
            if start >= quantity {
                break;
            }
            let end = if idx == parallel - 1 {
                quantity
            } else {
                ((idx + 1) * cnt).min(quantity)
            };
            partitions.push(start..end);
        }

        Self {
            quantity,
            partitions,
        }
    }

    pub fn quantity(&self) -> usize {
        self.quantity
    }

    pub fn partitions(&self) -> &[Range<usize>] {
        &self.partitions
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// A partition that stopped before reaching its end.
#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: usize,
    pub range: Range<usize>,
    pub index: usize,
    pub error: ProducerError,
}

impl PartitionFailure {
    /// Items of the partition that were never produced.
    pub fn abandoned(&self) -> usize {
        self.range.end - self.index
    }
}

/// Result of a pool run: merged output plus an explicit partial-result count.
#[derive(Debug)]
pub struct PoolOutcome<T> {
    pub output: T,
    pub requested: usize,
    pub completed: usize,
    pub failures: Vec<PartitionFailure>,
}

impl<T> PoolOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.completed == self.requested
    }

    pub fn missing(&self) -> usize {
        self.requested - self.completed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_parallel: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}

impl WorkerPool {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    pub fn plan(&self, quantity: usize) -> PartitionPlan {
        PartitionPlan::new(quantity, self.max_parallel)
    }

    /// Run `work` for every index and collect the results in completion order.
    pub fn map<T, F>(&self, quantity: usize, work: F) -> PoolOutcome<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync,
    {
        let collected = Mutex::new(Vec::with_capacity(quantity));
        let outcome = self.run(quantity, work, |item| {
            collected.lock().push(item);
            Ok(())
        });

        PoolOutcome {
            output: collected.into_inner(),
            requested: outcome.requested,
            completed: outcome.completed,
            failures: outcome.failures,
        }
    }

    /// Run `work` for every index and hand each result to `merge`.
    ///
    /// `merge` is shared by all workers and must synchronise its own state.
    /// An error from either closure abandons the rest of that partition.
    pub fn run<T, F, M>(&self, quantity: usize, work: F, merge: M) -> PoolOutcome<()>
    where
        F: Fn(usize) -> Result<T> + Sync,
        M: Fn(T) -> Result<()> + Sync,
    {
        let plan = self.plan(quantity);
        debug!(
            quantity,
            partitions = plan.len(),
            max_parallel = self.max_parallel,
            "starting worker pool"
        );

        let work = &work;
        let merge = &merge;
        let reports: Vec<(usize, Option<PartitionFailure>)> = thread::scope(|scope| {
            let handles: Vec<_> = plan
                .partitions()
                .iter()
                .cloned()
                .enumerate()
                .map(|(partition, range)| {
                    scope.spawn(move || run_partition(partition, range, work, merge))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(report) => report,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut completed = 0;
        let mut failures = Vec::new();
        for (done, failure) in reports {
            completed += done;
            failures.extend(failure);
        }

        PoolOutcome {
            output: (),
            requested: quantity,
            completed,
            failures,
        }
    }
}

fn run_partition<T, F, M>(
    partition: usize,
    range: Range<usize>,
    work: &F,
    merge: &M,
) -> (usize, Option<PartitionFailure>)
where
    F: Fn(usize) -> Result<T> + Sync,
    M: Fn(T) -> Result<()> + Sync,
{
    let mut done = 0;
    for index in range.clone() {
        if let Err(err) = work(index).and_then(merge) {
            error!(
                partition,
                index,
                abandoned = range.end - index,
                error = %err,
                "work item failed, abandoning rest of partition"
            );
            return (
                done,
                Some(PartitionFailure {
                    partition,
                    range,
                    index,
                    error: err,
                }),
            );
        }
        done += 1;
    }
    (done, None)
}
