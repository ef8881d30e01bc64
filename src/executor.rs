//! Worker Pool Executor
//!
//! Fans argument combinations out to a fixed number of worker threads and
//! drains their results from the single orchestrating thread. Workers
//! compete for jobs over one shared bounded channel, which load-balances
//! naturally when some units are much slower than others.
//!
//! The user function decides each unit's fate explicitly:
//!
//! - `Ok(Some(outputs))` -- the unit produced a [`CallRecord`];
//! - `Ok(None)` -- skip this unit (it completes, contributes nothing, and
//!   is never retried);
//! - `Err(_)` or a panic -- fatal; the pool shuts down and the whole sweep
//!   aborts with [`Error::UserFn`].
//!
//! The skip sentinel is deliberate: "no result" is an explicit value, not
//! an emptiness check on the output.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;

use crate::aggregate::{CallRecord, SweepOutputs};
use crate::grid::ArgumentCombination;
use crate::{Error, Result};

/// The user function executed once per argument combination.
pub type SweepFn =
    dyn Fn(&ArgumentCombination) -> anyhow::Result<Option<SweepOutputs>> + Send + Sync;

/// In what order the pool hands results back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Results come back in input order; out-of-order completions are
    /// buffered until their turn.
    Ordered,
    /// Results come back as workers finish them. Cheaper on memory and
    /// latency; each record is still self-describing via its `inputs`.
    #[default]
    Unordered,
}

/// Pool sizing and delivery configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    /// Number of worker threads
    pub workers: usize,
    /// Result delivery order
    pub delivery: DeliveryMode,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            delivery: DeliveryMode::default(),
        }
    }
}

impl PoolOptions {
    /// Override the worker count. Values above the available parallelism
    /// are permitted but oversubscribe the CPU.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Override the delivery mode.
    #[must_use]
    pub const fn delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }
}

/// Host hardware parallelism, falling back to 1 when unknown.
#[must_use]
pub fn default_worker_count() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Live dispatched/completed counts, readable without blocking dispatch.
#[derive(Debug, Default)]
pub struct PoolCounters {
    dispatched: AtomicUsize,
    completed: AtomicUsize,
}

impl PoolCounters {
    /// Units handed to workers so far.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Units the pool has finished (including skips).
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

/// What one dispatched unit produced.
enum UnitOutcome {
    Record(CallRecord),
    Skipped,
    Failed(String),
}

/// Fixed-size pool of worker threads executing the user function.
pub struct WorkerPool {
    func: Arc<SweepFn>,
    options: PoolOptions,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Create a pool around a user function.
    pub fn new<F>(func: F, options: PoolOptions) -> Self
    where
        F: Fn(&ArgumentCombination) -> anyhow::Result<Option<SweepOutputs>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(func),
            options,
            counters: Arc::new(PoolCounters::default()),
        }
    }

    /// Handle to the live progress counters.
    #[must_use]
    pub fn counters(&self) -> Arc<PoolCounters> {
        Arc::clone(&self.counters)
    }

    /// Execute every combination, invoking `on_complete` with the running
    /// completed-unit count (skips included) as units finish.
    ///
    /// Returns the surviving call records in the configured delivery
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserFn`] as soon as any unit fails; in-flight
    /// units are abandoned and no partial result set is returned.
    pub fn run<F>(
        &self,
        combinations: Vec<ArgumentCombination>,
        mut on_complete: F,
    ) -> Result<Vec<CallRecord>>
    where
        F: FnMut(usize),
    {
        let total = combinations.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        let workers = self.options.workers.clamp(1, total);

        thread::scope(|scope| {
            // Channels live inside the scope so an early abort drops the
            // receiver and unblocks every producer before the join.
            let (job_tx, job_rx) = bounded::<(usize, ArgumentCombination)>(workers * 2);
            let (unit_tx, unit_rx) = bounded::<(usize, UnitOutcome)>(workers * 2);

            for worker_idx in 0..workers {
                let job_rx = job_rx.clone();
                let unit_tx = unit_tx.clone();
                let func = Arc::clone(&self.func);
                thread::Builder::new()
                    .name(format!("sweep-worker-{worker_idx}"))
                    .spawn_scoped(scope, move || {
                        for (seq, args) in job_rx.iter() {
                            let outcome = run_unit(func.as_ref(), args);
                            if unit_tx.send((seq, outcome)).is_err() {
                                // consumer gone, the run is aborting
                                break;
                            }
                        }
                    })
                    .map_err(Error::Io)?;
            }
            drop(job_rx);
            drop(unit_tx);

            let counters = Arc::clone(&self.counters);
            thread::Builder::new()
                .name("sweep-feeder".to_string())
                .spawn_scoped(scope, move || {
                    for job in combinations.into_iter().enumerate() {
                        if job_tx.send(job).is_err() {
                            break;
                        }
                        counters.dispatched.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .map_err(Error::Io)?;

            let mut records = Vec::with_capacity(total);
            let mut reorder: BTreeMap<usize, Option<CallRecord>> = BTreeMap::new();
            let mut next_seq = 0usize;
            let mut completed = 0usize;

            while let Ok((seq, outcome)) = unit_rx.recv() {
                completed += 1;
                self.counters.completed.fetch_add(1, Ordering::Relaxed);

                let maybe_record = match outcome {
                    UnitOutcome::Record(record) => Some(record),
                    UnitOutcome::Skipped => None,
                    // dropping unit_rx on return unblocks the workers,
                    // which in turn releases the feeder
                    UnitOutcome::Failed(trace) => return Err(Error::UserFn { trace }),
                };

                match self.options.delivery {
                    DeliveryMode::Unordered => {
                        if let Some(record) = maybe_record {
                            records.push(record);
                        }
                    }
                    DeliveryMode::Ordered => {
                        reorder.insert(seq, maybe_record);
                        while let Some(buffered) = reorder.remove(&next_seq) {
                            if let Some(record) = buffered {
                                records.push(record);
                            }
                            next_seq += 1;
                        }
                    }
                }
                on_complete(completed);
            }

            Ok(records)
        })
    }
}

/// Run one unit, converting errors and panics into a formatted trace.
fn run_unit(func: &SweepFn, args: ArgumentCombination) -> UnitOutcome {
    match catch_unwind(AssertUnwindSafe(|| func(&args))) {
        Ok(Ok(Some(outputs))) => UnitOutcome::Record(CallRecord::new(args, outputs)),
        Ok(Ok(None)) => UnitOutcome::Skipped,
        Ok(Err(err)) => UnitOutcome::Failed(format!("{err:?}")),
        Err(panic) => UnitOutcome::Failed(panic_trace(panic.as_ref())),
    }
}

fn panic_trace(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("worker panicked: {msg}")
    } else {
        "worker panicked".to_string()
    }
}
