//! Sweep orchestration
//!
//! Ties the pieces together: enumerate combinations, drive the worker
//! pool from the single orchestrating thread, throttle progress, reshape
//! records into the columnar aggregate, and hand it to the sink.
//!
//! Two entry points:
//!
//! - [`Sweep::run_local`] -- the caller supplies the grid (product
//!   parameters and zip groups); progress goes to the log; the aggregate
//!   lands in the local gzip sink.
//! - [`Sweep::run_remote`] -- the tracking service supplies the grid
//!   (product parameters only); progress, failures and the final payload
//!   are posted back to it, subject to the upload size policy.
//!
//! Every failure is fatal to the whole sweep. A run that fails writes
//! nothing: the failure is logged (and posted, when remote) and returned.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::{AggregateResult, Aggregator, CallRecord, SweepOutputs};
use crate::encode::{PortableEncoder, ValueEncoder};
use crate::executor::{DeliveryMode, PoolCounters, PoolOptions, WorkerPool};
use crate::grid::{ArgumentCombination, SweepGrid};
use crate::progress::{FailureReport, ProgressReporter, DEFAULT_REPORT_INTERVAL};
use crate::remote::exploration::parse_explorations;
use crate::remote::{FunctionInfo, TrackingClient};
use crate::sink::{LocalSink, UploadPayload, MAX_UPLOAD_BYTES};
use crate::{Error, Result};

/// A configured sweep, ready to run against a grid.
pub struct Sweep {
    pool: WorkerPool,
    report_interval: Duration,
    encoder: Arc<dyn ValueEncoder>,
}

impl Sweep {
    /// Start configuring a sweep around a user function.
    pub fn builder<F>(func: F) -> SweepBuilder
    where
        F: Fn(&ArgumentCombination) -> anyhow::Result<Option<SweepOutputs>>
            + Send
            + Sync
            + 'static,
    {
        SweepBuilder {
            func: Box::new(func),
            options: PoolOptions::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            encoder: Arc::new(PortableEncoder),
        }
    }

    /// Live dispatched/completed counters of the underlying pool.
    #[must_use]
    pub fn counters(&self) -> Arc<PoolCounters> {
        self.pool.counters()
    }

    /// Run a caller-supplied grid, writing the aggregate to
    /// `<output_path>.json.gz`.
    ///
    /// # Errors
    ///
    /// Any unit failure aborts the sweep; nothing is written in that path.
    pub fn run_local(
        &self,
        grid: &SweepGrid,
        output_path: impl AsRef<Path>,
    ) -> Result<AggregateResult> {
        let combinations = grid.combinations();
        let total = combinations.len();
        tracing::info!(total, "starting local sweep");

        let mut reporter = ProgressReporter::with_threshold(total, self.report_interval);
        let run = self.pool.run(combinations, |completed| {
            if let Some(snapshot) = reporter.observe(completed) {
                tracing::info!(
                    index = snapshot.index,
                    total = snapshot.total,
                    time_per_interval = snapshot.time_per_interval,
                    "sweep progress"
                );
            }
        });

        let records = match run {
            Ok(records) => records,
            Err(err) => {
                let report = FailureReport::new(err.to_string());
                tracing::error!(error = %report.error, "sweep failed, no output written");
                return Err(err);
            }
        };

        let aggregate = self.aggregate(records);
        let sink = LocalSink::new(output_path);
        sink.write(&aggregate)?;
        tracing::info!(path = %sink.path().display(), "sweep complete");
        Ok(aggregate)
    }

    /// Run a sweep whose grid the tracking service supplies.
    ///
    /// Registers the function, waits for the operator to configure
    /// exploration ranges, runs the product of those ranges, then posts
    /// the result payload (or skips the upload when it exceeds the size
    /// limit -- the local file is written either way).
    ///
    /// # Errors
    ///
    /// Unit failures are posted to the error channel once and returned;
    /// no sink file is written in that path. Protocol and transport
    /// errors abort the run.
    pub fn run_remote(
        &self,
        client: &TrackingClient,
        info: &FunctionInfo,
        output_path: impl AsRef<Path>,
    ) -> Result<AggregateResult> {
        let created = client.create_experiment(info)?;
        let state = client.wait_for_start(&created.id)?;
        let explorations = state.explorations.as_ref().ok_or_else(|| {
            Error::Remote("experiment started without exploration ranges".to_string())
        })?;
        let grid = SweepGrid::product_only(parse_explorations(explorations)?);

        let combinations = grid.combinations();
        let total = combinations.len();
        let id = state.id.clone();
        tracing::info!(id = %state.id_str(), total, "starting remote sweep");

        let mut reporter = ProgressReporter::with_threshold(total, self.report_interval);
        let run = self.pool.run(combinations, |completed| {
            if let Some(snapshot) = reporter.observe(completed) {
                // fire-and-forget telemetry: a lost snapshot never fails the sweep
                if let Err(err) = client.report_progress(&id, &snapshot) {
                    tracing::warn!(error = %err, "progress report failed");
                }
            }
        });

        let records = match run {
            Ok(records) => records,
            Err(err) => {
                let report = FailureReport::new(err.to_string()).for_experiment(state.id_str());
                tracing::error!(error = %report.error, "sweep failed, reporting to service");
                if let Err(post_err) = client.report_error(&id, &report.error) {
                    tracing::warn!(error = %post_err, "failure report did not reach the service");
                }
                return Err(err);
            }
        };

        let aggregate = self.aggregate(records);
        let sink = LocalSink::new(output_path);
        let uncompressed = sink.write(&aggregate)?;

        match UploadPayload::prepare(&sink, uncompressed, MAX_UPLOAD_BYTES)? {
            UploadPayload::Ready(payload) => {
                client.report_result(&id, &payload)?;
                tracing::info!(id = %state.id_str(), "result uploaded");
            }
            UploadPayload::TooLarge { uncompressed } => {
                tracing::warn!(
                    uncompressed,
                    limit = MAX_UPLOAD_BYTES,
                    path = %sink.path().display(),
                    "payload exceeds upload limit, keeping local file only"
                );
            }
        }
        Ok(aggregate)
    }

    fn aggregate(&self, records: Vec<CallRecord>) -> AggregateResult {
        let mut aggregator = Aggregator::with_encoder(Arc::clone(&self.encoder));
        for record in records {
            aggregator.push(record);
        }
        aggregator.finish()
    }
}

/// Builder for [`Sweep`].
pub struct SweepBuilder {
    func: Box<dyn Fn(&ArgumentCombination) -> anyhow::Result<Option<SweepOutputs>> + Send + Sync>,
    options: PoolOptions,
    report_interval: Duration,
    encoder: Arc<dyn ValueEncoder>,
}

impl SweepBuilder {
    /// Set the worker count (defaults to hardware parallelism).
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.options = self.options.workers(workers);
        self
    }

    /// Set the result delivery mode (defaults to unordered).
    #[must_use]
    pub fn delivery(mut self, delivery: DeliveryMode) -> Self {
        self.options = self.options.delivery(delivery);
        self
    }

    /// Set the progress report throttle (defaults to 10 s).
    #[must_use]
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Replace the value encoder applied during aggregation.
    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn ValueEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Build the sweep.
    #[must_use]
    pub fn build(self) -> Sweep {
        Sweep {
            pool: WorkerPool::new(self.func, self.options),
            report_interval: self.report_interval,
            encoder: self.encoder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ParameterSpec;
    use serde_json::{json, Map};

    fn echo_fn(args: &ArgumentCombination) -> anyhow::Result<Option<SweepOutputs>> {
        let mut out = Map::new();
        out.insert("out".to_string(), args["a"].clone());
        out.insert("echo".to_string(), args["d"].clone());
        Ok(Some(out))
    }

    fn two_by_two() -> SweepGrid {
        let spec = ParameterSpec::new()
            .param("a", [json!(1), json!(2)])
            .unwrap()
            .param("d", [json!("x"), json!("y")])
            .unwrap();
        SweepGrid::product_only(spec)
    }

    #[test]
    fn test_local_sweep_end_to_end_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let sweep = Sweep::builder(echo_fn)
            .workers(2)
            .delivery(DeliveryMode::Ordered)
            .build();

        let aggregate = sweep
            .run_local(&two_by_two(), dir.path().join("results"))
            .unwrap();

        assert_eq!(
            aggregate.input_column("a").unwrap(),
            &[json!(1), json!(1), json!(2), json!(2)]
        );
        assert_eq!(
            aggregate.input_column("d").unwrap(),
            &[json!("x"), json!("y"), json!("x"), json!("y")]
        );
        assert_eq!(
            aggregate.output_column("out").unwrap(),
            &[json!(1), json!(1), json!(2), json!(2)]
        );

        // the sink holds the same aggregate
        let sink = LocalSink::new(dir.path().join("results"));
        assert_eq!(sink.read().unwrap(), aggregate);
    }

    #[test]
    fn test_failed_sweep_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sweep = Sweep::builder(|_args: &ArgumentCombination| anyhow::bail!("always fails"))
            .workers(2)
            .build();

        let err = sweep
            .run_local(&two_by_two(), dir.path().join("results"))
            .unwrap_err();
        assert!(matches!(err, Error::UserFn { .. }));
        assert!(!dir.path().join("results.json.gz").exists());
    }

    #[test]
    fn test_skipped_units_shrink_columns() {
        let dir = tempfile::tempdir().unwrap();
        let func = |args: &ArgumentCombination| {
            if args["a"] == json!(1) {
                return Ok(None);
            }
            let mut out = Map::new();
            out.insert("out".to_string(), args["a"].clone());
            Ok(Some(out))
        };
        let sweep = Sweep::builder(func).workers(2).build();
        let aggregate = sweep
            .run_local(&two_by_two(), dir.path().join("results"))
            .unwrap();

        assert_eq!(aggregate.output_column("out").unwrap().len(), 2);
        assert_eq!(aggregate.input_column("a").unwrap().len(), 2);
    }
}
