//! # autodse: Parameter-Sweep Design-Space Exploration
//!
//! Given a user function and a declarative description of which parameters
//! to vary over what candidate values, autodse enumerates the full (or
//! partially zip-grouped) Cartesian product of argument combinations, runs
//! the function once per combination across a bounded worker pool,
//! reshapes the per-call results into columnar form, and persists them to
//! a gzip JSON sink -- optionally bookkeeping the run through a remote
//! experiment-tracking service.
//!
//! This is a single-machine batch-sweep executor, not a job scheduler or
//! a distributed system. Failures are fatal by design: a failed unit
//! aborts the whole sweep before anything is written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use autodse::grid::{ParameterSpec, SweepGrid};
//! use autodse::sweep::Sweep;
//! use serde_json::{json, Map};
//!
//! let spec = ParameterSpec::new()
//!     .param("n", [json!(64), json!(128)])?
//!     .param("lr", [json!(0.1), json!(0.01)])?;
//!
//! let sweep = Sweep::builder(|args: &autodse::ArgumentCombination| {
//!     let n = args["n"].as_i64().unwrap_or(0);
//!     let mut out = Map::new();
//!     out.insert("cost".to_string(), json!(n * n));
//!     Ok(Some(out))
//! })
//! .workers(4)
//! .build();
//!
//! let aggregate = sweep.run_local(&SweepGrid::product_only(spec), "results")?;
//! println!("swept {} columns", aggregate.outputs.len());
//! # Ok::<(), autodse::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregate;
pub mod encode;
pub mod error;
pub mod executor;
pub mod grid;
pub mod progress;
pub mod remote;
pub mod sink;
pub mod sweep;

pub use aggregate::{AggregateResult, CallRecord};
pub use error::{Error, Result};
pub use executor::DeliveryMode;
pub use grid::{ArgumentCombination, ParameterSpec, SweepGrid, ZipGroup};
pub use sweep::Sweep;
