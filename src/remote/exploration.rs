//! Strict exploration-range descriptions
//!
//! The tracking service tells the client which candidate values to sweep
//! for each parameter. Descriptions are typed and validated here; server
//! text is never evaluated as code.
//!
//! Two kinds are accepted:
//!
//! ```json
//! {"kind": "enum", "values": [1, 2, "adam"]}
//! {"kind": "range", "start": 0.0, "stop": 1.0, "step": 0.25}
//! ```
//!
//! Ranges are half-open (`start` included, `stop` excluded), matching the
//! usual numeric-range convention.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::grid::ParameterSpec;
use crate::{Error, Result};

/// A typed candidate-value description for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Exploration {
    /// An explicit list of scalar candidates.
    Enum {
        /// Candidate values, scalars only
        values: Vec<Value>,
    },
    /// A half-open arithmetic progression of floats.
    Range {
        /// First candidate (included)
        start: f64,
        /// Upper bound (excluded)
        stop: f64,
        /// Increment; must be non-zero and point towards `stop`
        step: f64,
    },
}

impl Exploration {
    /// Parse and validate one description attached to `param`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExploration`] for unknown kinds, missing
    /// fields, non-scalar enum entries, or a degenerate range.
    pub fn parse(param: &str, raw: &Value) -> Result<Self> {
        let exploration: Self =
            serde_json::from_value(raw.clone()).map_err(|e| Error::InvalidExploration {
                param: param.to_string(),
                reason: e.to_string(),
            })?;
        exploration.validate(param)?;
        Ok(exploration)
    }

    fn validate(&self, param: &str) -> Result<()> {
        let fail = |reason: String| Error::InvalidExploration {
            param: param.to_string(),
            reason,
        };
        match self {
            Self::Enum { values } => {
                if values.is_empty() {
                    return Err(fail("enum has no values".to_string()));
                }
                for value in values {
                    if value.is_array() || value.is_object() {
                        return Err(fail(format!("enum value {value} is not a scalar")));
                    }
                }
            }
            Self::Range { start, stop, step } => {
                if !start.is_finite() || !stop.is_finite() || !step.is_finite() {
                    return Err(fail("range bounds must be finite".to_string()));
                }
                if *step == 0.0 {
                    return Err(fail("range step is zero".to_string()));
                }
                if (*stop - *start) * *step <= 0.0 {
                    return Err(fail(format!(
                        "range [{start}, {stop}) with step {step} produces no values"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Materialize the candidate values.
    pub fn values(&self, param: &str) -> Result<Vec<Value>> {
        match self {
            Self::Enum { values } => Ok(values.clone()),
            Self::Range { start, stop, step } => {
                let mut out = Vec::new();
                let mut i = 0u32;
                loop {
                    // multiply instead of accumulating to avoid drift
                    let x = start + f64::from(i) * step;
                    let past_stop = if *step > 0.0 { x >= *stop } else { x <= *stop };
                    if past_stop {
                        break;
                    }
                    let number =
                        Number::from_f64(x).ok_or_else(|| Error::InvalidExploration {
                            param: param.to_string(),
                            reason: format!("range produced non-finite value {x}"),
                        })?;
                    out.push(Value::Number(number));
                    i += 1;
                }
                Ok(out)
            }
        }
    }
}

/// Parse a full explorations map into product parameters.
///
/// Iteration order of the map fixes parameter declaration order, which in
/// turn fixes the combination order of the sweep.
///
/// # Errors
///
/// Fails on the first invalid description, or with
/// [`Error::EmptyValueSet`] if a valid description yields no values.
pub fn parse_explorations(explorations: &Map<String, Value>) -> Result<ParameterSpec> {
    let mut spec = ParameterSpec::new();
    for (param, raw) in explorations {
        let exploration = Exploration::parse(param, raw)?;
        spec = spec.param(param.clone(), exploration.values(param)?)?;
    }
    Ok(spec)
}
