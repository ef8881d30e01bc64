//! Result Aggregator
//!
//! Reshapes the stream of per-call records into columnar form: one column
//! per field name, holding that field's value from every record that
//! carried it, in arrival order.
//!
//! Records may have heterogeneous schemas. A field that first appears in a
//! late record starts its column late, so columns of different lengths are
//! expected output, not corruption. Column order follows first-seen order
//! of each key across the stream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::encode::{PortableEncoder, ValueEncoder};
use crate::grid::ArgumentCombination;

/// Output fields returned by one user-function call.
pub type SweepOutputs = Map<String, Value>;

/// One function invocation's paired inputs and outputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRecord {
    /// The argument combination the function was called with
    pub inputs: ArgumentCombination,
    /// The fields the function returned
    pub outputs: SweepOutputs,
}

impl CallRecord {
    /// Pair a combination with the outputs it produced.
    #[must_use]
    pub fn new(inputs: ArgumentCombination, outputs: SweepOutputs) -> Self {
        Self { inputs, outputs }
    }
}

/// Columnar reshaping of all call records from one sweep.
///
/// Serializes as `{"inputs": {field: [values...]}, "outputs": {...}}`,
/// the exact body the local sink writes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateResult {
    /// One column per input parameter
    pub inputs: Map<String, Value>,
    /// One column per output field
    pub outputs: Map<String, Value>,
}

impl AggregateResult {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no record has been aggregated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// An input column by field name, if any record carried the field.
    #[must_use]
    pub fn input_column(&self, name: &str) -> Option<&[Value]> {
        column(&self.inputs, name)
    }

    /// An output column by field name, if any record carried the field.
    #[must_use]
    pub fn output_column(&self, name: &str) -> Option<&[Value]> {
        column(&self.outputs, name)
    }
}

fn column<'a>(columns: &'a Map<String, Value>, name: &str) -> Option<&'a [Value]> {
    match columns.get(name) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Consumes call records and builds one [`AggregateResult`].
///
/// Values pass through the configured [`ValueEncoder`] on the way in, so
/// everything stored in a column is JSON-portable.
pub struct Aggregator {
    result: AggregateResult,
    encoder: Arc<dyn ValueEncoder>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Create an aggregator with the default [`PortableEncoder`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_encoder(Arc::new(PortableEncoder))
    }

    /// Create an aggregator with a custom encoder.
    #[must_use]
    pub fn with_encoder(encoder: Arc<dyn ValueEncoder>) -> Self {
        Self { result: AggregateResult::new(), encoder }
    }

    /// Append one record's fields to their columns.
    ///
    /// Columns are created the first time a key is seen; existing columns
    /// simply grow. A record missing a known field leaves that column
    /// untouched (length drift across columns is expected).
    pub fn push(&mut self, record: CallRecord) {
        push_fields(&mut self.result.inputs, record.inputs, self.encoder.as_ref());
        push_fields(&mut self.result.outputs, record.outputs, self.encoder.as_ref());
    }

    /// Aggregate an entire record stream.
    #[must_use]
    pub fn collect(mut self, records: impl IntoIterator<Item = CallRecord>) -> AggregateResult {
        for record in records {
            self.push(record);
        }
        self.finish()
    }

    /// Finish and hand over the aggregate.
    #[must_use]
    pub fn finish(self) -> AggregateResult {
        self.result
    }
}

fn push_fields(
    columns: &mut Map<String, Value>,
    fields: Map<String, Value>,
    encoder: &dyn ValueEncoder,
) {
    for (key, value) in fields {
        let encoded = encoder.encode(value);
        match columns
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(col) => col.push(encoded),
            // columns are only ever created as arrays above
            _ => unreachable!("aggregate column is always an array"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(inputs: Value, outputs: Value) -> CallRecord {
        let Value::Object(inputs) = inputs else { panic!("inputs") };
        let Value::Object(outputs) = outputs else { panic!("outputs") };
        CallRecord::new(inputs, outputs)
    }

    #[test]
    fn test_uniform_schema_round_trip() {
        let records: Vec<_> = (0..5)
            .map(|i| record(json!({"x": i}), json!({"y": i * 10})))
            .collect();
        let agg = Aggregator::new().collect(records);

        assert_eq!(agg.input_column("x").unwrap().len(), 5);
        assert_eq!(
            agg.output_column("y").unwrap(),
            &[json!(0), json!(10), json!(20), json!(30), json!(40)]
        );
    }

    #[test]
    fn test_heterogeneous_schemas_drift() {
        let mut agg = Aggregator::new();
        agg.push(record(json!({"x": 1}), json!({"loss": 0.5})));
        agg.push(record(json!({"x": 2}), json!({"loss": 0.4, "acc": 0.9})));
        let result = agg.finish();

        assert_eq!(result.output_column("loss").unwrap().len(), 2);
        // late-appearing field starts its column late
        assert_eq!(result.output_column("acc").unwrap().len(), 1);
    }

    #[test]
    fn test_column_order_is_first_seen() {
        let mut agg = Aggregator::new();
        agg.push(record(json!({}), json!({"b": 1})));
        agg.push(record(json!({}), json!({"a": 2})));
        let result = agg.finish();

        let keys: Vec<_> = result.outputs.keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_serializes_as_dict_of_columns() {
        let mut agg = Aggregator::new();
        agg.push(record(json!({"n": 1}), json!({"out": "p"})));
        agg.push(record(json!({"n": 2}), json!({"out": "q"})));
        let json = serde_json::to_value(agg.finish()).unwrap();

        assert_eq!(json, json!({"inputs": {"n": [1, 2]}, "outputs": {"out": ["p", "q"]}}));
    }

    #[test]
    fn test_empty_aggregate() {
        let agg = Aggregator::new().finish();
        assert!(agg.is_empty());
        assert!(agg.input_column("x").is_none());
    }
}
