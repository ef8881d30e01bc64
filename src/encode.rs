//! Portable value encoding for sweep results
//!
//! Aggregates end up as JSON on disk and on the wire, so every value that
//! enters a column must survive JSON serialization. Plain integers,
//! booleans, strings and finite floats pass through untouched; the one
//! thing JSON cannot carry is a non-finite float, which is widened to its
//! string representation instead of failing the whole sweep.
//!
//! [`ValueEncoder`] is the hook for callers that need a different policy
//! (e.g. clamping, rounding, or dropping binary blobs).

use serde_json::{Number, Value};

/// Coerces per-call values into JSON-portable form.
///
/// The default methods implement the portable policy; implementers can
/// override [`ValueEncoder::encode`] to apply their own coercion.
pub trait ValueEncoder: Send + Sync {
    /// Encode one value, descending into arrays and maps.
    fn encode(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.encode(v)).collect())
            }
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, self.encode(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Encode a float, falling back to a string for NaN and infinities.
    fn encode_f64(&self, x: f64) -> Value {
        Number::from_f64(x).map_or_else(|| Value::String(x.to_string()), Value::Number)
    }

    /// Encode a slice of floats as a plain JSON list.
    fn encode_f64_slice(&self, xs: &[f64]) -> Value {
        Value::Array(xs.iter().map(|&x| self.encode_f64(x)).collect())
    }
}

/// Default encoder: pass JSON-native values through, widen anything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableEncoder;

impl ValueEncoder for PortableEncoder {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_kinds_pass_through() {
        let enc = PortableEncoder;
        assert_eq!(enc.encode(json!(42)), json!(42));
        assert_eq!(enc.encode(json!(-7)), json!(-7));
        assert_eq!(enc.encode(json!(true)), json!(true));
        assert_eq!(enc.encode(json!("s")), json!("s"));
        assert_eq!(enc.encode(json!(2.5)), json!(2.5));
        assert_eq!(enc.encode(Value::Null), Value::Null);
    }

    #[test]
    fn test_nonfinite_floats_widen_to_strings() {
        let enc = PortableEncoder;
        assert_eq!(enc.encode_f64(f64::NAN), json!("NaN"));
        assert_eq!(enc.encode_f64(f64::INFINITY), json!("inf"));
        assert_eq!(enc.encode_f64(f64::NEG_INFINITY), json!("-inf"));
    }

    #[test]
    fn test_float_slice_encodes_to_plain_list() {
        let enc = PortableEncoder;
        assert_eq!(
            enc.encode_f64_slice(&[1.0, 0.5, -2.0]),
            json!([1.0, 0.5, -2.0])
        );
    }

    #[test]
    fn test_encode_descends_into_containers() {
        let enc = PortableEncoder;
        let nested = json!({"a": [1, 2, {"b": [true, "x"]}]});
        assert_eq!(enc.encode(nested.clone()), nested);
    }
}
