//! Experiment-tracking service client
//!
//! Thin blocking client for the remote bookkeeping API. The service is an
//! opaque collaborator: the core creates an experiment, polls until an
//! operator configures the exploration ranges, posts throttled progress,
//! and finally posts either the result payload or a failure report.
//!
//! All bodies are JSON. Any response that does not match the expected
//! shape is a protocol error and aborts the run.

pub mod exploration;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::progress::ProgressSnapshot;
use crate::{Error, Result};

/// Default delay between experiment-status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Declared description of one user-function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name
    pub name: String,
    /// Declared type name, as shown to the operator
    #[serde(rename = "type")]
    pub type_name: String,
    /// Rendered default value
    pub default: String,
}

impl ParameterInfo {
    /// Describe one parameter.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            default: default.into(),
        }
    }
}

/// What the client registers about the user function.
///
/// `full_signature` is composed from the declared parameters in the form
/// `name(param: type = default, ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function name shown to the operator
    pub fn_name: String,
    /// Declared parameters, in call order
    pub parameters: Vec<ParameterInfo>,
    /// Human-readable signature
    pub full_signature: String,
}

impl FunctionInfo {
    /// Build the registration record, composing the signature string.
    #[must_use]
    pub fn new(fn_name: impl Into<String>, parameters: Vec<ParameterInfo>) -> Self {
        let fn_name = fn_name.into();
        let rendered: Vec<String> = parameters
            .iter()
            .map(|p| format!("{}: {} = {}", p.name, p.type_name, p.default))
            .collect();
        let full_signature = format!("{fn_name}({})", rendered.join(", "));
        Self {
            fn_name,
            parameters,
            full_signature,
        }
    }
}

/// Experiment lifecycle status, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperimentStatus {
    /// Registered, waiting for the operator to configure explorations
    Created,
    /// Exploration ranges configured, sweep may proceed
    Running,
    /// Terminal success
    Done,
    /// Terminal failure
    Error,
    /// Any status this client does not know about
    #[serde(other)]
    Other,
}

/// Server-side experiment state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentState {
    /// Server-assigned experiment id (verbatim; string or number)
    pub id: Value,
    /// Current lifecycle status
    pub status: ExperimentStatus,
    /// Per-parameter exploration descriptions, once configured
    #[serde(default)]
    pub explorations: Option<Map<String, Value>>,
    /// Server-side creation timestamp, when provided
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExperimentState {
    /// Experiment id rendered for query parameters.
    #[must_use]
    pub fn id_str(&self) -> String {
        id_str(&self.id)
    }
}

fn id_str(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Responses arrive wrapped as `{"data": [ ... ]}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_first(self, context: &str) -> Result<T> {
        self.data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Remote(format!("{context}: empty data array")))
    }
}

/// Blocking client for the experiment-tracking service.
#[derive(Clone)]
pub struct TrackingClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    hostname: String,
    poll_interval: Duration,
}

impl TrackingClient {
    /// Create a client for `base_url` authenticating with `api_key`.
    ///
    /// The reported hostname defaults to the `HOSTNAME` environment
    /// variable.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        Self {
            agent: ureq::agent(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            hostname,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the reported hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Override the status poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// Register the user function and create an experiment.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a malformed response.
    pub fn create_experiment(&self, info: &FunctionInfo) -> Result<ExperimentState> {
        let response = self
            .agent
            .post(&self.url("experiment/create"))
            .query("api_key", &self.api_key)
            .query("hostname", &self.hostname)
            .send_json(info)?;
        let envelope: Envelope<ExperimentState> = response
            .into_json()
            .map_err(|e| Error::Remote(format!("experiment/create: {e}")))?;
        envelope.into_first("experiment/create")
    }

    /// Fetch the current state of an experiment.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a malformed response.
    pub fn fetch_experiment(&self, id: &Value) -> Result<ExperimentState> {
        let response = self
            .agent
            .get(&self.url("experiment"))
            .query("api_key", &self.api_key)
            .query("id", &id_str(id))
            .call()?;
        let envelope: Envelope<ExperimentState> = response
            .into_json()
            .map_err(|e| Error::Remote(format!("experiment: {e}")))?;
        envelope.into_first("experiment")
    }

    /// Poll until the experiment leaves [`ExperimentStatus::Created`].
    ///
    /// The operator configures exploration ranges out of band; this blocks
    /// the orchestrating thread, polling once per configured interval.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a malformed response.
    pub fn wait_for_start(&self, id: &Value) -> Result<ExperimentState> {
        tracing::info!(id = %id_str(id), "waiting for experiment to start");
        loop {
            let state = self.fetch_experiment(id)?;
            if state.status != ExperimentStatus::Created {
                tracing::info!(id = %state.id_str(), status = ?state.status, "experiment started");
                return Ok(state);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// Post one progress snapshot. Fire-and-forget telemetry; callers may
    /// ignore the error.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub fn report_progress(&self, id: &Value, snapshot: &ProgressSnapshot) -> Result<()> {
        self.agent
            .post(&self.url("experiment/progress"))
            .query("api_key", &self.api_key)
            .send_json(json!({ "progress": snapshot, "id": id }))?;
        Ok(())
    }

    /// Post a terminal failure report.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub fn report_error(&self, id: &Value, trace: &str) -> Result<()> {
        self.agent
            .post(&self.url("experiment/error"))
            .query("api_key", &self.api_key)
            .send_json(json!({ "error": trace, "id": id }))?;
        Ok(())
    }

    /// Post the terminal result payload (base64 of the compressed sink
    /// file).
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub fn report_result(&self, id: &Value, payload: &str) -> Result<()> {
        self.agent
            .post(&self.url("experiment/result"))
            .query("api_key", &self.api_key)
            .send_json(json!({ "data": payload, "id": id }))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_signature_composition() {
        let info = FunctionInfo::new(
            "train",
            vec![
                ParameterInfo::new("lr", "f64", "0.1"),
                ParameterInfo::new("opt", "str", "\"adam\""),
            ],
        );
        assert_eq!(info.full_signature, "train(lr: f64 = 0.1, opt: str = \"adam\")");
    }

    #[test]
    fn test_signature_with_no_parameters() {
        let info = FunctionInfo::new("probe", Vec::new());
        assert_eq!(info.full_signature, "probe()");
    }

    #[test]
    fn test_status_wire_format() {
        let status: ExperimentStatus = serde_json::from_value(json!("CREATED")).unwrap();
        assert_eq!(status, ExperimentStatus::Created);

        let status: ExperimentStatus = serde_json::from_value(json!("PAUSED")).unwrap();
        assert_eq!(status, ExperimentStatus::Other);
    }

    #[test]
    fn test_experiment_state_from_envelope() {
        let body = json!({
            "data": [{
                "id": 17,
                "status": "RUNNING",
                "explorations": {"lr": {"kind": "enum", "values": [0.1, 0.2]}}
            }]
        });
        let envelope: Envelope<ExperimentState> = serde_json::from_value(body).unwrap();
        let state = envelope.into_first("experiment").unwrap();

        assert_eq!(state.id_str(), "17");
        assert_eq!(state.status, ExperimentStatus::Running);
        assert!(state.explorations.unwrap().contains_key("lr"));
    }

    #[test]
    fn test_empty_envelope_is_protocol_error() {
        let envelope: Envelope<ExperimentState> =
            serde_json::from_value(json!({"data": []})).unwrap();
        let err = envelope.into_first("experiment").unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
    }

    #[test]
    fn test_string_and_numeric_ids_render_unquoted() {
        assert_eq!(id_str(&json!("exp-9")), "exp-9");
        assert_eq!(id_str(&json!(42)), "42");
    }

    #[test]
    fn test_client_url_join() {
        let client = TrackingClient::new("https://dse.example/api/", "k");
        assert_eq!(client.url("experiment/create"), "https://dse.example/api/experiment/create");
    }
}
