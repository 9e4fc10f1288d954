//! Perturbation requests and the job body executed by workers.

use crate::error::{SweepError, ValidationError};
use crate::graph::Graph;
use crate::sweep::{sweep, SweepParams, SweepResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;

/// A validated perturbation request. Immutable once accepted.
///
/// `method` is kept as the caller sent it; unknown methods are reported in
/// the job result rather than rejected at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerturbationRequest {
    pub graphml: String,
    pub remove_max: f64,
    pub nrepeats: u32,
    pub granularity: u32,
    pub method: String,
}

impl PerturbationRequest {
    /// Validate a JSON request body.
    ///
    /// Fields are checked in declaration order and the first offending field
    /// is reported. Numeric fields also accept numeric strings.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let fields = body
            .as_object()
            .ok_or_else(|| ValidationError::type_mismatch("request", "object"))?;

        let graphml = string_field(fields, "graphml")?;

        let remove_max = float_field(fields, "remove_max")?;
        if !(remove_max > 0.0 && remove_max <= 1.0) {
            return Err(ValidationError::out_of_range("remove_max", "in (0, 1]"));
        }

        let nrepeats = positive_int_field(fields, "nrepeats")?;
        let granularity = positive_int_field(fields, "granularity")?;
        let method = string_field(fields, "method")?;

        Ok(Self {
            graphml,
            remove_max,
            nrepeats,
            granularity,
            method,
        })
    }
}

fn present<'a>(fields: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, ValidationError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(ValidationError::missing(name)),
        Some(value) => Ok(value),
    }
}

fn string_field(fields: &Map<String, Value>, name: &'static str) -> Result<String, ValidationError> {
    present(fields, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::type_mismatch(name, "string"))
}

fn float_field(fields: &Map<String, Value>, name: &'static str) -> Result<f64, ValidationError> {
    let value = match present(fields, name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::type_mismatch(name, "float"))
}

fn positive_int_field(fields: &Map<String, Value>, name: &'static str) -> Result<u32, ValidationError> {
    let value = match present(fields, name)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    let value = value.ok_or_else(|| ValidationError::type_mismatch(name, "integer"))?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| ValidationError::out_of_range(name, ">= 1"))
}

/// What a finished job stores as its result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutcome {
    Sweep(SweepResult),
    /// The input was unusable (bad GraphML, unknown method)
    Error { error: String },
}

/// Execute a perturbation request.
///
/// Bad input becomes a `JobOutcome::Error` so the job still finishes; only a
/// blown deadline is returned as an error, which fails the job.
pub fn run_sweep_job(
    request: &PerturbationRequest,
    deadline: Option<Instant>,
) -> Result<JobOutcome, SweepError> {
    match execute(request, deadline) {
        Ok(result) => Ok(JobOutcome::Sweep(result)),
        Err(SweepError::DeadlineExceeded) => Err(SweepError::DeadlineExceeded),
        Err(err) => {
            tracing::warn!(error = %err, "Rejecting job input");
            Ok(JobOutcome::Error {
                error: err.to_string(),
            })
        }
    }
}

fn execute(request: &PerturbationRequest, deadline: Option<Instant>) -> Result<SweepResult, SweepError> {
    let mut params = SweepParams::new(
        request.remove_max,
        request.nrepeats as usize,
        request.granularity as usize,
        &request.method,
    )?;
    params.deadline = deadline;

    let graph = Graph::parse_graphml(&request.graphml)?;
    sweep(&graph, &params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationReason;
    use serde_json::json;

    const CHAIN: &str = r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
      <graph edgedefault="directed">
        <node id="1"/><node id="2"/><node id="3"/><node id="4"/>
        <edge source="1" target="2"/><edge source="2" target="3"/><edge source="3" target="4"/>
      </graph></graphml>"#;

    fn body() -> Value {
        json!({
            "graphml": CHAIN,
            "remove_max": 0.5,
            "nrepeats": 3,
            "granularity": 1,
            "method": "random",
        })
    }

    #[test]
    fn test_valid_request() {
        let request = PerturbationRequest::from_json(&body()).unwrap();
        assert_eq!(request.remove_max, 0.5);
        assert_eq!(request.nrepeats, 3);
        assert_eq!(request.method, "random");
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let mut body = body();
        body["remove_max"] = json!("0.25");
        body["nrepeats"] = json!("2");
        body["granularity"] = json!(4.0);
        let request = PerturbationRequest::from_json(&body).unwrap();
        assert_eq!(request.remove_max, 0.25);
        assert_eq!(request.nrepeats, 2);
        assert_eq!(request.granularity, 4);
    }

    #[test]
    fn test_missing_field() {
        let mut body = body();
        body.as_object_mut().unwrap().remove("granularity");
        let err = PerturbationRequest::from_json(&body).unwrap_err();
        assert_eq!(err.field, "granularity");
        assert_eq!(err.reason, ValidationReason::Missing);
    }

    #[test]
    fn test_type_mismatch() {
        let mut body = body();
        body["remove_max"] = json!("abc");
        let err = PerturbationRequest::from_json(&body).unwrap_err();
        assert_eq!(err.field, "remove_max");
        assert_eq!(err.reason, ValidationReason::TypeMismatch { expected: "float" });

        let mut body = self::body();
        body["nrepeats"] = json!(1.5);
        assert_eq!(PerturbationRequest::from_json(&body).unwrap_err().field, "nrepeats");

        let mut body = self::body();
        body["method"] = json!(7);
        assert_eq!(PerturbationRequest::from_json(&body).unwrap_err().field, "method");
    }

    #[test]
    fn test_out_of_range() {
        let mut body = body();
        body["remove_max"] = json!(1.5);
        assert_eq!(
            PerturbationRequest::from_json(&body).unwrap_err().reason,
            ValidationReason::OutOfRange { constraint: "in (0, 1]" }
        );

        let mut body = self::body();
        body["granularity"] = json!(0);
        assert_eq!(PerturbationRequest::from_json(&body).unwrap_err().field, "granularity");
    }

    #[test]
    fn test_non_object_body() {
        let err = PerturbationRequest::from_json(&json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "request");
    }

    #[test]
    fn test_bad_graph_is_a_result_not_a_failure() {
        let mut request = PerturbationRequest::from_json(&body()).unwrap();
        request.graphml = "<graphml><graph>".to_string();
        match run_sweep_job(&request, None).unwrap() {
            JobOutcome::Error { error } => assert!(error.starts_with("graph parse error")),
            other => panic!("expected error outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method_is_a_result() {
        let mut request = PerturbationRequest::from_json(&body()).unwrap();
        request.method = "closeness".to_string();
        match run_sweep_job(&request, None).unwrap() {
            JobOutcome::Error { error } => assert!(error.contains("closeness")),
            other => panic!("expected error outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_repeat_count_finishes_with_error() {
        let mut body = body();
        body["nrepeats"] = json!(u32::MAX);
        let request = PerturbationRequest::from_json(&body).unwrap();
        match run_sweep_job(&request, None).unwrap() {
            JobOutcome::Error { error } => assert!(error.contains("trial limit")),
            other => panic!("expected error outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_successful_job() {
        let mut request = PerturbationRequest::from_json(&body()).unwrap();
        request.method = "outdegree".to_string();
        request.remove_max = 1.0;
        match run_sweep_job(&request, None).unwrap() {
            JobOutcome::Sweep(result) => {
                assert_eq!(result.removed, vec![1, 2, 3]);
                assert_eq!(result.repeats, 1);
            }
            other => panic!("expected sweep outcome, got {:?}", other),
        }
    }
}
