//! Error taxonomy for graph ingestion, sweeps and the job lifecycle.
//!
//! Errors split along the boundary they are allowed to cross: graph and sweep
//! errors stay inside a job and are packaged into its result body, while job
//! errors are returned synchronously to whoever called the manager.

use thiserror::Error;

/// GraphML ingestion errors
#[derive(Error, Debug)]
pub enum GraphParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document has no graph element")]
    MissingGraph,

    #[error("<{element}> element is missing the '{attribute}' attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("document ended with unclosed elements")]
    Unbalanced,
}

/// Errors raised while running a perturbation sweep
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("invalid selection method '{0}' (expected 'random' or 'outdegree')")]
    InvalidMethod(String),

    #[error("graph parse error: {0}")]
    GraphParse(#[from] GraphParseError),

    #[error("sweep exceeded its deadline")]
    DeadlineExceeded,

    #[error("sweep of {steps} removal steps x {repeats} repeats exceeds the {limit} trial limit")]
    TooManyTrials {
        steps: usize,
        repeats: usize,
        limit: usize,
    },
}

/// Why a request field was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    Missing,
    TypeMismatch { expected: &'static str },
    OutOfRange { constraint: &'static str },
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationReason::Missing => write!(f, "field is required"),
            ValidationReason::TypeMismatch { expected } => {
                write!(f, "type mismatch, expected {}", expected)
            }
            ValidationReason::OutOfRange { constraint } => {
                write!(f, "out of range, must be {}", constraint)
            }
        }
    }
}

/// A perturbation request field failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid field '{field}': {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::Missing,
        }
    }

    pub fn type_mismatch(field: &'static str, expected: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::TypeMismatch { expected },
        }
    }

    pub fn out_of_range(field: &'static str, constraint: &'static str) -> Self {
        Self {
            field,
            reason: ValidationReason::OutOfRange { constraint },
        }
    }
}

/// Failures talking to the queue backend
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the job lifecycle manager
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unknown job id '{0}'")]
    UnknownJob(String),

    #[error("job '{0}' not found in queue backend")]
    JobNotFound(String),

    #[error("queue backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("queue backend reported unexpected state '{state}' for job '{public_id}'")]
    BackendInconsistency { public_id: String, state: String },
}

impl From<BackendError> for JobError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => JobError::BackendUnavailable(msg),
        }
    }
}

impl JobError {
    /// Only backend connectivity failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::BackendUnavailable(_))
    }
}
