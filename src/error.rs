use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing a vertex checkpoint file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error on '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed header in '{path}': {line:?}", path = path.display())]
    MalformedHeader { path: PathBuf, line: String },

    #[error(
        "Dimensions do not match in '{path}': file has {file_ndim}/{file_mpar}, expected {ndim}/{mpar}",
        path = path.display()
    )]
    DimensionMismatch {
        path: PathBuf,
        file_ndim: usize,
        file_mpar: usize,
        ndim: usize,
        mpar: usize,
    },

    #[error("Malformed vertex at line {line_no} of '{path}': {line:?}", path = path.display())]
    MalformedVertex {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error("Truncated vertex file '{path}': read {found} of {expected} vertices", path = path.display())]
    Truncated {
        path: PathBuf,
        found: usize,
        expected: usize,
    },
}

/// Error types for optimizers
#[derive(Debug, Error)]
pub enum MinimizerError {
    #[error("Allocation of {0} elements failed")]
    Allocation(usize),

    #[error("Algorithm '{0}' is not implemented")]
    NotImplemented(&'static str),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Evaluation budget of {limit} function calls exhausted")]
    EvaluationBudgetExhausted { limit: usize },

    #[error("Function evaluation returned invalid value")]
    FunctionEvaluationError,

    #[error("Invalid dimension or empty vector")]
    InvalidDimension,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tolerance must be positive")]
    InvalidTolerance,

    #[error("Line search failed: {0}")]
    LineSearchFailed(String),

    #[error("Maximum iterations exceeded ({0})")]
    MaxIterationsExceeded(usize),

    #[error("No minimum bracket found within search limits")]
    NoMinimumFound,

    #[error("Run log error: {0}")]
    RunLog(#[from] std::io::Error),

    #[error("Unknown optimizer '{0}'")]
    UnknownOptimizer(String),
}

impl MinimizerError {
    /// True when the error only reports that an evaluation budget ran out.
    pub fn is_budget_exhausted(&self) -> bool {
        matches!(self, MinimizerError::EvaluationBudgetExhausted { .. })
    }
}
