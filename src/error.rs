use std::path::PathBuf;
use thiserror::Error;

// Unified error type for edgesolve

#[derive(Error, Debug)]
pub enum KError {
    #[error("singular operator: row {row} has row-sum {row_sum}")]
    SingularOperator { row: usize, row_sum: f64 },
    #[error("incompatible partitions: {0}")]
    IncompatiblePartition(String),
    #[error("solver failed at iteration {iteration}: {source}")]
    SolverFailure {
        iteration: usize,
        #[source]
        source: Box<KError>,
    },
    #[error("indefinite matrix detected (p^T A p <= 0)")]
    IndefiniteMatrix,
    #[error("indefinite preconditioner detected (r^T z < 0)")]
    IndefinitePreconditioner,
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("matrix structure is fixed after fill-complete: {0}")]
    StructureLocked(String),
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("invalid parameter `{key}`: {reason}")]
    InvalidParameter { key: String, reason: String },
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {msg}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl KError {
    /// Wraps `self` as a solver failure raised at `iteration`.
    pub fn at_iteration(self, iteration: usize) -> Self {
        KError::SolverFailure {
            iteration,
            source: Box::new(self),
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        KError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
