//! Error types for the adapter.

use thiserror::Error;

/// Error raised by an expression-engine function during a point evaluation.
///
/// These are recoverable from the solver's point of view: the evaluation
/// bridge converts them into a step-reduction signal instead of unwinding
/// through the solver.
#[derive(Error, Debug)]
pub enum FunctionError {
    /// The engine could not evaluate at the requested point.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// The engine produced a NaN or infinite output.
    #[error("non-finite result at output {index}")]
    NonFinite {
        /// Index of the offending output entry.
        index: usize,
    },
}

/// Errors detected while structuring the problem or validating its data.
///
/// All of these are fatal at setup; none of them occur once a solve is
/// running (with the exception of [`SetupError::StructureInconsistency`],
/// which the bridge can surface after the solver returns).
#[derive(Error, Debug)]
pub enum SetupError {
    /// An input array does not have the expected length.
    #[error("dimension mismatch: {what} has length {got}, expected {expected}")]
    DimensionMismatch {
        /// Name of the offending array.
        what: &'static str,
        /// Actual length.
        got: usize,
        /// Required length.
        expected: usize,
    },

    /// A lower bound exceeds the matching upper bound.
    #[error("inconsistent {what} bounds at index {index}: lower {lower} > upper {upper}")]
    InconsistentBounds {
        /// Which bound pair ("variable" or "constraint").
        what: &'static str,
        /// Entry index in original coordinates.
        index: usize,
        /// Offending lower bound.
        lower: f64,
        /// Offending upper bound.
        upper: f64,
    },

    /// Constraints were declared but no constraint-Jacobian function exists.
    #[error("problem has {num_cons} constraints but no constraint Jacobian function")]
    MissingJacobian {
        /// Number of declared constraints.
        num_cons: usize,
    },

    /// The computed structure disagrees with what the solver was told to
    /// expect. This indicates a bug in the adapter or a function whose
    /// declared sparsity changed between setup and evaluation.
    #[error("internal structure inconsistency: {0}")]
    StructureInconsistency(String),
}

/// Errors surfaced by the solve driver.
#[derive(Error, Debug)]
pub enum SolveError {
    /// Problem structuring or validation failed.
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// The one-time evaluation at the initial point failed. Unlike
    /// failures during the solve, there is no solver to request a step
    /// reduction from yet, so this aborts.
    #[error("initial evaluation failed: {0}")]
    InitialEvaluation(#[from] FunctionError),

    /// A driver method was called in the wrong state.
    #[error("solve driver is {actual}, expected {expected}")]
    InvalidState {
        /// State the method requires.
        expected: &'static str,
        /// State the driver is actually in.
        actual: &'static str,
    },

    /// The solver backend failed outside its own status-code protocol
    /// (allocation failure, missing license, broken binding).
    #[error("solver backend error: {0}")]
    Backend(String),
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, SolveError>;
