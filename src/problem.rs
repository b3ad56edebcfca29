//! Problem data, settings and solve results.
//!
//! Everything in this module lives in original coordinates; the driver is
//! the only place where permuted coordinates appear.

use std::fmt;

use crate::error::SetupError;

/// Nonlinear program data in original coordinates.
///
/// Dimensions are implied by the function pair the driver was built with;
/// [`NlpProblem::validate`] checks every array against them.
#[derive(Debug, Clone)]
pub struct NlpProblem {
    /// Variable lower bounds (length n).
    pub x_lower: Vec<f64>,

    /// Variable upper bounds (length n).
    pub x_upper: Vec<f64>,

    /// Constraint lower bounds (length ng).
    pub g_lower: Vec<f64>,

    /// Constraint upper bounds (length ng).
    pub g_upper: Vec<f64>,

    /// Initial primal guess (length n).
    pub x0: Vec<f64>,

    /// Initial constraint multiplier guess (length ng).
    pub lam_g0: Vec<f64>,

    /// Fixed parameter values forwarded to every evaluation.
    pub params: Vec<f64>,
}

impl NlpProblem {
    /// Unbounded problem with zero initial guesses and no parameters.
    pub fn new(num_vars: usize, num_cons: usize) -> Self {
        Self {
            x_lower: vec![f64::NEG_INFINITY; num_vars],
            x_upper: vec![f64::INFINITY; num_vars],
            g_lower: vec![f64::NEG_INFINITY; num_cons],
            g_upper: vec![f64::INFINITY; num_cons],
            x0: vec![0.0; num_vars],
            lam_g0: vec![0.0; num_cons],
            params: Vec::new(),
        }
    }

    /// Number of variables this data describes.
    pub fn num_vars(&self) -> usize {
        self.x0.len()
    }

    /// Number of constraints this data describes.
    pub fn num_cons(&self) -> usize {
        self.g_lower.len()
    }

    /// Check array lengths against the declared dimensions and each bound
    /// pair for consistency.
    pub fn validate(&self, num_vars: usize, num_cons: usize, num_params: usize) -> Result<(), SetupError> {
        let checks: [(&'static str, usize, usize); 7] = [
            ("x_lower", self.x_lower.len(), num_vars),
            ("x_upper", self.x_upper.len(), num_vars),
            ("g_lower", self.g_lower.len(), num_cons),
            ("g_upper", self.g_upper.len(), num_cons),
            ("x0", self.x0.len(), num_vars),
            ("lam_g0", self.lam_g0.len(), num_cons),
            ("params", self.params.len(), num_params),
        ];
        for (what, got, expected) in checks {
            if got != expected {
                return Err(SetupError::DimensionMismatch { what, got, expected });
            }
        }
        for (index, (&lower, &upper)) in self.x_lower.iter().zip(&self.x_upper).enumerate() {
            if lower > upper {
                return Err(SetupError::InconsistentBounds { what: "variable", index, lower, upper });
            }
        }
        for (index, (&lower, &upper)) in self.g_lower.iter().zip(&self.g_upper).enumerate() {
            if lower > upper {
                return Err(SetupError::InconsistentBounds { what: "constraint", index, lower, upper });
            }
        }
        Ok(())
    }
}

/// Adapter and solver settings.
///
/// The typed counterparts of the native solver's option table; the
/// backend receives the whole struct and applies what it understands.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Treat linear constraints and linear variables specially. When
    /// false, every entity is classified nonlinear and the solver
    /// re-evaluates all of it each iteration.
    pub detect_linear: bool,

    /// Enable verbose backend output.
    pub verbose: bool,

    /// Major iteration limit (None = backend default).
    pub iteration_limit: Option<usize>,

    /// Feasibility tolerance (None = backend default).
    pub feasibility_tol: Option<f64>,

    /// Optimality tolerance (None = backend default).
    pub optimality_tol: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detect_linear: true,
            verbose: false,
            iteration_limit: None,
            feasibility_tol: None,
            optimality_tol: None,
        }
    }
}

/// Solution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The solver reported success.
    Optimal,

    /// The monitoring hook requested termination; the iterate is the last
    /// one the solver produced.
    MonitorStopped,

    /// The solver terminated with a non-success status. The native code
    /// and reason are in [`SolveInfo`].
    SolverFailure,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::MonitorStopped => write!(f, "Monitor Stopped"),
            SolveStatus::SolverFailure => write!(f, "Solver Failure"),
        }
    }
}

/// Solve result in original coordinates.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Solution status.
    pub status: SolveStatus,

    /// Primal solution (length n).
    pub x: Vec<f64>,

    /// Variable multipliers (length n).
    pub lam_x: Vec<f64>,

    /// Constraint multipliers (length ng).
    pub lam_g: Vec<f64>,

    /// Final constraint values (length ng).
    pub g: Vec<f64>,

    /// Objective value, including the linear objective row's contribution.
    pub obj_val: f64,

    /// Diagnostics.
    pub info: SolveInfo,
}

/// Solve diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Native solver status code.
    pub solver_status: i32,

    /// Native solver status description.
    pub solver_reason: String,

    /// Objective evaluations performed through the bridge.
    pub obj_evals: usize,

    /// Constraint evaluations performed through the bridge.
    pub con_evals: usize,
}
