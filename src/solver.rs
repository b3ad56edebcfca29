//! Block-solver seam.
//!
//! The external solver is consumed through a single-call, buffer-populated
//! convention: the adapter hands over dimensions, the merged structure and
//! bound/state arrays once, the solver iterates internally and calls back
//! through [`NlpCallback`] for every point it wants evaluated, and the
//! final state is read back from the same arrays after the call returns.
//!
//! The callback is an ordinary trait object; the solver recovers the
//! owning bridge by borrow, so there is no user-data pointer to smuggle.

use crate::error::SolveError;
use crate::problem::Settings;

/// Signal returned to the solver after each evaluation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalSignal {
    /// Evaluation succeeded, continue.
    Proceed,

    /// Evaluation failed recoverably; the solver should retry with a
    /// reduced step.
    ReduceStep,

    /// Stop the solve (monitor abort or unrecoverable inconsistency).
    Stop,
}

/// Objective part of an evaluation request.
pub struct ObjectiveRequest<'a> {
    /// Point restricted to the objective-nonlinear prefix (length
    /// `nn_obj`, permuted coordinates).
    pub x: &'a [f64],

    /// Objective value output.
    pub value: &'a mut f64,

    /// Gradient output over the prefix (length `nn_obj`). Entries whose
    /// variable has a frozen coefficient are left untouched.
    pub gradient: &'a mut [f64],
}

/// Constraint part of an evaluation request.
pub struct ConstraintRequest<'a> {
    /// Point restricted to the constraint-nonlinear prefix (length
    /// `nn_jac`, permuted coordinates).
    pub x: &'a [f64],

    /// Constraint value output for the first `nn_con` reordered rows.
    pub values: &'a mut [f64],

    /// Nonlinear Jacobian block output, column-major (length `ne_con`).
    pub jacobian: &'a mut [f64],
}

/// One solver-requested evaluation. The solver may request either part
/// independently.
pub struct EvalRequest<'a> {
    /// Objective evaluation, if requested.
    pub objective: Option<ObjectiveRequest<'a>>,

    /// Constraint evaluation, if requested.
    pub constraints: Option<ConstraintRequest<'a>>,
}

/// Callback entry point the solver drives once per requested point.
pub trait NlpCallback {
    /// Evaluate the requested parts and populate their output buffers.
    fn evaluate(&mut self, request: EvalRequest<'_>) -> EvalSignal;
}

/// Fixed-format problem handed to a block solver.
///
/// Bound and state arrays run over the `n` variables followed by the `m`
/// rows. Structure index arrays are 1-based, per the solver convention.
pub struct BlockProblem<'a> {
    /// Number of variables.
    pub n: usize,

    /// Number of rows (constraints plus synthesized rows).
    pub m: usize,

    /// Nonlinear constraint count (leading block of the rows).
    pub nn_con: usize,

    /// Objective-nonlinear variable count (leading block of the columns).
    pub nn_obj: usize,

    /// Constraint-nonlinear variable count (leading block of the columns).
    pub nn_jac: usize,

    /// Stored nonzeros of the merged structure.
    pub ne_a: usize,

    /// Expected nonzero count of the nonlinear Jacobian block.
    pub ne_con: usize,

    /// 1-based row of the linear objective row, 0 when absent.
    pub i_obj: usize,

    /// 1-based row index per stored nonzero, column-major.
    pub a_rows: &'a [usize],

    /// 1-based column pointers (length `n + 1`).
    pub a_col_ptr: &'a [usize],

    /// Coefficient values at the initial point.
    pub a_values: &'a [f64],

    /// Lower bounds, variables then rows (length `n + m`).
    pub lower: &'a [f64],

    /// Upper bounds, variables then rows (length `n + m`).
    pub upper: &'a [f64],

    /// State vector, variables then row activities (length `n + m`).
    /// Carries the initial guess in and the solution out.
    pub x: &'a mut [f64],

    /// Row multipliers (length `m`), in/out.
    pub pi: &'a mut [f64],

    /// Reduced costs / dual values (length `n + m`), out.
    pub rc: &'a mut [f64],
}

/// Outcome reported by a block solver after its single blocking call.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    /// Native status code; 0 means success.
    pub status: i32,

    /// Human-readable status description.
    pub reason: String,

    /// Objective value as reported by the solver. The linear objective
    /// row's activity is *not* included; the driver adds it back.
    pub objective: f64,
}

/// A solver following the single-call, buffer-populated convention.
pub trait BlockSolver {
    /// Run one blocking solve. The callback must be driven for every
    /// point the solver wants evaluated; `x`, `pi` and `rc` must hold the
    /// final iterate when this returns.
    fn solve(
        &mut self,
        problem: &mut BlockProblem<'_>,
        callback: &mut dyn NlpCallback,
        settings: &Settings,
    ) -> Result<SolverOutcome, SolveError>;
}
