//! Expression-engine seam.
//!
//! The adapter consumes the symbolic engine through two capabilities per
//! function: numeric evaluation at a point, and boolean dependency
//! propagation over the declared sparsity pattern. Both the objective
//! gradient and the constraint Jacobian are modeled as traits so any
//! engine with those capabilities can plug in.
//!
//! Value layout convention: every numeric output is dense-in-sparsity,
//! one value per stored nonzero of the declared pattern, column-major.

use crate::error::FunctionError;
use crate::sparsity::Sparsity;

/// Output of one objective-gradient evaluation.
#[derive(Debug, Clone)]
pub struct ObjectiveEval {
    /// Objective value at the evaluation point.
    pub value: f64,

    /// Gradient values, one per stored nonzero of the declared pattern.
    pub gradient: Vec<f64>,
}

/// Output of one constraint-Jacobian evaluation.
#[derive(Debug, Clone)]
pub struct ConstraintEval {
    /// Constraint values, one per constraint row.
    pub values: Vec<f64>,

    /// Jacobian values, one per stored nonzero of the declared pattern.
    pub jacobian: Vec<f64>,
}

/// Objective side of the engine: maps a point (and fixed parameters) to
/// the objective value and its gradient.
pub trait ObjectiveGradient {
    /// Number of decision variables.
    fn num_vars(&self) -> usize;

    /// Number of fixed parameters.
    fn num_params(&self) -> usize {
        0
    }

    /// Declared gradient pattern, `num_vars() × 1`. Fixed for the lifetime
    /// of the function.
    fn sparsity(&self) -> &Sparsity;

    /// Evaluate objective and gradient at `x` with parameters `params`.
    fn eval(&self, x: &[f64], params: &[f64]) -> Result<ObjectiveEval, FunctionError>;

    /// Dependency propagation: seed a "may depend nonlinearly" flag on
    /// every input and obtain one flag per stored gradient nonzero.
    ///
    /// The result must be sound: it may over-approximate nonlinearity but
    /// never report a nonlinearly-dependent entry as independent.
    fn propagate(&self, x_seed: &[bool], p_seed: &[bool]) -> Vec<bool>;
}

/// Constraint side of the engine: maps a point to constraint values and
/// the constraint Jacobian.
pub trait ConstraintJacobian {
    /// Number of decision variables.
    fn num_vars(&self) -> usize;

    /// Number of fixed parameters.
    fn num_params(&self) -> usize {
        0
    }

    /// Number of constraint rows.
    fn num_cons(&self) -> usize;

    /// Declared Jacobian pattern, `num_cons() × num_vars()`. Fixed for the
    /// lifetime of the function.
    fn sparsity(&self) -> &Sparsity;

    /// Evaluate constraint values and Jacobian at `x` with parameters
    /// `params`.
    fn eval(&self, x: &[f64], params: &[f64]) -> Result<ConstraintEval, FunctionError>;

    /// Dependency propagation over the Jacobian pattern, same contract as
    /// [`ObjectiveGradient::propagate`].
    fn propagate(&self, x_seed: &[bool], p_seed: &[bool]) -> Vec<bool>;
}
