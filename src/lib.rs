//! blocknlp: symbolic-NLP front end for block-structured sparse solvers
//!
//! This library adapts a symbolically-defined nonlinear program (decision
//! variables, objective and constraints evaluated through an external
//! expression engine with sparsity-propagation support) into the
//! fixed-format, block-structured input expected by sparse SQP solvers in
//! the SNOPT calling-convention family, and bridges the solver's iterative
//! function/derivative callbacks back to that engine.
//!
//! The pipeline, run once per problem structure:
//!
//! - **Classification** ([`classify`]): sparsity propagation assigns every
//!   variable an objective- and a constraint-nonlinearity class, and every
//!   constraint a class.
//! - **Ordering** ([`order`]): stable priority grouping puts everything
//!   "potentially nonlinear" into contiguous leading blocks and yields the
//!   three boundary counts (`nn_jac`, `nn_obj`, `nn_con`).
//! - **Structure assembly** ([`structure`]): the reordered constraint
//!   Jacobian and the frozen linear part of the objective gradient merge
//!   into one provenance-tagged sparse structure.
//! - **Evaluation bridging** ([`bridge`]): each solver-requested point is
//!   scattered to original coordinates, evaluated through the engine, and
//!   gathered back into the solver's buffers; engine failures become the
//!   solver's step-reduction signal.
//! - **Driving** ([`driver`]): bounds and guesses move into permuted
//!   coordinates (with affine-offset correction for linear constraints),
//!   the solver runs once, and the solution is scattered back.
//!
//! # Example
//!
//! ```ignore
//! use blocknlp::{solve, NlpProblem, Settings};
//!
//! // grad: impl ObjectiveGradient, jac: impl ConstraintJacobian,
//! // backend: impl BlockSolver
//! let mut problem = NlpProblem::new(grad.num_vars(), jac.num_cons());
//! problem.x0 = vec![1.0, 2.0];
//!
//! let result = solve(&grad, Some(&jac), &problem, &mut backend, &Settings::default())?;
//! println!("{}: obj = {}", result.status, result.obj_val);
//! ```
//!
//! # References
//!
//! - Gill, Murray, Saunders: *SNOPT: An SQP Algorithm for Large-Scale
//!   Constrained Optimization* (the block convention and the
//!   nonlinear-prefix variable ordering this adapter targets)

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod classify;
pub mod driver;
pub mod error;
pub mod function;
pub mod order;
pub mod problem;
pub mod solver;
pub mod sparsity;
pub mod structure;

// Re-export main types
pub use bridge::{EvalBridge, Iterate, MonitorFn, MonitorSignal};
pub use classify::{classify, Classification, Linearity};
pub use driver::{solve, DriverState, NlpSolver};
pub use error::{DriverResult, FunctionError, SetupError, SolveError};
pub use function::{ConstraintEval, ConstraintJacobian, ObjectiveEval, ObjectiveGradient};
pub use order::{ConstraintOrder, VariableOrder};
pub use problem::{NlpProblem, Settings, SolveInfo, SolveResult, SolveStatus};
pub use solver::{
    BlockProblem, BlockSolver, ConstraintRequest, EvalRequest, EvalSignal, NlpCallback,
    ObjectiveRequest, SolverOutcome,
};
pub use sparsity::Sparsity;
pub use structure::{MergedStructure, Provenance};
