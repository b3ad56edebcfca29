//! Solve driver.
//!
//! Orchestrates one solve: structure the problem once (classification,
//! permutations, merged structure), convert bounds and guesses into
//! permuted coordinates with affine-offset correction, invoke the solver
//! backend a single time with the evaluation bridge as its callback, and
//! scatter the returned solution back to original coordinates.
//!
//! One driver instance owns all mutable solve state; concurrent solves
//! require separate instances.

use crate::bridge::{EvalBridge, MonitorFn};
use crate::classify::{classify, Classification, Linearity};
use crate::error::{SetupError, SolveError};
use crate::function::{ConstraintJacobian, ObjectiveGradient};
use crate::order::{ConstraintOrder, VariableOrder};
use crate::problem::{NlpProblem, Settings, SolveInfo, SolveResult, SolveStatus};
use crate::solver::{BlockProblem, BlockSolver};
use crate::structure::MergedStructure;

/// Driver lifecycle. Construction performs the structuring transition, so
/// a driver is born `Structured`; `prepare` moves it to `Ready`, a solve
/// ends in `Solved` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Classification, orderings and merged structure are built.
    Structured,

    /// Bounds and initial guess are populated in permuted coordinates.
    Ready,

    /// The last solve finished (successfully or stopped by the monitor).
    Solved,

    /// The last solve failed.
    Failed,
}

impl DriverState {
    fn name(self) -> &'static str {
        match self {
            DriverState::Structured => "structured",
            DriverState::Ready => "ready",
            DriverState::Solved => "solved",
            DriverState::Failed => "failed",
        }
    }
}

/// Solve driver for one nonlinear program.
///
/// The structural products (classification, orders, merged structure) are
/// computed once at construction and never change; re-solving with new
/// parameter values only refreshes array values through [`NlpSolver::prepare`].
pub struct NlpSolver<'f> {
    grad: &'f dyn ObjectiveGradient,
    jac: Option<&'f dyn ConstraintJacobian>,
    settings: Settings,
    state: DriverState,

    classes: Classification,
    vars: VariableOrder,
    cons: ConstraintOrder,
    structure: MergedStructure,
    num_cons: usize,

    // permuted-coordinate solve arrays, length n + m except pi (m)
    lower: Vec<f64>,
    upper: Vec<f64>,
    x: Vec<f64>,
    pi: Vec<f64>,
    rc: Vec<f64>,
    params: Vec<f64>,
}

impl<'f> NlpSolver<'f> {
    /// Structure the problem: classify, order, assemble.
    pub fn new(
        grad: &'f dyn ObjectiveGradient,
        jac: Option<&'f dyn ConstraintJacobian>,
        settings: Settings,
    ) -> Result<Self, SetupError> {
        let n = grad.num_vars();
        let num_cons = jac.map_or(0, |j| j.num_cons());

        if let Some(jac) = jac {
            if jac.num_vars() != n {
                return Err(SetupError::DimensionMismatch {
                    what: "constraint Jacobian variables",
                    got: jac.num_vars(),
                    expected: n,
                });
            }
            if jac.num_params() != grad.num_params() {
                return Err(SetupError::DimensionMismatch {
                    what: "constraint Jacobian parameters",
                    got: jac.num_params(),
                    expected: grad.num_params(),
                });
            }
        }

        let classes = classify(grad, jac, num_cons, settings.detect_linear);
        let vars = VariableOrder::build(&classes);
        let cons = ConstraintOrder::build(&classes);
        let structure = MergedStructure::assemble(
            grad.sparsity(),
            jac.map(|j| j.sparsity()),
            &classes,
            &vars,
            &cons,
        );
        let m = structure.num_rows();
        log::debug!(
            "structured NLP: n={n} ng={num_cons} m={m} nn_jac={} nn_obj={} nn_con={}",
            vars.nn_jac,
            vars.nn_obj,
            cons.nn_con,
        );

        Ok(Self {
            grad,
            jac,
            settings,
            state: DriverState::Structured,
            classes,
            vars,
            cons,
            structure,
            num_cons,
            lower: vec![0.0; n + m],
            upper: vec![0.0; n + m],
            x: vec![0.0; n + m],
            pi: vec![0.0; m],
            rc: vec![0.0; n + m],
            params: Vec::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Number of decision variables.
    pub fn num_vars(&self) -> usize {
        self.vars.num_vars()
    }

    /// Number of constraints (excluding synthesized rows).
    pub fn num_cons(&self) -> usize {
        self.num_cons
    }

    /// Computed classification.
    pub fn classification(&self) -> &Classification {
        &self.classes
    }

    /// Computed variable ordering.
    pub fn variable_order(&self) -> &VariableOrder {
        &self.vars
    }

    /// Computed constraint ordering.
    pub fn constraint_order(&self) -> &ConstraintOrder {
        &self.cons
    }

    /// Merged coefficient structure.
    pub fn structure(&self) -> &MergedStructure {
        &self.structure
    }

    /// Populate bounds and initial guess in permuted coordinates.
    ///
    /// Affine (non-nonlinear) constraints get their bounds shifted by the
    /// constraint value at the origin: the frozen coefficients encode the
    /// slope, so only the residual needs bounding. Also performs the
    /// one-time evaluation at the initial guess that fills the merged
    /// structure's values.
    pub fn prepare(&mut self, problem: &NlpProblem) -> Result<(), SolveError> {
        let n = self.vars.num_vars();
        let ng = self.num_cons;
        let m = self.structure.num_rows();

        if self.jac.is_none() && problem.num_cons() > 0 {
            return Err(SetupError::MissingJacobian { num_cons: problem.num_cons() }.into());
        }
        problem.validate(n, ng, self.grad.num_params())?;

        self.params.clear();
        self.params.extend_from_slice(&problem.params);

        for k in 0..n {
            let kk = self.vars.forward[k];
            self.lower[k] = problem.x_lower[kk];
            self.upper[k] = problem.x_upper[kk];
            self.x[k] = problem.x0[kk];
        }

        let at_guess = self.grad.eval(&problem.x0, &self.params)?;
        self.structure.refresh_gradient(&at_guess.gradient);

        if let Some(jac) = self.jac {
            let at_guess = jac.eval(&problem.x0, &self.params)?;
            self.structure.refresh_jacobian(&at_guess.jacobian);

            let at_origin = jac.eval(&vec![0.0; n], &self.params)?;
            for k in 0..ng {
                let kk = self.cons.forward[k];
                if self.classes.con[kk] < Linearity::Nonlinear {
                    self.lower[n + k] = problem.g_lower[kk] - at_origin.values[kk];
                    self.upper[n + k] = problem.g_upper[kk] - at_origin.values[kk];
                } else {
                    self.lower[n + k] = problem.g_lower[kk];
                    self.upper[n + k] = problem.g_upper[kk];
                }
                self.x[n + k] = problem.lam_g0[kk];
            }
        }

        // synthesized objective / dummy rows are unbounded
        for r in ng..m {
            self.lower[n + r] = f64::NEG_INFINITY;
            self.upper[n + r] = f64::INFINITY;
            self.x[n + r] = 0.0;
        }

        self.pi.fill(0.0);
        self.rc.fill(0.0);
        self.state = DriverState::Ready;
        Ok(())
    }

    /// Run one blocking solve through the given backend.
    ///
    /// The optional monitor receives every iterate (original coordinates)
    /// and may request cooperative termination.
    pub fn solve_with(
        &mut self,
        solver: &mut dyn BlockSolver,
        monitor: Option<&mut MonitorFn<'_>>,
    ) -> Result<SolveResult, SolveError> {
        if self.state != DriverState::Ready {
            return Err(SolveError::InvalidState { expected: "ready", actual: self.state.name() });
        }

        let n = self.vars.num_vars();
        let ng = self.num_cons;
        let m = self.structure.num_rows();

        let a_rows = self.structure.rows_one_based();
        let a_col_ptr = self.structure.col_ptr_one_based();
        let a_values = self.structure.values().to_vec();
        let ne_a = a_rows.len();
        let ne_con = self.structure.nonlinear_nnz();
        let obj_row = self.structure.obj_row();
        let i_obj = obj_row.map_or(0, |r| r + 1);

        debug_assert!(ne_a > 0, "structure is never empty after assembly");
        debug_assert_eq!(a_col_ptr[0], 1);
        debug_assert_eq!(a_col_ptr[n], ne_a + 1);

        let mut bridge = EvalBridge::new(
            self.grad,
            self.jac,
            &self.classes,
            &self.vars,
            &self.cons,
            &mut self.structure,
            &self.params,
            monitor,
        );
        let mut block = BlockProblem {
            n,
            m,
            nn_con: self.cons.nn_con,
            nn_obj: self.vars.nn_obj,
            nn_jac: self.vars.nn_jac,
            ne_a,
            ne_con,
            i_obj,
            a_rows: &a_rows,
            a_col_ptr: &a_col_ptr,
            a_values: &a_values,
            lower: &self.lower,
            upper: &self.upper,
            x: &mut self.x,
            pi: &mut self.pi,
            rc: &mut self.rc,
        };

        let outcome = solver.solve(&mut block, &mut bridge, &self.settings)?;

        let monitor_stopped = bridge.monitor_stopped();
        let fatal = bridge.take_fatal();
        let (obj_evals, con_evals) = bridge.eval_counts();

        if let Some(message) = fatal {
            self.state = DriverState::Failed;
            return Err(SetupError::StructureInconsistency(message).into());
        }

        // scatter the solution back to original coordinates
        let mut x = vec![0.0; n];
        let mut lam_x = vec![0.0; n];
        let mut lam_g = vec![0.0; ng];
        let mut g = vec![0.0; ng];
        for k in 0..n {
            let kk = self.vars.forward[k];
            x[kk] = self.x[k];
            lam_x[kk] = -self.rc[k];
        }
        for k in 0..ng {
            let kk = self.cons.forward[k];
            lam_g[kk] = -self.rc[n + k];
            g[kk] = self.x[n + k];
        }

        // the linear objective row's activity re-enters the objective here,
        // exactly once
        let mut obj_val = outcome.objective;
        if let Some(row) = obj_row {
            obj_val += self.x[n + row];
        }

        let status = if monitor_stopped {
            SolveStatus::MonitorStopped
        } else if outcome.status == 0 {
            SolveStatus::Optimal
        } else {
            SolveStatus::SolverFailure
        };
        self.state = match status {
            SolveStatus::SolverFailure => DriverState::Failed,
            _ => DriverState::Solved,
        };
        log::debug!(
            "solve finished: status={status} solver_status={} obj={obj_val} \
             ({obj_evals} objective / {con_evals} constraint evaluations)",
            outcome.status,
        );

        Ok(SolveResult {
            status,
            x,
            lam_x,
            lam_g,
            g,
            obj_val,
            info: SolveInfo {
                solver_status: outcome.status,
                solver_reason: outcome.reason,
                obj_evals,
                con_evals,
            },
        })
    }
}

/// Structure, prepare and solve in one call.
pub fn solve(
    grad: &dyn ObjectiveGradient,
    jac: Option<&dyn ConstraintJacobian>,
    problem: &NlpProblem,
    solver: &mut dyn BlockSolver,
    settings: &Settings,
) -> Result<SolveResult, SolveError> {
    let mut driver = NlpSolver::new(grad, jac, settings.clone())?;
    driver.prepare(problem)?;
    driver.solve_with(solver, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use crate::function::ObjectiveEval;
    use crate::sparsity::Sparsity;

    /// f(x) = x0 + 2 x1, purely linear.
    struct LinearGrad {
        sp: Sparsity,
    }

    impl LinearGrad {
        fn new() -> Self {
            Self { sp: Sparsity::dense_column(2) }
        }
    }

    impl ObjectiveGradient for LinearGrad {
        fn num_vars(&self) -> usize {
            2
        }
        fn sparsity(&self) -> &Sparsity {
            &self.sp
        }
        fn eval(&self, x: &[f64], _p: &[f64]) -> Result<ObjectiveEval, FunctionError> {
            Ok(ObjectiveEval { value: x[0] + 2.0 * x[1], gradient: vec![1.0, 2.0] })
        }
        fn propagate(&self, _x: &[bool], _p: &[bool]) -> Vec<bool> {
            vec![false, false]
        }
    }

    #[test]
    fn test_solve_requires_prepare() {
        let grad = LinearGrad::new();
        let mut driver = NlpSolver::new(&grad, None, Settings::default()).unwrap();
        assert_eq!(driver.state(), DriverState::Structured);

        struct NeverSolver;
        impl BlockSolver for NeverSolver {
            fn solve(
                &mut self,
                _problem: &mut BlockProblem<'_>,
                _callback: &mut dyn crate::solver::NlpCallback,
                _settings: &Settings,
            ) -> Result<crate::solver::SolverOutcome, SolveError> {
                panic!("must not be called in the wrong state")
            }
        }

        let err = driver.solve_with(&mut NeverSolver, None).unwrap_err();
        assert!(matches!(err, SolveError::InvalidState { expected: "ready", .. }));
    }

    #[test]
    fn test_missing_jacobian_rejected_at_prepare() {
        let grad = LinearGrad::new();
        let mut driver = NlpSolver::new(&grad, None, Settings::default()).unwrap();
        let problem = NlpProblem::new(2, 1);
        let err = driver.prepare(&problem).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Setup(SetupError::MissingJacobian { num_cons: 1 })
        ));
    }

    #[test]
    fn test_prepare_permutes_variable_bounds() {
        let grad = LinearGrad::new();
        let mut driver = NlpSolver::new(&grad, None, Settings::default()).unwrap();

        let mut problem = NlpProblem::new(2, 0);
        problem.x_lower = vec![-1.0, -2.0];
        problem.x_upper = vec![1.0, 2.0];
        problem.x0 = vec![0.5, -0.5];
        driver.prepare(&problem).unwrap();
        assert_eq!(driver.state(), DriverState::Ready);

        // all-linear problem keeps the identity ordering
        assert_eq!(driver.variable_order().forward, vec![0, 1]);
        assert_eq!(driver.lower[..2], [-1.0, -2.0]);
        assert_eq!(driver.upper[..2], [1.0, 2.0]);
        assert_eq!(driver.x[..2], [0.5, -0.5]);

        // the single synthesized row (objective) is unbounded
        let m = driver.structure().num_rows();
        assert_eq!(m, 1);
        assert_eq!(driver.lower[2], f64::NEG_INFINITY);
        assert_eq!(driver.upper[2], f64::INFINITY);
    }
}
