//! Evaluation bridge.
//!
//! The bridge sits inside the solver's blocking call and is driven once
//! per requested point, potentially thousands of times per solve. Each
//! call converts the solver-side point (permuted, nonlinear-prefix
//! coordinates) into engine evaluations and scatters the results back
//! into the solver's output buffers.
//!
//! Failure discipline: engine errors never unwind through the solver.
//! They are logged and converted into [`EvalSignal::ReduceStep`], after
//! which the solver is expected to retry with a smaller step. Structural
//! inconsistencies (buffer sizes disagreeing with the computed structure)
//! are recorded as fatal and stop the solve instead.

use crate::classify::{Classification, Linearity};
use crate::error::FunctionError;
use crate::function::{ConstraintJacobian, ObjectiveGradient};
use crate::order::{ConstraintOrder, VariableOrder};
use crate::solver::{ConstraintRequest, EvalRequest, EvalSignal, NlpCallback, ObjectiveRequest};
use crate::structure::MergedStructure;

/// Signal returned by a monitoring hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    /// Keep solving.
    Continue,

    /// Terminate the solve cooperatively.
    Stop,
}

/// Snapshot handed to the monitoring hook.
#[derive(Debug)]
pub struct Iterate<'a> {
    /// Current point in original coordinates. Variables outside the
    /// nonlinear prefixes hold the background value 0; their contribution
    /// is captured by frozen coefficients.
    pub x: &'a [f64],
}

/// Monitoring hook: receives each iterate, may request termination.
pub type MonitorFn<'m> = dyn FnMut(&Iterate<'_>) -> MonitorSignal + 'm;

/// Per-solve evaluation bridge. Owns the scratch state one solve needs
/// and implements the solver-facing callback.
pub struct EvalBridge<'a, 'm> {
    grad: &'a dyn ObjectiveGradient,
    jac: Option<&'a dyn ConstraintJacobian>,
    classes: &'a Classification,
    vars: &'a VariableOrder,
    cons: &'a ConstraintOrder,
    structure: &'a mut MergedStructure,
    params: &'a [f64],
    monitor: Option<&'a mut MonitorFn<'m>>,

    /// Variable index → gradient nonzero slot, from the declared pattern.
    grad_slot: Vec<Option<usize>>,

    /// Full-size point buffer in original coordinates.
    scratch: Vec<f64>,

    obj_evals: usize,
    con_evals: usize,
    monitor_stopped: bool,
    fatal: Option<String>,
}

impl<'a, 'm> EvalBridge<'a, 'm> {
    /// Build a bridge for one solve.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        grad: &'a dyn ObjectiveGradient,
        jac: Option<&'a dyn ConstraintJacobian>,
        classes: &'a Classification,
        vars: &'a VariableOrder,
        cons: &'a ConstraintOrder,
        structure: &'a mut MergedStructure,
        params: &'a [f64],
        monitor: Option<&'a mut MonitorFn<'m>>,
    ) -> Self {
        let n = vars.num_vars();
        let mut grad_slot = vec![None; n];
        for (k, &j) in grad.sparsity().col(0).iter().enumerate() {
            grad_slot[j] = Some(k);
        }
        Self {
            grad,
            jac,
            classes,
            vars,
            cons,
            structure,
            params,
            monitor,
            grad_slot,
            scratch: vec![0.0; n],
            obj_evals: 0,
            con_evals: 0,
            monitor_stopped: false,
            fatal: None,
        }
    }

    /// Whether the monitoring hook requested termination.
    pub fn monitor_stopped(&self) -> bool {
        self.monitor_stopped
    }

    /// Take the fatal inconsistency message, if one was recorded.
    pub fn take_fatal(&mut self) -> Option<String> {
        self.fatal.take()
    }

    /// (objective, constraint) evaluation counts so far.
    pub fn eval_counts(&self) -> (usize, usize) {
        (self.obj_evals, self.con_evals)
    }

    fn fatal(&mut self, message: String) -> EvalSignal {
        log::error!("aborting solve: {message}");
        self.fatal = Some(message);
        EvalSignal::Stop
    }

    fn evaluate_inner(&mut self, request: EvalRequest<'_>) -> Result<EvalSignal, FunctionError> {
        let evaluated = request.objective.is_some() || request.constraints.is_some();

        if let Some(objective) = request.objective {
            let signal = self.eval_objective(objective)?;
            if signal != EvalSignal::Proceed {
                return Ok(signal);
            }
        }
        if let Some(constraints) = request.constraints {
            let signal = self.eval_constraints(constraints)?;
            if signal != EvalSignal::Proceed {
                return Ok(signal);
            }
        }

        if evaluated {
            if let Some(monitor) = self.monitor.as_mut() {
                let iterate = Iterate { x: &self.scratch };
                if monitor(&iterate) == MonitorSignal::Stop {
                    log::debug!("monitor requested termination");
                    self.monitor_stopped = true;
                    return Ok(EvalSignal::Stop);
                }
            }
        }
        Ok(EvalSignal::Proceed)
    }

    /// Objective half of a request: scatter the `nn_obj` prefix, evaluate
    /// the gradient function once, gather value and nonlinear gradient
    /// entries, refresh gradient-provenance structure cells.
    fn eval_objective(&mut self, req: ObjectiveRequest<'_>) -> Result<EvalSignal, FunctionError> {
        let nn_obj = self.vars.nn_obj;
        if req.x.len() != nn_obj || req.gradient.len() != nn_obj {
            return Ok(self.fatal(format!(
                "objective request sized {}/{}, adapter computed nn_obj = {nn_obj}",
                req.x.len(),
                req.gradient.len(),
            )));
        }

        // Positions with a frozen coefficient keep the background value;
        // their contribution is already in the merged structure.
        self.scratch.fill(0.0);
        for (k, &xk) in req.x.iter().enumerate() {
            let j = self.vars.forward[k];
            if self.classes.obj_var[j] == Linearity::Nonlinear {
                self.scratch[j] = xk;
            }
        }

        let out = self.grad.eval(&self.scratch, self.params)?;
        if out.gradient.len() != self.grad.sparsity().nnz() {
            return Ok(self.fatal(format!(
                "gradient function returned {} values, declared pattern stores {}",
                out.gradient.len(),
                self.grad.sparsity().nnz(),
            )));
        }

        *req.value = out.value;
        for k in 0..nn_obj {
            let j = self.vars.forward[k];
            if self.classes.obj_var[j] == Linearity::Nonlinear {
                if let Some(slot) = self.grad_slot[j] {
                    req.gradient[k] = out.gradient[slot];
                }
            }
        }

        self.structure.refresh_gradient(&out.gradient);
        self.obj_evals += 1;
        log::trace!("objective evaluation #{}: f = {}", self.obj_evals, out.value);
        Ok(EvalSignal::Proceed)
    }

    /// Constraint half of a request: scatter the `nn_jac` prefix, evaluate
    /// the Jacobian function once, refresh Jacobian-provenance cells, then
    /// gather values for the nonlinear rows and the nonlinear Jacobian
    /// block in column-major order.
    fn eval_constraints(&mut self, req: ConstraintRequest<'_>) -> Result<EvalSignal, FunctionError> {
        let Some(jac) = self.jac else {
            if req.values.is_empty() && req.jacobian.is_empty() {
                return Ok(EvalSignal::Proceed);
            }
            return Ok(self.fatal(
                "solver requested constraint values but no Jacobian function exists".to_string(),
            ));
        };

        let nn_jac = self.vars.nn_jac;
        let nn_con = self.cons.nn_con;
        if req.x.len() != nn_jac || req.values.len() != nn_con {
            return Ok(self.fatal(format!(
                "constraint request sized {}/{}, adapter computed nn_jac = {nn_jac}, nn_con = {nn_con}",
                req.x.len(),
                req.values.len(),
            )));
        }

        // Every variable in the nn_jac prefix is constraint-nonlinear by
        // the prefix invariant, so the scatter is unconditional.
        self.scratch.fill(0.0);
        for (k, &xk) in req.x.iter().enumerate() {
            self.scratch[self.vars.forward[k]] = xk;
        }

        let out = jac.eval(&self.scratch, self.params)?;
        if out.jacobian.len() != jac.sparsity().nnz() || out.values.len() != jac.num_cons() {
            return Ok(self.fatal(format!(
                "Jacobian function returned {} values / {} derivatives, declared {} / {}",
                out.values.len(),
                out.jacobian.len(),
                jac.num_cons(),
                jac.sparsity().nnz(),
            )));
        }

        self.structure.refresh_jacobian(&out.jacobian);

        for k in 0..nn_con {
            req.values[k] = out.values[self.cons.forward[k]];
        }

        let gathered = self.structure.gather_nonlinear_block(nn_con, nn_jac, req.jacobian);
        if gathered != req.jacobian.len() {
            return Ok(self.fatal(format!(
                "nonlinear Jacobian block holds {gathered} values, solver expects {}",
                req.jacobian.len(),
            )));
        }

        self.con_evals += 1;
        log::trace!("constraint evaluation #{}", self.con_evals);
        Ok(EvalSignal::Proceed)
    }
}

impl NlpCallback for EvalBridge<'_, '_> {
    fn evaluate(&mut self, request: EvalRequest<'_>) -> EvalSignal {
        match self.evaluate_inner(request) {
            Ok(signal) => signal,
            Err(err) => {
                log::warn!("evaluation failed, requesting step reduction: {err}");
                EvalSignal::ReduceStep
            }
        }
    }
}
