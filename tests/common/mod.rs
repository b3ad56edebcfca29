//! Shared test fixtures.
//!
//! `Poly` is a miniature polynomial expression engine: enough symbolic
//! structure to give the adapter real values, real derivatives, and a
//! sound dependency propagation. `ProbeSolver` is a scripted block solver
//! that drives the callback like a real backend would and records
//! everything it sees.

use std::cell::Cell;

use blocknlp::{
    BlockProblem, BlockSolver, ConstraintEval, ConstraintJacobian, ConstraintRequest, EvalRequest,
    EvalSignal, FunctionError, NlpCallback, ObjectiveEval, ObjectiveGradient, ObjectiveRequest,
    Settings, SolveError, SolverOutcome, Sparsity,
};

/// One monomial: `coef * Π x_j^p * Π param_i^q`.
#[derive(Debug, Clone)]
pub struct Term {
    pub coef: f64,
    pub vars: Vec<(usize, u32)>,
    pub params: Vec<(usize, u32)>,
}

/// Sum of monomials.
#[derive(Debug, Clone, Default)]
pub struct Poly {
    pub terms: Vec<Term>,
}

impl Poly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(coef: f64) -> Self {
        Self::new().plus(coef, &[])
    }

    /// Add `coef * Π x_j^p`.
    pub fn plus(self, coef: f64, vars: &[(usize, u32)]) -> Self {
        self.plus_param(coef, vars, &[])
    }

    /// Add `coef * Π x_j^p * Π param_i^q`.
    pub fn plus_param(mut self, coef: f64, vars: &[(usize, u32)], params: &[(usize, u32)]) -> Self {
        self.terms.push(Term { coef, vars: vars.to_vec(), params: params.to_vec() });
        self
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn eval(&self, x: &[f64], p: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let mut v = t.coef;
                for &(j, pow) in &t.vars {
                    v *= x[j].powi(pow as i32);
                }
                for &(i, pow) in &t.params {
                    v *= p[i].powi(pow as i32);
                }
                v
            })
            .sum()
    }

    /// Partial derivative with respect to variable `var` (power rule).
    pub fn diff(&self, var: usize) -> Poly {
        let mut out = Poly::new();
        for t in &self.terms {
            let Some(&(_, pow)) = t.vars.iter().find(|&&(j, _)| j == var) else {
                continue;
            };
            let mut vars: Vec<(usize, u32)> = t
                .vars
                .iter()
                .filter(|&&(j, _)| j != var)
                .copied()
                .collect();
            if pow > 1 {
                vars.push((var, pow - 1));
            }
            out.terms.push(Term {
                coef: t.coef * pow as f64,
                vars,
                params: t.params.clone(),
            });
        }
        out
    }

    /// Whether this polynomial mentions any seeded input. Applied to a
    /// derivative entry this is exactly the "may depend nonlinearly" bit.
    pub fn depends_on_seeded(&self, x_seed: &[bool], p_seed: &[bool]) -> bool {
        self.terms.iter().any(|t| {
            t.vars.iter().any(|&(j, pow)| pow > 0 && x_seed[j])
                || t.params.iter().any(|&(i, pow)| pow > 0 && p_seed[i])
        })
    }
}

/// Objective function backed by one polynomial.
pub struct PolyObjective {
    n: usize,
    np: usize,
    expr: Poly,
    sparsity: Sparsity,
    grads: Vec<Poly>,
}

impl PolyObjective {
    pub fn new(n: usize, np: usize, expr: Poly) -> Self {
        let mut entries = Vec::new();
        let mut grads = Vec::new();
        for j in 0..n {
            let d = expr.diff(j);
            if !d.is_zero() {
                entries.push((j, 0));
                grads.push(d);
            }
        }
        let sparsity = Sparsity::from_entries(n, 1, &entries);
        Self { n, np, expr, sparsity, grads }
    }
}

impl ObjectiveGradient for PolyObjective {
    fn num_vars(&self) -> usize {
        self.n
    }
    fn num_params(&self) -> usize {
        self.np
    }
    fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }
    fn eval(&self, x: &[f64], params: &[f64]) -> Result<ObjectiveEval, FunctionError> {
        Ok(ObjectiveEval {
            value: self.expr.eval(x, params),
            gradient: self.grads.iter().map(|g| g.eval(x, params)).collect(),
        })
    }
    fn propagate(&self, x_seed: &[bool], p_seed: &[bool]) -> Vec<bool> {
        self.grads.iter().map(|g| g.depends_on_seeded(x_seed, p_seed)).collect()
    }
}

/// Constraint function backed by one polynomial per row.
pub struct PolyConstraints {
    n: usize,
    np: usize,
    exprs: Vec<Poly>,
    sparsity: Sparsity,
    derivs: Vec<Poly>,
}

impl PolyConstraints {
    pub fn new(n: usize, np: usize, exprs: Vec<Poly>) -> Self {
        let ng = exprs.len();
        let mut triplets: Vec<(usize, usize, Poly)> = Vec::new();
        for (i, e) in exprs.iter().enumerate() {
            for j in 0..n {
                let d = e.diff(j);
                if !d.is_zero() {
                    triplets.push((i, j, d));
                }
            }
        }
        // column-major, matching Sparsity::from_entries order
        triplets.sort_by_key(|&(i, j, _)| (j, i));
        let entries: Vec<(usize, usize)> = triplets.iter().map(|&(i, j, _)| (i, j)).collect();
        let derivs = triplets.into_iter().map(|(_, _, d)| d).collect();
        let sparsity = Sparsity::from_entries(ng, n, &entries);
        Self { n, np, exprs, sparsity, derivs }
    }
}

impl ConstraintJacobian for PolyConstraints {
    fn num_vars(&self) -> usize {
        self.n
    }
    fn num_params(&self) -> usize {
        self.np
    }
    fn num_cons(&self) -> usize {
        self.exprs.len()
    }
    fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }
    fn eval(&self, x: &[f64], params: &[f64]) -> Result<ConstraintEval, FunctionError> {
        Ok(ConstraintEval {
            values: self.exprs.iter().map(|e| e.eval(x, params)).collect(),
            jacobian: self.derivs.iter().map(|d| d.eval(x, params)).collect(),
        })
    }
    fn propagate(&self, x_seed: &[bool], p_seed: &[bool]) -> Vec<bool> {
        self.derivs.iter().map(|d| d.depends_on_seeded(x_seed, p_seed)).collect()
    }
}

/// Objective wrapper that fails its first `failures` evaluations, then
/// delegates. Exercises the bridge's step-reduction recovery.
pub struct FlakyObjective {
    pub inner: PolyObjective,
    pub failures: Cell<usize>,
}

impl ObjectiveGradient for FlakyObjective {
    fn num_vars(&self) -> usize {
        self.inner.num_vars()
    }
    fn num_params(&self) -> usize {
        self.inner.num_params()
    }
    fn sparsity(&self) -> &Sparsity {
        self.inner.sparsity()
    }
    fn eval(&self, x: &[f64], params: &[f64]) -> Result<ObjectiveEval, FunctionError> {
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(FunctionError::Evaluation("flaky evaluation".into()));
        }
        self.inner.eval(x, params)
    }
    fn propagate(&self, x_seed: &[bool], p_seed: &[bool]) -> Vec<bool> {
        self.inner.propagate(x_seed, p_seed)
    }
}

/// Everything a probe run captured about the block problem it was handed.
#[derive(Debug, Clone)]
pub struct Captured {
    pub n: usize,
    pub m: usize,
    pub nn_con: usize,
    pub nn_obj: usize,
    pub nn_jac: usize,
    pub ne_a: usize,
    pub ne_con: usize,
    pub i_obj: usize,
    pub a_rows: Vec<usize>,
    pub a_col_ptr: Vec<usize>,
    pub a_values: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub x0: Vec<f64>,
}

/// Scripted block solver: drives the callback a fixed number of rounds at
/// the initial point, records every output, then reports a scripted
/// outcome and optionally overwrites the solution arrays.
pub struct ProbeSolver {
    pub rounds: usize,
    pub status: i32,
    pub reason: String,
    pub objective: f64,
    pub final_x: Option<Vec<f64>>,
    pub final_pi: Option<Vec<f64>>,
    pub final_rc: Option<Vec<f64>>,
    /// Misreport the nonlinear-block buffer length, to provoke the
    /// bridge's consistency check.
    pub jac_len_override: Option<usize>,

    pub captured: Option<Captured>,
    pub signals: Vec<EvalSignal>,
    pub obj_log: Vec<(f64, Vec<f64>)>,
    pub con_log: Vec<(Vec<f64>, Vec<f64>)>,
}

impl Default for ProbeSolver {
    fn default() -> Self {
        Self {
            rounds: 1,
            status: 0,
            reason: "optimal".to_string(),
            objective: 0.0,
            final_x: None,
            final_pi: None,
            final_rc: None,
            jac_len_override: None,
            captured: None,
            signals: Vec::new(),
            obj_log: Vec::new(),
            con_log: Vec::new(),
        }
    }
}

impl BlockSolver for ProbeSolver {
    fn solve(
        &mut self,
        problem: &mut BlockProblem<'_>,
        callback: &mut dyn NlpCallback,
        _settings: &Settings,
    ) -> Result<SolverOutcome, SolveError> {
        self.captured = Some(Captured {
            n: problem.n,
            m: problem.m,
            nn_con: problem.nn_con,
            nn_obj: problem.nn_obj,
            nn_jac: problem.nn_jac,
            ne_a: problem.ne_a,
            ne_con: problem.ne_con,
            i_obj: problem.i_obj,
            a_rows: problem.a_rows.to_vec(),
            a_col_ptr: problem.a_col_ptr.to_vec(),
            a_values: problem.a_values.to_vec(),
            lower: problem.lower.to_vec(),
            upper: problem.upper.to_vec(),
            x0: problem.x.to_vec(),
        });

        for _ in 0..self.rounds {
            let x_obj = problem.x[..problem.nn_obj].to_vec();
            let x_jac = problem.x[..problem.nn_jac].to_vec();
            let mut value = 0.0;
            let mut gradient = vec![0.0; problem.nn_obj];
            let mut values = vec![0.0; problem.nn_con];
            let jac_len = self.jac_len_override.unwrap_or(problem.ne_con);
            let mut jacobian = vec![0.0; jac_len];

            let signal = callback.evaluate(EvalRequest {
                objective: Some(ObjectiveRequest {
                    x: &x_obj,
                    value: &mut value,
                    gradient: &mut gradient,
                }),
                constraints: Some(ConstraintRequest {
                    x: &x_jac,
                    values: &mut values,
                    jacobian: &mut jacobian,
                }),
            });
            self.signals.push(signal);
            self.obj_log.push((value, gradient));
            self.con_log.push((values, jacobian));
            if signal == EvalSignal::Stop {
                break;
            }
        }

        if let Some(fx) = &self.final_x {
            problem.x.copy_from_slice(fx);
        }
        if let Some(fpi) = &self.final_pi {
            problem.pi.copy_from_slice(fpi);
        }
        if let Some(frc) = &self.final_rc {
            problem.rc.copy_from_slice(frc);
        }

        Ok(SolverOutcome {
            status: self.status,
            reason: self.reason.clone(),
            objective: self.objective,
        })
    }
}
