//! Nonlinearity classification.
//!
//! Every variable gets two classes (how it enters the objective, how it
//! enters the constraints) and every constraint row gets one, computed
//! once from the engine's propagated dependency patterns. Downstream,
//! linear-class coefficients are frozen into the merged structure and only
//! nonlinear-class entities flow through the evaluation bridge.

use crate::function::{ConstraintJacobian, ObjectiveGradient};
use crate::sparsity::Sparsity;

/// Degree of nonlinearity of a variable or constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Linearity {
    /// Structurally absent: no stored coefficient at all.
    Absent,
    /// Present with a constant coefficient, safe to freeze.
    Linear,
    /// Coefficient may change with the decision variables.
    Nonlinear,
}

/// Per-variable and per-constraint nonlinearity classes.
///
/// Immutable once computed; a structurally different problem requires a
/// fresh classification.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Objective class per variable, original order.
    pub obj_var: Vec<Linearity>,

    /// Constraint class per variable, original order.
    pub con_var: Vec<Linearity>,

    /// Class per constraint row, original order.
    pub con: Vec<Linearity>,
}

impl Classification {
    /// Number of decision variables.
    pub fn num_vars(&self) -> usize {
        self.obj_var.len()
    }

    /// Number of constraint rows.
    pub fn num_cons(&self) -> usize {
        self.con.len()
    }
}

/// Classify variables and constraints by sparsity propagation.
///
/// Seeds every decision variable `true` and every parameter `false`, then
/// reads the propagated dependency bits off each function's pattern. With
/// `detect_linear` off, everything present is reported nonlinear and the
/// solver re-evaluates all of it each iteration.
///
/// When no Jacobian function exists, every variable's constraint class and
/// every constraint default to `Linear`.
pub fn classify(
    grad: &dyn ObjectiveGradient,
    jac: Option<&dyn ConstraintJacobian>,
    num_cons: usize,
    detect_linear: bool,
) -> Classification {
    let nx = grad.num_vars();

    if !detect_linear {
        return Classification {
            obj_var: vec![Linearity::Nonlinear; nx],
            con_var: vec![Linearity::Nonlinear; nx],
            con: vec![Linearity::Nonlinear; num_cons],
        };
    }

    let x_seed = vec![true; nx];

    let gsp = grad.sparsity();
    assert_eq!(gsp.nrows(), nx, "gradient pattern must have one row per variable");
    assert_eq!(gsp.ncols(), 1, "gradient pattern must be a single column");
    let gbits = grad.propagate(&x_seed, &vec![false; grad.num_params()]);
    assert_eq!(gbits.len(), gsp.nnz(), "one dependency bit per stored gradient nonzero");

    let mut obj_var = vec![Linearity::Absent; nx];
    for (k, &j) in gsp.col(0).iter().enumerate() {
        obj_var[j] = if gbits[k] { Linearity::Nonlinear } else { Linearity::Linear };
    }

    let (con_var, con) = match jac {
        Some(jac) => {
            let jsp = jac.sparsity();
            assert_eq!(jsp.nrows(), num_cons, "Jacobian pattern must have one row per constraint");
            assert_eq!(jsp.ncols(), nx, "Jacobian pattern must have one column per variable");
            let jbits = jac.propagate(&x_seed, &vec![false; jac.num_params()]);
            assert_eq!(jbits.len(), jsp.nnz(), "one dependency bit per stored Jacobian nonzero");

            let con_var = classify_columns(jsp, &jbits);
            let (jsp_t, jbits_t) = jsp.transpose_with(&jbits);
            let con = classify_columns(&jsp_t, &jbits_t);
            (con_var, con)
        }
        None => (vec![Linearity::Linear; nx], vec![Linearity::Linear; num_cons]),
    };

    let classes = Classification { obj_var, con_var, con };
    log::debug!(
        "classified {} variables, {} constraints: obj {:?} / con-var {:?} / con {:?}",
        nx,
        num_cons,
        class_counts(&classes.obj_var),
        class_counts(&classes.con_var),
        class_counts(&classes.con),
    );
    classes
}

/// One class per column: empty column is absent, any set bit makes it
/// nonlinear, otherwise linear.
fn classify_columns(pattern: &Sparsity, bits: &[bool]) -> Vec<Linearity> {
    let mut classes = vec![Linearity::Absent; pattern.ncols()];
    for (j, class) in classes.iter_mut().enumerate() {
        let range = pattern.col_range(j);
        if range.is_empty() {
            continue;
        }
        let nonlinear = bits[range].iter().any(|&b| b);
        *class = if nonlinear { Linearity::Nonlinear } else { Linearity::Linear };
    }
    classes
}

/// (absent, linear, nonlinear) counts, for logging.
fn class_counts(classes: &[Linearity]) -> (usize, usize, usize) {
    let mut counts = (0, 0, 0);
    for c in classes {
        match c {
            Linearity::Absent => counts.0 += 1,
            Linearity::Linear => counts.1 += 1,
            Linearity::Nonlinear => counts.2 += 1,
        }
    }
    counts
}
