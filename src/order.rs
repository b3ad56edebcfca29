//! Variable and constraint permutations.
//!
//! The solver's block format requires every "potentially nonlinear" entity
//! to sit in a contiguous leading block. Both permutations here are stable
//! groupings (bucket scans, not comparison sorts): within a bucket the
//! original relative order is preserved.

use crate::classify::{Classification, Linearity};

/// Variable priority buckets over (objective class, constraint class),
/// in placement order. The first three buckets collect everything
/// nonlinear in some constraint; the first five collect everything
/// nonlinear in the objective.
const VAR_PRIORITY: [(Linearity, Linearity); 9] = [
    (Linearity::Nonlinear, Linearity::Nonlinear),
    (Linearity::Linear, Linearity::Nonlinear),
    (Linearity::Absent, Linearity::Nonlinear),
    (Linearity::Nonlinear, Linearity::Linear),
    (Linearity::Nonlinear, Linearity::Absent),
    (Linearity::Linear, Linearity::Linear),
    (Linearity::Linear, Linearity::Absent),
    (Linearity::Absent, Linearity::Linear),
    (Linearity::Absent, Linearity::Absent),
];

/// Stable variable ordering grouped by nonlinearity priority.
#[derive(Debug, Clone)]
pub struct VariableOrder {
    /// Sorted position → original variable index.
    pub forward: Vec<usize>,

    /// Original variable index → sorted position.
    pub inverse: Vec<usize>,

    /// Variables potentially nonlinear in some constraint occupy
    /// positions `[0, nn_jac)`.
    pub nn_jac: usize,

    /// Variables potentially nonlinear in the objective occupy positions
    /// `[0, nn_obj)`.
    pub nn_obj: usize,
}

impl VariableOrder {
    /// Build the ordering from variable classes.
    pub fn build(classes: &Classification) -> Self {
        let n = classes.num_vars();
        let mut forward = Vec::with_capacity(n);
        let mut cumulative = [0usize; 9];
        for (p, &key) in VAR_PRIORITY.iter().enumerate() {
            for j in 0..n {
                if (classes.obj_var[j], classes.con_var[j]) == key {
                    forward.push(j);
                }
            }
            cumulative[p] = forward.len();
        }
        debug_assert_eq!(forward.len(), n, "every variable lands in exactly one bucket");

        let nn_jac = cumulative[2];
        let nn_obj = cumulative[4];

        let mut inverse = vec![0usize; n];
        for (pos, &orig) in forward.iter().enumerate() {
            inverse[orig] = pos;
        }

        log::debug!("variable order: n={n} nn_jac={nn_jac} nn_obj={nn_obj}");
        Self { forward, inverse, nn_jac, nn_obj }
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.forward.len()
    }
}

/// Stable constraint ordering, nonlinear rows first.
#[derive(Debug, Clone)]
pub struct ConstraintOrder {
    /// Sorted position → original constraint index.
    pub forward: Vec<usize>,

    /// Original constraint index → sorted position.
    pub inverse: Vec<usize>,

    /// Nonlinear constraints occupy positions `[0, nn_con)`.
    pub nn_con: usize,
}

impl ConstraintOrder {
    /// Build the ordering from constraint classes.
    pub fn build(classes: &Classification) -> Self {
        let ng = classes.num_cons();
        let mut forward = Vec::with_capacity(ng);
        let mut nn_con = 0;
        for class in [Linearity::Nonlinear, Linearity::Linear, Linearity::Absent] {
            for i in 0..ng {
                if classes.con[i] == class {
                    forward.push(i);
                }
            }
            if class == Linearity::Nonlinear {
                nn_con = forward.len();
            }
        }
        debug_assert_eq!(forward.len(), ng, "every constraint lands in exactly one group");

        let mut inverse = vec![0usize; ng];
        for (pos, &orig) in forward.iter().enumerate() {
            inverse[orig] = pos;
        }

        log::debug!("constraint order: ng={ng} nn_con={nn_con}");
        Self { forward, inverse, nn_con }
    }

    /// Number of constraints.
    pub fn num_cons(&self) -> usize {
        self.forward.len()
    }
}
