//! Merged coefficient structure.
//!
//! One sparse structure combines the reordered constraint Jacobian with
//! the frozen linear part of the objective gradient. Every cell carries a
//! provenance tag naming the single upstream value that refreshes it, so
//! value updates after an evaluation are a linear scan with no searching.
//!
//! Rows are reordered constraints, optionally followed by one synthesized
//! objective row (the frozen gradient coefficients) and, in the degenerate
//! no-coefficient case, one dummy row that keeps the stored-nonzero array
//! non-empty for solvers that require it.

use crate::classify::{Classification, Linearity};
use crate::order::{ConstraintOrder, VariableOrder};
use crate::sparsity::Sparsity;

/// Which upstream evaluation supplies a cell's numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Structurally always zero (synthesized dummy cell).
    Zero,

    /// Stored nonzero `k` of the constraint Jacobian (un-permuted flat
    /// index into the Jacobian's value array).
    Jacobian(usize),

    /// Stored nonzero `k` of the objective gradient.
    Gradient(usize),
}

/// Merged sparse structure in permuted coordinates.
///
/// Cells are stored column-major; within a column, rows are ascending.
/// The value array is the only mutable part: it is refreshed from
/// evaluation outputs through the provenance tags.
#[derive(Debug, Clone)]
pub struct MergedStructure {
    col_ptr: Vec<usize>,
    rows: Vec<usize>,
    provenance: Vec<Provenance>,
    values: Vec<f64>,
    n: usize,
    m: usize,
    obj_row: Option<usize>,
    dummy_row: bool,
    nonlinear_nnz: usize,
}

impl MergedStructure {
    /// Assemble the merged structure from the function patterns, the
    /// classification, and the two orderings.
    ///
    /// Per reordered column: the Jacobian column of the original variable,
    /// rows mapped through the constraint order, then (if this variable's
    /// objective coefficient is frozen) one objective-row cell. The
    /// objective row exists only if at least one frozen coefficient is
    /// structurally present; the dummy row only if nothing at all is.
    pub fn assemble(
        grad_sp: &Sparsity,
        jac_sp: Option<&Sparsity>,
        classes: &Classification,
        vars: &VariableOrder,
        cons: &ConstraintOrder,
    ) -> Self {
        let n = vars.num_vars();
        let ng = cons.num_cons();

        // gradient nonzero slot per variable, frozen entries only
        let mut frozen_slot = vec![None; n];
        for (k, &j) in grad_sp.col(0).iter().enumerate() {
            if classes.obj_var[j] != Linearity::Nonlinear {
                frozen_slot[j] = Some(k);
            }
        }

        let mut col_ptr = Vec::with_capacity(n + 1);
        col_ptr.push(0);
        let mut rows = Vec::new();
        let mut provenance = Vec::new();
        let mut has_obj_row = false;
        let mut scratch: Vec<(usize, Provenance)> = Vec::new();

        for &orig_j in &vars.forward {
            scratch.clear();
            if let Some(jsp) = jac_sp {
                for k in jsp.col_range(orig_j) {
                    let permuted_row = cons.inverse[jsp.row_idx()[k]];
                    scratch.push((permuted_row, Provenance::Jacobian(k)));
                }
            }
            scratch.sort_unstable_by_key(|&(r, _)| r);
            if let Some(k) = frozen_slot[orig_j] {
                // objective row sorts last: its index ng exceeds every
                // constraint row
                scratch.push((ng, Provenance::Gradient(k)));
                has_obj_row = true;
            }
            for &(r, p) in &scratch {
                rows.push(r);
                provenance.push(p);
            }
            col_ptr.push(rows.len());
        }

        let mut m = ng;
        let mut obj_row = None;
        if has_obj_row {
            obj_row = Some(ng);
            m += 1;
        }

        let mut dummy_row = false;
        if rows.is_empty() {
            // no constraints and no frozen objective part; solvers in this
            // convention reject an empty coefficient array
            rows.push(0);
            provenance.push(Provenance::Zero);
            for c in col_ptr.iter_mut().skip(1) {
                *c = 1;
            }
            dummy_row = true;
            m += 1;
        }

        let values = vec![0.0; rows.len()];
        let nonlinear_nnz = count_nonlinear_block(&col_ptr, &rows, cons.nn_con, vars.nn_jac);

        log::debug!(
            "merged structure: {m} rows x {n} cols, {} nonzeros ({nonlinear_nnz} nonlinear), \
             obj_row={obj_row:?} dummy_row={dummy_row}",
            rows.len(),
        );

        Self { col_ptr, rows, provenance, values, n, m, obj_row, dummy_row, nonlinear_nnz }
    }

    /// Number of rows, including any synthesized ones.
    pub fn num_rows(&self) -> usize {
        self.m
    }

    /// Number of columns (= number of variables).
    pub fn num_cols(&self) -> usize {
        self.n
    }

    /// Number of stored cells.
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    /// Permuted row index of the synthesized objective row, if one exists.
    pub fn obj_row(&self) -> Option<usize> {
        self.obj_row
    }

    /// Whether the dummy row was synthesized.
    pub fn has_dummy_row(&self) -> bool {
        self.dummy_row
    }

    /// Stored nonzero count of the nonlinear Jacobian block (rows below
    /// `nn_con`, columns below `nn_jac`). This is the exact number of
    /// derivative values the solver expects per constraint evaluation.
    pub fn nonlinear_nnz(&self) -> usize {
        self.nonlinear_nnz
    }

    /// Current cell values, column-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Provenance tag per cell, column-major.
    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    /// Column pointer array (length `num_cols() + 1`, 0-based).
    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    /// Permuted row index per cell, column-major (0-based).
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// 1-based row index array, solver convention.
    pub fn rows_one_based(&self) -> Vec<usize> {
        self.rows.iter().map(|&r| r + 1).collect()
    }

    /// 1-based column pointer array, solver convention.
    pub fn col_ptr_one_based(&self) -> Vec<usize> {
        self.col_ptr.iter().map(|&c| c + 1).collect()
    }

    /// Refresh every gradient-provenance cell from a gradient value array
    /// (dense-in-sparsity, un-permuted order).
    pub fn refresh_gradient(&mut self, gradient: &[f64]) {
        for (value, tag) in self.values.iter_mut().zip(&self.provenance) {
            if let Provenance::Gradient(k) = *tag {
                *value = gradient[k];
            }
        }
    }

    /// Refresh every Jacobian-provenance cell from a Jacobian value array
    /// (dense-in-sparsity, un-permuted order).
    pub fn refresh_jacobian(&mut self, jacobian: &[f64]) {
        for (value, tag) in self.values.iter_mut().zip(&self.provenance) {
            if let Provenance::Jacobian(k) = *tag {
                *value = jacobian[k];
            }
        }
    }

    /// Gather the nonlinear block (rows below `nn_con`, columns below
    /// `nn_jac`) column-major into `out`, reading current cell values.
    ///
    /// Returns the number of block cells visited, which the caller must
    /// check against `out.len()`; on a mismatch nothing is written out of
    /// bounds and no value is silently dropped.
    pub fn gather_nonlinear_block(&self, nn_con: usize, nn_jac: usize, out: &mut [f64]) -> usize {
        let mut gathered = 0;
        for j in 0..nn_jac.min(self.n) {
            for k in self.col_ptr[j]..self.col_ptr[j + 1] {
                if self.rows[k] >= nn_con {
                    // rows ascend within a column, the rest is outside the block
                    break;
                }
                if gathered < out.len() {
                    out[gathered] = self.values[k];
                }
                gathered += 1;
            }
        }
        gathered
    }
}

fn count_nonlinear_block(col_ptr: &[usize], rows: &[usize], nn_con: usize, nn_jac: usize) -> usize {
    let mut count = 0;
    for j in 0..nn_jac.min(col_ptr.len() - 1) {
        for k in col_ptr[j]..col_ptr[j + 1] {
            if rows[k] < nn_con {
                count += 1;
            }
        }
    }
    count
}
