//! Compressed sparse column patterns.
//!
//! The adapter never owns numeric matrices: the expression engine declares
//! the *pattern* of each function output once, and numeric values travel as
//! flat arrays aligned with the pattern's stored-nonzero order. `Sparsity`
//! is that pattern, with the handful of operations the adapter needs:
//! per-column scans, a transpose that carries per-nonzero data along, and
//! conversions to and from [`sprs`] matrices.

use sprs::{CsMat, TriMat};
use std::ops::Range;

/// CSC sparsity pattern (structure only, no values).
///
/// Row indices are ascending within each column. One datum per stored
/// nonzero, ordered column-major, is the value layout every consumer of a
/// `Sparsity` assumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sparsity {
    nrows: usize,
    ncols: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
}

impl Sparsity {
    /// Build a pattern from raw CSC arrays.
    ///
    /// Panics on malformed input; pattern well-formedness is a caller
    /// contract, not a runtime condition.
    pub fn new(nrows: usize, ncols: usize, col_ptr: Vec<usize>, row_idx: Vec<usize>) -> Self {
        assert_eq!(col_ptr.len(), ncols + 1, "column pointer length must be ncols + 1");
        assert_eq!(col_ptr[0], 0, "column pointers must start at 0");
        assert_eq!(*col_ptr.last().unwrap(), row_idx.len(), "column pointers must end at nnz");
        for w in col_ptr.windows(2) {
            assert!(w[0] <= w[1], "column pointers must be nondecreasing");
        }
        for &r in &row_idx {
            assert!(r < nrows, "row index {r} out of range for {nrows} rows");
        }
        Self { nrows, ncols, col_ptr, row_idx }
    }

    /// Pattern with no stored entries.
    pub fn empty(nrows: usize, ncols: usize) -> Self {
        Self { nrows, ncols, col_ptr: vec![0; ncols + 1], row_idx: Vec::new() }
    }

    /// Dense single-column pattern (every row present).
    pub fn dense_column(nrows: usize) -> Self {
        Self {
            nrows,
            ncols: 1,
            col_ptr: vec![0, nrows],
            row_idx: (0..nrows).collect(),
        }
    }

    /// Build a pattern from (row, col) pairs. Duplicates collapse.
    pub fn from_entries(nrows: usize, ncols: usize, entries: &[(usize, usize)]) -> Self {
        let mut es: Vec<(usize, usize)> = entries.to_vec();
        es.sort_unstable_by_key(|&(r, c)| (c, r));
        es.dedup();
        let mut col_ptr = vec![0usize; ncols + 1];
        let mut row_idx = Vec::with_capacity(es.len());
        for &(r, c) in &es {
            assert!(r < nrows && c < ncols, "entry ({r}, {c}) out of range");
            col_ptr[c + 1] += 1;
            row_idx.push(r);
        }
        for c in 0..ncols {
            col_ptr[c + 1] += col_ptr[c];
        }
        Self { nrows, ncols, col_ptr, row_idx }
    }

    /// Extract the pattern of a CSC matrix.
    pub fn from_csmat(mat: &CsMat<f64>) -> Self {
        assert!(mat.is_csc(), "pattern extraction expects CSC storage");
        let entries: Vec<(usize, usize)> = mat.iter().map(|(_, (r, c))| (r, c)).collect();
        Self::from_entries(mat.rows(), mat.cols(), &entries)
    }

    /// Materialize a CSC matrix carrying `values` on this pattern.
    pub fn to_csmat(&self, values: &[f64]) -> CsMat<f64> {
        assert_eq!(values.len(), self.nnz(), "one value per stored nonzero");
        let mut tri = TriMat::new((self.nrows, self.ncols));
        for c in 0..self.ncols {
            for k in self.col_range(c) {
                tri.add_triplet(self.row_idx[k], c, values[k]);
            }
        }
        tri.to_csc()
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.row_idx.len()
    }

    /// Flat-index range of column `j`.
    pub fn col_range(&self, j: usize) -> Range<usize> {
        self.col_ptr[j]..self.col_ptr[j + 1]
    }

    /// Row indices stored in column `j`.
    pub fn col(&self, j: usize) -> &[usize] {
        &self.row_idx[self.col_range(j)]
    }

    /// Column pointer array (length `ncols + 1`).
    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    /// Row index per stored nonzero, column-major.
    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    /// Transpose the pattern, carrying one datum per nonzero into the
    /// transposed storage order.
    ///
    /// This is what row-wise scans use: transposing a propagated Jacobian
    /// pattern together with its dependency bits turns a per-constraint
    /// scan into an ordinary per-column scan.
    pub fn transpose_with<T: Copy>(&self, data: &[T]) -> (Sparsity, Vec<T>) {
        assert_eq!(data.len(), self.nnz(), "one datum per stored nonzero");
        let nnz = self.nnz();
        let mut col_ptr_t = vec![0usize; self.nrows + 1];
        for &r in &self.row_idx {
            col_ptr_t[r + 1] += 1;
        }
        for i in 0..self.nrows {
            col_ptr_t[i + 1] += col_ptr_t[i];
        }
        let mut cursor = col_ptr_t[..self.nrows].to_vec();
        let mut row_idx_t = vec![0usize; nnz];
        let mut perm = vec![0usize; nnz];
        for j in 0..self.ncols {
            for k in self.col_range(j) {
                let slot = cursor[self.row_idx[k]];
                cursor[self.row_idx[k]] += 1;
                row_idx_t[slot] = j;
                perm[slot] = k;
            }
        }
        let data_t = perm.iter().map(|&k| data[k]).collect();
        let transposed = Sparsity {
            nrows: self.ncols,
            ncols: self.nrows,
            col_ptr: col_ptr_t,
            row_idx: row_idx_t,
        };
        (transposed, data_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    #[test]
    fn test_from_entries_orders_column_major() {
        let sp = Sparsity::from_entries(3, 2, &[(2, 1), (0, 0), (1, 1), (2, 0)]);
        assert_eq!(sp.nnz(), 4);
        assert_eq!(sp.col_ptr(), &[0, 2, 4]);
        assert_eq!(sp.col(0), &[0, 2]);
        assert_eq!(sp.col(1), &[1, 2]);
    }

    #[test]
    fn test_transpose_with_carries_data() {
        // 2x3 pattern:
        //   [a . b]
        //   [. c d]
        // column-major data: a, c, b, d
        let sp = Sparsity::from_entries(2, 3, &[(0, 0), (1, 1), (0, 2), (1, 2)]);
        let (t, data) = sp.transpose_with(&['a', 'c', 'b', 'd']);
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        // transposed column 0 = row 0 of the original: a (col 0), b (col 2)
        assert_eq!(t.col(0), &[0, 2]);
        assert_eq!(data, vec!['a', 'b', 'c', 'd']);
    }

    #[test]
    fn test_transpose_empty() {
        let sp = Sparsity::empty(4, 3);
        let (t, data) = sp.transpose_with::<f64>(&[]);
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 4);
        assert_eq!(t.nnz(), 0);
        assert!(data.is_empty());
    }

    #[test]
    fn test_csmat_round_trip() {
        let mut tri = TriMat::new((2, 2));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(1, 0, 2.0);
        tri.add_triplet(1, 1, 3.0);
        let mat = tri.to_csc();

        let sp = Sparsity::from_csmat(&mat);
        assert_eq!(sp.nnz(), 3);
        assert_eq!(sp.col(0), &[0, 1]);
        assert_eq!(sp.col(1), &[1]);

        let back = sp.to_csmat(&[1.0, 2.0, 3.0]);
        assert_eq!(back.nnz(), 3);
        for (val, (r, c)) in back.iter() {
            let expected = match (r, c) {
                (0, 0) => 1.0,
                (1, 0) => 2.0,
                (1, 1) => 3.0,
                _ => panic!("unexpected entry"),
            };
            assert!((val - expected).abs() < 1e-15);
        }
    }

    #[test]
    fn test_dense_column() {
        let sp = Sparsity::dense_column(3);
        assert_eq!(sp.ncols(), 1);
        assert_eq!(sp.col(0), &[0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "row index")]
    fn test_rejects_out_of_range_row() {
        Sparsity::new(2, 1, vec![0, 1], vec![5]);
    }
}
