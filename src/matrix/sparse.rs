// Distributed CSR storage: builder (mutable structure) and fill-complete matrix (fixed structure)

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::parallel::RowPartition;
use faer::Mat;
use faer::sparse::{
    SymbolicSparseRowMat,    // owning symbolic CSR alias
    SparseRowMat,            // owning numeric CSR alias
};
use std::collections::BTreeMap;
use std::fmt;

/// Assembly-phase matrix: rows owned by the calling rank, columns in a sorted map per row.
///
/// Inserting into an existing `(row, col)` entry sums the values. [`CsrBuilder::fill_complete`]
/// freezes the structure and returns a [`CsrMatrix`].
pub struct CsrBuilder {
    row_map: RowPartition,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    pub fn new(row_map: RowPartition) -> Self {
        let rows = vec![BTreeMap::new(); row_map.local_len()];
        Self { row_map, rows }
    }

    pub fn row_partition(&self) -> &RowPartition {
        &self.row_map
    }

    /// Adds `value` at global `(row, col)`. The row must be owned by the calling rank.
    pub fn insert_global_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), KError> {
        let range = self.row_map.local_range();
        if !range.contains(&row) {
            return Err(KError::DimensionMismatch(format!(
                "row {row} is not owned by rank {} (owns {range:?})",
                self.row_map.comm().rank()
            )));
        }
        *self.rows[row - range.start].entry(col).or_insert(0.0) += value;
        Ok(())
    }

    pub fn insert_global_values(&mut self, row: usize, cols: &[usize], values: &[f64]) -> Result<(), KError> {
        if cols.len() != values.len() {
            return Err(KError::DimensionMismatch(format!(
                "{} column indices but {} values",
                cols.len(),
                values.len()
            )));
        }
        for (&c, &v) in cols.iter().zip(values) {
            self.insert_global_value(row, c, v)?;
        }
        Ok(())
    }

    /// Inserts the entry if the calling rank owns `row`; entries of other ranks are skipped.
    pub fn insert_if_owned(&mut self, row: usize, col: usize, value: f64) -> bool {
        let range = self.row_map.local_range();
        if range.contains(&row) {
            *self.rows[row - range.start].entry(col).or_insert(0.0) += value;
            true
        } else {
            false
        }
    }

    /// Freezes the structure. Column indices must lie in `0..domain_map.global_len()`.
    pub fn fill_complete(self, domain_map: RowPartition) -> Result<CsrMatrix, KError> {
        let ncols = domain_map.global_len();
        let nnz = self.rows.iter().map(BTreeMap::len).sum();
        let mut row_ptr = Vec::with_capacity(self.rows.len() + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);
        let first = self.row_map.local_range().start;
        for (i, row) in self.rows.into_iter().enumerate() {
            for (c, v) in row {
                if c >= ncols {
                    return Err(KError::DimensionMismatch(format!(
                        "column {c} in row {} exceeds domain size {ncols}",
                        first + i
                    )));
                }
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        Ok(CsrMatrix { row_map: self.row_map, domain_map, row_ptr, col_idx, values })
    }
}

/// Fill-complete distributed CSR matrix.
///
/// Holds the locally owned rows of a `global_nrows × global_ncols` matrix. Columns are global
/// indices into the domain partition, strictly increasing within each row. The sparsity structure
/// never changes; only values can be replaced.
#[derive(Clone)]
pub struct CsrMatrix {
    row_map: RowPartition,
    domain_map: RowPartition,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build from raw local row-ptr, global col-idx and values.
    ///
    /// Columns within a row may come in any order; they are sorted and duplicates are summed.
    pub fn from_csr(
        row_map: RowPartition,
        domain_map: RowPartition,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, KError> {
        let nrows = row_map.local_len();
        if row_ptr.len() != nrows + 1 {
            return Err(KError::DimensionMismatch(format!(
                "row_ptr has length {} for {nrows} local rows",
                row_ptr.len()
            )));
        }
        if row_ptr[0] != 0 || row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(KError::DimensionMismatch("row_ptr must start at 0 and be non-decreasing".into()));
        }
        if row_ptr[nrows] != col_idx.len() || col_idx.len() != values.len() {
            return Err(KError::DimensionMismatch(format!(
                "row_ptr ends at {} but there are {} column indices and {} values",
                row_ptr[nrows],
                col_idx.len(),
                values.len()
            )));
        }
        let mut builder = CsrBuilder::new(row_map);
        let first = builder.row_map.local_range().start;
        for i in 0..nrows {
            for k in row_ptr[i]..row_ptr[i + 1] {
                builder.insert_global_value(first + i, col_idx[k], values[k])?;
            }
        }
        builder.fill_complete(domain_map)
    }

    /// Build from global `(row, col, value)` triplets, keeping the rows owned by the calling rank.
    pub fn from_triplets(
        row_map: RowPartition,
        domain_map: RowPartition,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self, KError> {
        let nrows = row_map.global_len();
        let mut builder = CsrBuilder::new(row_map);
        for &(r, c, v) in triplets {
            if r >= nrows {
                return Err(KError::DimensionMismatch(format!("row {r} exceeds {nrows} rows")));
            }
            builder.insert_if_owned(r, c, v);
        }
        builder.fill_complete(domain_map)
    }

    /// Square diagonal matrix with the identity sparsity pattern and local diagonal `diag`.
    pub fn from_diagonal(row_map: RowPartition, diag: Vec<f64>) -> Result<Self, KError> {
        let n = row_map.local_len();
        if diag.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "{} diagonal values for {n} local rows",
                diag.len()
            )));
        }
        let first = row_map.local_range().start;
        Ok(Self {
            domain_map: row_map.clone(),
            row_map,
            row_ptr: (0..=n).collect(),
            col_idx: (first..first + n).collect(),
            values: diag,
        })
    }

    pub fn identity(row_map: RowPartition) -> Self {
        let n = row_map.local_len();
        let first = row_map.local_range().start;
        Self {
            domain_map: row_map.clone(),
            row_map,
            row_ptr: (0..=n).collect(),
            col_idx: (first..first + n).collect(),
            values: vec![1.0; n],
        }
    }

    pub fn row_partition(&self) -> &RowPartition {
        &self.row_map
    }

    pub fn domain_partition(&self) -> &RowPartition {
        &self.domain_map
    }

    pub fn local_nrows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    pub fn global_nrows(&self) -> usize {
        self.row_map.global_len()
    }

    pub fn global_ncols(&self) -> usize {
        self.domain_map.global_len()
    }

    /// Local number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Global number of stored entries. Collective.
    pub fn global_nnz(&self) -> usize {
        self.row_map.comm().all_reduce(self.nnz() as f64) as usize
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Columns and values of local row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let r = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[r.clone()], &self.values[r])
    }

    /// Stored value at global `(row, col)` for a locally owned row.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let range = self.row_map.local_range();
        if !range.contains(&row) {
            return None;
        }
        let (cols, vals) = self.row(row - range.start);
        cols.binary_search(&col).ok().map(|k| vals[k])
    }

    /// Sum of each local row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.local_nrows()).map(|i| self.row(i).1.iter().sum()).collect()
    }

    /// Diagonal entries of the local rows (zero where no diagonal entry is stored).
    pub fn diagonal(&self) -> Vec<f64> {
        let first = self.row_map.local_range().start;
        (0..self.local_nrows())
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.binary_search(&(first + i)).map(|k| vals[k]).unwrap_or(0.0)
            })
            .collect()
    }

    /// Same partitions and identical local sparsity pattern.
    pub fn same_structure(&self, other: &CsrMatrix) -> bool {
        self.row_map.is_compatible(&other.row_map)
            && self.domain_map.global_len() == other.domain_map.global_len()
            && self.row_ptr == other.row_ptr
            && self.col_idx == other.col_idx
    }

    /// Replaces all local values, keeping the structure.
    pub fn replace_values(&mut self, values: Vec<f64>) -> Result<(), KError> {
        if values.len() != self.values.len() {
            return Err(KError::StructureLocked(format!(
                "{} values given for {} stored entries",
                values.len(),
                self.values.len()
            )));
        }
        self.values = values;
        Ok(())
    }

    /// Overwrites existing entries of a locally owned row. Every `(row, col)` must already be stored.
    pub fn replace_global_values(&mut self, row: usize, cols: &[usize], values: &[f64]) -> Result<(), KError> {
        let range = self.row_map.local_range();
        if !range.contains(&row) {
            return Err(KError::DimensionMismatch(format!("row {row} is not owned locally")));
        }
        if cols.len() != values.len() {
            return Err(KError::DimensionMismatch(format!(
                "{} column indices but {} values",
                cols.len(),
                values.len()
            )));
        }
        let i = row - range.start;
        let start = self.row_ptr[i];
        let row_cols = &self.col_idx[start..self.row_ptr[i + 1]];
        let mut slots = Vec::with_capacity(cols.len());
        for &c in cols {
            match row_cols.binary_search(&c) {
                Ok(k) => slots.push(start + k),
                Err(_) => {
                    return Err(KError::StructureLocked(format!("entry ({row}, {c}) is not stored")));
                }
            }
        }
        for (slot, &v) in slots.into_iter().zip(values) {
            self.values[slot] = v;
        }
        Ok(())
    }

    pub fn scale(&mut self, alpha: f64) {
        self.values.iter_mut().for_each(|v| *v *= alpha);
    }

    /// Scales local row `i` by `factors[i]`.
    pub fn left_scale(&mut self, factors: &[f64]) {
        assert_eq!(factors.len(), self.local_nrows());
        for (i, &f) in factors.iter().enumerate() {
            let r = self.row_ptr[i]..self.row_ptr[i + 1];
            self.values[r].iter_mut().for_each(|v| *v *= f);
        }
    }

    /// `y = A x` for the local rows, with `x` indexed by global column.
    pub fn spmv_local(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.global_ncols());
        assert_eq!(y.len(), self.local_nrows());
        // the partitions hold a non-Sync communicator, so only the raw arrays cross threads
        let (row_ptr, col_idx, values) = (&self.row_ptr[..], &self.col_idx[..], &self.values[..]);
        let row_dot = |i: usize| -> f64 {
            let r = row_ptr[i]..row_ptr[i + 1];
            col_idx[r.clone()].iter().zip(&values[r]).map(|(&c, &v)| v * x[c]).sum()
        };
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            y.par_iter_mut().enumerate().for_each(|(i, yi)| *yi = row_dot(i));
        }
        #[cfg(not(feature = "rayon"))]
        {
            for (i, yi) in y.iter_mut().enumerate() {
                *yi = row_dot(i);
            }
        }
    }

    /// Full copy of the matrix on every rank, on serial partitions. Collective.
    pub fn replicate(&self) -> CsrMatrix {
        let rows = RowPartition::serial(self.global_nrows());
        let cols = RowPartition::serial(self.global_ncols());
        if !self.row_map.is_distributed() {
            return CsrMatrix {
                row_map: rows,
                domain_map: cols,
                row_ptr: self.row_ptr.clone(),
                col_idx: self.col_idx.clone(),
                values: self.values.clone(),
            };
        }
        let comm = self.row_map.comm();
        let lengths: Vec<usize> = self.row_ptr.windows(2).map(|w| w[1] - w[0]).collect();
        let lengths = comm.all_gather_indices(&lengths, &self.row_map.counts());
        let nnz_counts = comm.all_gather_count(self.nnz());
        let col_idx = comm.all_gather_indices(&self.col_idx, &nnz_counts);
        let values = comm.all_gather_varcount(&self.values, &nnz_counts);
        let mut row_ptr = Vec::with_capacity(lengths.len() + 1);
        row_ptr.push(0);
        for len in lengths {
            row_ptr.push(row_ptr[row_ptr.len() - 1] + len);
        }
        CsrMatrix { row_map: rows, domain_map: cols, row_ptr, col_idx, values }
    }

    /// Keeps the rows of a replicated matrix that `row_map` assigns to the calling rank.
    pub fn distribute(&self, row_map: RowPartition, domain_map: RowPartition) -> Result<CsrMatrix, KError> {
        if self.row_map.is_distributed() || self.local_nrows() != self.global_nrows() {
            return Err(KError::Unsupported("distribute expects a replicated matrix"));
        }
        if row_map.global_len() != self.global_nrows() || domain_map.global_len() != self.global_ncols() {
            return Err(KError::IncompatiblePartition(format!(
                "cannot distribute a {}x{} matrix over {row_map:?} x {domain_map:?}",
                self.global_nrows(),
                self.global_ncols()
            )));
        }
        let range = row_map.local_range();
        let (lo, hi) = (self.row_ptr[range.start], self.row_ptr[range.end]);
        let row_ptr = self.row_ptr[range.start..=range.end].iter().map(|&p| p - lo).collect();
        Ok(CsrMatrix {
            row_map,
            domain_map,
            row_ptr,
            col_idx: self.col_idx[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        })
    }

    /// Local rows as a faer sparse matrix (`local_nrows × global_ncols`).
    pub fn to_faer(&self) -> SparseRowMat<usize, f64> {
        // Build symbolic structure; `None` means “no separate row_nnz”:
        let symbolic = SymbolicSparseRowMat::new_checked(
            self.local_nrows(),
            self.global_ncols(),
            self.row_ptr.clone(),
            None,
            self.col_idx.clone(),
        );
        SparseRowMat::new(symbolic, self.values.clone())
    }

    /// Dense copy of the local rows.
    pub fn to_dense(&self) -> Mat<f64> {
        self.to_faer().to_dense()
    }
}

impl LinearOperator for CsrMatrix {
    fn row_partition(&self) -> &RowPartition {
        &self.row_map
    }
    fn domain_partition(&self) -> &RowPartition {
        &self.domain_map
    }
    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        if x.len() != self.domain_map.local_len() || y.len() != self.local_nrows() {
            return Err(KError::DimensionMismatch(format!(
                "apply: x has {} entries (expected {}), y has {} (expected {})",
                x.len(),
                self.domain_map.local_len(),
                y.len(),
                self.local_nrows()
            )));
        }
        if self.domain_map.is_distributed() {
            let x_global = self.domain_map.gather_all(x);
            self.spmv_local(&x_global, y);
        } else {
            self.spmv_local(x, y);
        }
        Ok(())
    }
}

impl PartialEq for CsrMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.same_structure(other) && self.values == other.values
    }
}

impl fmt::Debug for CsrMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrMatrix")
            .field("row_map", &self.row_map)
            .field("domain_map", &self.domain_map)
            .field("local_nnz", &self.nnz())
            .finish()
    }
}
