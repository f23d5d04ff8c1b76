//! Auxiliary-space preconditioner for the shifted curl-curl operator `SM = S + σ M1`.
//!
//! Edge-element error that smoothing cannot reduce lives in two subspaces: gradients of nodal
//! functions (`D0`) and interpolants of nodal vector fields (`Π`). Both get their own AMG
//! hierarchy:
//!
//! * `A11 = Πᵀ (SM + M1 D0 M0⁻¹ D0ᵀ M1) Π` on nodal vectors (`dim` unknowns per node);
//! * `A22 = D0ᵀ SM D0` on nodal scalars.
//!
//! A smoother on `SM` handles the rest. In `additive` mode the two corrections are summed between
//! a pre- and a post-smoothing step; `121` visits them in the order 11, 22, 11.

use crate::config::ParameterList;
use crate::error::KError;
use crate::matrix::{CsrMatrix, galerkin_product, multiply, transpose, two_matrix_add};
use crate::parallel::RowPartition;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::amg::{Amg, AmgParams};
use crate::preconditioner::smoother::{Smoother, SmootherParams};
use log::info;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RefMaxwellMode {
    #[default]
    Additive,
    OneTwoOne,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RefMaxwellParams {
    pub mode: RefMaxwellMode,
    pub disable_addon: bool,
    pub smoother: SmootherParams,
    pub params11: AmgParams,
    pub params22: AmgParams,
}

impl Default for RefMaxwellParams {
    fn default() -> Self {
        let base = AmgParams { max_levels: 4, max_coarse_size: 25, ..AmgParams::default() };
        Self {
            mode: RefMaxwellMode::Additive,
            disable_addon: false,
            smoother: SmootherParams::default(),
            params11: AmgParams { block_size: 3, ..base.clone() },
            params22: base,
        }
    }
}

impl RefMaxwellParams {
    /// Top-level `refmaxwell:` keys and the shared AMG keys give the defaults of both
    /// sub-hierarchies; the `refmaxwell: 11 list` / `refmaxwell: 22 list` sublists override them.
    pub fn from_list(list: &ParameterList) -> Result<Self, KError> {
        let defaults = RefMaxwellParams::default();
        let smoother = SmootherParams::from_list(list, &defaults.smoother)?;
        let base = AmgParams {
            max_levels: list.get_usize("refmaxwell: max levels", defaults.params22.max_levels)?,
            max_coarse_size: list.get_usize("refmaxwell: max coarse size", defaults.params22.max_coarse_size)?,
            block_size: 1,
            drop_tol: list.get_f64("aggregation: drop tol", defaults.params22.drop_tol)?,
            damping: list.get_f64("sa: damping factor", defaults.params22.damping)?,
            smoother: smoother.clone(),
            coarse_regularization: list.get_f64("coarse: regularization", defaults.params22.coarse_regularization)?,
        };
        let params11 = AmgParams::from_list(
            &list.sublist("refmaxwell: 11 list")?,
            &AmgParams { block_size: defaults.params11.block_size, ..base.clone() },
        )?;
        let params22 = AmgParams::from_list(&list.sublist("refmaxwell: 22 list")?, &base)?;
        let mode = match list.get_str("refmaxwell: mode", "additive")? {
            "additive" => RefMaxwellMode::Additive,
            "121" => RefMaxwellMode::OneTwoOne,
            other => return Err(KError::invalid("refmaxwell: mode", format!("unknown mode `{other}`"))),
        };
        Ok(Self {
            mode,
            disable_addon: list.get_bool("refmaxwell: disable addon", defaults.disable_addon)?,
            smoother,
            params11,
            params22,
        })
    }
}

/// Serial auxiliary-space preconditioner on replicated operators. Wrap it in
/// [`crate::preconditioner::Replicated`] to apply it to distributed vectors.
pub struct RefMaxwell {
    sm: Arc<CsrMatrix>,
    smoother: Smoother,
    pi: CsrMatrix,
    pi_t: CsrMatrix,
    d0: CsrMatrix,
    d0_t: CsrMatrix,
    amg11: Amg,
    amg22: Amg,
    mode: RefMaxwellMode,
}

impl RefMaxwell {
    /// Builds both hierarchies. Collective: the inputs are replicated on every rank first.
    ///
    /// `coords` holds one full column per spatial dimension (node-ordered).
    pub fn new(
        sm: &CsrMatrix,
        d0: &CsrMatrix,
        m0inv: &CsrMatrix,
        m1: &CsrMatrix,
        coords: &[Vec<f64>],
        params: &RefMaxwellParams,
    ) -> Result<Self, KError> {
        let sm = sm.replicate();
        let d0 = d0.replicate();
        let m0inv = m0inv.replicate();
        let m1 = m1.replicate();
        let (n_edges, n_nodes) = (sm.global_nrows(), d0.global_ncols());
        if sm.global_ncols() != n_edges || d0.global_nrows() != n_edges || m1.global_nrows() != n_edges {
            return Err(KError::DimensionMismatch(format!(
                "edge operators disagree: SM {}x{}, D0 {}x{}, M1 {}x{}",
                n_edges,
                sm.global_ncols(),
                d0.global_nrows(),
                n_nodes,
                m1.global_nrows(),
                m1.global_ncols()
            )));
        }
        if m0inv.global_nrows() != n_nodes || coords.iter().any(|c| c.len() != n_nodes) {
            return Err(KError::DimensionMismatch(format!(
                "nodal data must have {n_nodes} rows (M0inv has {})",
                m0inv.global_nrows()
            )));
        }
        if params.params11.block_size != coords.len() {
            return Err(KError::invalid(
                "number of equations",
                format!(
                    "11 hierarchy uses blocks of {} but coordinates have {} dimensions",
                    params.params11.block_size,
                    coords.len()
                ),
            ));
        }

        let pi = nodal_interpolation(&d0, coords)?;
        let a11_fine = if params.disable_addon {
            sm.clone()
        } else {
            let m1d0 = multiply(&m1, &d0)?;
            let addon = multiply(&multiply(&m1d0, &m0inv)?, &transpose(&m1d0)?)?;
            two_matrix_add(&sm, 1.0, &addon, 1.0)?
        };
        let a11 = galerkin_product(&pi, &a11_fine)?;
        let a22 = galerkin_product(&d0, &sm)?;
        info!(
            "refmaxwell: {n_edges} edges, {n_nodes} nodes; A11 {}x{} (nnz {}), A22 {}x{} (nnz {})",
            a11.global_nrows(),
            a11.global_ncols(),
            a11.nnz(),
            a22.global_nrows(),
            a22.global_ncols(),
            a22.nnz()
        );
        let amg11 = Amg::new(&a11, &params.params11)?;
        let amg22 = Amg::new(&a22, &params.params22)?;
        info!(
            "refmaxwell: 11 hierarchy {:?}, 22 hierarchy {:?}",
            amg11.level_sizes(),
            amg22.level_sizes()
        );

        let sm = Arc::new(sm);
        let smoother = Smoother::new(sm.clone(), &params.smoother)?;
        Ok(Self {
            sm,
            smoother,
            pi_t: transpose(&pi)?,
            pi,
            d0_t: transpose(&d0)?,
            d0,
            amg11,
            amg22,
            mode: params.mode,
        })
    }

    pub fn mode(&self) -> RefMaxwellMode {
        self.mode
    }

    pub fn hierarchy_sizes(&self) -> (Vec<usize>, Vec<usize>) {
        (self.amg11.level_sizes(), self.amg22.level_sizes())
    }

    fn residual(&self, r: &[f64], x: &[f64], out: &mut [f64]) {
        self.sm.spmv_local(x, out);
        out.iter_mut().zip(r).for_each(|(o, &ri)| *o = ri - *o);
    }

    /// `out += T B Tᵀ res` for a transfer `T` and its sub-hierarchy `B`.
    fn add_subspace_correction(
        transfer: &CsrMatrix,
        transfer_t: &CsrMatrix,
        amg: &Amg,
        res: &[f64],
        out: &mut [f64],
    ) -> Result<(), KError> {
        let nc = transfer_t.global_nrows();
        let (mut rc, mut zc) = (vec![0.0; nc], vec![0.0; nc]);
        transfer_t.spmv_local(res, &mut rc);
        amg.apply(&rc, &mut zc)?;
        let mut corr = vec![0.0; out.len()];
        transfer.spmv_local(&zc, &mut corr);
        out.iter_mut().zip(&corr).for_each(|(o, c)| *o += c);
        Ok(())
    }

    fn add_11(&self, res: &[f64], out: &mut [f64]) -> Result<(), KError> {
        Self::add_subspace_correction(&self.pi, &self.pi_t, &self.amg11, res, out)
    }

    fn add_22(&self, res: &[f64], out: &mut [f64]) -> Result<(), KError> {
        Self::add_subspace_correction(&self.d0, &self.d0_t, &self.amg22, res, out)
    }
}

impl Preconditioner for RefMaxwell {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.sm.global_nrows();
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "refmaxwell: {n} edges, got r={} z={}",
                r.len(),
                z.len()
            )));
        }
        let mut res = vec![0.0; n];
        let mut tmp = vec![0.0; n];

        self.smoother.smooth(r, z)?;
        match self.mode {
            RefMaxwellMode::Additive => {
                self.residual(r, z, &mut res);
                tmp.iter_mut().for_each(|t| *t = 0.0);
                self.add_11(&res, &mut tmp)?;
                self.add_22(&res, &mut tmp)?;
                z.iter_mut().zip(&tmp).for_each(|(zi, t)| *zi += t);
            }
            RefMaxwellMode::OneTwoOne => {
                self.residual(r, z, &mut res);
                self.add_11(&res, z)?;
                self.residual(r, z, &mut res);
                self.add_22(&res, z)?;
                self.residual(r, z, &mut res);
                self.add_11(&res, z)?;
            }
        }
        self.residual(r, z, &mut res);
        self.smoother.smooth(&res, &mut tmp)?;
        z.iter_mut().zip(&tmp).for_each(|(zi, t)| *zi += t);
        Ok(())
    }
}

/// Nodal-vector to edge interpolation `Π`.
///
/// Column `dim·n + c` is component `c` at node `n`. For an edge `e` with tangent
/// `t = D0 x` (head minus tail coordinates), `Π[e, dim·n + c] = |D0[e, n]| · t_c / 2`.
pub fn nodal_interpolation(d0: &CsrMatrix, coords: &[Vec<f64>]) -> Result<CsrMatrix, KError> {
    let dim = coords.len();
    let n_nodes = d0.global_ncols();
    let mut row_ptr = Vec::with_capacity(d0.local_nrows() + 1);
    let mut col_idx = Vec::with_capacity(d0.nnz() * dim);
    let mut values = Vec::with_capacity(d0.nnz() * dim);
    row_ptr.push(0);
    for e in 0..d0.local_nrows() {
        let (cols, vals) = d0.row(e);
        let tangent: Vec<f64> = coords
            .iter()
            .map(|x| cols.iter().zip(vals).map(|(&n, &v)| v * x[n]).sum())
            .collect();
        for (&n, &v) in cols.iter().zip(vals) {
            for (c, &t) in tangent.iter().enumerate() {
                col_idx.push(dim * n + c);
                values.push(0.5 * v.abs() * t);
            }
        }
        row_ptr.push(col_idx.len());
    }
    CsrMatrix::from_csr(
        d0.row_partition().clone(),
        RowPartition::serial(dim * n_nodes),
        row_ptr,
        col_idx,
        values,
    )
}
