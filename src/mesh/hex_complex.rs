//! Lowest-order discrete de Rham complex on a uniform hexahedral mesh of the unit cube.
//!
//! Nodes, edges and faces are numbered lexicographically (x fastest), edges and faces grouped by
//! direction (x, then y, then z). Edges point along their axis; faces are oriented by their
//! axis normal and their boundary follows the right-hand rule, so `D1 · D0 = 0` holds exactly.

use crate::error::KError;
use crate::io::{write_matrix, write_multivector};
use crate::matrix::{CsrMatrix, MultiVector, galerkin_product};
use crate::parallel::RowPartition;
use log::info;
use std::fs;
use std::path::Path;

/// 1D linear mass entry on the reference interval, scaled by the cell length later.
fn mass_1d(a: usize, b: usize) -> f64 {
    if a == b { 1.0 / 3.0 } else { 1.0 / 6.0 }
}

struct Numbering {
    n: usize,
}

impl Numbering {
    fn node(&self, i: usize, j: usize, k: usize) -> usize {
        let m = self.n + 1;
        i + m * (j + m * k)
    }
    fn num_nodes(&self) -> usize {
        (self.n + 1).pow(3)
    }
    fn edges_per_dir(&self) -> usize {
        self.n * (self.n + 1) * (self.n + 1)
    }
    fn ex(&self, i: usize, j: usize, k: usize) -> usize {
        let (n, m) = (self.n, self.n + 1);
        i + n * (j + m * k)
    }
    fn ey(&self, i: usize, j: usize, k: usize) -> usize {
        let (n, m) = (self.n, self.n + 1);
        self.edges_per_dir() + i + m * (j + n * k)
    }
    fn ez(&self, i: usize, j: usize, k: usize) -> usize {
        let m = self.n + 1;
        2 * self.edges_per_dir() + i + m * (j + m * k)
    }
    fn faces_per_dir(&self) -> usize {
        self.n * self.n * (self.n + 1)
    }
    fn fx(&self, i: usize, j: usize, k: usize) -> usize {
        let (n, m) = (self.n, self.n + 1);
        i + m * (j + n * k)
    }
    fn fy(&self, i: usize, j: usize, k: usize) -> usize {
        let (n, m) = (self.n, self.n + 1);
        self.faces_per_dir() + i + n * (j + m * k)
    }
    fn fz(&self, i: usize, j: usize, k: usize) -> usize {
        let n = self.n;
        2 * self.faces_per_dir() + i + n * (j + n * k)
    }
}

/// Discrete operators of the complex. All matrices are serial (one rank owns every row).
pub struct HexComplex {
    /// Cells per direction.
    pub n: usize,
    /// Edge–node incidence.
    pub d0: CsrMatrix,
    /// Face–edge incidence.
    pub d1: CsrMatrix,
    /// Trilinear nodal mass matrix.
    pub m0: CsrMatrix,
    /// Nédélec edge mass matrix.
    pub m1: CsrMatrix,
    /// Raviart–Thomas face mass matrix.
    pub m2: CsrMatrix,
    /// Curl–curl stiffness `D1ᵀ M2 D1`.
    pub s: CsrMatrix,
    /// Node coordinates: x, y and z columns.
    pub coords: Vec<Vec<f64>>,
}

impl HexComplex {
    pub fn generate(n: usize) -> Result<Self, KError> {
        if n == 0 {
            return Err(KError::invalid("cells", "need at least one cell per direction"));
        }
        let num = Numbering { n };
        let h = 1.0 / n as f64;
        let (nn, ne, nf) = (num.num_nodes(), 3 * num.edges_per_dir(), 3 * num.faces_per_dir());
        let node_map = RowPartition::serial(nn);
        let edge_map = RowPartition::serial(ne);
        let face_map = RowPartition::serial(nf);

        let mut coords = vec![Vec::with_capacity(nn); 3];
        for k in 0..=n {
            for j in 0..=n {
                for i in 0..=n {
                    coords[0].push(i as f64 * h);
                    coords[1].push(j as f64 * h);
                    coords[2].push(k as f64 * h);
                }
            }
        }

        let mut d0 = Vec::with_capacity(2 * ne);
        let mut d1 = Vec::with_capacity(4 * nf);
        for k in 0..=n {
            for j in 0..=n {
                for i in 0..=n {
                    let here = num.node(i, j, k);
                    if i < n {
                        let e = num.ex(i, j, k);
                        d0.extend([(e, here, -1.0), (e, num.node(i + 1, j, k), 1.0)]);
                    }
                    if j < n {
                        let e = num.ey(i, j, k);
                        d0.extend([(e, here, -1.0), (e, num.node(i, j + 1, k), 1.0)]);
                    }
                    if k < n {
                        let e = num.ez(i, j, k);
                        d0.extend([(e, here, -1.0), (e, num.node(i, j, k + 1), 1.0)]);
                    }
                    if j < n && k < n {
                        let f = num.fx(i, j, k);
                        d1.extend([
                            (f, num.ey(i, j, k), 1.0),
                            (f, num.ez(i, j + 1, k), 1.0),
                            (f, num.ey(i, j, k + 1), -1.0),
                            (f, num.ez(i, j, k), -1.0),
                        ]);
                    }
                    if i < n && k < n {
                        let f = num.fy(i, j, k);
                        d1.extend([
                            (f, num.ez(i, j, k), 1.0),
                            (f, num.ex(i, j, k + 1), 1.0),
                            (f, num.ez(i + 1, j, k), -1.0),
                            (f, num.ex(i, j, k), -1.0),
                        ]);
                    }
                    if i < n && j < n {
                        let f = num.fz(i, j, k);
                        d1.extend([
                            (f, num.ex(i, j, k), 1.0),
                            (f, num.ey(i + 1, j, k), 1.0),
                            (f, num.ex(i, j + 1, k), -1.0),
                            (f, num.ey(i, j, k), -1.0),
                        ]);
                    }
                }
            }
        }

        let mut m0 = Vec::with_capacity(64 * n * n * n);
        let mut m1 = Vec::with_capacity(48 * n * n * n);
        let mut m2 = Vec::with_capacity(12 * n * n * n);
        let corners: Vec<[usize; 3]> = (0..8).map(|c| [c & 1, (c >> 1) & 1, (c >> 2) & 1]).collect();
        let pairs: Vec<[usize; 2]> = (0..4).map(|c| [c & 1, (c >> 1) & 1]).collect();
        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    for p in &corners {
                        for q in &corners {
                            let v = h * h * h * mass_1d(p[0], q[0]) * mass_1d(p[1], q[1]) * mass_1d(p[2], q[2]);
                            m0.push((num.node(i + p[0], j + p[1], k + p[2]), num.node(i + q[0], j + q[1], k + q[2]), v));
                        }
                    }
                    // edge functions of one direction vary bilinearly across the other two
                    for a in &pairs {
                        for b in &pairs {
                            let v = h * mass_1d(a[0], b[0]) * mass_1d(a[1], b[1]);
                            m1.push((num.ex(i, j + a[0], k + a[1]), num.ex(i, j + b[0], k + b[1]), v));
                            m1.push((num.ey(i + a[0], j, k + a[1]), num.ey(i + b[0], j, k + b[1]), v));
                            m1.push((num.ez(i + a[0], j + a[1], k), num.ez(i + b[0], j + b[1], k), v));
                        }
                    }
                    for a in 0..2 {
                        for b in 0..2 {
                            let v = mass_1d(a, b) / h;
                            m2.push((num.fx(i + a, j, k), num.fx(i + b, j, k), v));
                            m2.push((num.fy(i, j + a, k), num.fy(i, j + b, k), v));
                            m2.push((num.fz(i, j, k + a), num.fz(i, j, k + b), v));
                        }
                    }
                }
            }
        }

        let d0 = CsrMatrix::from_triplets(edge_map.clone(), node_map.clone(), &d0)?;
        let d1 = CsrMatrix::from_triplets(face_map.clone(), edge_map.clone(), &d1)?;
        let m0 = CsrMatrix::from_triplets(node_map.clone(), node_map, &m0)?;
        let m1 = CsrMatrix::from_triplets(edge_map.clone(), edge_map, &m1)?;
        let m2 = CsrMatrix::from_triplets(face_map.clone(), face_map, &m2)?;
        let s = galerkin_product(&d1, &m2)?;
        info!("hex complex n={n}: {nn} nodes, {ne} edges, {nf} faces, nnz(S)={}", s.nnz());
        Ok(Self { n, d0, d1, m0, m1, m2, s, coords })
    }

    pub fn num_nodes(&self) -> usize {
        self.d0.global_ncols()
    }

    pub fn num_edges(&self) -> usize {
        self.d0.global_nrows()
    }

    pub fn num_faces(&self) -> usize {
        self.d1.global_nrows()
    }

    pub fn coords_multivector(&self) -> Result<MultiVector, KError> {
        MultiVector::from_columns(RowPartition::serial(self.num_nodes()), self.coords.clone())
    }

    /// Writes `S.txt`, `M1.txt`, `M0.txt`, `D0.txt` and `coords.txt` into `dir`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), KError> {
        fs::create_dir_all(dir).map_err(|source| KError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        write_matrix(&dir.join("S.txt"), &self.s)?;
        write_matrix(&dir.join("M1.txt"), &self.m1)?;
        write_matrix(&dir.join("M0.txt"), &self.m0)?;
        write_matrix(&dir.join("D0.txt"), &self.d0)?;
        write_multivector(&dir.join("coords.txt"), &self.coords_multivector()?)
    }
}
