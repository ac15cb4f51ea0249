//! Derived stress quantities for stacked tensor results
//!
//! All matrix functions take the `N x 6` matrix returned by
//! [`ResultSet::get_values_by_ids`](crate::ResultSet::get_values_by_ids) for
//! a stress entity, one tensor per row, components ordered
//! `[Sxx, Syy, Szz, Sxy, Syz, Szx]` as CalculiX writes them to the `.frd`
//! file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ccx_results::{FrdEntity, FrdResult, stress_tools};
//!
//! let frd = FrdResult::from_file("job.frd")?;
//! let stress = frd
//!     .get_result_set_by_entity_and_index(FrdEntity::STRESS, -1, None)
//!     .expect("job writes stresses");
//! let tensors = stress.get_values_by_ids(&stress.ids())?.into_rows().expect("nodal values");
//! let mises = stress_tools::mises_stresses(&tensors)?;
//! println!("max von Mises stress: {}", mises.max());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::error::{Result, ResultError};

/// Stress or strain tensor components (Voigt notation)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TensorComponents {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub yz: f64,
    pub xz: f64,
}

impl TensorComponents {
    /// Components from a row ordered `[xx, yy, zz, xy, yz, zx]`.
    pub fn from_row(row: &[f64]) -> Result<Self> {
        match *row {
            [xx, yy, zz, xy, yz, xz] => Ok(Self { xx, yy, zz, xy, yz, xz }),
            _ => Err(ResultError::InvalidTensorWidth(row.len())),
        }
    }

    /// Full symmetric 3x3 tensor
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.xx, self.xy, self.xz, //
            self.xy, self.yy, self.yz, //
            self.xz, self.yz, self.zz,
        )
    }

    /// von Mises equivalent stress
    ///
    /// σ_v = sqrt(0.5 * [(σ_xx - σ_yy)² + (σ_yy - σ_zz)² + (σ_zz - σ_xx)²] + 3 * [τ_xy² + τ_yz² + τ_xz²])
    pub fn mises(&self) -> f64 {
        let normal = 0.5
            * ((self.xx - self.yy).powi(2)
                + (self.yy - self.zz).powi(2)
                + (self.zz - self.xx).powi(2));
        let shear = 3.0 * (self.xy.powi(2) + self.yz.powi(2) + self.xz.powi(2));
        (normal + shear).sqrt()
    }

    /// Mean normal stress
    pub fn hydrostatic(&self) -> f64 {
        (self.xx + self.yy + self.zz) / 3.0
    }

    /// The tensor minus its hydrostatic part
    pub fn deviatoric(&self) -> Self {
        let hydro = self.hydrostatic();
        Self {
            xx: self.xx - hydro,
            yy: self.yy - hydro,
            zz: self.zz - hydro,
            ..*self
        }
    }

    /// Principal values sorted descending and their unit eigenvectors as
    /// columns in the same order.
    pub fn principal(&self) -> (Vector3<f64>, Matrix3<f64>) {
        let eigen = self.to_matrix().symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let values = Vector3::from_fn(|i, _| eigen.eigenvalues[order[i]]);
        let vectors = Matrix3::from_fn(|r, c| eigen.eigenvectors[(r, order[c])]);
        (values, vectors)
    }
}

fn tensor_rows(tensors: &DMatrix<f64>) -> Result<impl Iterator<Item = TensorComponents> + '_> {
    if tensors.ncols() != 6 {
        return Err(ResultError::InvalidTensorWidth(tensors.ncols()));
    }
    Ok(tensors.row_iter().map(|row| TensorComponents {
        xx: row[0],
        yy: row[1],
        zz: row[2],
        xy: row[3],
        yz: row[4],
        xz: row[5],
    }))
}

/// von Mises stress per tensor.
pub fn mises_stresses(tensors: &DMatrix<f64>) -> Result<DVector<f64>> {
    let values: Vec<f64> = tensor_rows(tensors)?.map(|t| t.mises()).collect();
    Ok(DVector::from_vec(values))
}

/// Principal stresses per tensor (`N x 3`, sorted descending) and the
/// matching eigenvectors, the i-th column belonging to the i-th principal
/// stress.
pub fn principal_stresses(tensors: &DMatrix<f64>) -> Result<(DMatrix<f64>, Vec<Matrix3<f64>>)> {
    let mut values = DMatrix::zeros(tensors.nrows(), 3);
    let mut vectors = Vec::with_capacity(tensors.nrows());
    for (i, t) in tensor_rows(tensors)?.enumerate() {
        let (p, v) = t.principal();
        values.set_row(i, &p.transpose());
        vectors.push(v);
    }
    Ok((values, vectors))
}

/// Principal stress with the largest magnitude per tensor, sign kept. Ties
/// go to the largest principal stress.
pub fn worst_principal_stresses(tensors: &DMatrix<f64>) -> Result<DVector<f64>> {
    let (p, _) = principal_stresses(tensors)?;
    Ok(DVector::from_fn(p.nrows(), |i, _| {
        if p[(i, 2)].abs() > p[(i, 0)].abs() {
            p[(i, 2)]
        } else {
            p[(i, 0)]
        }
    }))
}

/// Principal shear stresses per tensor, columns `[tau_23, tau_13, tau_12]`.
pub fn principal_shear_stresses(tensors: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (p, _) = principal_stresses(tensors)?;
    Ok(DMatrix::from_fn(p.nrows(), 3, |i, j| {
        let (a, b) = match j {
            0 => (1, 2),
            1 => (2, 0),
            _ => (0, 1),
        };
        (p[(i, a)] - p[(i, b)]).abs() / 2.0
    }))
}

/// Largest principal shear stress per tensor.
pub fn max_principal_shear_stresses(tensors: &DMatrix<f64>) -> Result<DVector<f64>> {
    let shear = principal_shear_stresses(tensors)?;
    Ok(DVector::from_fn(shear.nrows(), |i, _| shear.row(i).max()))
}
