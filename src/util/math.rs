//! Math type re-exports and value types decoded from results files.
//!
//! Vectors and transforms come from `glam` (double precision, since all
//! stored values are upcast to `f64` on read). Symmetric tensors have no
//! glam counterpart and are stored as flat component arrays.

pub use glam::{DAffine3, DMat3, DVec3};

use std::fmt;

/// Symmetric 2D tensor: `[xx, yy, xy]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tensor2(pub [f64; 3]);

/// Symmetric 3D tensor: `[xx, yy, zz, xy, xz, yz]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tensor3(pub [f64; 6]);

impl Tensor2 {
    pub fn xx(&self) -> f64 {
        self.0[0]
    }
    pub fn yy(&self) -> f64 {
        self.0[1]
    }
    pub fn xy(&self) -> f64 {
        self.0[2]
    }
}

impl Tensor3 {
    pub fn xx(&self) -> f64 {
        self.0[0]
    }
    pub fn yy(&self) -> f64 {
        self.0[1]
    }
    pub fn zz(&self) -> f64 {
        self.0[2]
    }

    /// Von Mises equivalent of this stress tensor.
    pub fn von_mises(&self) -> f64 {
        let [xx, yy, zz, xy, xz, yz] = self.0;
        let d = (xx - yy).powi(2) + (yy - zz).powi(2) + (zz - xx).powi(2);
        (0.5 * d + 3.0 * (xy * xy + xz * xz + yz * yz)).sqrt()
    }
}

/// Build a 3x3 matrix from 9 column-major values.
#[inline]
pub fn mat33_from_slice(v: &[f64]) -> DMat3 {
    DMat3::from_cols_slice(&v[..9])
}

/// Build a 3x4 transform from 12 column-major values
/// (three axis columns followed by the translation).
#[inline]
pub fn mat34_from_slice(v: &[f64]) -> DAffine3 {
    DAffine3::from_cols_slice(&v[..12])
}

impl fmt::Display for Tensor3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [xx, yy, zz, xy, xz, yz] = self.0;
        write!(f, "[{xx} {yy} {zz} {xy} {xz} {yz}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat34_column_major() {
        let v = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 4.0, 5.0, 6.0];
        let m = mat34_from_slice(&v);
        assert_eq!(m.translation, DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(m.transform_point3(DVec3::ZERO), DVec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_von_mises_uniaxial() {
        let t = Tensor3([100.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((t.von_mises() - 100.0).abs() < 1e-12);
    }
}
