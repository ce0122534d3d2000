//! Rigid 3D transforms laid out for device upload.
//!
//! [`RigidTransform`] is a row-major 4x4 `f32` matrix with `#[repr(C)]` layout,
//! so a `&[RigidTransform]` can be cast to bytes and written to a device buffer
//! without repacking. Composition follows the usual convention: `a * b` applies
//! `b` first, then `a`.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix3, Matrix4, Vector3};
use std::ops::Mul;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RigidTransform {
    /// Row-major entries, `rows[r][c]`.
    pub rows: [[f32; 4]; 4],
}

impl RigidTransform {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self { rows }
    }

    pub fn from_rotation_translation(rotation: &Matrix3<f32>, translation: &Vector3<f32>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self::from_matrix(&m)
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::IDENTITY;
        t.rows[0][3] = x;
        t.rows[1][3] = y;
        t.rows[2][3] = z;
        t
    }

    /// Rotation of `angle` radians about +Z followed by a translation.
    pub fn from_yaw_translation(angle: f32, translation: Vector3<f32>) -> Self {
        let (s, c) = angle.sin_cos();
        let rotation = Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0);
        Self::from_rotation_translation(&rotation, &translation)
    }

    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let mut rows = [[0.0f32; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = m[(r, c)];
            }
        }
        Self { rows }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_fn(|r, c| self.rows[r][c])
    }

    pub fn rotation(&self) -> Matrix3<f32> {
        Matrix3::from_fn(|r, c| self.rows[r][c])
    }

    pub fn translation(&self) -> Vector3<f32> {
        Vector3::new(self.rows[0][3], self.rows[1][3], self.rows[2][3])
    }

    /// `self * other`: express `other` (relative to this frame) in this frame's parent.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        let mut out = [[0.0f32; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.rows[r][k] * other.rows[k][c]).sum();
            }
        }
        RigidTransform { rows: out }
    }

    /// Inverse assuming the upper-left block is a rotation.
    pub fn inverse(&self) -> RigidTransform {
        let r_inv = self.rotation().transpose();
        let t_inv = -(r_inv * self.translation());
        Self::from_rotation_translation(&r_inv, &t_inv)
    }

    pub fn is_identity(&self, tolerance: f32) -> bool {
        self.approx_eq(&Self::IDENTITY, tolerance)
    }

    pub fn approx_eq(&self, other: &RigidTransform, tolerance: f32) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

impl From<Matrix4<f32>> for RigidTransform {
    fn from(m: Matrix4<f32>) -> Self {
        Self::from_matrix(&m)
    }
}

impl From<RigidTransform> for Matrix4<f32> {
    fn from(t: RigidTransform) -> Self {
        t.to_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let t = RigidTransform::from_yaw_translation(0.3, Vector3::new(1.0, 2.0, 3.0));
        assert!((t * RigidTransform::IDENTITY).approx_eq(&t, 1e-6));
        assert!((RigidTransform::IDENTITY * t).approx_eq(&t, 1e-6));
    }

    #[test]
    fn compose_matches_nalgebra() {
        let a = RigidTransform::from_yaw_translation(0.5, Vector3::new(1.0, 0.0, 0.0));
        let b = RigidTransform::from_yaw_translation(-0.2, Vector3::new(0.0, 2.0, 1.0));
        let expected = RigidTransform::from_matrix(&(a.to_matrix() * b.to_matrix()));
        assert!(a.compose(&b).approx_eq(&expected, 1e-5));
    }

    #[test]
    fn inverse_cancels() {
        let t = RigidTransform::from_yaw_translation(1.1, Vector3::new(-4.0, 0.5, 2.0));
        assert!((t * t.inverse()).is_identity(1e-5));
    }

    #[test]
    fn layout_is_sixteen_floats() {
        assert_eq!(std::mem::size_of::<RigidTransform>(), 64);
        let t = RigidTransform::from_translation(1.0, 2.0, 3.0);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&t));
        assert_eq!(floats[3], 1.0);
        assert_eq!(floats[7], 2.0);
        assert_eq!(floats[11], 3.0);
    }
}
