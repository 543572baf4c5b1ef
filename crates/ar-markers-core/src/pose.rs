//! Pose matrices and their decomposition into object transforms.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl ObjectTransform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Euclidean distance between the two positions.
    #[inline]
    pub fn distance_to(&self, position: &Vector3<f64>) -> f64 {
        (self.position - position).norm()
    }
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Reflection of the y axis.
pub const FLIP_Y: [f64; 4] = [1.0, -1.0, 1.0, 1.0];
/// Reflection of the z axis.
pub const FLIP_Z: [f64; 4] = [1.0, 1.0, -1.0, 1.0];

fn diagonal(d: [f64; 4]) -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::from(d))
}

/// Convert a detector pose (x right, y down, z forward) into the scene
/// convention (y up, left-handed): `flip_y * pose * flip_z`.
pub fn axis_correct(pose: &Matrix4<f64>) -> Matrix4<f64> {
    diagonal(FLIP_Y) * pose * diagonal(FLIP_Z)
}

/// Translation column.
#[inline]
pub fn position(pose: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)])
}

/// Length of each of the first three 4-component basis columns.
pub fn scale(pose: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(
        pose.column(0).norm(),
        pose.column(1).norm(),
        pose.column(2).norm(),
    )
}

/// Rotation whose +z axis points along `forward` and whose +y axis is as
/// close to `up` as possible.
///
/// A zero `forward` yields the identity. When `up` is parallel to `forward`
/// the shortest arc from +z to `forward` is used instead.
pub fn look_rotation(forward: &Vector3<f64>, up: &Vector3<f64>) -> UnitQuaternion<f64> {
    let Some(z) = forward.try_normalize(1e-12) else {
        return UnitQuaternion::identity();
    };
    let Some(x) = up.cross(&z).try_normalize(1e-12) else {
        return UnitQuaternion::rotation_between(&Vector3::z(), &z)
            .unwrap_or_else(UnitQuaternion::identity);
    };
    let y = z.cross(&x);
    let basis = Matrix3::from_columns(&[x, y, z]);
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
}

/// Split a pose into position, rotation and per-axis scale.
///
/// The rotation is built from the third (forward) and second (up) columns.
/// Shear is not detected; the pose is expected to be a scaled rotation plus
/// translation.
pub fn decompose(pose: &Matrix4<f64>) -> ObjectTransform {
    let forward = Vector3::new(pose[(0, 2)], pose[(1, 2)], pose[(2, 2)]);
    let up = Vector3::new(pose[(0, 1)], pose[(1, 1)], pose[(2, 1)]);
    ObjectTransform {
        position: position(pose),
        rotation: look_rotation(&forward, &up),
        scale: scale(pose),
    }
}
