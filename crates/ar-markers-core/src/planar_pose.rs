//! Pose of a square planar marker from its four image corners.

use nalgebra::{Matrix3, Matrix4, Point2, Point3};

use crate::{homography_from_4pt, CameraIntrinsics};

/// Errors from [`solve_marker_pose`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum MarkerPoseError {
    #[error("camera intrinsics are not invertible")]
    InvalidIntrinsics,
    #[error("marker size must be finite and > 0 (got {0})")]
    InvalidMarkerSize(f64),
    #[error("marker corners do not define a homography")]
    DegenerateCorners,
}

/// Marker-frame corner coordinates for a square marker of side `size`.
///
/// Order is top-left, top-right, bottom-right, bottom-left with +y up, which
/// is the order corners are expected in from the quad detector.
pub fn marker_object_points(size: f64) -> [Point3<f64>; 4] {
    let h = size / 2.0;
    [
        Point3::new(-h, h, 0.0),
        Point3::new(h, h, 0.0),
        Point3::new(h, -h, 0.0),
        Point3::new(-h, -h, 0.0),
    ]
}

/// Camera-from-marker pose `[R t; 0 1]` in the detector convention.
///
/// The plane-to-image homography is factored as `K^-1 H = s [r1 r2 t]`; the
/// rotation is projected onto SO(3) and the sign is fixed so the marker lies
/// in front of the camera.
pub fn solve_marker_pose(
    intrinsics: CameraIntrinsics,
    corners: &[Point2<f64>; 4],
    marker_size: f64,
) -> Result<Matrix4<f64>, MarkerPoseError> {
    if !marker_size.is_finite() || marker_size <= 0.0 {
        return Err(MarkerPoseError::InvalidMarkerSize(marker_size));
    }
    let k_inv = intrinsics
        .inverse_matrix()
        .ok_or(MarkerPoseError::InvalidIntrinsics)?;

    let plane = marker_object_points(marker_size).map(|p| Point2::new(p.x, p.y));
    let h = homography_from_4pt(&plane, corners).ok_or(MarkerPoseError::DegenerateCorners)?;

    let m = k_inv * h.h;
    let h1 = m.column(0).into_owned();
    let h2 = m.column(1).into_owned();
    let h3 = m.column(2).into_owned();

    let norm = (h1.norm() + h2.norm()) / 2.0;
    if norm < 1e-12 || !norm.is_finite() {
        return Err(MarkerPoseError::DegenerateCorners);
    }
    let mut s = 1.0 / norm;
    if h3.z * s < 0.0 {
        s = -s;
    }

    let r1 = h1 * s;
    let r2 = h2 * s;
    let r3 = r1.cross(&r2);
    let t = h3 * s;

    let approx_r = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = approx_r.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(MarkerPoseError::DegenerateCorners);
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        r = u * v_t;
    }

    let mut pose = Matrix4::identity();
    pose.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    pose.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
    if pose.iter().any(|v| !v.is_finite()) {
        return Err(MarkerPoseError::DegenerateCorners);
    }
    Ok(pose)
}
