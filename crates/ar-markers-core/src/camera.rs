//! Pinhole camera intrinsics.

use nalgebra::{Matrix3, Point2};
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics without lens distortion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Uncalibrated intrinsics derived from the frame size alone.
    ///
    /// Uses a symmetric pinhole with `fx = fy = max(width, height)` and the
    /// principal point at the image center.
    pub fn from_image_size(width: u32, height: u32) -> Self {
        let f = f64::from(width.max(height));
        Self {
            fx: f,
            fy: f,
            cx: f64::from(width) / 2.0,
            cy: f64::from(height) / 2.0,
        }
    }

    /// Returns `true` when all parameters are finite and focal lengths non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    /// The 3x3 camera matrix `K`.
    pub fn matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// `K^-1`, or `None` for invalid intrinsics.
    pub fn inverse_matrix(self) -> Option<Matrix3<f64>> {
        if !self.is_valid() {
            return None;
        }
        self.matrix().try_inverse()
    }

    /// Convert pixel coordinates to normalized pinhole coordinates.
    pub fn pixel_to_normalized(self, pixel: Point2<f64>) -> Option<Point2<f64>> {
        if !self.is_valid() {
            return None;
        }
        let x = (pixel.x - self.cx) / self.fx;
        let y = (pixel.y - self.cy) / self.fy;
        (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
    }

    /// Convert normalized pinhole coordinates to pixel coordinates.
    pub fn normalized_to_pixel(self, normalized: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.fx * normalized.x + self.cx,
            self.fy * normalized.y + self.cy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn landscape_frame_uses_width_as_focal_length() {
        let k = CameraIntrinsics::from_image_size(640, 480);
        assert_eq!(k.fx, 640.0);
        assert_eq!(k.fy, 640.0);
        assert_eq!(k.cx, 320.0);
        assert_eq!(k.cy, 240.0);
    }

    #[test]
    fn portrait_frame_uses_height_as_focal_length() {
        let k = CameraIntrinsics::from_image_size(720, 1280);
        assert_eq!(k.fx, 1280.0);
        assert_eq!(k.cx, 360.0);
        assert_eq!(k.cy, 640.0);
    }

    #[test]
    fn normalized_round_trip() {
        let k = CameraIntrinsics::from_image_size(800, 600);
        let px = Point2::new(123.5, 456.25);
        let n = k.pixel_to_normalized(px).expect("valid intrinsics");
        assert_relative_eq!(k.normalized_to_pixel(n), px, epsilon = 1e-9);
    }

    #[test]
    fn zero_sized_frame_is_invalid() {
        let k = CameraIntrinsics::from_image_size(0, 0);
        assert!(!k.is_valid());
        assert!(k.inverse_matrix().is_none());
    }
}
