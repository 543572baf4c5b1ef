//! Core types and utilities for AR marker tracking.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete marker detector, frame source or scene graph.
//!
//! Conventions:
//! - detector poses follow the pinhole camera frame (x right, y down, z forward);
//! - scene poses follow a left-handed, y-up frame and are produced with
//!   [`axis_correct`];
//! - all matrices are column-vector `nalgebra` matrices, translation in the
//!   last column.

mod camera;
mod homography;
mod image;
mod logger;
mod planar_pose;
mod pose;

pub use camera::CameraIntrinsics;
pub use homography::{homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView, ImageError};
pub use planar_pose::{marker_object_points, solve_marker_pose, MarkerPoseError};
pub use pose::{
    axis_correct, decompose, look_rotation, position, scale, ObjectTransform, FLIP_Y, FLIP_Z,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
