//! Pose estimator boundary.
//!
//! The tracker only needs `(marker id, pose)` pairs per frame. Anything that
//! turns an image into those implements [`PoseEstimator`]. For detectors that
//! only report marker corners, [`QuadPoseEstimator`] adds the pose solve.

use std::error::Error;

use ar_markers_core::{solve_marker_pose, CameraIntrinsics, GrayImageView, MarkerPoseError};
use ar_markers_tracker::{Detection, MarkerId};
use nalgebra::{Matrix4, Point2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors raised while estimating a frame's marker poses.
///
/// Any of these causes the frame to be skipped.
#[derive(thiserror::Error, Debug)]
pub enum PoseEstimateError {
    #[error("pose estimator returned {ids} ids but {poses} poses")]
    LengthMismatch { ids: usize, poses: usize },
    #[error("frame of {width}x{height} pixels is too large")]
    FrameTooLarge { width: usize, height: usize },
    #[error("marker {marker_id}: {source}")]
    Pose {
        marker_id: MarkerId,
        #[source]
        source: MarkerPoseError,
    },
    #[error("marker detector failed")]
    Detector(#[source] Box<dyn Error + Send + Sync>),
}

/// Parallel id/pose lists as produced by a marker detector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetections {
    pub ids: Vec<MarkerId>,
    /// Camera-from-marker poses in the detector convention.
    pub poses: Vec<Matrix4<f64>>,
}

impl RawDetections {
    pub fn push(&mut self, marker_id: MarkerId, pose: Matrix4<f64>) {
        self.ids.push(marker_id);
        self.poses.push(pose);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.poses.is_empty()
    }

    /// Zip into detections, preserving order. Lists of unequal length are an
    /// estimator failure.
    pub fn into_detections(self) -> Result<Vec<Detection>, PoseEstimateError> {
        if self.ids.len() != self.poses.len() {
            return Err(PoseEstimateError::LengthMismatch {
                ids: self.ids.len(),
                poses: self.poses.len(),
            });
        }
        Ok(self
            .ids
            .into_iter()
            .zip(self.poses)
            .map(|(marker_id, pose)| Detection::new(marker_id, pose))
            .collect())
    }
}

/// Produces raw marker poses for one frame.
pub trait PoseEstimator {
    fn estimate(&mut self, image: &GrayImageView<'_>) -> Result<RawDetections, PoseEstimateError>;
}

/// Four image corners of a decoded marker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerQuad {
    pub id: MarkerId,
    /// Top-left, top-right, bottom-right, bottom-left, in pixels.
    pub corners: [Point2<f64>; 4],
}

/// External marker detector reporting corner quads only.
pub trait QuadDetector {
    type Error: Error + Send + Sync + 'static;

    fn detect_quads(&mut self, image: &GrayImageView<'_>) -> Result<Vec<MarkerQuad>, Self::Error>;
}

impl<F> QuadDetector for F
where
    F: FnMut(&GrayImageView<'_>) -> Vec<MarkerQuad>,
{
    type Error = std::convert::Infallible;

    fn detect_quads(&mut self, image: &GrayImageView<'_>) -> Result<Vec<MarkerQuad>, Self::Error> {
        Ok(self(image))
    }
}

/// Pose estimator built from a quad detector and a planar pose solve.
///
/// Intrinsics are derived from the frame size (see
/// [`CameraIntrinsics::from_image_size`]); every marker is assumed to have
/// the same side length.
pub struct QuadPoseEstimator<D> {
    detector: D,
    marker_size: f64,
}

impl<D: QuadDetector> QuadPoseEstimator<D> {
    pub fn new(detector: D, marker_size: f64) -> Self {
        Self {
            detector,
            marker_size,
        }
    }

    pub fn marker_size(&self) -> f64 {
        self.marker_size
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}

impl<D: QuadDetector> PoseEstimator for QuadPoseEstimator<D> {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(width = image.width, height = image.height))
    )]
    fn estimate(&mut self, image: &GrayImageView<'_>) -> Result<RawDetections, PoseEstimateError> {
        let too_large = || PoseEstimateError::FrameTooLarge {
            width: image.width,
            height: image.height,
        };
        let width = u32::try_from(image.width).map_err(|_| too_large())?;
        let height = u32::try_from(image.height).map_err(|_| too_large())?;
        let intrinsics = CameraIntrinsics::from_image_size(width, height);

        let quads = self
            .detector
            .detect_quads(image)
            .map_err(|e| PoseEstimateError::Detector(Box::new(e)))?;

        let mut out = RawDetections::default();
        for quad in quads {
            let pose = solve_marker_pose(intrinsics, &quad.corners, self.marker_size).map_err(
                |source| PoseEstimateError::Pose {
                    marker_id: quad.id,
                    source,
                },
            )?;
            out.push(quad.id, pose);
        }
        log::trace!("estimated {} marker pose(s)", out.len());
        Ok(out)
    }
}
