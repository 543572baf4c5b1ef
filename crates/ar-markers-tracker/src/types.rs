use std::time::Duration;

use ar_markers_core::{axis_correct, decompose, ObjectTransform};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// Logical marker id encoded in the marker pattern.
pub type MarkerId = i32;

/// Frame time measured from the start of the stream.
pub type Timestamp = Duration;

/// One marker observation in the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub marker_id: MarkerId,
    /// Raw camera-from-marker pose in the detector convention.
    pub pose: Matrix4<f64>,
}

impl Detection {
    pub fn new(marker_id: MarkerId, pose: Matrix4<f64>) -> Self {
        Self { marker_id, pose }
    }

    /// Axis-corrected and decomposed pose, as pushed to scene objects.
    pub fn scene_transform(&self) -> ObjectTransform {
        decompose(&axis_correct(&self.pose))
    }
}
