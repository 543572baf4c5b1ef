//! High-level facade crate for the `ar-markers-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry and tracker crates,
//! - the pose estimator boundary ([`estimator`]) with a quad-based estimator,
//! - the frame pipeline ([`pipeline`]) that runs estimation and one tracker
//!   update per frame,
//! - JSON configuration, detection logs and replay reports ([`io`], [`replay`]),
//! - (feature-gated) `image` helpers for grayscale frames on disk.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ar_markers::io::{DetectionLog, TrackingConfig};
//! use ar_markers::replay::replay;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrackingConfig::load_json("markers.json")?;
//! let log = DetectionLog::load_json("detections.json")?;
//! let report = replay(&config, &log)?;
//! println!("objects alive at the end: {}", report.final_objects.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ar_markers::core`: poses, intrinsics, homographies, logging.
//! - `ar_markers::tracker`: `MarkerTracker`, `ReconciliationDispatcher`, `SceneBinder`.
//! - `ar_markers::estimator`: `PoseEstimator`, `QuadDetector`, `QuadPoseEstimator`.
//! - `ar_markers::pipeline`: `FramePipeline`, `FrameSource`, `FrameSink`.
//! - `ar_markers::frames` (feature `image`): image-file frame source.

pub use ar_markers_core as core;
pub use ar_markers_tracker as tracker;

pub use ar_markers_core::{CameraIntrinsics, GrayImage, GrayImageView, ObjectTransform};
pub use ar_markers_tracker::{
    Detection, FrameReport, MarkerDefinition, MarkerId, ObjectId, RecordingScene, SceneBinder,
    Timestamp, TrackerParams,
};

pub mod estimator;
pub mod io;
pub mod pipeline;
pub mod replay;

#[cfg(feature = "image")]
pub mod frames;
