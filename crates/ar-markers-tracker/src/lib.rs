//! Marker tracking and scene-object lifecycle reconciliation.
//!
//! Per frame, the [`ReconciliationDispatcher`] splits the detections by
//! logical marker id and runs one [`MarkerTracker`] update per configured
//! [`MarkerDefinition`]. Each update:
//!
//! 1. resets the per-frame match flags,
//! 2. prunes instances missing for at least the grace period,
//! 3. greedily matches detections to the nearest unmatched instance,
//! 4. pushes fresh transforms to matched objects,
//! 5. starts the absence clock of unmatched instances,
//! 6. creates objects for detections left over.
//!
//! Scene objects are created, moved and released through the [`SceneBinder`]
//! trait; [`RecordingScene`] is an in-memory implementation.

mod binder;
mod definition;
mod dispatcher;
mod error;
mod params;
mod recording;
mod tracker;
mod types;

pub use binder::SceneBinder;
pub use definition::{MarkerDefinition, MarkerDefinitions};
pub use dispatcher::{FrameReport, ReconciliationDispatcher, TrackedInstances};
pub use error::ConfigError;
pub use params::TrackerParams;
pub use recording::{ObjectId, RecordingScene, SceneObject};
pub use tracker::{MarkerTracker, PartitionUpdate, TrackedInstance};
pub use types::{Detection, MarkerId, Timestamp};

pub use ar_markers_core::ObjectTransform;
