//! Offline replay of a recorded detection log against a [`RecordingScene`].

use std::fs;
use std::path::Path;

use ar_markers_core::ObjectTransform;
use ar_markers_tracker::{ConfigError, FrameReport, MarkerId, ObjectId, RecordingScene};
use serde::{Deserialize, Serialize};

use crate::io::{DetectionLog, IoError, TrackingConfig};
use crate::pipeline::{FramePipeline, PipelineError, PipelineStats};

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("frame {index}: invalid timestamp {timestamp_s}")]
    InvalidTimestamp { index: usize, timestamp_s: f64 },
}

/// Lifecycle events of one replayed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub index: usize,
    pub timestamp_s: f64,
    pub created: Vec<ObjectId>,
    pub updated: Vec<ObjectId>,
    pub destroyed: Vec<ObjectId>,
    pub ignored_detections: usize,
}

impl ReplayFrame {
    fn from_report(index: usize, report: &FrameReport<ObjectId>) -> Self {
        Self {
            index,
            timestamp_s: report.timestamp.as_secs_f64(),
            created: report.created().copied().collect(),
            updated: report.updated().copied().collect(),
            destroyed: report.destroyed().copied().collect(),
            ignored_detections: report.ignored_detections,
        }
    }
}

/// A frame the pipeline refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFrame {
    pub index: usize,
    pub timestamp_s: f64,
    pub error: String,
}

/// An object still alive after the last frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalObject {
    pub object: ObjectId,
    pub marker_id: MarkerId,
    pub prototype: String,
    pub transform: Option<ObjectTransform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub frames: Vec<ReplayFrame>,
    pub skipped: Vec<SkippedFrame>,
    pub final_objects: Vec<FinalObject>,
    pub stats: PipelineStats,
}

impl ReplayReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Run every logged frame through a fresh tracker.
///
/// Frames with inconsistent detections are listed in
/// [`ReplayReport::skipped`] and leave the tracked state untouched.
pub fn replay(
    config: &TrackingConfig,
    recording: &DetectionLog,
) -> Result<ReplayReport, ReplayError> {
    let dispatcher = config.build_dispatcher()?;
    let mut pipeline = FramePipeline::new((), RecordingScene::new(), dispatcher)?;

    let mut frames = Vec::with_capacity(recording.frames.len());
    let mut skipped = Vec::new();
    for (index, logged) in recording.frames.iter().enumerate() {
        let now = logged.timestamp().ok_or(ReplayError::InvalidTimestamp {
            index,
            timestamp_s: logged.timestamp_s,
        })?;
        match pipeline.process_detections(logged.to_raw(), now) {
            Ok(report) => frames.push(ReplayFrame::from_report(index, &report)),
            Err(PipelineError::Estimate(err)) => {
                log::warn!("frame {index} skipped: {err}");
                skipped.push(SkippedFrame {
                    index,
                    timestamp_s: logged.timestamp_s,
                    error: err.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }
    }

    let scene = pipeline.binder();
    let final_objects = pipeline
        .instances()
        .partitions()
        .flat_map(|tracker| {
            tracker.instances().iter().map(move |inst| {
                let object = *inst.handle();
                let recorded = scene.object(object);
                FinalObject {
                    object,
                    marker_id: tracker.marker_id(),
                    prototype: recorded.map(|o| o.prototype.clone()).unwrap_or_default(),
                    transform: recorded.and_then(|o| o.transform),
                }
            })
        })
        .collect();

    log::info!(
        "replayed {} frame(s), {} skipped, {} object(s) alive",
        frames.len(),
        skipped.len(),
        scene.live_count()
    );

    Ok(ReplayReport {
        frames,
        skipped,
        final_objects,
        stats: pipeline.stats(),
    })
}
