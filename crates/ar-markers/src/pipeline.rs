//! Frame pipeline: frame source → pose estimator → tracker → scene.

use std::error::Error;

use ar_markers_core::{GrayImage, GrayImageView};
use ar_markers_tracker::{
    ConfigError, FrameReport, ReconciliationDispatcher, SceneBinder, Timestamp, TrackedInstances,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::estimator::{PoseEstimateError, PoseEstimator, RawDetections};

/// Errors surfaced by [`FramePipeline`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("frame skipped: {0}")]
    Estimate(#[from] PoseEstimateError),
    #[error("frame source failed")]
    Source(#[source] Box<dyn Error + Send + Sync>),
}

/// One captured frame.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: GrayImage,
    pub timestamp: Timestamp,
}

/// Produces one frame per tick; `Ok(None)` ends the stream.
pub trait FrameSource {
    type Error: Error + Send + Sync + 'static;

    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

/// Accepts each processed frame back, e.g. for overlay display.
pub trait FrameSink<H> {
    fn present(&mut self, frame: &Frame, report: &FrameReport<H>);
}

impl<H> FrameSink<H> for () {
    fn present(&mut self, _frame: &Frame, _report: &FrameReport<H>) {}
}

/// A capture device as enumerated by the platform layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub name: String,
    pub front_facing: bool,
}

/// Prefer the first back-facing camera, else the first camera at all.
pub fn select_capture_device(devices: &[CaptureDevice]) -> Option<usize> {
    devices
        .iter()
        .position(|d| !d.front_facing)
        .or_else(|| (!devices.is_empty()).then_some(0))
}

/// Running counters of a pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Frames handed to the tracker.
    pub frames: usize,
    /// Frames dropped because pose estimation failed.
    pub skipped: usize,
    pub created: usize,
    pub destroyed: usize,
}

/// Owns the estimator, the scene binder and the tracked state, and runs one
/// tracker update per frame.
///
/// `E` may be `()` when detections come from elsewhere (see
/// [`FramePipeline::process_detections`]).
pub struct FramePipeline<E, B: SceneBinder> {
    estimator: E,
    binder: B,
    dispatcher: ReconciliationDispatcher<B::Prototype>,
    instances: TrackedInstances<B::Handle>,
    stats: PipelineStats,
}

impl<E, B: SceneBinder> FramePipeline<E, B> {
    /// Build a pipeline, refusing to start if `binder` cannot instantiate a
    /// configured prototype.
    pub fn new(
        estimator: E,
        binder: B,
        dispatcher: ReconciliationDispatcher<B::Prototype>,
    ) -> Result<Self, PipelineError> {
        dispatcher.definitions().validate_prototypes(&binder)?;
        Ok(Self {
            estimator,
            binder,
            dispatcher,
            instances: TrackedInstances::new(),
            stats: PipelineStats::default(),
        })
    }

    /// Feed already-estimated detections for the frame at `now`.
    ///
    /// Inconsistent input skips the frame and leaves tracked state untouched.
    pub fn process_detections(
        &mut self,
        raw: RawDetections,
        now: Timestamp,
    ) -> Result<FrameReport<B::Handle>, PipelineError> {
        let detections = match raw.into_detections() {
            Ok(detections) => detections,
            Err(err) => {
                self.stats.skipped += 1;
                return Err(err.into());
            }
        };
        let report =
            self.dispatcher
                .dispatch(&mut self.instances, &detections, now, &mut self.binder);
        self.stats.frames += 1;
        self.stats.created += report.created().count();
        self.stats.destroyed += report.destroyed().count();
        Ok(report)
    }

    /// Destroy all live objects.
    pub fn shutdown(&mut self) -> Vec<B::Handle> {
        let released = self.instances.clear(&mut self.binder);
        self.stats.destroyed += released.len();
        log::info!("pipeline shut down, released {} object(s)", released.len());
        released
    }

    pub fn binder(&self) -> &B {
        &self.binder
    }

    pub fn estimator_mut(&mut self) -> &mut E {
        &mut self.estimator
    }

    pub fn instances(&self) -> &TrackedInstances<B::Handle> {
        &self.instances
    }

    pub fn dispatcher(&self) -> &ReconciliationDispatcher<B::Prototype> {
        &self.dispatcher
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

impl<E: PoseEstimator, B: SceneBinder> FramePipeline<E, B> {
    /// Estimate poses in `image` and update the tracker.
    ///
    /// On estimator failure the frame is skipped: no tracker update runs and
    /// the error is returned.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(t = now.as_secs_f64()))
    )]
    pub fn process_frame(
        &mut self,
        image: &GrayImageView<'_>,
        now: Timestamp,
    ) -> Result<FrameReport<B::Handle>, PipelineError> {
        match self.estimator.estimate(image) {
            Ok(raw) => self.process_detections(raw, now),
            Err(err) => {
                self.stats.skipped += 1;
                Err(err.into())
            }
        }
    }

    /// Drive frames from `source` until it is exhausted.
    ///
    /// Estimation failures are logged and the frame is dropped; a failing
    /// source stops the run.
    pub fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
    ) -> Result<PipelineStats, PipelineError>
    where
        S: FrameSource,
        K: FrameSink<B::Handle>,
    {
        while let Some(frame) = source
            .next_frame()
            .map_err(|e| PipelineError::Source(Box::new(e)))?
        {
            match self.process_frame(&frame.image.view(), frame.timestamp) {
                Ok(report) => sink.present(&frame, &report),
                Err(PipelineError::Estimate(err)) => {
                    log::warn!(
                        "frame at {:.3}s skipped: {}",
                        frame.timestamp.as_secs_f64(),
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.stats)
    }
}
