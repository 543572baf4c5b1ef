use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use ar_markers::core::marker_object_points;
use ar_markers::estimator::{MarkerQuad, PoseEstimateError, QuadDetector, QuadPoseEstimator};
use ar_markers::pipeline::{Frame, FramePipeline, FrameSink, FrameSource, PipelineError};
use ar_markers::tracker::{
    ConfigError, MarkerDefinition, MarkerDefinitions, ReconciliationDispatcher,
};
use ar_markers::{
    CameraIntrinsics, FrameReport, GrayImage, GrayImageView, ObjectId, RecordingScene,
    SceneBinder, TrackerParams,
};
use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion};

const WIDTH: usize = 320;
const HEIGHT: usize = 240;

#[derive(Debug, thiserror::Error)]
#[error("detector offline")]
struct DetectorOffline;

/// Replays a fixed per-frame list of detector outputs.
struct ScriptedDetector {
    script: VecDeque<Result<Vec<MarkerQuad>, DetectorOffline>>,
}

impl QuadDetector for ScriptedDetector {
    type Error = DetectorOffline;

    fn detect_quads(
        &mut self,
        _image: &GrayImageView<'_>,
    ) -> Result<Vec<MarkerQuad>, DetectorOffline> {
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct VecSource {
    frames: VecDeque<Frame>,
}

impl VecSource {
    fn at_millis(times: &[u64]) -> Self {
        let frames = times
            .iter()
            .map(|&t| Frame {
                image: GrayImage::new(WIDTH, HEIGHT),
                timestamp: Duration::from_millis(t),
            })
            .collect();
        Self { frames }
    }
}

impl FrameSource for VecSource {
    type Error = Infallible;

    fn next_frame(&mut self) -> Result<Option<Frame>, Infallible> {
        Ok(self.frames.pop_front())
    }
}

#[derive(Default)]
struct CollectingSink {
    created: Vec<ObjectId>,
    destroyed: Vec<ObjectId>,
    frames: usize,
}

impl FrameSink<ObjectId> for CollectingSink {
    fn present(&mut self, _frame: &Frame, report: &FrameReport<ObjectId>) {
        self.frames += 1;
        self.created.extend(report.created().copied());
        self.destroyed.extend(report.destroyed().copied());
    }
}

fn quad(id: i32, x: f64) -> MarkerQuad {
    let k = CameraIntrinsics::from_image_size(WIDTH as u32, HEIGHT as u32);
    let pose = Isometry3::from_parts(
        Translation3::new(x, 0.1, 5.0),
        UnitQuaternion::from_euler_angles(0.1, -0.2, 0.05),
    );
    let corners = marker_object_points(1.0).map(|p| {
        let c = pose * p;
        k.normalized_to_pixel(Point2::new(c.x / c.z, c.y / c.z))
    });
    MarkerQuad { id, corners }
}

fn dispatcher(prototype: &str) -> ReconciliationDispatcher<String> {
    let defs = MarkerDefinitions::new(vec![MarkerDefinition {
        marker_id: 5,
        prototype: prototype.to_string(),
    }])
    .expect("definitions");
    ReconciliationDispatcher::new(defs, TrackerParams::default()).expect("params")
}

fn pipeline(
    script: Vec<Result<Vec<MarkerQuad>, DetectorOffline>>,
) -> FramePipeline<QuadPoseEstimator<ScriptedDetector>, RecordingScene> {
    let detector = ScriptedDetector {
        script: script.into(),
    };
    FramePipeline::new(
        QuadPoseEstimator::new(detector, 1.0),
        RecordingScene::with_prototypes(["cube"]),
        dispatcher("cube"),
    )
    .expect("pipeline")
}

#[test]
fn run_tracks_marker_until_it_disappears() {
    let mut p = pipeline(vec![
        Ok(vec![quad(5, 0.0)]),
        Ok(vec![quad(5, 0.05)]),
        Ok(vec![quad(5, 0.1)]),
    ]);
    let mut source = VecSource::at_millis(&[0, 33, 66, 100, 200, 300]);
    let mut sink = CollectingSink::default();

    let stats = p.run(&mut source, &mut sink).expect("run");

    assert_eq!(sink.frames, 6);
    assert_eq!(sink.created, vec![ObjectId(0)]);
    assert_eq!(sink.destroyed, vec![ObjectId(0)]);
    assert_eq!(stats.frames, 6);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.destroyed, 1);
    assert_eq!(p.binder().live_count(), 0);
}

#[test]
fn detector_failure_skips_frame_and_keeps_state() {
    let mut p = pipeline(vec![
        Ok(vec![quad(5, 0.0)]),
        Err(DetectorOffline),
        Ok(vec![quad(5, 0.02)]),
    ]);
    let img = GrayImage::new(WIDTH, HEIGHT);

    let first = p
        .process_frame(&img.view(), Duration::from_millis(0))
        .expect("frame 0");
    let id = *first.created().next().expect("created");

    let err = p
        .process_frame(&img.view(), Duration::from_millis(300))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Estimate(PoseEstimateError::Detector(_))
    ));
    let tracker = p.instances().partition(5).expect("partition");
    assert_eq!(tracker.len(), 1);
    assert_eq!(tracker.instances()[0].missing_since(), None);

    let third = p
        .process_frame(&img.view(), Duration::from_millis(330))
        .expect("frame 2");
    assert_eq!(third.updated().copied().collect::<Vec<_>>(), vec![id]);
    assert_eq!(third.destroyed().count(), 0);
    assert_eq!(p.stats().skipped, 1);
    assert_eq!(p.binder().object(id).map(|o| o.moves), Some(2));
}

#[test]
fn run_logs_and_continues_past_failed_frames() {
    let mut p = pipeline(vec![
        Ok(vec![quad(5, 0.0)]),
        Err(DetectorOffline),
        Ok(vec![quad(5, 0.01)]),
    ]);
    let mut source = VecSource::at_millis(&[0, 33, 66]);
    let mut sink = CollectingSink::default();

    let stats = p.run(&mut source, &mut sink).expect("run");
    assert_eq!(sink.frames, 2);
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.skipped, 1);
    assert_eq!(p.binder().live_count(), 1);
}

#[test]
fn unknown_prototype_refuses_to_start() {
    let detector = ScriptedDetector {
        script: VecDeque::new(),
    };
    let result = FramePipeline::new(
        QuadPoseEstimator::new(detector, 1.0),
        RecordingScene::with_prototypes(["cube"]),
        dispatcher("tree"),
    );
    assert!(matches!(
        result,
        Err(PipelineError::Config(ConfigError::UnknownPrototype { marker_id: 5 }))
    ));
}

#[test]
fn shutdown_releases_every_object() {
    let mut p = pipeline(vec![Ok(vec![quad(5, -0.5), quad(5, 0.5)])]);
    let img = GrayImage::new(WIDTH, HEIGHT);
    let report = p
        .process_frame(&img.view(), Duration::ZERO)
        .expect("frame");
    assert_eq!(report.created().count(), 2);

    let released = p.shutdown();
    assert_eq!(released.len(), 2);
    assert_eq!(p.binder().live_count(), 0);
    assert_eq!(p.binder().destroyed_count(), 2);
    assert!(p.instances().is_empty());
    assert!(p.binder().has_prototype(&"cube".to_string()));
}

#[derive(Debug, thiserror::Error)]
#[error("camera unplugged")]
struct Unplugged;

struct FailingSource;

impl FrameSource for FailingSource {
    type Error = Unplugged;

    fn next_frame(&mut self) -> Result<Option<Frame>, Unplugged> {
        Err(Unplugged)
    }
}

#[test]
fn source_failure_stops_the_run() {
    let mut p = pipeline(Vec::new());
    let err = p.run(&mut FailingSource, &mut ()).unwrap_err();
    assert!(matches!(err, PipelineError::Source(_)));
}
