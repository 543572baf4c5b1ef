//! Per-marker-id instance tracking.

use std::time::Duration;

use ar_markers_core::ObjectTransform;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Detection, MarkerId, SceneBinder, Timestamp, TrackerParams};

/// The tracker's belief that one physical marker is (or recently was) visible.
#[derive(Clone, Debug)]
pub struct TrackedInstance<H> {
    handle: H,
    transform: ObjectTransform,
    matched: bool,
    missing_since: Option<Timestamp>,
}

impl<H> TrackedInstance<H> {
    /// Handle of the bound scene object.
    #[inline]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Last transform pushed to the object.
    #[inline]
    pub fn transform(&self) -> &ObjectTransform {
        &self.transform
    }

    /// Whether a detection was assigned during the latest update.
    #[inline]
    pub fn matched_this_frame(&self) -> bool {
        self.matched
    }

    /// Time of the first frame in the current run of missed frames.
    #[inline]
    pub fn missing_since(&self) -> Option<Timestamp> {
        self.missing_since
    }

    fn is_expired(&self, now: Timestamp, grace: Duration) -> bool {
        self.missing_since
            .is_some_and(|since| now.saturating_sub(since) >= grace)
    }
}

/// Lifecycle changes produced by one [`MarkerTracker::update`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionUpdate<H> {
    pub marker_id: MarkerId,
    pub created: Vec<H>,
    pub updated: Vec<H>,
    pub destroyed: Vec<H>,
}

impl<H> PartitionUpdate<H> {
    fn new(marker_id: MarkerId) -> Self {
        Self {
            marker_id,
            created: Vec::new(),
            updated: Vec::new(),
            destroyed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.destroyed.is_empty()
    }
}

/// Live instances of one logical marker id.
#[derive(Clone, Debug)]
pub struct MarkerTracker<H> {
    marker_id: MarkerId,
    instances: Vec<TrackedInstance<H>>,
}

impl<H: Clone + std::fmt::Debug> MarkerTracker<H> {
    pub fn new(marker_id: MarkerId) -> Self {
        Self {
            marker_id,
            instances: Vec::new(),
        }
    }

    #[inline]
    pub fn marker_id(&self) -> MarkerId {
        self.marker_id
    }

    /// Instances ordered by creation.
    #[inline]
    pub fn instances(&self) -> &[TrackedInstance<H>] {
        &self.instances
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Reconcile this frame's detections with the live instances.
    ///
    /// Detections carrying another marker id are skipped. Matching is greedy:
    /// detections are visited in slice order and each takes the nearest
    /// instance not yet matched this frame, with no distance limit. Ties go
    /// to the oldest instance.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, prototype, detections, params, binder),
            fields(marker_id = self.marker_id, detections = detections.len())
        )
    )]
    pub fn update<B>(
        &mut self,
        prototype: &B::Prototype,
        detections: &[Detection],
        now: Timestamp,
        params: &TrackerParams,
        binder: &mut B,
    ) -> PartitionUpdate<H>
    where
        B: SceneBinder<Handle = H>,
    {
        let mut out = PartitionUpdate::new(self.marker_id);

        for inst in &mut self.instances {
            inst.matched = false;
        }

        self.prune(now, params.grace_period(), binder, &mut out);

        let observed: Vec<ObjectTransform> = detections
            .iter()
            .filter(|d| d.marker_id == self.marker_id)
            .map(Detection::scene_transform)
            .collect();

        let assignment = self.assign(&observed);
        let mut consumed = vec![false; observed.len()];

        for (inst, slot) in self.instances.iter_mut().zip(&assignment) {
            match *slot {
                Some(det_idx) => {
                    consumed[det_idx] = true;
                    inst.missing_since = None;
                    inst.transform = observed[det_idx];
                    binder.set_transform(&inst.handle, &inst.transform);
                    out.updated.push(inst.handle.clone());
                }
                None => {
                    if inst.missing_since.is_none() {
                        log::debug!(
                            "marker {}: object {:?} went missing at {:.3}s",
                            self.marker_id,
                            inst.handle,
                            now.as_secs_f64()
                        );
                        inst.missing_since = Some(now);
                    }
                }
            }
        }

        for (transform, _) in observed.iter().zip(&consumed).filter(|(_, used)| !**used) {
            let handle = binder.instantiate(prototype);
            binder.set_transform(&handle, transform);
            log::debug!("marker {}: created object {:?}", self.marker_id, handle);
            out.created.push(handle.clone());
            self.instances.push(TrackedInstance {
                handle,
                transform: *transform,
                matched: true,
                missing_since: None,
            });
        }

        out
    }

    /// Destroy every instance, e.g. on shutdown.
    pub fn clear<B>(&mut self, binder: &mut B) -> Vec<H>
    where
        B: SceneBinder<Handle = H>,
    {
        self.instances
            .drain(..)
            .map(|inst| {
                let handle = inst.handle.clone();
                binder.destroy(inst.handle);
                handle
            })
            .collect()
    }

    fn prune<B>(
        &mut self,
        now: Timestamp,
        grace: Duration,
        binder: &mut B,
        out: &mut PartitionUpdate<H>,
    ) where
        B: SceneBinder<Handle = H>,
    {
        let (expired, alive): (Vec<_>, Vec<_>) = std::mem::take(&mut self.instances)
            .into_iter()
            .partition(|inst| inst.is_expired(now, grace));
        self.instances = alive;

        for inst in expired {
            log::debug!(
                "marker {}: destroyed object {:?} after {:.3}s missing",
                self.marker_id,
                inst.handle,
                inst.missing_since
                    .map_or(0.0, |since| now.saturating_sub(since).as_secs_f64())
            );
            out.destroyed.push(inst.handle.clone());
            binder.destroy(inst.handle);
        }
    }

    // Greedy nearest-position assignment; returns the detection index
    // assigned to each instance.
    fn assign(&mut self, observed: &[ObjectTransform]) -> Vec<Option<usize>> {
        let mut assignment = vec![None; self.instances.len()];
        for (det_idx, det) in observed.iter().enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (inst_idx, inst) in self.instances.iter().enumerate() {
                if inst.matched {
                    continue;
                }
                let dist = inst.transform.distance_to(&det.position);
                if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                    best = Some((inst_idx, dist));
                }
            }
            if let Some((inst_idx, _)) = best {
                self.instances[inst_idx].matched = true;
                assignment[inst_idx] = Some(det_idx);
            }
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObjectId, RecordingScene};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};

    const ID: MarkerId = 5;

    // Raw detector pose whose scene position is `(x, y, z)`.
    fn det(x: f64, y: f64, z: f64) -> Detection {
        Detection::new(ID, Matrix4::new_translation(&Vector3::new(x, -y, z)))
    }

    fn ms(v: u64) -> Timestamp {
        Duration::from_millis(v)
    }

    fn step(
        tracker: &mut MarkerTracker<ObjectId>,
        scene: &mut RecordingScene,
        detections: &[Detection],
        now: Timestamp,
    ) -> PartitionUpdate<ObjectId> {
        tracker.update(
            &"cube".to_string(),
            detections,
            now,
            &TrackerParams::default(),
            scene,
        )
    }

    #[test]
    fn first_detection_creates_instance() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        let up = step(&mut tracker, &mut scene, &[det(1.0, 2.0, 3.0)], ms(0));
        assert_eq!(up.created.len(), 1);
        assert!(up.updated.is_empty() && up.destroyed.is_empty());

        let inst = &tracker.instances()[0];
        assert!(inst.matched_this_frame());
        assert_relative_eq!(inst.transform().position, Vector3::new(1.0, 2.0, 3.0));
        let obj = scene.object(*inst.handle()).expect("live object");
        assert_eq!(obj.transform.map(|t| t.position), Some(Vector3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn nearest_unmatched_instance_wins() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(
            &mut tracker,
            &mut scene,
            &[det(0.0, 0.0, 0.0), det(10.0, 0.0, 0.0)],
            ms(0),
        );
        let near_origin = *tracker.instances()[0].handle();
        let near_ten = *tracker.instances()[1].handle();

        // Listed in the opposite order; each still goes to its neighbour.
        step(
            &mut tracker,
            &mut scene,
            &[det(9.5, 0.0, 0.0), det(0.5, 0.0, 0.0)],
            ms(30),
        );
        let x_of = |h| scene.object(h).and_then(|o| o.transform).map(|t| t.position.x);
        assert_eq!(x_of(near_origin), Some(0.5));
        assert_eq!(x_of(near_ten), Some(9.5));
    }

    #[test]
    fn crossing_trajectories_pair_greedily() {
        // Instances at x=0 and x=3. Detections at x=1.4 (first) and x=-10.
        // Greedy gives 1.4 to the x=0 instance (distance 1.4 < 1.6) and the far
        // detection to x=3, although the opposite pairing has a lower total.
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(
            &mut tracker,
            &mut scene,
            &[det(0.0, 0.0, 0.0), det(3.0, 0.0, 0.0)],
            ms(0),
        );
        let a = *tracker.instances()[0].handle();
        let b = *tracker.instances()[1].handle();

        let up = step(
            &mut tracker,
            &mut scene,
            &[det(1.4, 0.0, 0.0), det(-10.0, 0.0, 0.0)],
            ms(30),
        );
        assert_eq!(up.updated.len(), 2);
        assert!(up.created.is_empty());
        let x_of = |h| scene.object(h).and_then(|o| o.transform).map(|t| t.position.x);
        assert_eq!(x_of(a), Some(1.4));
        assert_eq!(x_of(b), Some(-10.0));
    }

    #[test]
    fn equal_distances_go_to_oldest_instance() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(
            &mut tracker,
            &mut scene,
            &[det(-1.0, 0.0, 0.0), det(1.0, 0.0, 0.0)],
            ms(0),
        );
        let oldest = *tracker.instances()[0].handle();
        let up = step(&mut tracker, &mut scene, &[det(0.0, 0.0, 0.0)], ms(30));
        assert_eq!(up.updated, vec![oldest]);
    }

    #[test]
    fn missing_clock_starts_once_and_clears_on_match() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(&mut tracker, &mut scene, &[det(0.0, 0.0, 0.0)], ms(0));

        step(&mut tracker, &mut scene, &[], ms(40));
        assert_eq!(tracker.instances()[0].missing_since(), Some(ms(40)));
        assert!(!tracker.instances()[0].matched_this_frame());

        step(&mut tracker, &mut scene, &[], ms(80));
        assert_eq!(tracker.instances()[0].missing_since(), Some(ms(40)));

        step(&mut tracker, &mut scene, &[det(0.0, 0.0, 0.0)], ms(120));
        assert_eq!(tracker.instances()[0].missing_since(), None);
    }

    #[test]
    fn expired_instance_is_pruned_before_matching() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(&mut tracker, &mut scene, &[det(0.0, 0.0, 0.0)], ms(0));
        let old = *tracker.instances()[0].handle();
        step(&mut tracker, &mut scene, &[], ms(50));

        // 200 ms after going missing: the old object is gone and the new
        // detection gets a fresh one.
        let up = step(&mut tracker, &mut scene, &[det(0.0, 0.0, 0.0)], ms(250));
        assert_eq!(up.destroyed, vec![old]);
        assert_eq!(up.created.len(), 1);
        assert_ne!(up.created[0], old);
        assert!(scene.object(old).is_none());
    }

    #[test]
    fn foreign_ids_are_skipped() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        let other = Detection::new(ID + 1, Matrix4::identity());
        let up = step(&mut tracker, &mut scene, &[other], ms(0));
        assert!(up.is_empty());
        assert!(tracker.is_empty());
    }

    #[test]
    fn clear_destroys_everything() {
        let mut scene = RecordingScene::new();
        let mut tracker = MarkerTracker::new(ID);
        step(
            &mut tracker,
            &mut scene,
            &[det(0.0, 0.0, 0.0), det(1.0, 0.0, 0.0)],
            ms(0),
        );
        let released = tracker.clear(&mut scene);
        assert_eq!(released.len(), 2);
        assert_eq!(scene.live_count(), 0);
        assert!(tracker.is_empty());
    }
}
