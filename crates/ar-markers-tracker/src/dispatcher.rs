//! Routing of a frame's detections to the per-id trackers.

use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    ConfigError, Detection, MarkerDefinitions, MarkerId, MarkerTracker, PartitionUpdate,
    SceneBinder, Timestamp, TrackerParams,
};

/// All tracked instances, partitioned by marker id.
///
/// Owned by the caller and handed to [`ReconciliationDispatcher::dispatch`]
/// once per frame; nothing else mutates it.
#[derive(Clone, Debug)]
pub struct TrackedInstances<H> {
    partitions: BTreeMap<MarkerId, MarkerTracker<H>>,
}

impl<H> Default for TrackedInstances<H> {
    fn default() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }
}

impl<H: Clone + std::fmt::Debug> TrackedInstances<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(&self, marker_id: MarkerId) -> Option<&MarkerTracker<H>> {
        self.partitions.get(&marker_id)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &MarkerTracker<H>> {
        self.partitions.values()
    }

    /// Total number of live instances across all ids.
    pub fn len(&self) -> usize {
        self.partitions.values().map(MarkerTracker::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy every live object and forget all instances.
    pub fn clear<B>(&mut self, binder: &mut B) -> Vec<H>
    where
        B: SceneBinder<Handle = H>,
    {
        let released: Vec<H> = self
            .partitions
            .values_mut()
            .flat_map(|tracker| tracker.clear(binder))
            .collect();
        self.partitions.clear();
        released
    }
}

/// Everything that changed during one frame.
#[derive(Clone, Debug)]
pub struct FrameReport<H> {
    pub timestamp: Timestamp,
    /// One entry per configured marker id, in definition order.
    pub partitions: Vec<PartitionUpdate<H>>,
    /// Detections whose marker id has no definition.
    pub ignored_detections: usize,
}

impl<H> FrameReport<H> {
    pub fn created(&self) -> impl Iterator<Item = &H> {
        self.partitions.iter().flat_map(|p| p.created.iter())
    }

    pub fn updated(&self) -> impl Iterator<Item = &H> {
        self.partitions.iter().flat_map(|p| p.updated.iter())
    }

    pub fn destroyed(&self) -> impl Iterator<Item = &H> {
        self.partitions.iter().flat_map(|p| p.destroyed.iter())
    }

    pub fn partition(&self, marker_id: MarkerId) -> Option<&PartitionUpdate<H>> {
        self.partitions.iter().find(|p| p.marker_id == marker_id)
    }
}

/// Splits detections by marker id and runs one tracker update per definition.
#[derive(Clone, Debug)]
pub struct ReconciliationDispatcher<P> {
    definitions: MarkerDefinitions<P>,
    params: TrackerParams,
}

impl<P> ReconciliationDispatcher<P> {
    pub fn new(
        definitions: MarkerDefinitions<P>,
        params: TrackerParams,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self {
            definitions,
            params,
        })
    }

    pub fn definitions(&self) -> &MarkerDefinitions<P> {
        &self.definitions
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Run one frame.
    ///
    /// Every configured id is updated, including ids without detections, so
    /// their instances keep aging. Detections within an id keep their input
    /// order, which decides greedy matching priority.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip_all,
            fields(t = now.as_secs_f64(), detections = detections.len())
        )
    )]
    pub fn dispatch<B>(
        &self,
        instances: &mut TrackedInstances<B::Handle>,
        detections: &[Detection],
        now: Timestamp,
        binder: &mut B,
    ) -> FrameReport<B::Handle>
    where
        B: SceneBinder<Prototype = P>,
    {
        let mut groups: BTreeMap<MarkerId, Vec<Detection>> = BTreeMap::new();
        for det in detections {
            groups.entry(det.marker_id).or_default().push(*det);
        }

        let mut partitions = Vec::with_capacity(self.definitions.len());
        for def in self.definitions.iter() {
            let group = groups.remove(&def.marker_id).unwrap_or_default();
            let tracker = instances
                .partitions
                .entry(def.marker_id)
                .or_insert_with(|| MarkerTracker::new(def.marker_id));
            partitions.push(tracker.update(&def.prototype, &group, now, &self.params, binder));
        }

        let ignored_detections: usize = groups.values().map(Vec::len).sum();
        if ignored_detections > 0 {
            log::debug!(
                "ignored {} detection(s) of unconfigured marker ids {:?}",
                ignored_detections,
                groups.keys().collect::<Vec<_>>()
            );
        }

        FrameReport {
            timestamp: now,
            partitions,
            ignored_detections,
        }
    }
}
