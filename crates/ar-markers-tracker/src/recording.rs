//! In-memory scene used for replays and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ar_markers_core::ObjectTransform;
use serde::{Deserialize, Serialize};

use crate::SceneBinder;

/// Handle of an object in a [`RecordingScene`]. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A live object in a [`RecordingScene`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub prototype: String,
    /// Last transform pushed by the tracker.
    pub transform: Option<ObjectTransform>,
    /// Number of transform updates received, including the initial one.
    pub moves: usize,
}

/// Scene binder that records objects and their transforms in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingScene {
    catalogue: Option<BTreeSet<String>>,
    objects: BTreeMap<ObjectId, SceneObject>,
    next_id: u64,
    instantiated: usize,
    destroyed: usize,
}

impl RecordingScene {
    /// Scene accepting any prototype name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene that can only instantiate the listed prototypes.
    pub fn with_prototypes<I, S>(prototypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            catalogue: Some(prototypes.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Live objects ordered by creation.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn live_count(&self) -> usize {
        self.objects.len()
    }

    /// Total number of objects ever instantiated.
    pub fn instantiated_count(&self) -> usize {
        self.instantiated
    }

    /// Total number of objects ever destroyed.
    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }
}

impl SceneBinder for RecordingScene {
    type Prototype = String;
    type Handle = ObjectId;

    fn has_prototype(&self, prototype: &String) -> bool {
        !prototype.is_empty()
            && self
                .catalogue
                .as_ref()
                .is_none_or(|names| names.contains(prototype))
    }

    fn instantiate(&mut self, prototype: &String) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.instantiated += 1;
        self.objects.insert(
            id,
            SceneObject {
                prototype: prototype.clone(),
                transform: None,
                moves: 0,
            },
        );
        id
    }

    fn set_transform(&mut self, handle: &ObjectId, transform: &ObjectTransform) {
        match self.objects.get_mut(handle) {
            Some(obj) => {
                obj.transform = Some(*transform);
                obj.moves += 1;
            }
            None => log::warn!("set_transform on unknown object {handle}"),
        }
    }

    fn destroy(&mut self, handle: ObjectId) {
        if self.objects.remove(&handle).is_some() {
            self.destroyed += 1;
        } else {
            log::warn!("destroy of unknown object {handle}");
        }
    }
}
