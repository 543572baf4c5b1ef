use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, MarkerId, SceneBinder};

/// Which prototype to instantiate for a logical marker id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerDefinition<P> {
    pub marker_id: MarkerId,
    pub prototype: P,
}

/// Validated, immutable table of marker definitions.
#[derive(Clone, Debug)]
pub struct MarkerDefinitions<P> {
    entries: Vec<MarkerDefinition<P>>,
}

impl<P> MarkerDefinitions<P> {
    /// Validate a definition table. Marker ids must be unique.
    pub fn new(entries: Vec<MarkerDefinition<P>>) -> Result<Self, ConfigError> {
        let mut seen = BTreeSet::new();
        for def in &entries {
            if !seen.insert(def.marker_id) {
                return Err(ConfigError::DuplicateMarkerId {
                    marker_id: def.marker_id,
                });
            }
        }
        if entries.is_empty() {
            log::warn!("marker definition table is empty; nothing will be tracked");
        }
        Ok(Self { entries })
    }

    /// Check that every prototype can be instantiated by `binder`.
    pub fn validate_prototypes<B>(&self, binder: &B) -> Result<(), ConfigError>
    where
        B: SceneBinder<Prototype = P>,
    {
        match self
            .entries
            .iter()
            .find(|def| !binder.has_prototype(&def.prototype))
        {
            Some(def) => Err(ConfigError::UnknownPrototype {
                marker_id: def.marker_id,
            }),
            None => Ok(()),
        }
    }

    pub fn get(&self, marker_id: MarkerId) -> Option<&MarkerDefinition<P>> {
        self.entries.iter().find(|def| def.marker_id == marker_id)
    }

    pub fn contains(&self, marker_id: MarkerId) -> bool {
        self.get(marker_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarkerDefinition<P>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
