//! JSON configuration and detection-log helpers.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ar_markers_tracker::{
    ConfigError, MarkerDefinition, MarkerDefinitions, MarkerId, ReconciliationDispatcher,
    Timestamp, TrackerParams,
};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::estimator::RawDetections;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_marker_size() -> f64 {
    1.0
}

fn default_dictionary() -> String {
    "DICT_6X6_250".to_string()
}

/// One row of the marker table as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub marker_id: MarkerId,
    #[serde(default)]
    pub prototype: Option<String>,
}

/// Tracking configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub markers: Vec<MarkerEntry>,
    #[serde(default)]
    pub tracker: TrackerParams,
    /// Side length of every printed marker, in scene units.
    #[serde(default = "default_marker_size")]
    pub marker_size: f64,
    /// Marker dictionary the markers were printed from. Informational: it is
    /// reported by `check-config`, the detector is configured separately.
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
}

impl TrackingConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check everything that does not depend on a scene.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build_definitions()?;
        self.tracker.validate()?;
        if !self.marker_size.is_finite() || self.marker_size <= 0.0 {
            return Err(ConfigError::InvalidMarkerSize(self.marker_size));
        }
        Ok(())
    }

    /// Build the marker definition table.
    pub fn build_definitions(&self) -> Result<MarkerDefinitions<String>, ConfigError> {
        let mut defs = Vec::with_capacity(self.markers.len());
        for entry in &self.markers {
            let prototype = match entry.prototype.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    return Err(ConfigError::MissingPrototype {
                        marker_id: entry.marker_id,
                    })
                }
            };
            defs.push(MarkerDefinition {
                marker_id: entry.marker_id,
                prototype,
            });
        }
        MarkerDefinitions::new(defs)
    }

    /// Validate the whole config and build a dispatcher from it.
    pub fn build_dispatcher(&self) -> Result<ReconciliationDispatcher<String>, ConfigError> {
        self.validate()?;
        ReconciliationDispatcher::new(self.build_definitions()?, self.tracker.clone())
    }
}

/// One frame of recorded estimator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedFrame {
    pub timestamp_s: f64,
    #[serde(default)]
    pub ids: Vec<MarkerId>,
    /// Row-major 4x4 poses, parallel to `ids`.
    #[serde(default)]
    pub poses: Vec<[[f64; 4]; 4]>,
}

impl LoggedFrame {
    /// Frame time, `None` if negative or not finite.
    pub fn timestamp(&self) -> Option<Timestamp> {
        Duration::try_from_secs_f64(self.timestamp_s).ok()
    }

    /// Convert to estimator output. Length mismatches are kept and reported
    /// when the frame is processed.
    pub fn to_raw(&self) -> RawDetections {
        RawDetections {
            ids: self.ids.clone(),
            poses: self
                .poses
                .iter()
                .map(|rows| Matrix4::from_row_slice(rows.as_flattened()))
                .collect(),
        }
    }
}

/// Recorded estimator output for a whole session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionLog {
    pub frames: Vec<LoggedFrame>,
}

impl DetectionLog {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> TrackingConfig {
        serde_json::from_str(json).expect("config json")
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let cfg = config(r#"{ "markers": [ { "marker_id": 5, "prototype": "cube" } ] }"#);
        assert_eq!(cfg.tracker, TrackerParams::default());
        assert_eq!(cfg.marker_size, 1.0);
        assert_eq!(cfg.dictionary, "DICT_6X6_250");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_or_blank_prototype_is_rejected() {
        let cfg = config(r#"{ "markers": [ { "marker_id": 3 } ] }"#);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MissingPrototype { marker_id: 3 })
        );

        let cfg = config(r#"{ "markers": [ { "marker_id": 4, "prototype": "  " } ] }"#);
        assert_eq!(
            cfg.build_definitions().err(),
            Some(ConfigError::MissingPrototype { marker_id: 4 })
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let cfg = config(
            r#"{ "markers": [
                { "marker_id": 1, "prototype": "a" },
                { "marker_id": 1, "prototype": "b" }
            ] }"#,
        );
        assert_eq!(
            cfg.build_dispatcher().err(),
            Some(ConfigError::DuplicateMarkerId { marker_id: 1 })
        );
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut cfg = config(r#"{ "markers": [] }"#);
        cfg.marker_size = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidMarkerSize(0.0)));

        cfg.marker_size = 1.0;
        cfg.tracker.grace_period_s = -1.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidGracePeriod(-1.0)));
    }

    #[test]
    fn logged_poses_are_row_major() {
        let frame = LoggedFrame {
            timestamp_s: 0.5,
            ids: vec![7],
            poses: vec![[
                [1.0, 0.0, 0.0, 0.1],
                [0.0, 1.0, 0.0, 0.2],
                [0.0, 0.0, 1.0, 0.3],
                [0.0, 0.0, 0.0, 1.0],
            ]],
        };
        let raw = frame.to_raw();
        assert_eq!(raw.ids, vec![7]);
        assert_eq!(raw.poses[0][(0, 3)], 0.1);
        assert_eq!(raw.poses[0][(1, 3)], 0.2);
        assert_eq!(raw.poses[0][(2, 3)], 0.3);
        assert_eq!(frame.timestamp(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn negative_timestamp_has_no_duration() {
        let frame = LoggedFrame {
            timestamp_s: -0.1,
            ids: Vec::new(),
            poses: Vec::new(),
        };
        assert_eq!(frame.timestamp(), None);
    }

    #[test]
    fn config_roundtrips_through_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.json");
        let cfg = config(r#"{ "markers": [ { "marker_id": 2, "prototype": "tree" } ] }"#);
        cfg.write_json(&path).expect("write");
        let loaded = TrackingConfig::load_json(&path).expect("load");
        assert_eq!(loaded, cfg);
    }
}
