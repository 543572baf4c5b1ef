use crate::MarkerId;

/// Configuration problems detected before the first frame is processed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("marker id {marker_id} is defined more than once")]
    DuplicateMarkerId { marker_id: MarkerId },
    #[error("marker id {marker_id} has no prototype")]
    MissingPrototype { marker_id: MarkerId },
    #[error("marker id {marker_id} references a prototype the scene cannot instantiate")]
    UnknownPrototype { marker_id: MarkerId },
    #[error("grace period must be finite and >= 0 seconds (got {0})")]
    InvalidGracePeriod(f64),
    #[error("marker size must be finite and > 0 (got {0})")]
    InvalidMarkerSize(f64),
}
