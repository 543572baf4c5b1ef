use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

fn default_grace_period_s() -> f64 {
    0.2
}

/// Tracker tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerParams {
    /// How long an instance may stay unmatched before its object is destroyed.
    ///
    /// Absorbs single-frame detection dropouts.
    #[serde(default = "default_grace_period_s")]
    pub grace_period_s: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            grace_period_s: default_grace_period_s(),
        }
    }
}

impl TrackerParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grace_period_s.is_finite() || self.grace_period_s < 0.0 {
            return Err(ConfigError::InvalidGracePeriod(self.grace_period_s));
        }
        Ok(())
    }

    /// Grace period as a duration. Call [`TrackerParams::validate`] first.
    #[inline]
    pub fn grace_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.grace_period_s).unwrap_or(Duration::ZERO)
    }
}
