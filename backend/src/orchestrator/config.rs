//! Simulator configuration

use crate::core::time::SimTime;
use crate::orchestrator::engine::SimulationError;
use serde::{Deserialize, Serialize};

/// Kernel settings, independent of the problem being simulated
///
/// # Example
/// ```
/// use case_sim_core::orchestrator::SimulatorConfig;
///
/// let config = SimulatorConfig {
///     horizon: 24.0 * 7.0,
///     ..SimulatorConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Events after this moment are not dispatched (hours)
    pub horizon: SimTime,

    /// Period of the resource calendar check
    pub resource_check_interval: SimTime,

    /// Keep task intervals and event completions
    pub record_history: bool,

    /// Keep the dispatched-event log (needed for digests)
    pub record_event_log: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            horizon: 24.0 * 365.0,
            resource_check_interval: 1.0,
            record_history: true,
            record_event_log: true,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.horizon.is_finite() || self.horizon < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "horizon must be finite and >= 0, got {}",
                self.horizon
            )));
        }

        if !self.resource_check_interval.is_finite() || self.resource_check_interval <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "resource_check_interval must be > 0, got {}",
                self.resource_check_interval
            )));
        }

        Ok(())
    }
}
