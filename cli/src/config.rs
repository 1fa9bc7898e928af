//! Run configuration for the CLI
//!
//! One JSON document with three optional sections:
//!
//! ```json
//! {
//!   "simulator": { "horizon": 8760.0 },
//!   "problem": { "seed": 7, "intake_staff": 3 },
//!   "planner": { "type": "slot", "lead": 24.0, "capacity": 2 }
//! }
//! ```
//!
//! Missing sections and fields fall back to their defaults.

use case_sim_core::{HealthcareConfig, PlannerConfig, ProblemError, SimulationError, SimulatorConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Problem(#[from] ProblemError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub simulator: SimulatorConfig,
    pub problem: HealthcareConfig,
    pub planner: PlannerConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// SHA-256 of the canonical JSON rendering, hex encoded.
    ///
    /// Two runs with the same fingerprint use identical settings.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }
}
