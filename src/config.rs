// Console configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

// Which existing reservations block a new booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    // Every reservation blocks its window, cancelled and completed ones included
    #[default]
    AllReservations,
    ActiveOnly,
}

// Whether a route may claim a driver or vehicle that is already busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    #[default]
    RequireAvailable,
    Permissive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub conflict_policy: ConflictPolicy,
    pub assignment_policy: AssignmentPolicy,
}

impl ConsoleConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
