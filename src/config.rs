//! Robot tuning loaded from JSON. Every field has a default, so an empty
//! object is a valid configuration.

use crate::hal::MOTOR_OUTPUT_LIMIT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("control period must be between 1 and 1000 ms, got {0}")]
    InvalidPeriod(u32),

    #[error("remote deadband must be within [0, 1), got {0}")]
    InvalidDeadband(f32),

    #[error("`{field}` = {value} exceeds motor output limit {limit}", limit = MOTOR_OUTPUT_LIMIT)]
    InvalidOutput { field: &'static str, value: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Time between scheduler ticks.
    pub control_period_ms: u32,
    /// Stick values below this magnitude read as zero.
    pub remote_deadband: f32,
    /// Chassis motor output at full stick deflection.
    pub chassis_max_output: i16,
    pub agitator_rotate_output: i16,
    pub agitator_unjam_output: i16,
    /// Length of one unjam cycle, in ticks.
    pub agitator_unjam_ticks: u32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            control_period_ms: 2,
            remote_deadband: 0.05,
            chassis_max_output: 16000,
            agitator_rotate_output: 3000,
            agitator_unjam_output: -3000,
            agitator_unjam_ticks: 250,
        }
    }
}

impl RobotConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.control_period_ms) {
            return Err(ConfigError::InvalidPeriod(self.control_period_ms));
        }
        if !(0.0..1.0).contains(&self.remote_deadband) {
            return Err(ConfigError::InvalidDeadband(self.remote_deadband));
        }

        let outputs = [
            ("chassis_max_output", self.chassis_max_output),
            ("agitator_rotate_output", self.agitator_rotate_output),
            ("agitator_unjam_output", self.agitator_unjam_output),
        ];
        for (field, value) in outputs {
            let value = i32::from(value);
            if value.abs() > i32::from(MOTOR_OUTPUT_LIMIT) {
                return Err(ConfigError::InvalidOutput { field, value });
            }
        }
        if self.chassis_max_output < 0 {
            return Err(ConfigError::InvalidOutput {
                field: "chassis_max_output",
                value: i32::from(self.chassis_max_output),
            });
        }
        Ok(())
    }
}
