use super::{Health, Subsystem};
use crate::hal::{MotorDriver, MOTOR_OUTPUT_LIMIT};
use serde::{Deserialize, Serialize};

pub const AGITATOR_NAME: &str = "agitator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgitatorState {
    pub desired_output: i16,
    pub shaft_rpm: i16,
    pub health: Health,
}

/// Single-motor projectile feeder.
pub struct AgitatorSubsystem {
    motor: Box<dyn MotorDriver>,
    desired_output: i16,
    shaft_rpm: i16,
    health: Health,
}

impl AgitatorSubsystem {
    pub fn new(motor: Box<dyn MotorDriver>) -> Self {
        Self {
            motor,
            desired_output: 0,
            shaft_rpm: 0,
            health: Health::Nominal,
        }
    }

    pub fn set_desired_output(&mut self, output: i16) {
        self.desired_output = output.clamp(-MOTOR_OUTPUT_LIMIT, MOTOR_OUTPUT_LIMIT);
    }

    pub fn desired_output(&self) -> i16 {
        self.desired_output
    }

    /// Speed sampled during the last refresh.
    pub fn shaft_rpm(&self) -> i16 {
        self.shaft_rpm
    }

    pub fn get_state(&self) -> AgitatorState {
        AgitatorState {
            desired_output: self.desired_output,
            shaft_rpm: self.shaft_rpm,
            health: self.health,
        }
    }
}

impl Subsystem for AgitatorSubsystem {
    fn name(&self) -> &str {
        AGITATOR_NAME
    }

    fn refresh(&mut self) {
        if self.motor.is_online() {
            self.motor.set_desired_output(self.desired_output);
            self.shaft_rpm = self.motor.shaft_rpm();
            self.health = Health::Nominal;
        } else {
            self.shaft_rpm = 0;
            self.health = Health::Offline;
        }
    }

    fn refresh_safe_disconnect(&mut self) {
        self.desired_output = 0;
        self.refresh();
    }

    fn health(&self) -> Health {
        self.health
    }
}
