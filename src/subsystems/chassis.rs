use super::{Health, Subsystem};
use crate::hal::{MotorDriver, MOTOR_OUTPUT_LIMIT};
use serde::{Deserialize, Serialize};

pub const CHASSIS_NAME: &str = "chassis";

pub const MOTOR_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorPosition {
    LeftFront,
    LeftBack,
    RightFront,
    RightBack,
}

impl MotorPosition {
    pub const ALL: [MotorPosition; MOTOR_COUNT] = [
        MotorPosition::LeftFront,
        MotorPosition::LeftBack,
        MotorPosition::RightFront,
        MotorPosition::RightBack,
    ];

    fn index(self) -> usize {
        self as usize
    }

    // Right-side motors are mounted mirrored.
    fn is_inverted(self) -> bool {
        matches!(self, MotorPosition::RightFront | MotorPosition::RightBack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisState {
    pub desired_output: [i16; MOTOR_COUNT],
    pub online_motors: u8,
    pub health: Health,
}

/// Four-wheel tank drive.
pub struct ChassisSubsystem {
    motors: [Box<dyn MotorDriver>; MOTOR_COUNT],
    desired_output: [i16; MOTOR_COUNT],
    max_output: i16,
    online_motors: u8,
    health: Health,
}

impl ChassisSubsystem {
    /// `motors` is indexed by [`MotorPosition`] order.
    pub fn new(motors: [Box<dyn MotorDriver>; MOTOR_COUNT], max_output: i16) -> Self {
        Self {
            motors,
            desired_output: [0; MOTOR_COUNT],
            max_output: max_output.clamp(0, MOTOR_OUTPUT_LIMIT),
            online_motors: MOTOR_COUNT as u8,
            health: Health::Nominal,
        }
    }

    /// Tank drive inputs in `[-1, 1]`; out-of-range values are clamped.
    pub fn set_desired_output(&mut self, left: f32, right: f32) {
        let left = self.scale(left);
        let right = self.scale(right);

        for position in MotorPosition::ALL {
            let side = match position {
                MotorPosition::LeftFront | MotorPosition::LeftBack => left,
                MotorPosition::RightFront | MotorPosition::RightBack => right,
            };
            self.desired_output[position.index()] = if position.is_inverted() { -side } else { side };
        }
    }

    pub fn stop(&mut self) {
        self.desired_output = [0; MOTOR_COUNT];
    }

    pub fn desired_output(&self, position: MotorPosition) -> i16 {
        self.desired_output[position.index()]
    }

    pub fn max_output(&self) -> i16 {
        self.max_output
    }

    pub fn get_state(&self) -> ChassisState {
        ChassisState {
            desired_output: self.desired_output,
            online_motors: self.online_motors,
            health: self.health,
        }
    }

    fn scale(&self, input: f32) -> i16 {
        if input.is_nan() {
            return 0;
        }
        (input.clamp(-1.0, 1.0) * f32::from(self.max_output)).round() as i16
    }

    fn write_outputs(&mut self) {
        let mut online = 0u8;
        for (motor, &output) in self.motors.iter_mut().zip(self.desired_output.iter()) {
            if motor.is_online() {
                motor.set_desired_output(output);
                online += 1;
            }
        }

        self.online_motors = online;
        self.health = match online {
            0 => Health::Offline,
            n if usize::from(n) == MOTOR_COUNT => Health::Nominal,
            _ => Health::Degraded,
        };
    }
}

impl Subsystem for ChassisSubsystem {
    fn name(&self) -> &str {
        CHASSIS_NAME
    }

    fn refresh(&mut self) {
        self.write_outputs();
    }

    fn refresh_safe_disconnect(&mut self) {
        self.stop();
        self.write_outputs();
    }

    fn health(&self) -> Health {
        self.health
    }
}
