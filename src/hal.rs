//! Hardware capabilities consumed by subsystems.
//!
//! Subsystems never instantiate drivers. They receive a [`MotorDriver`]
//! per actuator at construction and only talk to hardware through it.
//! [`SimMotor`] is the host-side implementation used by the simulator and
//! the tests.

use alloc::rc::Rc;
use core::cell::RefCell;
use serde::{Deserialize, Serialize};

/// Largest magnitude a motor controller accepts as a desired output.
pub const MOTOR_OUTPUT_LIMIT: i16 = 16384;

/// An opaque motor controller channel.
pub trait MotorDriver {
    /// Command the controller. Values are clamped to [`MOTOR_OUTPUT_LIMIT`]
    /// by the driver.
    fn set_desired_output(&mut self, output: i16);

    /// `false` once the controller stopped reporting feedback.
    fn is_online(&self) -> bool;

    fn shaft_rpm(&self) -> i16 {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimMotorState {
    pub online: bool,
    pub output: i16,
    pub shaft_rpm: i16,
    pub write_count: u32,
}

impl Default for SimMotorState {
    fn default() -> Self {
        Self {
            online: true,
            output: 0,
            shaft_rpm: 0,
            write_count: 0,
        }
    }
}

/// Simulated motor. Clones share state, so a test can keep one handle
/// while the subsystem drives the other.
#[derive(Debug, Clone, Default)]
pub struct SimMotor {
    state: Rc<RefCell<SimMotorState>>,
}

impl SimMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.state.borrow_mut().online = online;
    }

    pub fn last_output(&self) -> i16 {
        self.state.borrow().output
    }

    pub fn write_count(&self) -> u32 {
        self.state.borrow().write_count
    }

    pub fn get_state(&self) -> SimMotorState {
        *self.state.borrow()
    }

    /// Boxed handle sharing this motor's state, ready to hand to a subsystem.
    pub fn boxed(&self) -> Box<dyn MotorDriver> {
        Box::new(self.clone())
    }
}

impl MotorDriver for SimMotor {
    fn set_desired_output(&mut self, output: i16) {
        let mut state = self.state.borrow_mut();
        state.output = output.clamp(-MOTOR_OUTPUT_LIMIT, MOTOR_OUTPUT_LIMIT);
        // Crude first-order response: a free-spinning M3508 reaches roughly
        // 0.5 rpm per unit of output.
        state.shaft_rpm = state.output / 2;
        state.write_count = state.write_count.wrapping_add(1);
    }

    fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    fn shaft_rpm(&self) -> i16 {
        let state = self.state.borrow();
        if state.online {
            state.shaft_rpm
        } else {
            0
        }
    }
}
