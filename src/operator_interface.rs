//! Maps raw remote samples to the normalized signals commands read.

use crate::remote::{Channel, RemoteSnapshot, Switch, SwitchState, CHANNEL_MAX};

/// Clamp `value` to `[-1, 1]` and zero anything inside the deadband.
pub fn apply_deadband(value: f32, deadband: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    let value = value.clamp(-1.0, 1.0);
    if value.abs() < deadband {
        0.0
    } else {
        value
    }
}

/// Raw channel units to `[-1, 1]`.
pub fn normalize_channel(raw: i16) -> f32 {
    f32::from(raw) / f32::from(CHANNEL_MAX)
}

/// Holds the snapshot sampled this tick. Every getter is a pure function of
/// that snapshot and the deadband; nothing carries over between ticks.
#[derive(Debug, Clone)]
pub struct OperatorInterface {
    snapshot: RemoteSnapshot,
    deadband: f32,
}

impl OperatorInterface {
    pub fn new(deadband: f32) -> Self {
        Self {
            snapshot: RemoteSnapshot::default(),
            deadband: deadband.clamp(0.0, 1.0),
        }
    }

    pub fn update(&mut self, snapshot: RemoteSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &RemoteSnapshot {
        &self.snapshot
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.connected
    }

    pub fn deadband(&self) -> f32 {
        self.deadband
    }

    /// Normalized channel value; `0.0` while the remote is disconnected.
    pub fn channel(&self, channel: Channel) -> f32 {
        if !self.snapshot.connected {
            return 0.0;
        }
        apply_deadband(normalize_channel(self.snapshot.channel(channel)), self.deadband)
    }

    /// Switches read `Mid` while the remote is disconnected.
    pub fn switch(&self, switch: Switch) -> SwitchState {
        if !self.snapshot.connected {
            return SwitchState::Mid;
        }
        self.snapshot.switch(switch)
    }

    pub fn chassis_tank_left_input(&self) -> f32 {
        self.channel(Channel::LeftVertical)
    }

    pub fn chassis_tank_right_input(&self) -> f32 {
        self.channel(Channel::RightVertical)
    }
}

impl Default for OperatorInterface {
    fn default() -> Self {
        Self::new(0.0)
    }
}
