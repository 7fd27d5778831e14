//! Raw operator input as delivered by the remote transport.
//!
//! The layout follows a DR16-style receiver: four stick channels and a
//! wheel reporting raw values in `[-CHANNEL_MAX, CHANNEL_MAX]`, plus two
//! three-position switches.

use heapless::Deque;
use serde::{Deserialize, Serialize};

/// Full-scale magnitude of a raw stick channel.
pub const CHANNEL_MAX: i16 = 660;

const MAX_SCRIPTED_SNAPSHOTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    RightHorizontal,
    RightVertical,
    LeftHorizontal,
    LeftVertical,
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Switch {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwitchState {
    Up,
    #[default]
    Mid,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub connected: bool,
    pub right_horizontal: i16,
    pub right_vertical: i16,
    pub left_horizontal: i16,
    pub left_vertical: i16,
    pub wheel: i16,
    pub left_switch: SwitchState,
    pub right_switch: SwitchState,
}

impl RemoteSnapshot {
    /// A connected remote with centered sticks and both switches in `Mid`.
    pub fn neutral() -> Self {
        Self {
            connected: true,
            ..Self::default()
        }
    }

    pub fn channel(&self, channel: Channel) -> i16 {
        match channel {
            Channel::RightHorizontal => self.right_horizontal,
            Channel::RightVertical => self.right_vertical,
            Channel::LeftHorizontal => self.left_horizontal,
            Channel::LeftVertical => self.left_vertical,
            Channel::Wheel => self.wheel,
        }
    }

    pub fn switch(&self, switch: Switch) -> SwitchState {
        match switch {
            Switch::Left => self.left_switch,
            Switch::Right => self.right_switch,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: Channel, value: i16) -> Self {
        let slot = match channel {
            Channel::RightHorizontal => &mut self.right_horizontal,
            Channel::RightVertical => &mut self.right_vertical,
            Channel::LeftHorizontal => &mut self.left_horizontal,
            Channel::LeftVertical => &mut self.left_vertical,
            Channel::Wheel => &mut self.wheel,
        };
        *slot = value;
        self
    }

    #[must_use]
    pub fn with_switch(mut self, switch: Switch, state: SwitchState) -> Self {
        match switch {
            Switch::Left => self.left_switch = state,
            Switch::Right => self.right_switch = state,
        }
        self
    }
}

/// Opaque remote/joystick link, sampled once per tick.
pub trait RemoteTransport {
    /// Latest decoded frame. A lost link reports `connected: false`.
    fn read(&mut self) -> RemoteSnapshot;
}

/// Replays a fixed sequence of snapshots, then keeps repeating the last one.
#[derive(Debug, Clone)]
pub struct ScriptedRemote {
    frames: Deque<RemoteSnapshot, MAX_SCRIPTED_SNAPSHOTS>,
    last: RemoteSnapshot,
}

impl ScriptedRemote {
    /// Starts out disconnected until the first pushed frame is read.
    pub fn new() -> Self {
        Self {
            frames: Deque::new(),
            last: RemoteSnapshot::default(),
        }
    }

    /// Queue a frame; returns it back if the script is full.
    pub fn push(&mut self, snapshot: RemoteSnapshot) -> Result<(), RemoteSnapshot> {
        self.frames.push_back(snapshot)
    }

    pub fn pending(&self) -> usize {
        self.frames.len()
    }
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransport for ScriptedRemote {
    fn read(&mut self) -> RemoteSnapshot {
        if let Some(next) = self.frames.pop_front() {
            self.last = next;
        }
        self.last
    }
}
