pub mod agitator;
pub mod chassis;

pub use agitator::{AgitatorState, AgitatorSubsystem};
pub use chassis::{ChassisState, ChassisSubsystem, MotorPosition};

use core::fmt;
use serde::{Deserialize, Serialize};

pub const MAX_SUBSYSTEMS: usize = 8;

static_assertions::const_assert!(MAX_SUBSYSTEMS <= u8::MAX as usize);

/// Stable handle to a subsystem registered with a scheduler.
///
/// Only [`CommandScheduler::register_subsystem`](crate::scheduler::CommandScheduler::register_subsystem)
/// mints these, so every id indexes a live arena slot of the scheduler
/// that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SubsystemId(u8);

impl SubsystemId {
    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < MAX_SUBSYSTEMS, "subsystem index {} out of range", index);
        Self(index as u8)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsystem#{}", self.0)
    }
}

/// Degraded-state flag a subsystem exposes instead of failing its refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Health {
    #[default]
    Nominal,
    Degraded,
    Offline,
}

pub trait Subsystem {
    /// Identity of the subsystem. Two subsystems with the same name are the
    /// same subsystem as far as registration is concerned.
    fn name(&self) -> &str;

    /// Per-tick hardware update, called before any command executes.
    /// Faults are reported through [`Subsystem::health`], never by panicking.
    fn refresh(&mut self);

    /// Replaces [`Subsystem::refresh`] on ticks where the operator link is
    /// lost. Implementations drive their outputs to a safe state.
    fn refresh_safe_disconnect(&mut self) {
        self.refresh();
    }

    fn health(&self) -> Health {
        Health::Nominal
    }

    fn is_healthy(&self) -> bool {
        self.health() == Health::Nominal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsystemKind {
    Chassis,
    Agitator,
}

/// Every subsystem this robot is built from.
pub enum RobotSubsystem {
    Chassis(ChassisSubsystem),
    Agitator(AgitatorSubsystem),
}

impl RobotSubsystem {
    pub fn kind(&self) -> SubsystemKind {
        match self {
            RobotSubsystem::Chassis(_) => SubsystemKind::Chassis,
            RobotSubsystem::Agitator(_) => SubsystemKind::Agitator,
        }
    }

    pub fn as_chassis(&self) -> Option<&ChassisSubsystem> {
        match self {
            RobotSubsystem::Chassis(chassis) => Some(chassis),
            RobotSubsystem::Agitator(_) => None,
        }
    }

    pub fn as_chassis_mut(&mut self) -> Option<&mut ChassisSubsystem> {
        match self {
            RobotSubsystem::Chassis(chassis) => Some(chassis),
            RobotSubsystem::Agitator(_) => None,
        }
    }

    pub fn as_agitator(&self) -> Option<&AgitatorSubsystem> {
        match self {
            RobotSubsystem::Agitator(agitator) => Some(agitator),
            RobotSubsystem::Chassis(_) => None,
        }
    }

    pub fn as_agitator_mut(&mut self) -> Option<&mut AgitatorSubsystem> {
        match self {
            RobotSubsystem::Agitator(agitator) => Some(agitator),
            RobotSubsystem::Chassis(_) => None,
        }
    }

    fn inner(&self) -> &dyn Subsystem {
        match self {
            RobotSubsystem::Chassis(chassis) => chassis,
            RobotSubsystem::Agitator(agitator) => agitator,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Subsystem {
        match self {
            RobotSubsystem::Chassis(chassis) => chassis,
            RobotSubsystem::Agitator(agitator) => agitator,
        }
    }
}

impl fmt::Debug for RobotSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RobotSubsystem")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("health", &self.health())
            .finish()
    }
}

impl Subsystem for RobotSubsystem {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn refresh(&mut self) {
        self.inner_mut().refresh();
    }

    fn refresh_safe_disconnect(&mut self) {
        self.inner_mut().refresh_safe_disconnect();
    }

    fn health(&self) -> Health {
        self.inner().health()
    }
}

impl From<ChassisSubsystem> for RobotSubsystem {
    fn from(chassis: ChassisSubsystem) -> Self {
        RobotSubsystem::Chassis(chassis)
    }
}

impl From<AgitatorSubsystem> for RobotSubsystem {
    fn from(agitator: AgitatorSubsystem) -> Self {
        RobotSubsystem::Agitator(agitator)
    }
}
