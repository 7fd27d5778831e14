//! Commands the robot binds to its subsystems and remote.

pub mod agitator;
pub mod chassis_tank_drive;

pub use agitator::{RotateAgitatorCommand, UnjamAgitatorCommand};
pub use chassis_tank_drive::ChassisTankDriveCommand;

use crate::command::Command;
use crate::operator_interface::OperatorInterface;
use crate::subsystems::RobotSubsystem;

/// Command type the robot's scheduler runs.
pub type RobotCommand = dyn Command<RobotSubsystem, OperatorInterface>;
