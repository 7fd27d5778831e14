//! # Command-based robot control
//!
//! A tick-driven command scheduler for small robots. Hardware-facing
//! subsystems are owned by the scheduler; commands claim the subsystems they
//! require and drive them one control period at a time.
//!
//! ## Features
//!
//! - **Single-writer ownership**: a subsystem is written by at most one
//!   running command per tick
//! - **Interruption policy**: commands choose whether newcomers may cancel them
//! - **Default commands**: idle subsystems fall back to a registered default
//! - **Remote mappings**: switch positions on the operator remote schedule commands
//! - **Safe disconnect**: losing the remote link cancels everything and zeroes outputs
//! - **Embedded-friendly**: bounded command and subsystem tables; rejections carry handles, not strings
//!
//! ## Quick Start
//!
//! ```rust
//! use cmdrobot::hal::SimMotor;
//! use cmdrobot::remote::ScriptedRemote;
//! use cmdrobot::{Drivers, Robot, RobotConfig};
//!
//! let drivers = Drivers {
//!     remote: Box::new(ScriptedRemote::new()),
//!     chassis_motors: [
//!         SimMotor::new().boxed(),
//!         SimMotor::new().boxed(),
//!         SimMotor::new().boxed(),
//!         SimMotor::new().boxed(),
//!     ],
//!     agitator_motor: SimMotor::new().boxed(),
//! };
//!
//! let mut robot = Robot::new(drivers, RobotConfig::default()).unwrap();
//! robot.init_subsystem_commands().unwrap();
//!
//! // The scripted remote starts disconnected, so this tick holds outputs safe.
//! robot.tick().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - [`subsystems`] - Hardware-facing subsystems and the [`Subsystem`] trait
//! - [`command`] - The [`Command`] trait and its execution context
//! - [`scheduler`] - Ownership, interruption and default promotion
//! - [`operator_interface`] - Normalized remote inputs
//! - [`command_mapper`] - Switch-to-command bindings
//! - [`robot`] - Top-level wiring and the control tick

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::new_without_default)]

extern crate alloc;

pub mod command;
pub mod command_mapper;
pub mod commands;
pub mod config;
pub mod fault;
pub mod hal;
pub mod operator_interface;
pub mod remote;
pub mod robot;
pub mod scheduler;
pub mod subsystems;

// Re-export main public types for convenience
pub use command::{Command, CommandContext, CommandId, CommandState, InterruptionBehavior, RequirementSet};
pub use config::{ConfigError, RobotConfig};
pub use operator_interface::OperatorInterface;
pub use robot::{Drivers, Robot, RobotError, RobotHandles, RobotScheduler};
pub use scheduler::{CommandScheduler, SchedulerError, SchedulerStats, TickReport};
pub use subsystems::{Health, RobotSubsystem, Subsystem, SubsystemId};
