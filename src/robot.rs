//! Top-level wiring: hardware drivers in, one control tick out.

use crate::command::CommandId;
use crate::command_mapper::{CommandMapper, MapperError, MappingKind, RemoteMapState};
use crate::commands::{ChassisTankDriveCommand, RobotCommand, RotateAgitatorCommand, UnjamAgitatorCommand};
use crate::config::{ConfigError, RobotConfig};
use crate::fault::FaultLog;
use crate::hal::MotorDriver;
use crate::operator_interface::OperatorInterface;
use crate::remote::{RemoteTransport, Switch, SwitchState};
use crate::scheduler::{CommandScheduler, SchedulerError, TickReport};
use crate::subsystems::chassis::MOTOR_COUNT;
use crate::subsystems::{AgitatorSubsystem, ChassisSubsystem, RobotSubsystem, Subsystem, SubsystemId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub type RobotScheduler = CommandScheduler<RobotSubsystem, OperatorInterface>;

#[derive(Debug, Error)]
pub enum RobotError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mapping(#[from] MapperError),

    #[error("subsystems and commands are already initialized")]
    AlreadyInitialized,

    #[error("tick before subsystems and commands were initialized")]
    NotInitialized,

    #[error("an earlier initialization attempt failed; subsystems are no longer available")]
    WiringFailed,
}

impl RobotError {
    pub fn is_fatal(&self) -> bool {
        match self {
            RobotError::Scheduler(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Hardware handed to the robot at construction.
pub struct Drivers {
    pub remote: Box<dyn RemoteTransport>,
    pub chassis_motors: [Box<dyn MotorDriver>; MOTOR_COUNT],
    pub agitator_motor: Box<dyn MotorDriver>,
}

/// Handles minted by [`Robot::init_subsystem_commands`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobotHandles {
    pub chassis: SubsystemId,
    pub agitator: SubsystemId,
    pub tank_drive: CommandId,
    pub rotate_agitator: CommandId,
    pub unjam_agitator: CommandId,
}

pub struct Robot {
    config: RobotConfig,
    remote: Box<dyn RemoteTransport>,
    operator_interface: OperatorInterface,
    scheduler: RobotScheduler,
    mapper: CommandMapper,
    faults: FaultLog,
    pending: Option<(ChassisSubsystem, AgitatorSubsystem)>,
    handles: Option<RobotHandles>,
    tick_count: u64,
}

impl Robot {
    pub fn new(drivers: Drivers, config: RobotConfig) -> Result<Self, RobotError> {
        config.validate()?;

        let Drivers {
            remote,
            chassis_motors,
            agitator_motor,
        } = drivers;

        let chassis = ChassisSubsystem::new(chassis_motors, config.chassis_max_output);
        let agitator = AgitatorSubsystem::new(agitator_motor);

        Ok(Self {
            operator_interface: OperatorInterface::new(config.remote_deadband),
            config,
            remote,
            scheduler: CommandScheduler::new(),
            mapper: CommandMapper::new(),
            faults: FaultLog::new(),
            pending: Some((chassis, agitator)),
            handles: None,
            tick_count: 0,
        })
    }

    /// Register subsystems, commands, defaults and remote mappings, then
    /// close the wiring phase. Runs once.
    ///
    /// The subsystems are handed to the scheduler on the first call, so a
    /// failed attempt cannot be retried and later calls return
    /// [`RobotError::WiringFailed`].
    pub fn init_subsystem_commands(&mut self) -> Result<RobotHandles, RobotError> {
        let Some((chassis, agitator)) = self.pending.take() else {
            return Err(if self.handles.is_some() {
                RobotError::AlreadyInitialized
            } else {
                RobotError::WiringFailed
            });
        };

        match self.wire(chassis, agitator) {
            Ok(handles) => {
                self.handles = Some(handles);
                Ok(handles)
            }
            Err(e) => {
                error!(error = %e, "robot wiring failed");
                Err(e)
            }
        }
    }

    fn wire(&mut self, chassis: ChassisSubsystem, agitator: AgitatorSubsystem) -> Result<RobotHandles, RobotError> {
        let chassis = self.scheduler.register_subsystem(chassis.into())?;
        let agitator = self.scheduler.register_subsystem(agitator.into())?;

        let tank_drive: Box<RobotCommand> = Box::new(ChassisTankDriveCommand::new(chassis));
        let rotate_agitator: Box<RobotCommand> =
            Box::new(RotateAgitatorCommand::new(agitator, self.config.agitator_rotate_output));
        let unjam_agitator: Box<RobotCommand> = Box::new(UnjamAgitatorCommand::new(
            agitator,
            self.config.agitator_unjam_output,
            self.config.agitator_unjam_ticks,
        ));

        let tank_drive = self.scheduler.register_command(tank_drive)?;
        let rotate_agitator = self.scheduler.register_command(rotate_agitator)?;
        let unjam_agitator = self.scheduler.register_command(unjam_agitator)?;

        self.scheduler.set_default_command(chassis, tank_drive)?;

        self.mapper.add_mapping(
            RemoteMapState::switch(Switch::Right, SwitchState::Up),
            MappingKind::Hold,
            rotate_agitator,
        )?;
        self.mapper.add_mapping(
            RemoteMapState::switch(Switch::Right, SwitchState::Down),
            MappingKind::Press,
            unjam_agitator,
        )?;

        self.scheduler.finish_wiring();

        let handles = RobotHandles {
            chassis,
            agitator,
            tank_drive,
            rotate_agitator,
            unjam_agitator,
        };
        info!(
            subsystems = self.scheduler.subsystem_count(),
            mappings = self.mapper.len(),
            "robot wiring complete"
        );
        Ok(handles)
    }

    /// One control period: sample the remote, then either run commands or
    /// hold everything safe while the link is down.
    pub fn tick(&mut self) -> Result<TickReport, RobotError> {
        if self.handles.is_none() {
            return Err(RobotError::NotInitialized);
        }
        self.tick_count = self.tick_count.saturating_add(1);

        let was_connected = self.operator_interface.is_connected();
        self.operator_interface.update(self.remote.read());
        let connected = self.operator_interface.is_connected();

        let report = if connected {
            if !was_connected {
                info!(tick = self.tick_count, "remote connected");
            }
            let mapped = self.mapper.handle_input(&self.operator_interface, &mut self.scheduler)?;
            if mapped.rejected > 0 {
                debug!(rejected = mapped.rejected, "remote mappings rejected this tick");
            }
            self.scheduler.run(&self.operator_interface)?
        } else {
            if was_connected {
                warn!(tick = self.tick_count, "remote link lost, holding outputs safe");
            }
            self.mapper.reset();
            self.scheduler.run_safe_disconnect()?;

            let mut report = TickReport {
                tick: self.scheduler.get_stats().ticks,
                ..TickReport::default()
            };
            for (id, subsystem) in self.scheduler.subsystems() {
                if !subsystem.is_healthy() {
                    let _ = report.degraded.push(id);
                }
            }
            report
        };

        for (id, subsystem) in self.scheduler.subsystems() {
            self.faults.observe(id, subsystem.health(), self.tick_count);
        }

        Ok(report)
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.is_some()
    }

    pub fn handles(&self) -> Option<&RobotHandles> {
        self.handles.as_ref()
    }

    pub fn scheduler(&self) -> &RobotScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut RobotScheduler {
        &mut self.scheduler
    }

    pub fn operator_interface(&self) -> &OperatorInterface {
        &self.operator_interface
    }

    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn chassis(&self) -> Option<&ChassisSubsystem> {
        let id = self.handles?.chassis;
        self.scheduler.subsystem(id).and_then(RobotSubsystem::as_chassis)
    }

    pub fn agitator(&self) -> Option<&AgitatorSubsystem> {
        let id = self.handles?.agitator;
        self.scheduler.subsystem(id).and_then(RobotSubsystem::as_agitator)
    }
}
