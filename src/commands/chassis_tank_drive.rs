use crate::command::{Command, CommandContext, RequirementSet};
use crate::operator_interface::OperatorInterface;
use crate::subsystems::{RobotSubsystem, SubsystemId};

/// Drives the chassis from the operator's tank sticks every tick.
#[derive(Debug)]
pub struct ChassisTankDriveCommand {
    chassis: SubsystemId,
    requirements: RequirementSet,
}

impl ChassisTankDriveCommand {
    pub fn new(chassis: SubsystemId) -> Self {
        Self {
            chassis,
            requirements: RequirementSet::of(&[chassis]),
        }
    }
}

impl Command<RobotSubsystem, OperatorInterface> for ChassisTankDriveCommand {
    fn name(&self) -> &str {
        "chassis tank drive"
    }

    fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, RobotSubsystem>, input: &OperatorInterface) {
        let left = input.chassis_tank_left_input();
        let right = input.chassis_tank_right_input();

        if let Some(chassis) = ctx.subsystem_mut(self.chassis).and_then(RobotSubsystem::as_chassis_mut) {
            chassis.set_desired_output(left, right);
        }
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext<'_, RobotSubsystem>) {
        if let Some(chassis) = ctx.subsystem_mut(self.chassis).and_then(RobotSubsystem::as_chassis_mut) {
            chassis.stop();
        }
    }
}
