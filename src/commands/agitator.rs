use crate::command::{Command, CommandContext, InterruptionBehavior, RequirementSet};
use crate::operator_interface::OperatorInterface;
use crate::subsystems::{AgitatorSubsystem, RobotSubsystem, SubsystemId};

fn agitator_mut<'c>(
    ctx: &'c mut CommandContext<'_, RobotSubsystem>,
    id: SubsystemId,
) -> Option<&'c mut AgitatorSubsystem> {
    ctx.subsystem_mut(id).and_then(RobotSubsystem::as_agitator_mut)
}

/// Spins the agitator at a fixed output until cancelled.
#[derive(Debug)]
pub struct RotateAgitatorCommand {
    agitator: SubsystemId,
    output: i16,
    requirements: RequirementSet,
}

impl RotateAgitatorCommand {
    pub fn new(agitator: SubsystemId, output: i16) -> Self {
        Self {
            agitator,
            output,
            requirements: RequirementSet::of(&[agitator]),
        }
    }
}

impl Command<RobotSubsystem, OperatorInterface> for RotateAgitatorCommand {
    fn name(&self) -> &str {
        "rotate agitator"
    }

    fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    fn initialize(&mut self, ctx: &mut CommandContext<'_, RobotSubsystem>) {
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(self.output);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, RobotSubsystem>, _input: &OperatorInterface) {
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(self.output);
        }
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext<'_, RobotSubsystem>) {
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(0);
        }
    }
}

/// Runs the agitator backwards for a fixed number of ticks. Cannot be
/// interrupted once started.
#[derive(Debug)]
pub struct UnjamAgitatorCommand {
    agitator: SubsystemId,
    output: i16,
    duration_ticks: u32,
    elapsed_ticks: u32,
    requirements: RequirementSet,
}

impl UnjamAgitatorCommand {
    pub fn new(agitator: SubsystemId, output: i16, duration_ticks: u32) -> Self {
        Self {
            agitator,
            output,
            duration_ticks,
            elapsed_ticks: 0,
            requirements: RequirementSet::of(&[agitator]),
        }
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }
}

impl Command<RobotSubsystem, OperatorInterface> for UnjamAgitatorCommand {
    fn name(&self) -> &str {
        "unjam agitator"
    }

    fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    fn interruption_behavior(&self) -> InterruptionBehavior {
        InterruptionBehavior::CancelIncoming
    }

    fn initialize(&mut self, ctx: &mut CommandContext<'_, RobotSubsystem>) {
        self.elapsed_ticks = 0;
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(self.output);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, RobotSubsystem>, _input: &OperatorInterface) {
        self.elapsed_ticks = self.elapsed_ticks.saturating_add(1);
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(self.output);
        }
    }

    fn is_finished(&self, _ctx: &CommandContext<'_, RobotSubsystem>) -> bool {
        self.elapsed_ticks >= self.duration_ticks
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext<'_, RobotSubsystem>) {
        if let Some(agitator) = agitator_mut(ctx, self.agitator) {
            agitator.set_desired_output(0);
        }
    }
}
