//! The per-tick command scheduler.
//!
//! The scheduler owns every registered subsystem and every command handed
//! to it, each in a bounded arena addressed by [`SubsystemId`] and
//! [`CommandId`]. Each subsystem maps to at most one owning command, and
//! every running command owns all of its requirements. [`CommandScheduler::run`]
//! is the only per-tick entry point:
//!
//! 1. refresh every subsystem, in registration order;
//! 2. execute every running command, in scheduling order, ending the ones
//!    that report finished;
//! 3. promote default commands onto subsystems nobody owns.

use crate::command::{Command, CommandContext, CommandId, CommandState, InterruptionBehavior, RequirementSet};
use crate::subsystems::{Subsystem, SubsystemId, MAX_SUBSYSTEMS};
use arrayvec::ArrayVec;
use core::fmt;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

pub const MAX_COMMANDS: usize = 32;

static_assertions::const_assert!(MAX_COMMANDS <= u16::MAX as usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("subsystem `{name}` is already registered")]
    DuplicateSubsystem { name: String },

    #[error("subsystem `{name}` registered after the wiring phase closed")]
    RegistrationClosed { name: String },

    #[error("subsystem table full ({max} slots)", max = MAX_SUBSYSTEMS)]
    SubsystemCapacity,

    #[error("command table full ({max} slots)", max = MAX_COMMANDS)]
    CommandCapacity,

    #[error("unknown {0}")]
    UnknownSubsystem(SubsystemId),

    #[error("unknown or reaped {0}")]
    UnknownCommand(CommandId),

    #[error("{command} rejected: {incumbent} holds a required subsystem and cannot be interrupted")]
    Rejected { command: CommandId, incumbent: CommandId },

    #[error("invalid default command for {subsystem}: {reason}")]
    InvalidDefaultCommand {
        subsystem: SubsystemId,
        reason: &'static str,
    },

    #[error("ownership invariant violated: {0}")]
    InvariantViolation(String),
}

impl SchedulerError {
    /// Only an inconsistent ownership map is unrecoverable; everything else
    /// leaves the scheduler in a well-defined state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::InvariantViolation(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub total_scheduled: u32,
    pub total_rejected: u32,
    pub total_interrupted: u32,
    pub total_finished: u32,
    pub default_promotions: u32,
    pub currently_running: u8,
}

/// What happened during one [`CommandScheduler::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Commands that reported finished this tick, in execution order.
    pub finished: Vec<CommandId, MAX_COMMANDS>,
    /// Default commands promoted onto idle subsystems this tick.
    pub promoted: Vec<CommandId, MAX_SUBSYSTEMS>,
    /// Subsystems whose health was not nominal after their refresh.
    pub degraded: Vec<SubsystemId, MAX_SUBSYSTEMS>,
}

pub(crate) struct SubsystemSlot<S> {
    pub(crate) subsystem: S,
    pub(crate) owner: Option<CommandId>,
    pub(crate) default_command: Option<CommandId>,
}

struct CommandSlot<S, I> {
    command: Box<dyn Command<S, I>>,
    requirements: RequirementSet,
    state: CommandState,
    transient: bool,
    running_as_default: bool,
    default_of: Option<SubsystemId>,
}

impl<S, I> CommandSlot<S, I> {
    fn blocks_interruption(&self) -> bool {
        // Defaults always yield to explicit commands.
        !self.running_as_default
            && self.command.interruption_behavior() == InterruptionBehavior::CancelIncoming
    }
}

struct CommandEntry<S, I> {
    generation: u16,
    slot: Option<CommandSlot<S, I>>,
    /// Set once `generation` is exhausted. A retired entry is never reused,
    /// so no handle minted for it can resolve again.
    retired: bool,
}

fn slot_of<S, I>(entries: &[CommandEntry<S, I>], id: CommandId) -> Option<&CommandSlot<S, I>> {
    entries
        .get(id.index())
        .filter(|entry| entry.generation == id.generation())
        .and_then(|entry| entry.slot.as_ref())
}

fn slot_of_mut<S, I>(entries: &mut [CommandEntry<S, I>], id: CommandId) -> Option<&mut CommandSlot<S, I>> {
    entries
        .get_mut(id.index())
        .filter(|entry| entry.generation == id.generation())
        .and_then(|entry| entry.slot.as_mut())
}

pub struct CommandScheduler<S, I> {
    subsystems: Vec<SubsystemSlot<S>, MAX_SUBSYSTEMS>,
    commands: Vec<CommandEntry<S, I>, MAX_COMMANDS>,
    running: Vec<CommandId, MAX_COMMANDS>,
    wiring_open: bool,
    stats: SchedulerStats,
}

impl<S: Subsystem, I> CommandScheduler<S, I> {
    pub fn new() -> Self {
        Self {
            subsystems: Vec::new(),
            commands: Vec::new(),
            running: Vec::new(),
            wiring_open: true,
            stats: SchedulerStats::default(),
        }
    }

    /// Add a subsystem to the arena. Only allowed while wiring is open.
    pub fn register_subsystem(&mut self, subsystem: S) -> Result<SubsystemId, SchedulerError> {
        let name = subsystem.name();

        if !self.wiring_open {
            warn!(subsystem = name, "registration after wiring closed");
            return Err(SchedulerError::RegistrationClosed { name: name.to_string() });
        }

        if self.subsystems.iter().any(|slot| slot.subsystem.name() == name) {
            warn!(subsystem = name, "duplicate subsystem registration");
            return Err(SchedulerError::DuplicateSubsystem { name: name.to_string() });
        }

        if self.subsystems.is_full() {
            warn!(subsystem = name, "subsystem table full");
            return Err(SchedulerError::SubsystemCapacity);
        }

        let id = SubsystemId::from_index(self.subsystems.len());
        debug!(subsystem = name, %id, "registered subsystem");

        let slot = SubsystemSlot {
            subsystem,
            owner: None,
            default_command: None,
        };
        if self.subsystems.push(slot).is_err() {
            return Err(SchedulerError::SubsystemCapacity);
        }

        Ok(id)
    }

    /// Close the wiring phase. [`CommandScheduler::run`] does this implicitly.
    pub fn finish_wiring(&mut self) {
        if self.wiring_open {
            self.wiring_open = false;
            info!(subsystems = self.subsystems.len(), "wiring phase closed");
        }
    }

    pub fn is_wiring_open(&self) -> bool {
        self.wiring_open
    }

    /// Hand a reusable command to the scheduler without running it.
    pub fn register_command(&mut self, command: Box<dyn Command<S, I>>) -> Result<CommandId, SchedulerError> {
        self.insert_command(command, false)
    }

    /// Submit a one-shot command. It is reaped once it finishes or is
    /// interrupted, and dropped right away if scheduling is rejected.
    pub fn schedule_new(&mut self, command: Box<dyn Command<S, I>>) -> Result<CommandId, SchedulerError> {
        let id = self.insert_command(command, true)?;
        if let Err(e) = self.schedule(id) {
            self.reap(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Bind `command` as the default of `subsystem`, replacing any earlier
    /// default. A default that is currently running as such is interrupted
    /// so the new one can take over on the next promotion.
    pub fn set_default_command(&mut self, subsystem: SubsystemId, command: CommandId) -> Result<(), SchedulerError> {
        if subsystem.index() >= self.subsystems.len() {
            return Err(SchedulerError::UnknownSubsystem(subsystem));
        }

        let slot = slot_of(&self.commands, command).ok_or(SchedulerError::UnknownCommand(command))?;
        let invalid = |reason| SchedulerError::InvalidDefaultCommand { subsystem, reason };
        if slot.transient {
            return Err(invalid("one-shot commands cannot be defaults"));
        }
        if !slot.requirements.contains(subsystem) {
            return Err(invalid("default command must require its subsystem"));
        }
        if slot.default_of.is_some_and(|other| other != subsystem) {
            return Err(invalid("command is already the default of another subsystem"));
        }

        if let Some(previous) = self.subsystems[subsystem.index()].default_command {
            if previous != command {
                let was_running_as_default =
                    slot_of(&self.commands, previous).is_some_and(|p| p.running_as_default);
                if was_running_as_default {
                    self.finish_command(previous, true);
                }
                if let Some(previous_slot) = slot_of_mut(&mut self.commands, previous) {
                    previous_slot.default_of = None;
                }
            }
        }

        if let Some(slot) = slot_of_mut(&mut self.commands, command) {
            slot.default_of = Some(subsystem);
        }
        self.subsystems[subsystem.index()].default_command = Some(command);
        debug!(%subsystem, %command, "default command set");
        Ok(())
    }

    pub fn default_command(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.subsystems.get(subsystem.index()).and_then(|slot| slot.default_command)
    }

    /// Start `command`, interrupting conflicting incumbents that allow it.
    ///
    /// On rejection nothing changes and the request is not retained.
    /// Scheduling a command that is already running is a no-op.
    pub fn schedule(&mut self, command: CommandId) -> Result<(), SchedulerError> {
        self.schedule_inner(command, false)
    }

    fn schedule_inner(&mut self, id: CommandId, as_default: bool) -> Result<(), SchedulerError> {
        let slot = slot_of(&self.commands, id).ok_or(SchedulerError::UnknownCommand(id))?;
        if slot.state == CommandState::Running {
            trace!(command = slot.command.name(), "already running");
            return Ok(());
        }

        let requirements = slot.requirements.clone();

        let mut incumbents: ArrayVec<CommandId, MAX_SUBSYSTEMS> = ArrayVec::new();
        for subsystem in requirements.iter() {
            let owner = self
                .subsystems
                .get(subsystem.index())
                .ok_or(SchedulerError::UnknownSubsystem(subsystem))?
                .owner;
            if let Some(owner) = owner {
                if !incumbents.contains(&owner) {
                    incumbents.push(owner);
                }
            }
        }

        for &incumbent in &incumbents {
            let incumbent_slot = slot_of(&self.commands, incumbent).ok_or_else(|| {
                self.violation(format!("{} is owned by reaped {}", requirements_owner_desc(&requirements), incumbent))
            })?;
            if incumbent_slot.blocks_interruption() {
                debug!(
                    command = slot.command.name(),
                    incumbent = incumbent_slot.command.name(),
                    "scheduling rejected"
                );
                self.stats.total_rejected = self.stats.total_rejected.saturating_add(1);
                return Err(SchedulerError::Rejected { command: id, incumbent });
            }
        }

        for incumbent in incumbents {
            self.finish_command(incumbent, true);
        }

        for subsystem in requirements.iter() {
            self.subsystems[subsystem.index()].owner = Some(id);
        }

        let Some(slot) = slot_of_mut(&mut self.commands, id) else {
            return Err(self.violation(format!("{} vanished while being scheduled", id)));
        };
        slot.state = CommandState::Scheduled;
        slot.running_as_default = as_default;
        {
            let mut ctx = CommandContext::new(id, &mut self.subsystems[..]);
            slot.command.initialize(&mut ctx);
        }
        slot.state = CommandState::Running;
        debug!(command = slot.command.name(), %id, as_default, "command scheduled");

        if self.running.push(id).is_err() {
            return Err(self.violation(format!("running list overflow scheduling {}", id)));
        }
        self.stats.total_scheduled = self.stats.total_scheduled.saturating_add(1);
        if as_default {
            self.stats.default_promotions = self.stats.default_promotions.saturating_add(1);
        }
        self.stats.currently_running = self.running.len() as u8;

        self.verify_ownership()
    }

    /// One control tick. See the module docs for the step order.
    pub fn run(&mut self, input: &I) -> Result<TickReport, SchedulerError> {
        self.finish_wiring();
        self.stats.ticks = self.stats.ticks.saturating_add(1);

        let mut report = TickReport {
            tick: self.stats.ticks,
            ..TickReport::default()
        };

        for (index, slot) in self.subsystems.iter_mut().enumerate() {
            slot.subsystem.refresh();
            if !slot.subsystem.is_healthy() {
                let _ = report.degraded.push(SubsystemId::from_index(index));
            }
        }

        let snapshot: ArrayVec<CommandId, MAX_COMMANDS> = self.running.iter().copied().collect();
        for id in snapshot {
            let finished = {
                let Some(slot) = slot_of_mut(&mut self.commands, id) else {
                    return Err(self.violation(format!("running {} has no slot", id)));
                };
                let mut ctx = CommandContext::new(id, &mut self.subsystems[..]);
                slot.command.execute(&mut ctx, input);
                slot.command.is_finished(&ctx)
            };

            if finished {
                self.finish_command(id, false);
                let _ = report.finished.push(id);
            }
        }

        for index in 0..self.subsystems.len() {
            let slot = &self.subsystems[index];
            if slot.owner.is_some() {
                continue;
            }
            let Some(default) = slot.default_command else {
                continue;
            };
            if !self.can_promote(default) {
                continue;
            }

            match self.schedule_inner(default, true) {
                Ok(()) => {
                    let _ = report.promoted.push(default);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "default command promotion failed"),
            }
        }

        self.verify_ownership()?;
        Ok(report)
    }

    /// Tick variant for when the operator link is lost: every command is
    /// interrupted and subsystems drive their outputs safe. No defaults are
    /// promoted.
    pub fn run_safe_disconnect(&mut self) -> Result<(), SchedulerError> {
        self.finish_wiring();
        self.stats.ticks = self.stats.ticks.saturating_add(1);

        self.cancel_all();
        for slot in self.subsystems.iter_mut() {
            slot.subsystem.refresh_safe_disconnect();
        }

        self.verify_ownership()
    }

    /// Interrupt `command` now. Returns `false` if it was not running.
    pub fn cancel(&mut self, command: CommandId) -> bool {
        if !self.is_running(command) {
            return false;
        }
        self.finish_command(command, true);
        true
    }

    /// Interrupt every running command. Returns how many were interrupted.
    pub fn cancel_all(&mut self) -> usize {
        let snapshot: ArrayVec<CommandId, MAX_COMMANDS> = self.running.iter().copied().collect();
        for &id in &snapshot {
            self.finish_command(id, true);
        }
        if !snapshot.is_empty() {
            debug!(count = snapshot.len(), "cancelled all commands");
        }
        snapshot.len()
    }

    pub fn is_running(&self, command: CommandId) -> bool {
        slot_of(&self.commands, command).is_some_and(|slot| slot.state == CommandState::Running)
    }

    /// `None` for unknown or reaped commands.
    pub fn command_state(&self, command: CommandId) -> Option<CommandState> {
        slot_of(&self.commands, command).map(|slot| slot.state)
    }

    pub fn command_name(&self, command: CommandId) -> Option<&str> {
        slot_of(&self.commands, command).map(|slot| slot.command.name())
    }

    pub fn requirements_of(&self, command: CommandId) -> Option<&RequirementSet> {
        slot_of(&self.commands, command).map(|slot| &slot.requirements)
    }

    pub fn owner_of(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.subsystems.get(subsystem.index()).and_then(|slot| slot.owner)
    }

    /// Running commands in the order they execute.
    pub fn running_commands(&self) -> &[CommandId] {
        &self.running
    }

    pub fn subsystem(&self, subsystem: SubsystemId) -> Option<&S> {
        self.subsystems.get(subsystem.index()).map(|slot| &slot.subsystem)
    }

    pub fn subsystems(&self) -> impl Iterator<Item = (SubsystemId, &S)> + '_ {
        self.subsystems
            .iter()
            .enumerate()
            .map(|(index, slot)| (SubsystemId::from_index(index), &slot.subsystem))
    }

    pub fn find_subsystem(&self, name: &str) -> Option<SubsystemId> {
        self.subsystems
            .iter()
            .position(|slot| slot.subsystem.name() == name)
            .map(SubsystemId::from_index)
    }

    pub fn subsystem_count(&self) -> usize {
        self.subsystems.len()
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Check the ownership map in both directions.
    pub fn verify_ownership(&self) -> Result<(), SchedulerError> {
        for (index, slot) in self.subsystems.iter().enumerate() {
            let subsystem = SubsystemId::from_index(index);
            let Some(owner) = slot.owner else {
                continue;
            };
            let Some(owner_slot) = slot_of(&self.commands, owner) else {
                return Err(self.violation(format!("{} owned by reaped {}", subsystem, owner)));
            };
            if owner_slot.state != CommandState::Running {
                return Err(self.violation(format!(
                    "{} owned by {} in state {:?}",
                    subsystem, owner, owner_slot.state
                )));
            }
            if !owner_slot.requirements.contains(subsystem) {
                return Err(self.violation(format!("{} owned by {} which does not require it", subsystem, owner)));
            }
        }

        for (position, &id) in self.running.iter().enumerate() {
            if self.running[..position].contains(&id) {
                return Err(self.violation(format!("{} listed as running twice", id)));
            }
            let Some(slot) = slot_of(&self.commands, id) else {
                return Err(self.violation(format!("running {} has no slot", id)));
            };
            if slot.state != CommandState::Running {
                return Err(self.violation(format!("running {} in state {:?}", id, slot.state)));
            }
            for subsystem in slot.requirements.iter() {
                let owner = self.subsystems.get(subsystem.index()).and_then(|s| s.owner);
                if owner != Some(id) {
                    return Err(self.violation(format!(
                        "running {} requires {} but it maps to {:?}",
                        id, subsystem, owner
                    )));
                }
            }
        }

        Ok(())
    }

    fn insert_command(
        &mut self,
        command: Box<dyn Command<S, I>>,
        transient: bool,
    ) -> Result<CommandId, SchedulerError> {
        let requirements = command.requirements().clone();
        if let Some(unknown) = requirements.iter().find(|id| id.index() >= self.subsystems.len()) {
            warn!(command = command.name(), %unknown, "command requires an unregistered subsystem");
            return Err(SchedulerError::UnknownSubsystem(unknown));
        }

        let slot = CommandSlot {
            command,
            requirements,
            state: CommandState::Idle,
            transient,
            running_as_default: false,
            default_of: None,
        };

        if let Some(index) = self
            .commands
            .iter()
            .position(|entry| entry.slot.is_none() && !entry.retired)
        {
            let entry = &mut self.commands[index];
            entry.slot = Some(slot);
            return Ok(CommandId::new(index, entry.generation));
        }

        let index = self.commands.len();
        let entry = CommandEntry {
            generation: 0,
            slot: Some(slot),
            retired: false,
        };
        if self.commands.push(entry).is_err() {
            warn!("command table full");
            return Err(SchedulerError::CommandCapacity);
        }
        Ok(CommandId::new(index, 0))
    }

    fn can_promote(&self, default: CommandId) -> bool {
        let Some(slot) = slot_of(&self.commands, default) else {
            return false;
        };
        slot.state != CommandState::Running
            && slot
                .requirements
                .iter()
                .all(|subsystem| self.owner_of(subsystem).is_none())
    }

    /// End a running command: `end()` while it still owns its subsystems,
    /// then release them. Does nothing if `id` is not running.
    fn finish_command(&mut self, id: CommandId, interrupted: bool) {
        let Some(slot) = slot_of_mut(&mut self.commands, id) else {
            return;
        };
        if slot.state != CommandState::Running {
            return;
        }

        {
            let mut ctx = CommandContext::new(id, &mut self.subsystems[..]);
            slot.command.end(interrupted, &mut ctx);
        }

        for subsystem in slot.requirements.iter() {
            if let Some(entry) = self.subsystems.get_mut(subsystem.index()) {
                if entry.owner == Some(id) {
                    entry.owner = None;
                }
            }
        }

        slot.state = if interrupted {
            CommandState::Interrupted
        } else {
            CommandState::Finished
        };
        slot.running_as_default = false;
        let transient = slot.transient;
        debug!(command = slot.command.name(), %id, interrupted, "command ended");

        self.running.retain(|running| *running != id);
        if interrupted {
            self.stats.total_interrupted = self.stats.total_interrupted.saturating_add(1);
        } else {
            self.stats.total_finished = self.stats.total_finished.saturating_add(1);
        }
        self.stats.currently_running = self.running.len() as u8;

        if transient {
            self.reap(id);
        }
    }

    fn reap(&mut self, id: CommandId) {
        if let Some(entry) = self.commands.get_mut(id.index()) {
            if entry.generation == id.generation() {
                entry.slot = None;
                match entry.generation.checked_add(1) {
                    Some(next) => entry.generation = next,
                    None => {
                        entry.retired = true;
                        warn!(index = id.index(), "command slot generations exhausted, retiring slot");
                    }
                }
            }
        }
    }

    fn violation(&self, detail: String) -> SchedulerError {
        error!(detail = %detail, "ownership invariant violated");
        SchedulerError::InvariantViolation(detail)
    }
}

fn requirements_owner_desc(requirements: &RequirementSet) -> String {
    let ids: alloc::vec::Vec<String> = requirements.iter().map(|id| id.to_string()).collect();
    ids.join(", ")
}

impl<S: Subsystem, I> Default for CommandScheduler<S, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, I> fmt::Debug for CommandScheduler<S, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandScheduler")
            .field("subsystems", &self.subsystems.len())
            .field("commands", &self.commands.iter().filter(|e| e.slot.is_some()).count())
            .field("running", &self.running.len())
            .field("wiring_open", &self.wiring_open)
            .field("stats", &self.stats)
            .finish()
    }
}
