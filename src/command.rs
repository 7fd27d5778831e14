//! The [`Command`] trait and the handles the scheduler tracks commands by.

use crate::scheduler::SubsystemSlot;
use crate::subsystems::{SubsystemId, MAX_SUBSYSTEMS};
use core::fmt;
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Generational handle into the scheduler's command table.
///
/// Reaping a command bumps its slot's generation, and a slot whose
/// generation is exhausted is retired, so a stale handle never resolves to
/// whatever command reuses the slot later. Handles serialize for logs and
/// reports but cannot be deserialized back into a live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CommandId {
    index: u16,
    generation: u16,
}

impl CommandId {
    pub(crate) fn new(index: usize, generation: u16) -> Self {
        Self {
            index: index as u16,
            generation,
        }
    }

    pub fn index(self) -> usize {
        usize::from(self.index)
    }

    pub fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    /// Registered and not running. Persistent commands return here only
    /// through `Finished` or `Interrupted`.
    Idle,
    /// Accepted by the scheduler; `initialize()` is in progress.
    Scheduled,
    Running,
    Finished,
    Interrupted,
}

impl CommandState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandState::Finished | CommandState::Interrupted)
    }
}

/// What happens when a newer command wants a subsystem this one holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterruptionBehavior {
    /// The incumbent is interrupted and the newcomer takes over.
    #[default]
    CancelSelf,
    /// The newcomer is rejected.
    CancelIncoming,
}

/// The subsystems a command needs exclusive control of. Duplicate ids
/// collapse, so the set never holds more than [`MAX_SUBSYSTEMS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementSet(Vec<SubsystemId, MAX_SUBSYSTEMS>);

impl RequirementSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn of(ids: &[SubsystemId]) -> Self {
        ids.iter().copied().collect()
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: SubsystemId) -> bool {
        if self.contains(id) {
            return false;
        }
        // Distinct ids are bounded by the subsystem table size.
        debug_assert!(!self.0.is_full(), "requirement set overflow");
        self.0.push(id).is_ok()
    }

    pub fn contains(&self, id: SubsystemId) -> bool {
        self.0.contains(&id)
    }

    pub fn intersects(&self, other: &RequirementSet) -> bool {
        self.0.iter().any(|id| other.contains(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = SubsystemId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<SubsystemId> for RequirementSet {
    fn from_iter<T: IntoIterator<Item = SubsystemId>>(iter: T) -> Self {
        let mut set = RequirementSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// A command's view of the subsystem table while one of its callbacks runs.
///
/// Any registered subsystem can be read. Only subsystems the command
/// currently owns can be written.
pub struct CommandContext<'a, S> {
    owner: CommandId,
    slots: &'a mut [SubsystemSlot<S>],
}

impl<'a, S> CommandContext<'a, S> {
    pub(crate) fn new(owner: CommandId, slots: &'a mut [SubsystemSlot<S>]) -> Self {
        Self { owner, slots }
    }

    /// The command this context was handed to.
    pub fn owner(&self) -> CommandId {
        self.owner
    }

    pub fn owns(&self, id: SubsystemId) -> bool {
        self.slots
            .get(id.index())
            .is_some_and(|slot| slot.owner == Some(self.owner))
    }

    pub fn subsystem(&self, id: SubsystemId) -> Option<&S> {
        self.slots.get(id.index()).map(|slot| &slot.subsystem)
    }

    /// `None` if the subsystem is not registered or not owned by this command.
    pub fn subsystem_mut(&mut self, id: SubsystemId) -> Option<&mut S> {
        let owner = self.owner;
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.owner == Some(owner))
            .map(|slot| &mut slot.subsystem)
    }
}

/// A unit of control logic run by the scheduler.
///
/// `S` is the scheduler's subsystem type and `I` the per-tick operator
/// input handed to [`Command::execute`].
pub trait Command<S, I> {
    fn name(&self) -> &str;

    /// Queried once, when the command is handed to the scheduler. The
    /// scheduler keeps its own copy, so the set cannot change while running.
    fn requirements(&self) -> &RequirementSet;

    fn interruption_behavior(&self) -> InterruptionBehavior {
        InterruptionBehavior::CancelSelf
    }

    /// Called once per accepted scheduling, before the first `execute`.
    fn initialize(&mut self, _ctx: &mut CommandContext<'_, S>) {}

    fn execute(&mut self, ctx: &mut CommandContext<'_, S>, input: &I);

    /// Polled right after every `execute`.
    fn is_finished(&self, _ctx: &CommandContext<'_, S>) -> bool {
        false
    }

    /// Called exactly once per run, while the command still owns its
    /// requirements.
    fn end(&mut self, _interrupted: bool, _ctx: &mut CommandContext<'_, S>) {}
}
