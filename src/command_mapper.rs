//! Trigger bindings from remote switch states to commands.
//!
//! The mapper is evaluated once per tick, after the operator interface has
//! sampled the remote and before [`CommandScheduler::run`], so commands it
//! schedules claim their subsystems ahead of default promotion.

use crate::command::CommandId;
use crate::operator_interface::OperatorInterface;
use crate::remote::{Switch, SwitchState};
use crate::scheduler::{CommandScheduler, SchedulerError};
use crate::subsystems::Subsystem;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_MAPPINGS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("mapping table full ({max} slots)", max = MAX_MAPPINGS)]
    Capacity,

    #[error("a mapping with these conditions already drives {0}")]
    DuplicateMapping(CommandId),

    #[error("a mapping needs at least one switch condition")]
    EmptyCondition,
}

/// Switch positions a mapping waits for. `None` means "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteMapState {
    pub left_switch: Option<SwitchState>,
    pub right_switch: Option<SwitchState>,
}

impl RemoteMapState {
    pub fn switch(switch: Switch, state: SwitchState) -> Self {
        Self::default().and_switch(switch, state)
    }

    #[must_use]
    pub fn and_switch(mut self, switch: Switch, state: SwitchState) -> Self {
        match switch {
            Switch::Left => self.left_switch = Some(state),
            Switch::Right => self.right_switch = Some(state),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.left_switch.is_none() && self.right_switch.is_none()
    }

    pub fn matches(&self, oi: &OperatorInterface) -> bool {
        if !oi.is_connected() || self.is_empty() {
            return false;
        }
        let check = |wanted: Option<SwitchState>, switch| wanted.map_or(true, |state| oi.switch(switch) == state);
        check(self.left_switch, Switch::Left) && check(self.right_switch, Switch::Right)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingKind {
    /// Schedule when the condition becomes true.
    Press,
    /// Schedule when the condition becomes true, cancel when it stops.
    Hold,
    /// While the condition holds, schedule whenever the command is not
    /// running. Cancel when it stops.
    HoldRepeat,
    /// Each time the condition becomes true, alternate schedule / cancel.
    Toggle,
}

#[derive(Debug, Clone)]
struct Mapping {
    condition: RemoteMapState,
    kind: MappingKind,
    command: CommandId,
    was_active: bool,
    toggled_on: bool,
    /// A rejection was already logged during the current activation.
    rejection_logged: bool,
}

/// Per-tick outcome of [`CommandMapper::handle_input`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperReport {
    pub scheduled: u8,
    pub cancelled: u8,
    pub rejected: u8,
}

#[derive(Debug, Default)]
pub struct CommandMapper {
    mappings: Vec<Mapping, MAX_MAPPINGS>,
}

impl CommandMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(
        &mut self,
        condition: RemoteMapState,
        kind: MappingKind,
        command: CommandId,
    ) -> Result<(), MapperError> {
        if condition.is_empty() {
            return Err(MapperError::EmptyCondition);
        }
        if self
            .mappings
            .iter()
            .any(|m| m.condition == condition && m.command == command)
        {
            return Err(MapperError::DuplicateMapping(command));
        }

        let mapping = Mapping {
            condition,
            kind,
            command,
            was_active: false,
            toggled_on: false,
            rejection_logged: false,
        };
        self.mappings.push(mapping).map_err(|_| MapperError::Capacity)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Forget edge state, e.g. after the remote link dropped. A switch that
    /// is still held when the link returns counts as a fresh press.
    pub fn reset(&mut self) {
        for mapping in self.mappings.iter_mut() {
            mapping.was_active = false;
            mapping.toggled_on = false;
            mapping.rejection_logged = false;
        }
    }

    /// Evaluate every mapping against the current remote state.
    ///
    /// Rejections are counted and never retried here. Only the first
    /// rejection of each activation is logged at `warn`.
    pub fn handle_input<S: Subsystem, I>(
        &mut self,
        oi: &OperatorInterface,
        scheduler: &mut CommandScheduler<S, I>,
    ) -> Result<MapperReport, SchedulerError> {
        let mut report = MapperReport::default();

        for mapping in self.mappings.iter_mut() {
            let active = oi.is_connected() && mapping.condition.matches(oi);
            let rising = active && !mapping.was_active;
            let falling = !active && mapping.was_active;
            mapping.was_active = active;
            if !active {
                mapping.rejection_logged = false;
            }

            let action = match mapping.kind {
                MappingKind::Press => rising.then_some(Action::Schedule),
                MappingKind::Hold => {
                    if rising {
                        Some(Action::Schedule)
                    } else if falling {
                        Some(Action::Cancel)
                    } else {
                        None
                    }
                }
                MappingKind::HoldRepeat => {
                    if active && !scheduler.is_running(mapping.command) {
                        Some(Action::Schedule)
                    } else if falling {
                        Some(Action::Cancel)
                    } else {
                        None
                    }
                }
                MappingKind::Toggle => {
                    if rising {
                        mapping.toggled_on = !mapping.toggled_on;
                        Some(if mapping.toggled_on { Action::Schedule } else { Action::Cancel })
                    } else {
                        None
                    }
                }
            };

            match action {
                Some(Action::Schedule) => match scheduler.schedule(mapping.command) {
                    Ok(()) => {
                        mapping.rejection_logged = false;
                        debug!(command = %mapping.command, kind = ?mapping.kind, "mapping scheduled command");
                        report.scheduled = report.scheduled.saturating_add(1);
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        if mapping.rejection_logged {
                            debug!(command = %mapping.command, error = %e, "mapping still rejected");
                        } else {
                            warn!(command = %mapping.command, error = %e, "mapping could not schedule command");
                            mapping.rejection_logged = true;
                        }
                        report.rejected = report.rejected.saturating_add(1);
                        if mapping.kind == MappingKind::Toggle {
                            mapping.toggled_on = false;
                        }
                    }
                },
                Some(Action::Cancel) => {
                    if scheduler.cancel(mapping.command) {
                        debug!(command = %mapping.command, kind = ?mapping.kind, "mapping cancelled command");
                        report.cancelled = report.cancelled.saturating_add(1);
                    }
                }
                None => {}
            }
        }

        Ok(report)
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Schedule,
    Cancel,
}
