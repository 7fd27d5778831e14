use crate::subsystems::{Health, SubsystemId, MAX_SUBSYSTEMS};
use heapless::Vec;
use serde::Serialize;
use tracing::{info, warn};

pub const MAX_FAULT_HISTORY: usize = 64;

static_assertions::const_assert!(MAX_FAULT_HISTORY >= MAX_SUBSYSTEMS);

#[derive(Debug, Clone, Serialize)]
pub struct FaultRecord {
    pub id: u32,
    pub subsystem: SubsystemId,
    /// Worst health seen while the fault was open.
    pub health: Health,
    pub opened_tick: u64,
    pub resolved_tick: Option<u64>,
}

impl FaultRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_tick.is_some()
    }

    pub fn duration_ticks(&self) -> Option<u64> {
        self.resolved_tick.map(|end| end.saturating_sub(self.opened_tick))
    }
}

/// Tracks subsystem health transitions tick over tick.
#[derive(Debug)]
pub struct FaultLog {
    history: Vec<FaultRecord, MAX_FAULT_HISTORY>,
    next_fault_id: u32,
}

impl FaultLog {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            next_fault_id: 1,
        }
    }

    /// Feed the health a subsystem reported this tick. Returns the id of a
    /// fault opened by this observation, if any.
    pub fn observe(&mut self, subsystem: SubsystemId, health: Health, tick: u64) -> Option<u32> {
        let open = self
            .history
            .iter()
            .position(|f| f.subsystem == subsystem && !f.is_resolved());

        let Some(index) = open else {
            return match health {
                Health::Nominal => None,
                health => Some(self.open_fault(subsystem, health, tick)),
            };
        };

        let fault = &mut self.history[index];
        if health == Health::Nominal {
            fault.resolved_tick = Some(tick);
            info!(
                %subsystem,
                fault_id = fault.id,
                ticks = tick.saturating_sub(fault.opened_tick),
                "subsystem recovered"
            );
        } else if health > fault.health {
            warn!(%subsystem, fault_id = fault.id, ?health, "subsystem health worsened");
            fault.health = health;
        }
        None
    }

    fn open_fault(&mut self, subsystem: SubsystemId, health: Health, tick: u64) -> u32 {
        let fault_id = self.next_fault_id;
        self.next_fault_id = self.next_fault_id.wrapping_add(1);

        warn!(%subsystem, fault_id, ?health, "subsystem degraded");

        if self.history.is_full() {
            // Oldest resolved record goes first, then the oldest overall.
            let victim = self.history.iter().position(FaultRecord::is_resolved).unwrap_or(0);
            self.history.remove(victim);
        }

        let _ = self.history.push(FaultRecord {
            id: fault_id,
            subsystem,
            health,
            opened_tick: tick,
            resolved_tick: None,
        });
        fault_id
    }

    pub fn active_faults(&self) -> impl Iterator<Item = &FaultRecord> {
        self.history.iter().filter(|f| !f.is_resolved())
    }

    pub fn active_fault_count(&self) -> usize {
        self.active_faults().count()
    }

    pub fn is_faulted(&self, subsystem: SubsystemId) -> bool {
        self.active_faults().any(|f| f.subsystem == subsystem)
    }

    pub fn history(&self) -> &[FaultRecord] {
        &self.history
    }

    pub fn clear_resolved(&mut self) {
        self.history.retain(|f| !f.is_resolved());
    }
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new()
    }
}
