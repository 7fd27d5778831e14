#![allow(dead_code)]

use cmdrobot::hal::SimMotor;
use cmdrobot::remote::{RemoteSnapshot, RemoteTransport};
use cmdrobot::{
    Command, CommandContext, CommandScheduler, Drivers, Health, InterruptionBehavior, RequirementSet, Robot,
    RobotConfig, Subsystem, SubsystemId,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Refresh(&'static str),
    SafeRefresh(&'static str),
    Initialize(&'static str),
    Execute(&'static str),
    End(&'static str, bool),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> EventLog {
    Rc::default()
}

pub fn take_events(log: &EventLog) -> Vec<Event> {
    log.borrow_mut().drain(..).collect()
}

/// Subsystem double that records its refreshes and exposes a settable health.
pub struct RecordingSubsystem {
    pub name: &'static str,
    pub health: Rc<RefCell<Health>>,
    pub writes: u32,
    log: EventLog,
}

impl RecordingSubsystem {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            health: Rc::new(RefCell::new(Health::Nominal)),
            writes: 0,
            log: Rc::clone(log),
        }
    }
}

impl Subsystem for RecordingSubsystem {
    fn name(&self) -> &str {
        self.name
    }

    fn refresh(&mut self) {
        self.log.borrow_mut().push(Event::Refresh(self.name));
    }

    fn refresh_safe_disconnect(&mut self) {
        self.log.borrow_mut().push(Event::SafeRefresh(self.name));
    }

    fn health(&self) -> Health {
        *self.health.borrow()
    }
}

pub type TestScheduler = CommandScheduler<RecordingSubsystem, ()>;

/// Command double. Writes to every subsystem it requires on each execute.
pub struct RecordingCommand {
    name: &'static str,
    requirements: RequirementSet,
    behavior: InterruptionBehavior,
    finish_after: Option<u32>,
    executed: u32,
    log: EventLog,
}

impl RecordingCommand {
    pub fn new(name: &'static str, requirements: &[SubsystemId], log: &EventLog) -> Self {
        Self {
            name,
            requirements: RequirementSet::of(requirements),
            behavior: InterruptionBehavior::CancelSelf,
            finish_after: None,
            executed: 0,
            log: Rc::clone(log),
        }
    }

    pub fn non_interruptible(mut self) -> Self {
        self.behavior = InterruptionBehavior::CancelIncoming;
        self
    }

    pub fn finish_after(mut self, ticks: u32) -> Self {
        self.finish_after = Some(ticks);
        self
    }

    pub fn boxed(self) -> Box<dyn Command<RecordingSubsystem, ()>> {
        Box::new(self)
    }
}

impl Command<RecordingSubsystem, ()> for RecordingCommand {
    fn name(&self) -> &str {
        self.name
    }

    fn requirements(&self) -> &RequirementSet {
        &self.requirements
    }

    fn interruption_behavior(&self) -> InterruptionBehavior {
        self.behavior
    }

    fn initialize(&mut self, _ctx: &mut CommandContext<'_, RecordingSubsystem>) {
        self.executed = 0;
        self.log.borrow_mut().push(Event::Initialize(self.name));
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_, RecordingSubsystem>, _input: &()) {
        self.executed += 1;
        self.log.borrow_mut().push(Event::Execute(self.name));
        for id in self.requirements.iter() {
            if let Some(subsystem) = ctx.subsystem_mut(id) {
                subsystem.writes += 1;
            }
        }
    }

    fn is_finished(&self, _ctx: &CommandContext<'_, RecordingSubsystem>) -> bool {
        self.finish_after.is_some_and(|ticks| self.executed >= ticks)
    }

    fn end(&mut self, interrupted: bool, _ctx: &mut CommandContext<'_, RecordingSubsystem>) {
        self.log.borrow_mut().push(Event::End(self.name, interrupted));
    }
}

pub fn scheduler_with(names: &[&'static str]) -> (TestScheduler, Vec<SubsystemId>, EventLog) {
    let log = new_log();
    let mut scheduler = TestScheduler::new();
    let ids = names
        .iter()
        .map(|name| scheduler.register_subsystem(RecordingSubsystem::new(*name, &log)).unwrap())
        .collect();
    (scheduler, ids, log)
}

/// Remote double the test keeps a handle to while the robot reads it.
#[derive(Clone, Default)]
pub struct SharedRemote {
    frames: Rc<RefCell<VecDeque<RemoteSnapshot>>>,
    last: Rc<RefCell<RemoteSnapshot>>,
}

impl SharedRemote {
    /// Set the frame every following tick reads.
    pub fn hold(&self, snapshot: RemoteSnapshot) {
        self.frames.borrow_mut().clear();
        *self.last.borrow_mut() = snapshot;
    }

    pub fn push(&self, snapshot: RemoteSnapshot) {
        self.frames.borrow_mut().push_back(snapshot);
    }
}

impl RemoteTransport for SharedRemote {
    fn read(&mut self) -> RemoteSnapshot {
        if let Some(next) = self.frames.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        *self.last.borrow()
    }
}

pub struct RobotRig {
    pub robot: Robot,
    pub remote: SharedRemote,
    pub chassis_motors: [SimMotor; 4],
    pub agitator_motor: SimMotor,
}

pub fn robot_rig(config: RobotConfig) -> RobotRig {
    let remote = SharedRemote::default();
    let chassis_motors = [SimMotor::new(), SimMotor::new(), SimMotor::new(), SimMotor::new()];
    let agitator_motor = SimMotor::new();

    let drivers = Drivers {
        remote: Box::new(remote.clone()),
        chassis_motors: [
            chassis_motors[0].boxed(),
            chassis_motors[1].boxed(),
            chassis_motors[2].boxed(),
            chassis_motors[3].boxed(),
        ],
        agitator_motor: agitator_motor.boxed(),
    };

    RobotRig {
        robot: Robot::new(drivers, config).unwrap(),
        remote,
        chassis_motors,
        agitator_motor,
    }
}
