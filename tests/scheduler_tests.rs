mod common;

use cmdrobot::{CommandState, SchedulerError, SubsystemId};
use common::*;
use proptest::prelude::*;

#[test]
fn test_drive_then_turn_interrupts_drive() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let chassis = ids[0];

    let drive = scheduler
        .register_command(RecordingCommand::new("drive", &[chassis], &log).boxed())
        .unwrap();
    let turn = scheduler
        .register_command(RecordingCommand::new("turn", &[chassis], &log).boxed())
        .unwrap();

    scheduler.schedule(drive).unwrap();
    scheduler.run(&()).unwrap();
    assert_eq!(scheduler.owner_of(chassis), Some(drive));
    take_events(&log);

    scheduler.schedule(turn).unwrap();
    assert_eq!(
        take_events(&log),
        vec![Event::End("drive", true), Event::Initialize("turn")]
    );
    assert_eq!(scheduler.owner_of(chassis), Some(turn));
    assert_eq!(scheduler.command_state(drive), Some(CommandState::Interrupted));

    scheduler.run(&()).unwrap();
    assert_eq!(
        take_events(&log),
        vec![Event::Refresh("chassis"), Event::Execute("turn")]
    );
}

#[test]
fn test_idle_default_promoted_on_first_tick() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let chassis = ids[0];

    let idle = scheduler
        .register_command(RecordingCommand::new("idle", &[chassis], &log).boxed())
        .unwrap();
    scheduler.set_default_command(chassis, idle).unwrap();

    let report = scheduler.run(&()).unwrap();
    assert_eq!(report.promoted.as_slice(), &[idle]);
    assert_eq!(scheduler.owner_of(chassis), Some(idle));
    assert_eq!(
        take_events(&log),
        vec![Event::Refresh("chassis"), Event::Initialize("idle")]
    );

    scheduler.run(&()).unwrap();
    assert_eq!(
        take_events(&log),
        vec![Event::Refresh("chassis"), Event::Execute("idle")]
    );
    assert_eq!(scheduler.get_stats().default_promotions, 1);
}

#[test]
fn test_duplicate_chassis_registration_leaves_map_unchanged() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let drive = scheduler
        .register_command(RecordingCommand::new("drive", &[ids[0]], &log).boxed())
        .unwrap();
    scheduler.schedule(drive).unwrap();

    let result = scheduler.register_subsystem(RecordingSubsystem::new("chassis", &log));
    assert_eq!(
        result.err(),
        Some(SchedulerError::DuplicateSubsystem {
            name: "chassis".to_string()
        })
    );
    assert_eq!(scheduler.subsystem_count(), 1);
    assert_eq!(scheduler.owner_of(ids[0]), Some(drive));
    assert!(scheduler.verify_ownership().is_ok());
}

#[test]
fn test_disjoint_commands_run_together() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis", "agitator", "turret"]);
    let drive = scheduler
        .register_command(RecordingCommand::new("drive", &[ids[0]], &log).boxed())
        .unwrap();
    let feed = scheduler
        .register_command(RecordingCommand::new("feed", &[ids[1], ids[2]], &log).boxed())
        .unwrap();

    scheduler.schedule(drive).unwrap();
    scheduler.schedule(feed).unwrap();
    assert_eq!(scheduler.running_commands(), &[drive, feed]);

    scheduler.run(&()).unwrap();
    assert_eq!(scheduler.subsystem(ids[0]).unwrap().writes, 1);
    assert_eq!(scheduler.subsystem(ids[2]).unwrap().writes, 1);
}

#[test]
fn test_non_interruptible_incumbent_keeps_subsystems() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis", "agitator"]);
    let unjam = scheduler
        .register_command(
            RecordingCommand::new("unjam", &[ids[1]], &log)
                .non_interruptible()
                .boxed(),
        )
        .unwrap();
    let both = scheduler
        .register_command(RecordingCommand::new("both", &[ids[0], ids[1]], &log).boxed())
        .unwrap();

    scheduler.schedule(unjam).unwrap();
    take_events(&log);

    let result = scheduler.schedule(both);
    assert!(matches!(result, Err(SchedulerError::Rejected { .. })));
    assert!(take_events(&log).is_empty());
    assert_eq!(scheduler.owner_of(ids[0]), None);
    assert_eq!(scheduler.owner_of(ids[1]), Some(unjam));
    assert_eq!(scheduler.get_stats().total_rejected, 1);

    // A rejected request is not retained.
    scheduler.run(&()).unwrap();
    assert!(!scheduler.is_running(both));
}

#[test]
fn test_finished_command_releases_before_next_tick() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let chassis = ids[0];
    let nudge = scheduler
        .register_command(RecordingCommand::new("nudge", &[chassis], &log).finish_after(2).boxed())
        .unwrap();

    scheduler.schedule(nudge).unwrap();
    scheduler.run(&()).unwrap();
    assert!(scheduler.is_running(nudge));

    let report = scheduler.run(&()).unwrap();
    assert_eq!(report.finished.as_slice(), &[nudge]);
    assert_eq!(scheduler.owner_of(chassis), None);

    let ends = take_events(&log)
        .into_iter()
        .filter(|e| matches!(e, Event::End(..)))
        .collect::<Vec<_>>();
    assert_eq!(ends, vec![Event::End("nudge", false)]);
}

#[test]
fn test_explicit_command_claims_before_default() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let chassis = ids[0];
    let idle = scheduler
        .register_command(RecordingCommand::new("idle", &[chassis], &log).boxed())
        .unwrap();
    let drive = scheduler
        .register_command(RecordingCommand::new("drive", &[chassis], &log).boxed())
        .unwrap();
    scheduler.set_default_command(chassis, idle).unwrap();

    scheduler.schedule(drive).unwrap();
    let report = scheduler.run(&()).unwrap();
    assert!(report.promoted.is_empty());
    assert_eq!(scheduler.owner_of(chassis), Some(drive));

    scheduler.cancel(drive);
    let report = scheduler.run(&()).unwrap();
    assert_eq!(report.promoted.as_slice(), &[idle]);
}

#[test]
fn test_reaped_one_shot_id_goes_stale() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let first = scheduler
        .schedule_new(RecordingCommand::new("once", &[ids[0]], &log).finish_after(1).boxed())
        .unwrap();
    scheduler.run(&()).unwrap();
    assert_eq!(scheduler.command_state(first), None);

    let second = scheduler
        .schedule_new(RecordingCommand::new("again", &[ids[0]], &log).boxed())
        .unwrap();
    assert_eq!(first.index(), second.index());
    assert_ne!(first, second);
    assert!(matches!(scheduler.schedule(first), Err(SchedulerError::UnknownCommand(_))));
    assert!(scheduler.is_running(second));
}

#[test]
fn test_exhausted_one_shot_slot_never_aliases_old_handle() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let first = scheduler
        .schedule_new(RecordingCommand::new("once", &[ids[0]], &log).finish_after(1).boxed())
        .unwrap();
    scheduler.run(&()).unwrap();

    for _ in 0..u16::MAX {
        let cycled = scheduler
            .schedule_new(RecordingCommand::new("cycled", &[ids[0]], &log).boxed())
            .unwrap();
        assert_eq!(cycled.index(), first.index());
        assert!(scheduler.cancel(cycled));
        log.borrow_mut().clear();
    }

    let fresh = scheduler
        .schedule_new(RecordingCommand::new("fresh", &[ids[0]], &log).boxed())
        .unwrap();
    assert_ne!(fresh.index(), first.index());
    assert_eq!(scheduler.command_state(first), None);
    assert!(!scheduler.cancel(first));
    assert!(scheduler.is_running(fresh));
    assert_eq!(scheduler.owner_of(ids[0]), Some(fresh));
}

#[test]
fn test_persistent_command_reinitialized_on_reschedule() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis"]);
    let nudge = scheduler
        .register_command(RecordingCommand::new("nudge", &[ids[0]], &log).finish_after(2).boxed())
        .unwrap();

    scheduler.schedule(nudge).unwrap();
    scheduler.run(&()).unwrap();
    scheduler.run(&()).unwrap();
    assert_eq!(scheduler.command_state(nudge), Some(CommandState::Finished));

    scheduler.schedule(nudge).unwrap();
    let initializations = take_events(&log)
        .into_iter()
        .filter(|e| *e == Event::Initialize("nudge"))
        .count();
    assert_eq!(initializations, 2);

    // The execution count restarted, so one tick is not enough to finish.
    scheduler.run(&()).unwrap();
    assert!(scheduler.is_running(nudge));
    let report = scheduler.run(&()).unwrap();
    assert_eq!(report.finished.as_slice(), &[nudge]);
}

#[test]
fn test_rejection_leaves_interruptible_incumbent_alone() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis", "agitator"]);
    let drive = scheduler
        .register_command(RecordingCommand::new("drive", &[ids[0]], &log).boxed())
        .unwrap();
    let unjam = scheduler
        .register_command(
            RecordingCommand::new("unjam", &[ids[1]], &log)
                .non_interruptible()
                .boxed(),
        )
        .unwrap();
    let both = scheduler
        .register_command(RecordingCommand::new("both", &[ids[0], ids[1]], &log).boxed())
        .unwrap();

    scheduler.schedule(drive).unwrap();
    scheduler.schedule(unjam).unwrap();
    take_events(&log);

    assert_eq!(
        scheduler.schedule(both),
        Err(SchedulerError::Rejected {
            command: both,
            incumbent: unjam
        })
    );
    assert!(take_events(&log).is_empty());
    assert_eq!(scheduler.owner_of(ids[0]), Some(drive));
    assert_eq!(scheduler.owner_of(ids[1]), Some(unjam));
    assert_eq!(scheduler.command_state(drive), Some(CommandState::Running));
    assert_eq!(scheduler.running_commands(), &[drive, unjam]);
}

#[test]
fn test_safe_disconnect_cancels_and_skips_defaults() {
    let (mut scheduler, ids, log) = scheduler_with(&["chassis", "agitator"]);
    let idle = scheduler
        .register_command(RecordingCommand::new("idle", &[ids[0]], &log).boxed())
        .unwrap();
    scheduler.set_default_command(ids[0], idle).unwrap();
    let spin = scheduler
        .register_command(RecordingCommand::new("spin", &[ids[1]], &log).boxed())
        .unwrap();

    scheduler.schedule(spin).unwrap();
    scheduler.run(&()).unwrap();
    assert!(scheduler.is_running(idle));
    take_events(&log);

    scheduler.run_safe_disconnect().unwrap();
    let events = take_events(&log);
    assert!(events.contains(&Event::End("idle", true)));
    assert!(events.contains(&Event::End("spin", true)));
    assert!(events.contains(&Event::SafeRefresh("chassis")));
    assert!(!events.iter().any(|e| matches!(e, Event::Refresh(_) | Event::Initialize(_))));
    assert!(scheduler.running_commands().is_empty());
}

#[test]
fn test_registration_closes_after_first_run() {
    let (mut scheduler, _ids, log) = scheduler_with(&["chassis"]);
    scheduler.run(&()).unwrap();
    assert!(matches!(
        scheduler.register_subsystem(RecordingSubsystem::new("turret", &log)),
        Err(SchedulerError::RegistrationClosed { .. })
    ));
}

#[derive(Debug, Clone)]
enum Op {
    Schedule(usize),
    Cancel(usize),
    ScheduleOneShot(u8, bool),
    Run,
    CancelAll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..5usize).prop_map(Op::Schedule),
        (0..5usize).prop_map(Op::Cancel),
        (1..8u8, any::<bool>()).prop_map(|(mask, blocking)| Op::ScheduleOneShot(mask, blocking)),
        Just(Op::Run),
        Just(Op::CancelAll),
    ]
}

fn requirements_from_mask(ids: &[SubsystemId], mask: u8) -> Vec<SubsystemId> {
    ids.iter()
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, id)| *id)
        .collect()
}

proptest! {
    /// Random schedule/cancel/run sequences never break single ownership.
    #[test]
    fn ownership_invariant_holds(
        masks in prop::collection::vec(1..8u8, 5),
        blocking in prop::collection::vec(any::<bool>(), 5),
        finish in prop::collection::vec(prop::option::of(1..4u32), 5),
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let (mut scheduler, ids, log) = scheduler_with(&["a", "b", "c"]);

        let mut persistent = Vec::new();
        for k in 0..5 {
            let mut command = RecordingCommand::new("persistent", &requirements_from_mask(&ids, masks[k]), &log);
            if blocking[k] {
                command = command.non_interruptible();
            }
            if let Some(ticks) = finish[k] {
                command = command.finish_after(ticks);
            }
            persistent.push(scheduler.register_command(command.boxed()).unwrap());
        }
        if masks[0] & 1 != 0 {
            scheduler.set_default_command(ids[0], persistent[0]).unwrap();
        }

        for op in ops {
            let result = match op {
                Op::Schedule(k) => scheduler.schedule(persistent[k]).map(|_| ()),
                Op::Cancel(k) => {
                    scheduler.cancel(persistent[k]);
                    Ok(())
                }
                Op::ScheduleOneShot(mask, blocking) => {
                    let mut command = RecordingCommand::new("oneshot", &requirements_from_mask(&ids, mask), &log)
                        .finish_after(2);
                    if blocking {
                        command = command.non_interruptible();
                    }
                    scheduler.schedule_new(command.boxed()).map(|_| ())
                }
                Op::Run => scheduler.run(&()).map(|_| ()),
                Op::CancelAll => {
                    scheduler.cancel_all();
                    Ok(())
                }
            };

            if let Err(e) = &result {
                prop_assert!(!e.is_fatal(), "fatal error: {}", e);
            }
            prop_assert!(scheduler.verify_ownership().is_ok());

            for &id in &ids {
                if let Some(owner) = scheduler.owner_of(id) {
                    prop_assert!(scheduler.is_running(owner));
                    prop_assert!(scheduler.requirements_of(owner).unwrap().contains(id));
                }
            }
            for &running in scheduler.running_commands() {
                for required in scheduler.requirements_of(running).unwrap().iter() {
                    prop_assert_eq!(scheduler.owner_of(required), Some(running));
                }
            }
            log.borrow_mut().clear();
        }
    }
}
