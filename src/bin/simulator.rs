use clap::{App, Arg};
use cmdrobot::hal::SimMotor;
use cmdrobot::remote::{Channel, RemoteSnapshot, RemoteTransport, Switch, SwitchState, CHANNEL_MAX};
use cmdrobot::{Drivers, Robot, RobotConfig};
use colored::*;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};

const DEFAULT_TICKS: &str = "2000";
const STATUS_EVERY_TICKS: u64 = 500;

/// Synthetic operator: drives a slow weave, holds the agitator for a while,
/// asks for one unjam, then drops the link briefly.
struct DemoOperator {
    tick: u64,
}

impl RemoteTransport for DemoOperator {
    fn read(&mut self) -> RemoteSnapshot {
        self.tick += 1;
        let t = self.tick % 2000;

        if (1600..1700).contains(&t) {
            return RemoteSnapshot::default();
        }

        let phase = self.tick as f32 / 200.0;
        let left = (f32::from(CHANNEL_MAX) * 0.6 * phase.sin()) as i16;
        let right = (f32::from(CHANNEL_MAX) * 0.6 * phase.cos()) as i16;

        let right_switch = match t {
            400..=799 => SwitchState::Up,
            1000..=1049 => SwitchState::Down,
            _ => SwitchState::Mid,
        };

        RemoteSnapshot::neutral()
            .with_channel(Channel::LeftVertical, left)
            .with_channel(Channel::RightVertical, right)
            .with_switch(Switch::Right, right_switch)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("cmdrobot-simulator")
        .version("0.1.0")
        .about("Runs the command scheduler against simulated motors and a scripted operator")
        .arg(
            Arg::with_name("ticks")
                .short("n")
                .long("ticks")
                .value_name("TICKS")
                .help("Number of control ticks to run (0 runs forever)")
                .takes_value(true)
                .default_value(DEFAULT_TICKS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Tick count must be a valid number".into()),
                }),
        )
        .arg(
            Arg::with_name("period-ms")
                .short("p")
                .long("period-ms")
                .value_name("MS")
                .help("Override the control period from the config")
                .takes_value(true)
                .validator(|v| match v.parse::<u32>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Period must be a valid number".into()),
                }),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON robot configuration")
                .takes_value(true),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => RobotConfig::from_file(path)?,
        None => RobotConfig::default(),
    };
    if let Some(period) = matches.value_of("period-ms") {
        config.control_period_ms = period.parse()?;
        config.validate()?;
    }
    let ticks: u64 = matches.value_of("ticks").unwrap_or(DEFAULT_TICKS).parse()?;

    println!("{}", "Command-based Robot Simulator".bright_cyan().bold());
    println!("{}", "=============================".bright_cyan());
    println!(
        "{} {} ms   {} {}",
        "period:".bright_white(),
        config.control_period_ms,
        "ticks:".bright_white(),
        if ticks == 0 { "unbounded".to_string() } else { ticks.to_string() }
    );

    let chassis_motors = [SimMotor::new(), SimMotor::new(), SimMotor::new(), SimMotor::new()];
    let agitator_motor = SimMotor::new();
    let drivers = Drivers {
        remote: Box::new(DemoOperator { tick: 0 }),
        chassis_motors: [
            chassis_motors[0].boxed(),
            chassis_motors[1].boxed(),
            chassis_motors[2].boxed(),
            chassis_motors[3].boxed(),
        ],
        agitator_motor: agitator_motor.boxed(),
    };

    let period = Duration::from_millis(u64::from(config.control_period_ms));
    let mut robot = Robot::new(drivers, config)?;
    robot.init_subsystem_commands()?;

    let mut interval = time::interval(period);
    let mut tick: u64 = 0;

    loop {
        interval.tick().await;
        tick += 1;

        match robot.tick() {
            Ok(report) => {
                if !report.degraded.is_empty() {
                    warn!("degraded subsystems this tick: {:?}", report.degraded);
                }
            }
            Err(e) if e.is_fatal() => {
                error!("fatal scheduler error: {}", e);
                return Err(e.into());
            }
            Err(e) => warn!("tick {} failed: {}", tick, e),
        }

        if tick % STATUS_EVERY_TICKS == 0 {
            let chassis: Vec<i16> = chassis_motors.iter().map(SimMotor::last_output).collect();
            info!(
                "tick {}: connected={} running={} chassis={:?} agitator={}",
                tick,
                robot.operator_interface().is_connected(),
                robot.scheduler().running_commands().len(),
                chassis,
                agitator_motor.last_output()
            );
        }

        if ticks != 0 && tick >= ticks {
            break;
        }
    }

    let stats = serde_json::to_string_pretty(robot.scheduler().get_stats())?;
    println!("{}", "Scheduler statistics".bright_green().bold());
    println!("{}", stats);
    println!(
        "{} {}",
        "faults recorded:".bright_white(),
        robot.faults().history().len()
    );

    Ok(())
}
